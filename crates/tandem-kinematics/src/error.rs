#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! This module defines error types that can occur while advancing poses or
//! normalizing velocity commands.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for negative time delta.
    /// This variant is returned when a negative time delta is used for pose updates.
    NegativeTimeDelta(&'static str),
    /// Error for an invalid velocity limit.
    /// This variant is returned when a command is normalized against a limit that is not positive.
    InvalidVelocityLimit(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
            KinematicsError::InvalidVelocityLimit(msg) => {
                write!(f, "Invalid velocity limit: {}", msg)
            }
        }
    }
}

impl core::error::Error for KinematicsError {}
