//! This module defines the error types used by the `tandem-navigation` crate.

#![warn(missing_docs)]

use tandem_kinematics::KinematicsError;
use thiserror::Error;

/// Error type for navigation operations.
///
/// This enum encapsulates all possible errors that can occur while maintaining
/// the fused map or running a planning cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    /// Error for invalid map resolution.
    /// This variant is returned when a map resolution is provided that is not positive.
    #[error("Invalid map resolution: {0}")]
    InvalidResolution(&'static str),
    /// Error for invalid map dimensions.
    /// This variant is returned when map width or height is zero, or the cell
    /// data does not cover `width * height` cells.
    #[error("Invalid map dimensions: {0}")]
    InvalidDimensions(&'static str),
    /// Error for out-of-bounds access.
    /// This variant is returned when attempting to access map cells outside the valid range.
    #[error("Map access out of bounds: {0}")]
    OutOfBounds(&'static str),
    /// No global map has been received yet.
    #[error("Global map has not been received yet")]
    MapNotReady,
    /// An incremental map update did not match the current map size.
    #[error("Map update carries {actual} cells, map has {expected}")]
    DataLengthMismatch {
        /// Cells in the current map.
        expected: usize,
        /// Cells carried by the update.
        actual: usize,
    },
    /// A pose could not be transformed between two frames.
    #[error("Cannot transform from '{source_frame}' to '{target_frame}': {reason}")]
    Transform {
        /// Frame the pose should be expressed in.
        target_frame: String,
        /// Frame the pose is currently expressed in.
        source_frame: String,
        /// Why the lookup failed.
        reason: String,
    },
    /// The planning cycle ended with no candidate path to commit.
    #[error("No path found to the requested goal")]
    NoPathFound,
    /// A pose or velocity computation failed.
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}
