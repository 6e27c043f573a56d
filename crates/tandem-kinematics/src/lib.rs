#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library of planar robot poses and velocity commands."]
#![doc = ""]
#![doc = "This crate provides the pose and twist types shared by the planner, angle"]
#![doc = "normalization, and constant-velocity pose advancement used to forward-simulate"]
#![doc = "an operator's steering command."]

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, hypot, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::KinematicsError;

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis of the frame the pose is expressed in).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// x position (m).
    pub x: f64,
    /// y position (m).
    pub y: f64,
    /// Heading (rad).
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose.
    ///
    /// # Arguments
    ///
    /// * `x`: x position in meters.
    /// * `y`: y position in meters.
    /// * `theta`: Heading in radians.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Normalize an angle to be within `[-PI, PI)`.
    ///
    /// Angles at `PI` will be normalized to `-PI`.
    pub fn normalize_angle(angle: f64) -> f64 {
        let a = angle % (2.0 * PI);
        if a >= PI {
            a - 2.0 * PI
        } else if a < -PI {
            a + 2.0 * PI
        } else {
            a
        }
    }

    /// Straight-line distance between the positions of two poses, ignoring heading.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        hypot(other.x - self.x, other.y - self.y)
    }

    /// Squared straight-line distance between two poses.
    pub fn distance_squared_to(&self, other: &Pose) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    /// Moves the pose along a fixed `heading` at a constant `speed` for `dt` seconds.
    ///
    /// The returned pose faces `heading` (normalized to `[-PI, PI)`), regardless of
    /// the heading of `self`.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn advanced(&self, heading: f64, speed: f64, dt: f64) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }

        Ok(Pose {
            x: self.x + speed * cos(heading) * dt,
            y: self.y + speed * sin(heading) * dt,
            theta: Pose::normalize_angle(heading),
        })
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2} rad)", self.x, self.y, self.theta)
    }
}

/// A twist expressed in the robot base frame.
/// A twist represents the commanded linear and angular velocities of the robot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    /// Linear x velocity (m/s) in the robot's base frame.
    pub vx: f64,
    /// Angular z velocity (rad/s) around the robot's base frame z-axis.
    pub wz: f64,
}

impl Twist {
    /// Construct a new twist.
    ///
    /// # Arguments
    ///
    /// * `vx`: Linear velocity along the robot's x-axis (m/s).
    /// * `wz`: Angular velocity around the robot's z-axis (rad/s).
    pub const fn new(vx: f64, wz: f64) -> Self {
        Twist { vx, wz }
    }

    /// Expresses the twist as a fraction of the given full-range limits.
    ///
    /// Returns `(vx / max_lin, wz / max_ang)`. No clamping is applied, so a
    /// command beyond the limits yields components with magnitude above one.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidVelocityLimit)` if either limit is not positive.
    pub fn normalized(&self, max_lin: f64, max_ang: f64) -> Result<(f64, f64), KinematicsError> {
        if max_lin <= 0.0 || max_ang <= 0.0 {
            return Err(KinematicsError::InvalidVelocityLimit("must be positive"));
        }
        Ok((self.vx / max_lin, self.wz / max_ang))
    }
}

impl fmt::Display for Twist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(vx: {:.2} m/s, ωz: {:.2} rad/s)", self.vx, self.wz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_pose_normalization() {
        assert!((Pose::normalize_angle(0.0) - 0.0).abs() < EPSILON);
        assert!((Pose::normalize_angle(PI) - (-PI)).abs() < EPSILON); // PI should map to -PI for [-PI, PI)
        assert!((Pose::normalize_angle(-PI) - -PI).abs() < EPSILON);
        assert!((Pose::normalize_angle(2.5 * PI) - 0.5 * PI).abs() < EPSILON);
        assert!((Pose::normalize_angle(-2.5 * PI) - -0.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_distance() {
        let a = Pose::new(1.0, 1.0, 0.3);
        let b = Pose::new(4.0, 5.0, -1.0);
        assert!((a.distance_to(&b) - 5.0).abs() < EPSILON);
        assert!((a.distance_squared_to(&b) - 25.0).abs() < EPSILON);
    }

    #[test]
    fn test_advanced_moves_along_heading() {
        let start = Pose::new(1.0, 1.0, 0.0); // own heading is ignored
        let moved = start.advanced(PI / 2.0, 0.2, 0.5).unwrap();

        // Expected: x = 1 + 0.2*cos(PI/2)*0.5 = 1
        //           y = 1 + 0.2*sin(PI/2)*0.5 = 1.1
        assert!((moved.x - 1.0).abs() < EPSILON);
        assert!((moved.y - 1.1).abs() < EPSILON);
        assert!((moved.theta - PI / 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_advanced_normalizes_heading() {
        let moved = Pose::default().advanced(3.0 * PI, 1.0, 1.0).unwrap();
        assert!((moved.x - (-1.0)).abs() < EPSILON);
        assert!((moved.theta - (-PI)).abs() < EPSILON);
    }

    #[test]
    fn test_advanced_negative_dt() {
        let result = Pose::default().advanced(0.0, 1.0, -0.1);
        assert!(matches!(result, Err(KinematicsError::NegativeTimeDelta("must be non-negative"))));
    }

    #[test]
    fn test_twist_normalized() {
        let (lin, ang) = Twist::new(0.5, -2.0).normalized(1.0, 4.0).unwrap();
        assert!((lin - 0.5).abs() < EPSILON);
        assert!((ang - (-0.5)).abs() < EPSILON);

        // Commands beyond the limit are not clamped here
        let (lin, _) = Twist::new(3.0, 0.0).normalized(1.5, 1.0).unwrap();
        assert!((lin - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_twist_normalized_invalid_limits() {
        assert!(matches!(
            Twist::new(1.0, 0.0).normalized(0.0, 1.0),
            Err(KinematicsError::InvalidVelocityLimit(_))
        ));
        assert!(matches!(
            Twist::new(1.0, 0.0).normalized(1.0, -1.0),
            Err(KinematicsError::InvalidVelocityLimit(_))
        ));
    }
}
