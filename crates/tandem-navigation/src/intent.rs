//! Short-horizon simulation of the operator's steering command.

use nalgebra::Vector2;
use tandem_kinematics::{Pose, Twist};

use crate::config::PlannerConfig;
use crate::error::NavigationError;
use crate::map::WorldPoint;

/// Slack when comparing accumulated step times against the horizon.
const HORIZON_EPSILON: f64 = 1e-9;

/// Where the operator's current command would take the robot, in world coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentTrajectory {
    /// Ordered points, starting at the robot's position.
    pub points: Vec<WorldPoint>,
}

impl IntentTrajectory {
    /// Net displacement from the first point to the last.
    pub fn displacement(&self) -> Vector2<f64> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last - first,
            _ => Vector2::zeros(),
        }
    }

    /// Straight-line length of the trajectory (m).
    pub fn arc_length(&self) -> f64 {
        self.displacement().norm()
    }
}

/// Turns an operator command into an [`IntentTrajectory`] and decides whether
/// the command counts as active steering.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentSimulator {
    horizon: f64,
    step: f64,
    speed: f64,
    max_lin: f64,
    max_ang: f64,
    input_thresh: f64,
}

impl IntentSimulator {
    /// Creates a simulator from the `forward_sim_*` and `joy_*` parameters.
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            horizon: config.forward_sim_time,
            step: config.forward_sim_resolution,
            speed: config.forward_sim_speed,
            max_lin: config.joy_max_lin,
            max_ang: config.joy_max_ang,
            input_thresh: config.joy_input_thresh,
        }
    }

    /// Whether `command` lies strictly outside the ellipse spanning
    /// `joy_input_thresh` of the full command range.
    ///
    /// Invalid command limits never trigger.
    pub fn is_steering(&self, command: &Twist) -> bool {
        match command.normalized(self.max_lin, self.max_ang) {
            Ok((lin, ang)) => lin * lin + ang * ang > self.input_thresh * self.input_thresh,
            Err(_) => false,
        }
    }

    /// Steps along the commanded direction at constant speed until the horizon.
    ///
    /// The heading is the pose heading offset by the command direction, with
    /// both normalized components capped at one. Points are spaced
    /// `forward_sim_resolution` apart; the last one lands exactly on the horizon.
    pub fn simulate(&self, pose: &Pose, command: &Twist) -> Result<IntentTrajectory, NavigationError> {
        let (lin, ang) = command.normalized(self.max_lin, self.max_ang)?;
        let heading = pose.theta + ang.min(1.0).atan2(lin.min(1.0));

        let mut points = vec![WorldPoint::new(pose.x, pose.y)];
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let dt = self.step / self.speed;
        if !([self.speed, self.step, self.horizon, dt].into_iter().all(positive)
            && self.horizon / dt <= f64::from(u32::MAX))
        {
            return Ok(IntentTrajectory { points });
        }

        let mut k = 1u32;
        loop {
            let t = (f64::from(k) * dt).min(self.horizon);
            let next = pose.advanced(heading, self.speed, t)?;
            points.push(WorldPoint::new(next.x, next.y));
            if t >= self.horizon - HORIZON_EPSILON {
                break;
            }
            k += 1;
        }

        Ok(IntentTrajectory { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    const EPSILON: f64 = 1e-9;

    fn simulator() -> IntentSimulator {
        IntentSimulator::new(&PlannerConfig::default())
    }

    #[test]
    fn test_threshold_is_strict() {
        let sim = simulator();
        assert!(!sim.is_steering(&Twist::new(0.8, 0.0)));
        assert!(sim.is_steering(&Twist::new(0.81, 0.0)));
        assert!(!sim.is_steering(&Twist::new(0.0, 0.0)));
        // 0.6^2 + 0.6^2 = 0.72 > 0.64
        assert!(sim.is_steering(&Twist::new(0.6, -0.6)));
    }

    #[test]
    fn test_invalid_limits_never_trigger() {
        let config = PlannerConfig {
            joy_max_lin: 0.0,
            ..PlannerConfig::default()
        };
        assert!(!IntentSimulator::new(&config).is_steering(&Twist::new(5.0, 5.0)));
    }

    #[test]
    fn test_non_finite_parameters_yield_start_only() {
        let configs = [
            PlannerConfig {
                forward_sim_time: f64::INFINITY,
                ..PlannerConfig::default()
            },
            PlannerConfig {
                forward_sim_speed: f64::INFINITY,
                ..PlannerConfig::default()
            },
            PlannerConfig {
                forward_sim_resolution: f64::NAN,
                ..PlannerConfig::default()
            },
            PlannerConfig {
                forward_sim_resolution: 1e-300,
                forward_sim_speed: 1e300,
                ..PlannerConfig::default()
            },
        ];
        for config in configs {
            let trajectory = IntentSimulator::new(&config)
                .simulate(&Pose::new(1.0, 2.0, 0.0), &Twist::new(1.0, 0.0))
                .unwrap();
            assert_eq!(trajectory.points, vec![WorldPoint::new(1.0, 2.0)]);
        }
    }

    #[test]
    fn test_forward_command_reaches_horizon() {
        let trajectory = simulator()
            .simulate(&Pose::new(1.0, 2.0, 0.0), &Twist::new(1.0, 0.0))
            .unwrap();

        // 1.0 s at 0.2 m/s in 0.1 m steps
        assert_eq!(trajectory.points.len(), 3);
        assert_eq!(trajectory.points[0], WorldPoint::new(1.0, 2.0));
        let last = trajectory.points[2];
        assert!((last.x - 1.2).abs() < EPSILON);
        assert!((last.y - 2.0).abs() < EPSILON);
        assert!((trajectory.arc_length() - 0.2).abs() < EPSILON);
    }

    #[test]
    fn test_last_step_is_clipped_to_horizon() {
        let config = PlannerConfig {
            forward_sim_time: 0.75,
            ..PlannerConfig::default()
        };
        let trajectory = IntentSimulator::new(&config)
            .simulate(&Pose::default(), &Twist::new(1.0, 0.0))
            .unwrap();

        // Steps at 0.5 s, then clipped to 0.75 s
        assert_eq!(trajectory.points.len(), 3);
        assert!((trajectory.points[1].x - 0.1).abs() < EPSILON);
        assert!((trajectory.points[2].x - 0.15).abs() < EPSILON);
    }

    #[test]
    fn test_direction_combines_heading_and_command() {
        let pose = Pose::new(0.0, 0.0, FRAC_PI_4);
        // Angular command saturates at one, giving a 45 degree offset
        let trajectory = simulator().simulate(&pose, &Twist::new(1.0, 3.0)).unwrap();

        let displacement = trajectory.displacement();
        assert!(displacement.x.abs() < EPSILON);
        assert!((displacement.y - 0.2).abs() < EPSILON);
    }
}
