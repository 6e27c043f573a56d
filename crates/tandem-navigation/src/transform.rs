//! Frame transforms for poses handed to the planner.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use nalgebra::{Isometry2, Point2};
use tandem_kinematics::Pose;

use crate::error::NavigationError;
use crate::path::FramedPose;

/// Source of rigid transforms between named frames.
pub trait FrameTransformer: Send + Sync {
    /// Transform taking coordinates in `source_frame` to `target_frame`,
    /// waiting at most `timeout` for it to become available.
    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Isometry2<f64>, NavigationError>;

    /// Expresses `pose` in `target_frame`. Poses already in that frame are returned as-is.
    fn transform_pose(
        &self,
        pose: &FramedPose,
        target_frame: &str,
        timeout: Duration,
    ) -> Result<FramedPose, NavigationError> {
        if pose.frame_id == target_frame {
            return Ok(pose.clone());
        }
        let transform = self.lookup(target_frame, &pose.frame_id, timeout)?;
        let position = transform * Point2::new(pose.pose.x, pose.pose.y);
        let theta = Pose::normalize_angle(pose.pose.theta + transform.rotation.angle());
        Ok(FramedPose::new(
            target_frame,
            Pose::new(position.x, position.y, theta),
        ))
    }
}

/// Fixed tree of transforms, answered without waiting.
#[derive(Debug, Clone, Default)]
pub struct StaticTransformTree {
    // (parent, child) -> child-to-parent transform
    edges: HashMap<(String, String), Isometry2<f64>>,
}

impl StaticTransformTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transform taking `child` coordinates into `parent`.
    pub fn set_transform(
        &mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
        child_to_parent: Isometry2<f64>,
    ) {
        self.edges
            .insert((parent.into(), child.into()), child_to_parent);
    }

    fn neighbours<'a>(
        &'a self,
        frame: &'a str,
    ) -> impl Iterator<Item = (&'a str, Isometry2<f64>)> + 'a {
        self.edges
            .iter()
            .filter_map(move |((parent, child), transform)| {
                if child == frame {
                    Some((parent.as_str(), *transform))
                } else if parent == frame {
                    Some((child.as_str(), transform.inverse()))
                } else {
                    None
                }
            })
    }
}

impl FrameTransformer for StaticTransformTree {
    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        _timeout: Duration,
    ) -> Result<Isometry2<f64>, NavigationError> {
        if target_frame == source_frame {
            return Ok(Isometry2::identity());
        }

        let mut visited: HashSet<&str> = HashSet::from([source_frame]);
        let mut queue = VecDeque::from([(source_frame, Isometry2::identity())]);
        while let Some((frame, to_frame)) = queue.pop_front() {
            for (next, step) in self.neighbours(frame) {
                if !visited.insert(next) {
                    continue;
                }
                let to_next = step * to_frame;
                if next == target_frame {
                    return Ok(to_next);
                }
                queue.push_back((next, to_next));
            }
        }

        Err(NavigationError::Transform {
            target_frame: target_frame.to_string(),
            source_frame: source_frame.to_string(),
            reason: "frames are not connected".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;
    use std::f64::consts::FRAC_PI_2;

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn tree() -> StaticTransformTree {
        let mut tree = StaticTransformTree::new();
        tree.set_transform("map", "odom", Isometry2::new(Vector2::new(1.0, 0.0), FRAC_PI_2));
        tree.set_transform("odom", "base_link", Isometry2::new(Vector2::new(0.0, 2.0), 0.0));
        tree
    }

    #[test]
    fn test_chained_lookup() {
        let pose = FramedPose::new("base_link", Pose::new(1.0, 0.0, 0.0));
        let in_map = tree().transform_pose(&pose, "map", TIMEOUT).unwrap();

        // base_link (1, 0) -> odom (1, 2) -> map rotate 90 deg, shift x by 1
        assert_eq!(in_map.frame_id, "map");
        assert!((in_map.pose.x - (-1.0)).abs() < 1e-9);
        assert!((in_map.pose.y - 1.0).abs() < 1e-9);
        assert!((in_map.pose.theta - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_lookup() {
        let pose = FramedPose::new("map", Pose::new(1.0, 0.0, FRAC_PI_2));
        let in_odom = tree().transform_pose(&pose, "odom", TIMEOUT).unwrap();
        assert!(in_odom.pose.x.abs() < 1e-9);
        assert!(in_odom.pose.y.abs() < 1e-9);
        assert!(in_odom.pose.theta.abs() < 1e-9);
    }

    #[test]
    fn test_same_frame_and_unknown_frame() {
        let pose = FramedPose::new("map", Pose::new(3.0, 4.0, 0.5));
        assert_eq!(tree().transform_pose(&pose, "map", TIMEOUT), Ok(pose));

        let lost = FramedPose::new("camera", Pose::default());
        assert!(matches!(
            tree().transform_pose(&lost, "map", TIMEOUT),
            Err(NavigationError::Transform { .. })
        ));
    }
}
