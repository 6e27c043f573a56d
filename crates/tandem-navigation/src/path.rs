//! Candidate paths in grid and world form.

use tandem_kinematics::Pose;

use crate::map::{MapInfo, MapPoint};

/// One alternative route produced by the graph engine, in map-grid units.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePath {
    /// Identifier assigned by the engine, kept stable across trims.
    pub id: u32,
    /// Ordered waypoints from start to goal.
    pub waypoints: Vec<MapPoint>,
    /// Engine cost estimate for the whole path.
    pub cost: f64,
}

impl CandidatePath {
    /// Creates a candidate path.
    pub fn new(id: u32, waypoints: Vec<MapPoint>, cost: f64) -> Self {
        Self { id, waypoints, cost }
    }
}

/// A pose tagged with the frame it is expressed in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FramedPose {
    /// Frame identifier.
    pub frame_id: String,
    /// Pose in that frame.
    pub pose: Pose,
}

impl FramedPose {
    /// Creates a framed pose.
    pub fn new(frame_id: impl Into<String>, pose: Pose) -> Self {
        Self {
            frame_id: frame_id.into(),
            pose,
        }
    }
}

/// A candidate path converted to world coordinates in the map frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
    /// Identifier of the candidate this path was built from.
    pub id: u32,
    /// Frame of every pose.
    pub frame_id: String,
    /// Ordered poses from start to goal.
    pub poses: Vec<Pose>,
    /// Engine cost estimate.
    pub cost: f64,
}

impl PlannedPath {
    /// Converts grid waypoints to world poses.
    ///
    /// The first pose takes `start_theta` and the last takes `goal_theta`;
    /// intermediate poses carry a zero heading.
    pub fn from_candidate(
        candidate: &CandidatePath,
        info: &MapInfo,
        start_theta: f64,
        goal_theta: f64,
    ) -> Self {
        let mut poses: Vec<Pose> = candidate
            .waypoints
            .iter()
            .map(|waypoint| {
                let world = info.map_to_world(waypoint);
                Pose::new(world.x, world.y, 0.0)
            })
            .collect();

        if let Some(first) = poses.first_mut() {
            first.theta = start_theta;
        }
        if let Some(last) = poses.last_mut() {
            last.theta = goal_theta;
        }

        Self {
            id: candidate.id,
            frame_id: info.frame_id.clone(),
            poses,
            cost: candidate.cost,
        }
    }

    /// Whether the path has no poses.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Total length of the path (m).
    pub fn length(&self) -> f64 {
        self.poses
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }
}
