//! Planner configuration.

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Tuning parameters of the shared-control planner.
///
/// Every field has a default, so a configuration source only needs to name the
/// values it changes.
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Local cells at or above this occupancy are fused into the global map.
    pub occupancy_threshold: i8,
    /// Graph refresh rate (Hz). Zero refreshes once, after the first map arrives.
    pub update_voronoi_rate: f64,
    /// Number of candidate paths requested per plan.
    pub num_paths: usize,
    /// Within this distance of the goal (m) the last committed path is reused.
    pub xy_goal_tolerance: f64,
    /// Within this distance of the goal (m) operator steering is ignored.
    pub near_goal_threshold: f64,
    /// Horizon of the intent simulation (s).
    pub forward_sim_time: f64,
    /// Distance between consecutive intent points (m).
    pub forward_sim_resolution: f64,
    /// Constant speed of the intent simulation (m/s).
    pub forward_sim_speed: f64,
    /// Full-range linear command (m/s).
    pub joy_max_lin: f64,
    /// Full-range angular command (rad/s).
    pub joy_max_ang: f64,
    /// Fraction of full command range above which the operator is steering.
    pub joy_input_thresh: f64,
    /// Paths whose deviation is at least this multiple of the best are disqualified.
    pub selection_threshold: f64,
    /// Register the local map corners as routing vertices.
    pub add_local_costmap_corners: bool,
    /// Ignore incremental global map updates.
    pub static_global_map: bool,
    /// Fuse local map updates into the global map.
    pub subscribe_local_costmap: bool,
    /// Spacing between interpolated path waypoints (m).
    pub path_waypoint_sep: f64,
    /// Bound on a single frame transform lookup (ms).
    pub transform_timeout_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            occupancy_threshold: 65,
            update_voronoi_rate: 0.0,
            num_paths: 3,
            xy_goal_tolerance: 0.15,
            near_goal_threshold: 1.0,
            forward_sim_time: 1.0,
            forward_sim_resolution: 0.1,
            forward_sim_speed: 0.2,
            joy_max_lin: 1.0,
            joy_max_ang: 1.0,
            joy_input_thresh: 0.8,
            selection_threshold: 1.5,
            add_local_costmap_corners: false,
            static_global_map: false,
            subscribe_local_costmap: true,
            path_waypoint_sep: 0.2,
            transform_timeout_ms: 1000,
        }
    }
}
