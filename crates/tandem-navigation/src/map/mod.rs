//! Map-related functionality for navigation.
//!
//! This module provides the occupancy grid, the overlay of local sensor views
//! onto it, and the point types used to address it.

pub mod fused;
pub mod fusion;
pub mod grid_map;
pub mod point_types;

pub use fused::FusedMap;
pub use fusion::{FusionReport, MapFusionEngine, OverlayEntry, OverlayPatch};
pub use grid_map::{GridMap, MapInfo, OCCUPANCY_FREE, OCCUPANCY_LETHAL, OCCUPANCY_UNKNOWN};
pub use point_types::{GridPoint, MapPoint, WorldPoint};
