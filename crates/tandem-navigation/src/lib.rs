#![warn(missing_docs)]
#![doc = "Shared-control global planning over a fused occupancy map."]
#![doc = ""]
#![doc = "The crate keeps a global occupancy grid with a local sensor view overlaid on"]
#![doc = "it, drives an external graph engine to obtain alternative paths, and picks"]
#![doc = "the path that best matches the operator's steering command."]

pub mod arbitration;
pub mod config;
pub mod error;
pub mod graph;
pub mod intent;
pub mod map;
pub mod path;
pub mod session;
pub mod transform;

pub use arbitration::{Arbitration, PathArbitrator, vector_angle};
pub use config::PlannerConfig;
pub use error::NavigationError;
pub use graph::{GraphArtifacts, GraphEngine};
pub use intent::{IntentSimulator, IntentTrajectory};
pub use map::{
    FusedMap, FusionReport, GridMap, GridPoint, MapFusionEngine, MapInfo, MapPoint,
    OCCUPANCY_FREE, OCCUPANCY_LETHAL, OCCUPANCY_UNKNOWN, OverlayPatch, WorldPoint,
};
pub use path::{CandidatePath, FramedPose, PlannedPath};
pub use session::{PathSet, PlanOutcome, PlanStrategy, PlanningSession, SessionControl};
pub use transform::{FrameTransformer, StaticTransformTree};
