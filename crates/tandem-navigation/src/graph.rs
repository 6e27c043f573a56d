//! Seam to the routing-graph collaborator.
//!
//! Building a routable graph from the occupancy grid, searching it for
//! alternative routes, trimming existing routes and resampling them are owned
//! by an implementation of [`GraphEngine`]. The planner only drives it.

use crate::map::{GridMap, GridPoint, MapInfo, MapPoint, WorldPoint};
use crate::path::CandidatePath;

/// Routing graph built from the fused map, able to produce alternative paths.
pub trait GraphEngine: Send {
    /// Rebuilds the routing graph from the map.
    fn map_to_graph(&mut self, map: &GridMap);

    /// Registers extra vertices (in map cells) to include in the next graph build.
    fn set_local_vertices(&mut self, vertices: &[GridPoint]);

    /// Whether paths from an earlier search are retained for trimming.
    fn has_previous_paths(&self) -> bool;

    /// Forgets paths retained from earlier searches.
    fn clear_previous_paths(&mut self);

    /// Searches for up to `num_paths` alternative paths from `start` to `goal`.
    fn get_paths(&mut self, start: GridPoint, goal: GridPoint, num_paths: usize)
    -> Vec<CandidatePath>;

    /// Trims or extends the retained paths so they begin at `start`, keeping
    /// their ids. `preferred` is the index currently favoured by the operator.
    fn replan(
        &mut self,
        start: GridPoint,
        goal: GridPoint,
        num_paths: usize,
        preferred: usize,
    ) -> Vec<CandidatePath>;

    /// Resamples each path so consecutive waypoints are `waypoint_sep` apart.
    fn interpolate_paths(&self, paths: &mut [CandidatePath], waypoint_sep: f64);

    /// Neighbours of each graph node, by node index.
    fn adjacency_list(&self) -> Vec<Vec<usize>>;

    /// Position of each graph node, in map cells.
    fn nodes(&self) -> Vec<MapPoint>;
}

/// Routing graph published after each refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphArtifacts {
    /// Frame of the node positions.
    pub frame_id: String,
    /// Neighbours of each node.
    pub adjacency: Vec<Vec<usize>>,
    /// Node positions in world coordinates.
    pub nodes: Vec<WorldPoint>,
}

impl GraphArtifacts {
    /// Reads the graph out of `engine`, placing nodes in the world with `info`.
    pub fn collect<E: GraphEngine + ?Sized>(engine: &E, info: &MapInfo) -> Self {
        Self {
            frame_id: info.frame_id.clone(),
            adjacency: engine.adjacency_list(),
            nodes: engine
                .nodes()
                .iter()
                .map(|node| info.map_to_world(node))
                .collect(),
        }
    }
}
