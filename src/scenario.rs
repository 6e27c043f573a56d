//! Scenario replay: drives the node from a TOML script instead of live inputs.
//!
//! Graph search is not part of this crate, so the scenario lists the candidate
//! paths the [`ScenarioEngine`] should hand out.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use nalgebra::{Isometry2, Vector2};
use serde::Deserialize;
use tandem_kinematics::{Pose, Twist};
use tandem_navigation::{
    CandidatePath, FramedPose, GraphEngine, GridMap, GridPoint, MapInfo, MapPoint,
    OCCUPANCY_FREE, OCCUPANCY_LETHAL, StaticTransformTree,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::TandemConfig;
use crate::node::{NodeEvent, Outputs, PlannerNode};

/// Occupancy grid as written in a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct MapSpec {
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    #[serde(default)]
    pub origin: [f64; 2],
    #[serde(default = "default_frame")]
    pub frame_id: String,
    /// Full cell data; when absent the map starts free.
    #[serde(default)]
    pub data: Option<Vec<i8>>,
    /// Cells to mark lethal, as `[x, y]`.
    #[serde(default)]
    pub obstacles: Vec<[i64; 2]>,
}

fn default_frame() -> String {
    "map".to_string()
}

impl MapSpec {
    pub fn to_grid(&self) -> anyhow::Result<GridMap> {
        let info = MapInfo::new(
            self.width,
            self.height,
            self.resolution,
            Vector2::new(self.origin[0], self.origin[1]),
            self.frame_id.clone(),
        )?;
        let mut grid = match &self.data {
            Some(data) => GridMap::from_data(info, data.clone())?,
            None => GridMap::new(info, OCCUPANCY_FREE),
        };
        for &[x, y] in &self.obstacles {
            grid.set_value(GridPoint::new(x, y), OCCUPANCY_LETHAL)?;
        }
        Ok(grid)
    }
}

/// Candidate path served by the scenario engine, in map cells.
#[derive(Debug, Clone, Deserialize)]
pub struct PathSpec {
    pub id: u32,
    pub cost: f64,
    pub waypoints: Vec<[f64; 2]>,
}

/// Fixed transform `child -> parent`, as `[x, y, theta]`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformSpec {
    pub parent: String,
    pub child: String,
    pub transform: [f64; 3],
}

/// One scripted input.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Step {
    GlobalMap(MapSpec),
    GlobalUpdate(MapSpec),
    LocalMap(MapSpec),
    Velocity { vx: f64, wz: f64 },
    Preferred { index: usize },
    Cancel,
    RefreshGraph,
    Plan {
        start: [f64; 3],
        goal: [f64; 3],
        #[serde(default = "default_frame")]
        start_frame: String,
        #[serde(default = "default_frame")]
        goal_frame: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub paths: Vec<PathSpec>,
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml(&text)
    }

    pub fn transform_tree(&self) -> StaticTransformTree {
        let mut tree = StaticTransformTree::new();
        for spec in &self.transforms {
            let [x, y, theta] = spec.transform;
            tree.set_transform(
                spec.parent.clone(),
                spec.child.clone(),
                Isometry2::new(Vector2::new(x, y), theta),
            );
        }
        tree
    }
}

/// Graph engine that serves the paths listed in a scenario.
///
/// Trimming drops the waypoints before the one closest to the new start and
/// prepends the start. Interpolation resamples each path at a fixed spacing.
#[derive(Debug, Default)]
pub struct ScenarioEngine {
    paths: Vec<CandidatePath>,
    previous: Vec<CandidatePath>,
    local_vertices: Vec<GridPoint>,
    resolution: f64,
    builds: usize,
}

impl ScenarioEngine {
    pub fn new(paths: &[PathSpec]) -> Self {
        Self {
            paths: paths
                .iter()
                .map(|spec| {
                    let waypoints = spec
                        .waypoints
                        .iter()
                        .map(|&[x, y]| MapPoint::new(x, y))
                        .collect();
                    CandidatePath::new(spec.id, waypoints, spec.cost)
                })
                .collect(),
            resolution: 1.0,
            ..Self::default()
        }
    }

    /// Number of graph builds so far.
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn local_vertices(&self) -> &[GridPoint] {
        &self.local_vertices
    }

    fn trim(path: &CandidatePath, start: GridPoint) -> CandidatePath {
        let start = start.to_map_point();
        let closest = path
            .waypoints
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                nalgebra::distance(*a, &start).total_cmp(&nalgebra::distance(*b, &start))
            })
            .map_or(0, |(i, _)| i);

        let mut waypoints = vec![start];
        waypoints.extend(path.waypoints.iter().skip(closest + 1).copied());
        let cost = waypoints
            .windows(2)
            .map(|pair| nalgebra::distance(&pair[0], &pair[1]))
            .sum();
        CandidatePath::new(path.id, waypoints, cost)
    }
}

impl GraphEngine for ScenarioEngine {
    fn map_to_graph(&mut self, map: &GridMap) {
        self.resolution = map.get_info().resolution;
        self.builds += 1;
    }

    fn set_local_vertices(&mut self, vertices: &[GridPoint]) {
        self.local_vertices = vertices.to_vec();
    }

    fn has_previous_paths(&self) -> bool {
        !self.previous.is_empty()
    }

    fn clear_previous_paths(&mut self) {
        self.previous.clear();
    }

    fn get_paths(&mut self, _start: GridPoint, _goal: GridPoint, num_paths: usize) -> Vec<CandidatePath> {
        self.previous = self.paths.iter().take(num_paths).cloned().collect();
        self.previous.clone()
    }

    fn replan(
        &mut self,
        start: GridPoint,
        _goal: GridPoint,
        num_paths: usize,
        _preferred: usize,
    ) -> Vec<CandidatePath> {
        self.previous = self
            .previous
            .iter()
            .take(num_paths)
            .map(|path| Self::trim(path, start))
            .collect();
        self.previous.clone()
    }

    fn interpolate_paths(&self, paths: &mut [CandidatePath], waypoint_sep: f64) {
        let step = waypoint_sep / self.resolution;
        if !(step > 0.0) {
            return;
        }
        for path in paths {
            let Some(&first) = path.waypoints.first() else {
                continue;
            };
            let mut resampled = vec![first];
            for pair in path.waypoints.windows(2) {
                let segment = pair[1] - pair[0];
                let pieces = (segment.norm() / step).ceil().max(1.0) as usize;
                resampled.extend((1..=pieces).map(|k| pair[0] + segment * (k as f64 / pieces as f64)));
            }
            path.waypoints = resampled;
        }
    }

    fn adjacency_list(&self) -> Vec<Vec<usize>> {
        let mut adjacency = Vec::new();
        for path in &self.paths {
            let base = adjacency.len();
            let count = path.waypoints.len();
            for i in 0..count {
                let mut neighbours = Vec::new();
                if i > 0 {
                    neighbours.push(base + i - 1);
                }
                if i + 1 < count {
                    neighbours.push(base + i + 1);
                }
                adjacency.push(neighbours);
            }
        }
        adjacency
    }

    fn nodes(&self) -> Vec<MapPoint> {
        self.paths
            .iter()
            .flat_map(|path| path.waypoints.iter().copied())
            .collect()
    }
}

/// Summary of a replayed scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub plans: Vec<Result<u32, String>>,
}

/// Replays `scenario` against a fresh node and reports each planning result.
pub async fn replay(config: &TandemConfig, scenario: &Scenario) -> anyhow::Result<ReplayReport> {
    let outputs = Outputs::new(config.node.topic_capacity);
    let node = PlannerNode::new(
        config.planner.clone(),
        ScenarioEngine::new(&scenario.paths),
        Arc::new(scenario.transform_tree()),
        outputs,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh = tokio::spawn(node.clone().run_refresh(shutdown_rx));

    let mut report = ReplayReport::default();
    for (i, step) in scenario.steps.iter().enumerate() {
        match step {
            Step::GlobalMap(spec) => node.apply(NodeEvent::GlobalMap(spec.to_grid()?))?,
            Step::GlobalUpdate(spec) => {
                let data = spec.to_grid()?.get_data().to_vec();
                if let Err(e) = node.apply(NodeEvent::GlobalUpdate(data)) {
                    warn!(step = i, error = %e, "Global update rejected");
                }
            }
            Step::LocalMap(spec) => {
                if let Err(e) = node.apply(NodeEvent::LocalMap(spec.to_grid()?)) {
                    warn!(step = i, error = %e, "Local map rejected");
                }
            }
            Step::Velocity { vx, wz } => node.apply(NodeEvent::Velocity(Twist::new(*vx, *wz)))?,
            Step::Preferred { index } => node.apply(NodeEvent::PreferredIndex(*index))?,
            Step::Cancel => node.apply(NodeEvent::Cancel)?,
            Step::RefreshGraph => {
                if !node.refresh_graph() {
                    warn!(step = i, "No map to build the routing graph from");
                }
            }
            Step::Plan {
                start,
                goal,
                start_frame,
                goal_frame,
            } => {
                let start = FramedPose::new(start_frame.clone(), Pose::new(start[0], start[1], start[2]));
                let goal = FramedPose::new(goal_frame.clone(), Pose::new(goal[0], goal[1], goal[2]));
                match node.plan(&start, &goal) {
                    Ok(plan) => {
                        info!(step = i, id = plan.id, poses = plan.poses.len(), length = plan.length(), "Plan committed");
                        report.plans.push(Ok(plan.id));
                    }
                    Err(e) => {
                        error!(step = i, error = %e, "Planning failed");
                        report.plans.push(Err(e.to_string()));
                    }
                }
            }
        }
    }

    // Ignore send errors, the refresh task may already have finished
    let _ = shutdown_tx.send(true);
    refresh.await??;
    Ok(report)
}
