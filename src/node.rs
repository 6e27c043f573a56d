//! The planner node: shared state, one apply function per input event, the
//! graph refresh task and the planning request handler.
//!
//! Locks are always taken in the order session, engine, map. The map lock is
//! only held to fuse a local view or to copy a snapshot.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use parking_lot::Mutex;
use tandem_kinematics::Twist;
use tandem_navigation::{
    FramedPose, FrameTransformer, FusedMap, FusionReport, GraphArtifacts, GraphEngine, GridMap,
    GridPoint, IntentTrajectory, MapFusionEngine, NavigationError, PlannedPath, PlannerConfig,
    PlanningSession, SessionControl,
};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::blackboard::{self, Blackboard};
use crate::bus::Topic;

/// Interval between checks for the first map in one-shot refresh mode.
const MAP_WAIT_RETRY: Duration = Duration::from_secs(1);

/// One external input to the node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Full replacement of the global map.
    GlobalMap(GridMap),
    /// Replacement cell data for the current global map.
    GlobalUpdate(Vec<i8>),
    /// Latest local sensor view.
    LocalMap(GridMap),
    /// Operator velocity command.
    Velocity(Twist),
    /// Operator's preferred path index.
    PreferredIndex(usize),
    /// Drop cached paths.
    Cancel,
}

/// Broadcast outputs of the node.
#[derive(Debug, Clone)]
pub struct Outputs {
    /// The committed plan of each successful request.
    pub plan: Topic<PlannedPath>,
    /// Every candidate path of the last request.
    pub paths: Topic<Vec<PlannedPath>>,
    /// Routing graph snapshot after each rebuild.
    pub graph: Topic<GraphArtifacts>,
    /// Simulated operator trajectory when the operator is steering.
    pub intent: Topic<IntentTrajectory>,
}

impl Outputs {
    /// Creates all topics with the same buffer `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            plan: Topic::new("plan", capacity),
            paths: Topic::new("all_paths", capacity),
            graph: Topic::new("graph", capacity),
            intent: Topic::new("user_direction", capacity),
        }
    }
}

/// Shared-control planner node. Cloning yields another handle to the same state.
pub struct PlannerNode<E> {
    config: PlannerConfig,
    map: Arc<Mutex<FusedMap>>,
    engine: Arc<Mutex<E>>,
    session: Arc<Mutex<PlanningSession>>,
    control: Arc<SessionControl>,
    operator: Blackboard,
    transformer: Arc<dyn FrameTransformer>,
    outputs: Outputs,
}

impl<E> Clone for PlannerNode<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            map: Arc::clone(&self.map),
            engine: Arc::clone(&self.engine),
            session: Arc::clone(&self.session),
            control: Arc::clone(&self.control),
            operator: Arc::clone(&self.operator),
            transformer: Arc::clone(&self.transformer),
            outputs: self.outputs.clone(),
        }
    }
}

impl<E: GraphEngine + 'static> PlannerNode<E> {
    pub fn new(
        config: PlannerConfig,
        engine: E,
        transformer: Arc<dyn FrameTransformer>,
        outputs: Outputs,
    ) -> Self {
        let fusion = MapFusionEngine::new(
            config.occupancy_threshold,
            config.add_local_costmap_corners,
        );
        let session = PlanningSession::new(config.clone());
        let control = session.control();
        info!(?config, "Shared-control planner initialized");

        Self {
            config,
            map: Arc::new(Mutex::new(FusedMap::new(fusion))),
            engine: Arc::new(Mutex::new(engine)),
            session: Arc::new(Mutex::new(session)),
            control,
            operator: Blackboard::default(),
            transformer,
            outputs,
        }
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    pub fn operator(&self) -> &Blackboard {
        &self.operator
    }

    /// Copy of the fused map.
    pub fn map_snapshot(&self) -> GridMap {
        self.map.lock().snapshot()
    }

    /// Runs `f` with exclusive access to the graph engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut *self.engine.lock())
    }

    /// Applies one input event.
    pub fn apply(&self, event: NodeEvent) -> Result<(), NavigationError> {
        match event {
            NodeEvent::GlobalMap(map) => {
                self.apply_global_map(map);
                Ok(())
            }
            NodeEvent::GlobalUpdate(data) => self.apply_global_update(data),
            NodeEvent::LocalMap(local) => self.apply_local_map(local),
            NodeEvent::Velocity(command) => {
                blackboard::set_command(&self.operator, command);
                Ok(())
            }
            NodeEvent::PreferredIndex(index) => {
                let previous = self.control.preferred();
                self.control.set_preferred(index);
                if previous != index {
                    info!(from = previous, to = index, "Preferred path changed through topic");
                }
                Ok(())
            }
            NodeEvent::Cancel => {
                info!("Cancel requested, cached paths will be discarded");
                self.control.cancel();
                Ok(())
            }
        }
    }

    fn apply_global_map(&self, map: GridMap) {
        self.map.lock().apply_global(map);
    }

    fn apply_global_update(&self, data: Vec<i8>) -> Result<(), NavigationError> {
        if self.config.static_global_map {
            debug!("Static global map, ignoring incremental update");
            return Ok(());
        }
        let report = self.map.lock().apply_global_update(data)?;
        self.register_corners(report);
        Ok(())
    }

    fn apply_local_map(&self, local: GridMap) -> Result<(), NavigationError> {
        if !self.config.subscribe_local_costmap {
            debug!("Local map fusion disabled, ignoring local map");
            return Ok(());
        }
        let report = self.map.lock().apply_local(local)?;
        self.register_corners(report);
        Ok(())
    }

    // Called after the map lock is released, keeping engine-after-map out of the lock order.
    fn register_corners(&self, report: Option<FusionReport>) {
        if let Some(corners) = report.and_then(|r| r.corners) {
            self.engine.lock().set_local_vertices(&corners);
        }
    }

    /// Rebuilds the routing graph from a snapshot of the fused map and publishes it.
    ///
    /// Returns `false` without touching the engine while no map has arrived.
    pub fn refresh_graph(&self) -> bool {
        let snapshot = {
            let map = self.map.lock();
            if !map.is_ready() {
                return false;
            }
            map.snapshot()
        };

        let artifacts = {
            let mut engine = self.engine.lock();
            engine.map_to_graph(&snapshot);
            GraphArtifacts::collect(&*engine, snapshot.get_info())
        };
        debug!(nodes = artifacts.nodes.len(), "Routing graph refreshed");
        self.outputs.graph.publish(artifacts);
        true
    }

    /// Graph refresh task.
    ///
    /// With `update_voronoi_rate == 0` the graph is built once, after waiting
    /// for the first map. Otherwise it is rebuilt periodically and ticks without
    /// a map are skipped. Returns when `shutdown` flips to `true`, or with an
    /// error when the rate yields no finite non-zero period.
    pub async fn run_refresh(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        if self.config.update_voronoi_rate <= 0.0 {
            let mut retry = time::interval(MAP_WAIT_RETRY);
            loop {
                tokio::select! {
                    _ = retry.tick() => {
                        if self.refresh_graph() {
                            info!("Routing graph built, one-shot refresh done");
                            return Ok(());
                        }
                        warn!("Map not received yet, waiting before building the routing graph");
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Shutdown while waiting for the first map");
                            return Ok(());
                        }
                    }
                }
            }
        }

        let rate = self.config.update_voronoi_rate;
        let period = match Duration::try_from_secs_f64(1.0 / rate) {
            Ok(period) if !period.is_zero() => period,
            _ => bail!("update_voronoi_rate {rate} does not give a usable refresh period"),
        };
        info!(?period, "Periodic graph refresh started");
        let mut ticker = time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.refresh_graph() {
                        warn!("Map is empty, skipping graph refresh");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Graph refresh stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Applies events from `events` until the channel closes or `shutdown` flips.
    /// A failing event is logged and the loop carries on.
    pub async fn run_events(
        self,
        mut events: mpsc::Receiver<NodeEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Event channel closed");
                        return Ok(());
                    };
                    if let Err(e) = self.apply(event) {
                        warn!(error = %e, "Failed to apply event");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Serves one planning request and publishes the results.
    ///
    /// Poses not in the map frame are transformed into it first; a failed
    /// transform fails only this request.
    pub fn plan(&self, start: &FramedPose, goal: &FramedPose) -> Result<PlannedPath, NavigationError> {
        let info = {
            let map = self.map.lock();
            if !map.is_ready() {
                return Err(NavigationError::MapNotReady);
            }
            map.info().clone()
        };

        let timeout = Duration::from_millis(self.config.transform_timeout_ms);
        let to_map = |pose: &FramedPose| {
            if pose.frame_id != info.frame_id {
                warn!(frame = %pose.frame_id, map_frame = %info.frame_id, "Pose is not in map frame, transforming");
            }
            self.transformer
                .transform_pose(pose, &info.frame_id, timeout)
                .inspect_err(|e| error!(error = %e, "Transform failed, aborting plan"))
        };
        let start = to_map(start)?;
        let goal = to_map(goal)?;
        let command = blackboard::snapshot(&self.operator).command;

        let outcome = {
            let mut session = self.session.lock();
            let mut engine = self.engine.lock();
            session.make_plan(&mut *engine, &info, &start.pose, &goal.pose, &command)?
        };

        if let Some(intent) = outcome.intent {
            self.outputs.intent.publish(intent);
        }
        if !outcome.candidates.is_empty() {
            self.outputs.paths.publish(outcome.candidates);
        }
        debug!(
            strategy = ?outcome.strategy,
            preferred = outcome.preferred,
            poses = outcome.plan.poses.len(),
            "Committed plan"
        );
        self.outputs.plan.publish(outcome.plan.clone());
        Ok(outcome.plan)
    }

    /// Goal cell of the cached paths, if any.
    pub fn cached_goal(&self) -> Option<GridPoint> {
        self.session.lock().path_set().goal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{PathSpec, ScenarioEngine};
    use nalgebra::Vector2;
    use tandem_kinematics::Pose;
    use tandem_navigation::{MapInfo, OCCUPANCY_FREE, StaticTransformTree};

    fn node_with(config: PlannerConfig) -> PlannerNode<ScenarioEngine> {
        let paths = [
            PathSpec {
                id: 0,
                cost: 6.0,
                waypoints: vec![[2.0, 5.0], [5.0, 5.0], [8.0, 5.0]],
            },
            PathSpec {
                id: 1,
                cost: 9.0,
                waypoints: vec![[2.0, 5.0], [2.0, 8.0], [8.0, 5.0]],
            },
        ];
        PlannerNode::new(
            config,
            ScenarioEngine::new(&paths),
            Arc::new(StaticTransformTree::new()),
            Outputs::new(8),
        )
    }

    fn global_map() -> GridMap {
        let info = MapInfo::new(10, 10, 0.5, Vector2::new(-1.0, 2.0), "map").unwrap();
        GridMap::new(info, OCCUPANCY_FREE)
    }

    fn local_map() -> GridMap {
        let info = MapInfo::new(2, 2, 0.5, Vector2::new(0.0, 3.0), "map").unwrap();
        GridMap::from_data(info, vec![100, 0, 0, 0]).unwrap()
    }

    fn in_map(x: f64, y: f64) -> FramedPose {
        FramedPose::new("map", Pose::new(x, y, 0.0))
    }

    #[tokio::test]
    async fn test_one_shot_refresh_waits_for_map() {
        let node = node_with(PlannerConfig::default());
        let mut graph_rx = node.outputs().graph.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let refresh = tokio::spawn(node.clone().run_refresh(shutdown_rx));
        node.apply(NodeEvent::GlobalMap(global_map())).unwrap();

        let artifacts = time::timeout(Duration::from_secs(5), graph_rx.recv())
            .await
            .unwrap()
            .unwrap();
        refresh.await.unwrap().unwrap();

        assert_eq!(artifacts.frame_id, "map");
        assert_eq!(artifacts.nodes.len(), 6);
        // Cell (2, 5) at 0.5m resolution from origin (-1, 2)
        assert!((artifacts.nodes[0].x - 0.0).abs() < 1e-9);
        assert!((artifacts.nodes[0].y - 4.5).abs() < 1e-9);
        assert_eq!(artifacts.adjacency[1], vec![0, 2]);
        assert_eq!(node.with_engine(|engine| engine.builds()), 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_map_wait() {
        let node = node_with(PlannerConfig::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let refresh = tokio::spawn(node.clone().run_refresh(shutdown_rx));
        shutdown_tx.send(true).unwrap();

        time::timeout(Duration::from_secs(5), refresh)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(node.with_engine(|engine| engine.builds()), 0);
    }

    #[tokio::test]
    async fn test_periodic_refresh_skips_without_map() {
        let node = node_with(PlannerConfig {
            update_voronoi_rate: 50.0,
            ..PlannerConfig::default()
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let refresh = tokio::spawn(node.clone().run_refresh(shutdown_rx));

        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(node.with_engine(|engine| engine.builds()), 0);

        node.apply(NodeEvent::GlobalMap(global_map())).unwrap();
        time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        refresh.await.unwrap().unwrap();
        assert!(node.with_engine(|engine| engine.builds()) >= 1);
    }

    #[tokio::test]
    async fn test_unusable_refresh_rate_is_rejected() {
        for rate in [f64::INFINITY, 1e-320, f64::NAN] {
            let node = node_with(PlannerConfig {
                update_voronoi_rate: rate,
                ..PlannerConfig::default()
            });
            let (_shutdown_tx, shutdown_rx) = watch::channel(false);
            assert!(node.run_refresh(shutdown_rx).await.is_err(), "rate {rate}");
        }
    }

    #[test]
    fn test_map_events_respect_subscriptions() {
        let node = node_with(PlannerConfig {
            static_global_map: true,
            subscribe_local_costmap: false,
            ..PlannerConfig::default()
        });
        node.apply(NodeEvent::GlobalMap(global_map())).unwrap();

        node.apply(NodeEvent::GlobalUpdate(vec![100; 100])).unwrap();
        node.apply(NodeEvent::LocalMap(local_map())).unwrap();
        assert_eq!(node.map_snapshot().count_at_least(65), 0);
    }

    #[test]
    fn test_local_map_fuses_and_registers_corners() {
        let node = node_with(PlannerConfig {
            add_local_costmap_corners: true,
            ..PlannerConfig::default()
        });
        node.apply(NodeEvent::GlobalMap(global_map())).unwrap();
        node.apply(NodeEvent::LocalMap(local_map())).unwrap();

        assert_eq!(node.map_snapshot().count_at_least(65), 1);
        assert_eq!(
            node.with_engine(|engine| engine.local_vertices().to_vec()),
            vec![
                GridPoint::new(2, 2),
                GridPoint::new(4, 2),
                GridPoint::new(4, 4),
                GridPoint::new(2, 4),
            ]
        );

        // Mismatched update length is rejected, map left as is
        assert_eq!(
            node.apply(NodeEvent::GlobalUpdate(vec![0; 3])),
            Err(NavigationError::DataLengthMismatch { expected: 100, actual: 3 })
        );
        assert_eq!(node.map_snapshot().count_at_least(65), 1);
    }

    #[test]
    fn test_plan_requires_map() {
        let node = node_with(PlannerConfig::default());
        assert_eq!(
            node.plan(&in_map(0.0, 4.5), &in_map(3.0, 4.5)),
            Err(NavigationError::MapNotReady)
        );
    }

    #[tokio::test]
    async fn test_plan_publishes_and_survives_transform_failure() {
        let node = node_with(PlannerConfig::default());
        let mut plan_rx = node.outputs().plan.subscribe();
        let mut paths_rx = node.outputs().paths.subscribe();
        node.apply(NodeEvent::GlobalMap(global_map())).unwrap();

        let lost_goal = FramedPose::new("camera", Pose::new(3.0, 4.5, 0.0));
        assert!(matches!(
            node.plan(&in_map(0.0, 4.5), &lost_goal),
            Err(NavigationError::Transform { .. })
        ));

        let plan = node.plan(&in_map(0.0, 4.5), &in_map(3.0, 4.5)).unwrap();
        assert_eq!(plan.id, 0);
        assert_eq!(plan.frame_id, "map");
        assert_eq!(node.cached_goal(), Some(GridPoint::new(8, 5)));

        assert_eq!(*plan_rx.recv().await.unwrap(), plan);
        let paths = paths_rx.recv().await.unwrap();
        assert_eq!(paths.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_operator_events_reach_shared_state() {
        let node = node_with(PlannerConfig::default());
        node.apply(NodeEvent::PreferredIndex(1)).unwrap();
        node.apply(NodeEvent::Velocity(Twist::new(0.4, 0.1))).unwrap();
        node.apply(NodeEvent::Cancel).unwrap();

        assert_eq!(node.control().preferred(), 1);
        assert!(node.control().is_cancelled());
        assert_eq!(blackboard::snapshot(node.operator()).command, Twist::new(0.4, 0.1));
    }

    #[tokio::test]
    async fn test_event_loop_applies_until_closed() {
        let node = node_with(PlannerConfig::default());
        let (tx, rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let events = tokio::spawn(node.clone().run_events(rx, shutdown_rx));

        tx.send(NodeEvent::GlobalUpdate(vec![0; 4])).await.unwrap();
        tx.send(NodeEvent::PreferredIndex(2)).await.unwrap();
        drop(tx);

        events.await.unwrap().unwrap();
        assert_eq!(node.control().preferred(), 2);
    }
}
