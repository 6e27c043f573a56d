//! Cross-cycle planning state and the per-request planning cycle.
//!
//! A [`PlanningSession`] remembers the paths committed by the previous cycle
//! and the goal they lead to. Each call to [`PlanningSession::make_plan`]
//! either reuses them, asks the graph engine to trim them to the new start, or
//! discards them and searches afresh. The operator's preferred index and
//! cancellation requests arrive asynchronously through [`SessionControl`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tandem_kinematics::{Pose, Twist};
use tracing::{debug, info, warn};

use crate::arbitration::PathArbitrator;
use crate::config::PlannerConfig;
use crate::error::NavigationError;
use crate::graph::GraphEngine;
use crate::intent::{IntentSimulator, IntentTrajectory};
use crate::map::{GridPoint, MapInfo, WorldPoint};
use crate::path::PlannedPath;

/// Paths committed by the last cycle and the goal cell they lead to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathSet {
    paths: Vec<PlannedPath>,
    goal: Option<GridPoint>,
}

impl PathSet {
    /// The stored paths, in world coordinates.
    pub fn paths(&self) -> &[PlannedPath] {
        &self.paths
    }

    /// Goal cell the stored paths were planned for.
    pub fn goal(&self) -> Option<GridPoint> {
        self.goal
    }

    /// Number of stored paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no paths are stored.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path at `index`, if there is one.
    pub fn get(&self, index: usize) -> Option<&PlannedPath> {
        self.paths.get(index)
    }

    /// Forgets the paths and the goal.
    pub fn clear(&mut self) {
        self.paths.clear();
        self.goal = None;
    }
}

/// Preferred index and cancellation flag, shared with asynchronous updaters.
#[derive(Debug, Default)]
pub struct SessionControl {
    preferred: AtomicUsize,
    cancelled: AtomicBool,
}

impl SessionControl {
    /// Currently preferred path index.
    pub fn preferred(&self) -> usize {
        self.preferred.load(Ordering::Acquire)
    }

    /// Sets the preferred path index. Out-of-range values are stored and only
    /// take effect once enough paths exist.
    pub fn set_preferred(&self, index: usize) {
        self.preferred.store(index, Ordering::Release);
    }

    /// Requests that cached paths be discarded before the next cycle.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether a cancellation is waiting to be applied.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn take_cancel(&self) -> bool {
        self.cancelled.swap(false, Ordering::AcqRel)
    }
}

/// How a planning cycle obtained its paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStrategy {
    /// Near the goal: the stored path was returned without consulting the engine.
    ReuseNearGoal,
    /// Same goal as before: stored paths were trimmed to the new start.
    Trim,
    /// New goal or no stored paths: paths were searched from scratch.
    Fresh,
}

/// Everything a planning cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    /// Committed plan.
    pub plan: PlannedPath,
    /// Branch taken.
    pub strategy: PlanStrategy,
    /// Index of `plan` among the candidates.
    pub preferred: usize,
    /// Candidate paths produced this cycle. Empty when paths were reused.
    pub candidates: Vec<PlannedPath>,
    /// Intent trajectory, when arbitration ran.
    pub intent: Option<IntentTrajectory>,
}

/// Planning state that persists across cycles.
#[derive(Debug)]
pub struct PlanningSession {
    config: PlannerConfig,
    path_set: PathSet,
    control: Arc<SessionControl>,
    simulator: IntentSimulator,
    arbitrator: PathArbitrator,
}

impl PlanningSession {
    /// Creates a session with no stored paths.
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            simulator: IntentSimulator::new(&config),
            arbitrator: PathArbitrator::new(config.selection_threshold),
            config,
            path_set: PathSet::default(),
            control: Arc::new(SessionControl::default()),
        }
    }

    /// Handle for asynchronous preferred-index and cancellation updates.
    pub fn control(&self) -> Arc<SessionControl> {
        Arc::clone(&self.control)
    }

    /// Paths stored by the last cycle.
    pub fn path_set(&self) -> &PathSet {
        &self.path_set
    }

    /// Planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Runs one planning cycle.
    ///
    /// `start` and `goal` must already be expressed in the frame of `info`.
    ///
    /// # Returns
    /// * `Err(NavigationError::NoPathFound)` if the cycle leaves no path at the
    ///   preferred index.
    pub fn make_plan<E: GraphEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        info: &MapInfo,
        start: &Pose,
        goal: &Pose,
        command: &Twist,
    ) -> Result<PlanOutcome, NavigationError> {
        if self.control.take_cancel() {
            info!("Cancel received, discarding stored paths");
            self.path_set.clear();
            engine.clear_previous_paths();
        }

        let preferred = self.control.preferred();
        if start.distance_to(goal) < self.config.xy_goal_tolerance {
            if let Some(plan) = self.path_set.get(preferred) {
                if plan.is_empty() {
                    return Err(NavigationError::NoPathFound);
                }
                debug!(preferred, "Near goal, reusing stored path");
                return Ok(PlanOutcome {
                    plan: plan.clone(),
                    strategy: PlanStrategy::ReuseNearGoal,
                    preferred,
                    candidates: Vec::new(),
                    intent: None,
                });
            }
        }

        let start_cell = info.world_to_cell(&WorldPoint::new(start.x, start.y));
        let goal_cell = info.world_to_cell(&WorldPoint::new(goal.x, goal.y));
        let num_paths = self.config.num_paths;

        let (strategy, mut candidates) = if !self.path_set.is_empty()
            && self.path_set.goal == Some(goal_cell)
            && engine.has_previous_paths()
        {
            let paths = engine.replan(start_cell, goal_cell, num_paths, preferred);
            (PlanStrategy::Trim, paths)
        } else {
            self.path_set.clear();
            self.control.set_preferred(0);
            engine.clear_previous_paths();
            let paths = engine.get_paths(start_cell, goal_cell, num_paths);
            self.path_set.goal = Some(goal_cell);
            (PlanStrategy::Fresh, paths)
        };
        debug!(?strategy, start = %start_cell, goal = %goal_cell, found = candidates.len(), "Obtained candidate paths");

        if candidates.len() < num_paths {
            warn!(
                requested = num_paths,
                found = candidates.len(),
                "Could not find all requested paths"
            );
        }
        if candidates.is_empty() {
            self.path_set.paths.clear();
            return Err(NavigationError::NoPathFound);
        }

        engine.interpolate_paths(&mut candidates, self.config.path_waypoint_sep);
        self.path_set.paths = candidates
            .iter()
            .map(|candidate| PlannedPath::from_candidate(candidate, info, start.theta, goal.theta))
            .collect();

        let mut intent = None;
        let near_goal = start.distance_squared_to(goal) <= self.config.near_goal_threshold.powi(2);
        if self.simulator.is_steering(command) && !near_goal {
            let trajectory = self.simulator.simulate(start, command)?;
            if let Some(arbitration) = self.arbitrator.match_path(&trajectory, &self.path_set.paths) {
                let previous = self.control.preferred();
                if arbitration.index != previous {
                    info!(
                        from = previous,
                        to = arbitration.index,
                        "Preferred path changed through operator steering"
                    );
                    self.control.set_preferred(arbitration.index);
                }
            }
            intent = Some(trajectory);
        }

        let preferred = self.control.preferred();
        let plan = self
            .path_set
            .get(preferred)
            .filter(|plan| !plan.is_empty())
            .cloned()
            .ok_or(NavigationError::NoPathFound)?;

        Ok(PlanOutcome {
            plan,
            strategy,
            preferred,
            candidates: self.path_set.paths.clone(),
            intent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_taken_once() {
        let control = SessionControl::default();
        assert!(!control.take_cancel());
        control.cancel();
        assert!(control.is_cancelled());
        assert!(control.take_cancel());
        assert!(!control.take_cancel());
    }

    #[test]
    fn test_out_of_range_preference_is_kept() {
        let session = PlanningSession::new(PlannerConfig::default());
        session.control().set_preferred(7);
        assert_eq!(session.control().preferred(), 7);
        assert!(session.path_set().get(7).is_none());
    }
}
