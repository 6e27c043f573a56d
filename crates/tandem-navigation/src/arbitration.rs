//! Picks the candidate path that best matches the operator's steering intent.
//!
//! Each path is compared with the intent trajectory over the distance the
//! intent spans. Paths that diverge too much from the intent are disqualified
//! by raising their cost to infinity, then the cheapest remaining path wins.

use nalgebra::Vector2;

use crate::intent::IntentTrajectory;
use crate::path::PlannedPath;

/// Signed angle from `from` to `to`, in `[-PI, PI]`.
pub fn vector_angle(from: &Vector2<f64>, to: &Vector2<f64>) -> f64 {
    from.perp(to).atan2(from.dot(to))
}

/// Result of matching candidate paths against an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    /// Index of the selected path.
    pub index: usize,
    /// Deviation score of each path.
    pub scores: Vec<f64>,
    /// Path costs after disqualification.
    pub costs: Vec<f64>,
}

/// Scores candidate paths against an intent trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathArbitrator {
    selection_threshold: f64,
}

impl PathArbitrator {
    /// Creates an arbitrator that disqualifies paths scoring at least
    /// `selection_threshold` times the best score.
    pub fn new(selection_threshold: f64) -> Self {
        Self {
            selection_threshold,
        }
    }

    /// Sum of squared angles between the intent's net direction and each path
    /// segment, over the intent's length.
    ///
    /// A segment whose end lies beyond that length is not compared, nor is
    /// any segment after it.
    pub fn deviation_score(intent: &IntentTrajectory, path: &PlannedPath) -> f64 {
        let direction = intent.displacement();
        let max_s = direction.norm();

        let mut s = 0.0;
        let mut score = 0.0;
        for pair in path.poses.windows(2) {
            let segment = Vector2::new(pair[1].x - pair[0].x, pair[1].y - pair[0].y);
            s += segment.norm();
            if s > max_s {
                break;
            }
            score += vector_angle(&direction, &segment).powi(2);
        }
        score
    }

    /// Whether a path scoring `score` is disqualified when the best score is `min`.
    ///
    /// With a best score of zero, another zero score is a ratio of one and any
    /// positive score an infinite ratio.
    pub fn is_disqualified(&self, score: f64, min: f64) -> bool {
        let ratio = if min == 0.0 {
            if score == 0.0 { 1.0 } else { f64::INFINITY }
        } else {
            score / min
        };
        ratio >= self.selection_threshold
    }

    /// Selects a path for `intent`.
    ///
    /// Returns `None` when there is no path to choose from. Ties on cost go to
    /// the lowest index, including the case where every path is disqualified.
    pub fn match_path(&self, intent: &IntentTrajectory, paths: &[PlannedPath]) -> Option<Arbitration> {
        if paths.is_empty() {
            return None;
        }

        let scores: Vec<f64> = paths
            .iter()
            .map(|path| Self::deviation_score(intent, path))
            .collect();
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);

        let costs: Vec<f64> = paths
            .iter()
            .zip(&scores)
            .map(|(path, &score)| {
                if self.is_disqualified(score, min) {
                    f64::INFINITY
                } else {
                    path.cost
                }
            })
            .collect();

        let mut index = 0;
        for (i, &cost) in costs.iter().enumerate() {
            if cost < costs[index] {
                index = i;
            }
        }

        Some(Arbitration {
            index,
            scores,
            costs,
        })
    }
}
