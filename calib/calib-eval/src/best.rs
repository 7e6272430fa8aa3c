//! Best result so far and snapshots of its outputs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BestConfig;
use crate::error::{EvalError, EvalResult};

/// Lowest accepted cost and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    /// Cost.
    pub cost: f64,
    /// Iteration that produced it.
    pub iteration: u64,
    /// Physical parameter values.
    pub parameters: Vec<f64>,
}

/// Monotonically improving best cost.
///
/// A cost replaces the current best only if it is lower, below the
/// plausibility `ceiling`, and not below the `floor`. Near-zero scores
/// from degenerate geometry fall under the floor; sentinel costs never
/// pass the ceiling.
///
/// # Example
///
/// ```
/// use calib_eval::BestTracker;
///
/// let mut best = BestTracker::new(100.0, 0.01);
/// assert!(best.offer(1, &[1.0], 5.0).is_some());
/// assert!(best.offer(2, &[2.0], 7.0).is_none()); // worse
/// assert!(best.offer(3, &[3.0], 0.0).is_none()); // below floor
/// assert!(best.offer(4, &[4.0], 1e9).is_none()); // above ceiling
/// assert_eq!(best.best().unwrap().iteration, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BestTracker {
    ceiling: f64,
    floor: f64,
    best: Option<BestResult>,
}

impl From<BestConfig> for BestTracker {
    fn from(config: BestConfig) -> Self {
        Self::new(config.ceiling, config.floor)
    }
}

impl BestTracker {
    /// Tracker accepting costs in `[floor, ceiling)`.
    #[must_use]
    pub const fn new(ceiling: f64, floor: f64) -> Self {
        Self {
            ceiling,
            floor,
            best: None,
        }
    }

    /// Current best, if any cost was accepted.
    #[must_use]
    pub const fn best(&self) -> Option<&BestResult> {
        self.best.as_ref()
    }

    /// Current best cost, infinite before the first acceptance.
    #[must_use]
    pub fn best_cost(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |b| b.cost)
    }

    /// Whether `cost` would be accepted.
    #[must_use]
    pub fn is_improvement(&self, cost: f64) -> bool {
        cost.is_finite() && cost < self.ceiling && cost >= self.floor && cost < self.best_cost()
    }

    /// Record `cost` if it improves; returns the new best when accepted.
    pub fn offer(&mut self, iteration: u64, parameters: &[f64], cost: f64) -> Option<&BestResult> {
        if !self.is_improvement(cost) {
            return None;
        }
        self.best = Some(BestResult {
            cost,
            iteration,
            parameters: parameters.to_vec(),
        });
        self.best.as_ref()
    }
}

/// Receives a request to preserve outputs whenever the best improves.
pub trait SnapshotSink {
    /// Preserve the outputs that produced `best`.
    ///
    /// # Errors
    ///
    /// Implementations report filesystem failures; the evaluator logs them
    /// and continues.
    fn snapshot(&mut self, best: &BestResult) -> EvalResult<()>;
}

/// Copies the regular files of a directory into a `best` directory and
/// records the best result next to them as `best.json`.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    source: PathBuf,
    destination: PathBuf,
}

impl DirectorySnapshot {
    /// Summary file written into the destination.
    pub const SUMMARY_FILE: &'static str = "best.json";

    /// Snapshot of `source` into `destination`.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Snapshot of `output_root` into `<output_root>/best`.
    #[must_use]
    pub fn under(output_root: &Path) -> Self {
        Self::new(output_root, output_root.join("best"))
    }

    /// Destination directory.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

impl SnapshotSink for DirectorySnapshot {
    fn snapshot(&mut self, best: &BestResult) -> EvalResult<()> {
        fs::create_dir_all(&self.destination)
            .map_err(|e| EvalError::write(&self.destination, e))?;

        let mut copied = 0usize;
        if let Ok(entries) = fs::read_dir(&self.source) {
            for entry in entries.flatten() {
                if !entry.file_type().is_ok_and(|t| t.is_file()) {
                    continue;
                }
                let target = self.destination.join(entry.file_name());
                fs::copy(entry.path(), &target).map_err(|e| EvalError::write(&target, e))?;
                copied += 1;
            }
        }

        let summary = self.destination.join(Self::SUMMARY_FILE);
        let json = serde_json::to_string_pretty(best)
            .map_err(|e| EvalError::write(&summary, e.into()))?;
        fs::write(&summary, json).map_err(|e| EvalError::write(&summary, e))?;

        debug!(copied, destination = %self.destination.display(), "Snapshot written");
        info!(cost = best.cost, iteration = best.iteration, "New best result");
        Ok(())
    }
}
