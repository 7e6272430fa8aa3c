//! The objective the optimizer calls.

use calib_params::{ParameterSpace, SENTINEL_COST};
use tracing::{debug, info, warn};

use crate::backend::{EvaluationBackend, Sample};
use crate::best::{BestResult, BestTracker, SnapshotSink};
use crate::log::IterationLog;
use crate::stage::EvaluationStage;

/// Maps a normalized parameter vector to a cost.
///
/// Every call clamps the vector, denormalizes it, hands it to the backend
/// and appends exactly one row to the iteration log, failed or not. The
/// optimizer only ever sees a finite cost; failures become
/// [`SENTINEL_COST`].
///
/// Calls are serialized through `&mut self`, so iteration numbers are
/// strictly increasing and log rows appear in call order. Numbering
/// continues after the last row already in the log.
pub struct SimulationEvaluator<B> {
    space: ParameterSpace,
    backend: B,
    log: IterationLog,
    best: BestTracker,
    snapshot: Option<Box<dyn SnapshotSink>>,
    iteration: u64,
}

impl<B: std::fmt::Debug> std::fmt::Debug for SimulationEvaluator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEvaluator")
            .field("dimension", &self.space.dimension())
            .field("backend", &self.backend)
            .field("log", &self.log.path())
            .field("best", &self.best.best())
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}

impl<B: EvaluationBackend> SimulationEvaluator<B> {
    /// Evaluator without snapshots.
    #[must_use]
    pub fn new(space: ParameterSpace, backend: B, log: IterationLog, best: BestTracker) -> Self {
        let iteration = log.last_iteration();
        Self {
            space,
            backend,
            log,
            best,
            snapshot: None,
            iteration,
        }
    }

    /// Preserve outputs through `sink` whenever the best improves.
    #[must_use]
    pub fn with_snapshot(mut self, sink: impl SnapshotSink + 'static) -> Self {
        self.snapshot = Some(Box::new(sink));
        self
    }

    /// Parameter space.
    #[must_use]
    pub const fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// Number of the last logged evaluation, including rows from earlier
    /// runs sharing the log.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Best accepted result.
    #[must_use]
    pub const fn best(&self) -> Option<&BestResult> {
        self.best.best()
    }

    /// Backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Evaluate one normalized vector.
    ///
    /// A vector of the wrong length never reaches the backend. It still
    /// takes an iteration number and logs a sentinel row, with missing
    /// components at their lower bound and extra ones dropped.
    pub fn evaluate(&mut self, normalized: &[f64]) -> f64 {
        self.iteration += 1;
        let iteration = self.iteration;
        debug!(iteration, stage = %EvaluationStage::ReceivedSample);

        let clamped = match self.space.clamp_unit(normalized) {
            Ok(clamped) => clamped,
            Err(e) => {
                warn!(iteration, error = %e, "Rejected sample");
                self.log_row(iteration, &self.padded_physical(normalized), SENTINEL_COST);
                return SENTINEL_COST;
            }
        };

        let physical: Vec<f64> = self
            .space
            .specs()
            .iter()
            .zip(&clamped)
            .map(|(spec, &x)| spec.denormalize(x))
            .collect();
        let properties = self.space.property_map_physical(&physical);
        debug!(iteration, stage = %EvaluationStage::Denormalized, ?physical);

        let sample = Sample {
            iteration,
            normalized: &clamped,
            physical: &physical,
            properties: &properties,
        };
        let cost = match self.backend.evaluate(&sample) {
            Ok(cost) if cost.is_finite() => cost,
            Ok(cost) => {
                warn!(iteration, cost, "Non-finite cost replaced by sentinel");
                SENTINEL_COST
            }
            Err(failure) => {
                warn!(iteration, stage = %failure.stage, reason = %failure.reason, "Evaluation failed");
                SENTINEL_COST
            }
        };

        self.log_row(iteration, &physical, cost);

        if let Some(best) = self.best.offer(iteration, &physical, cost) {
            info!(iteration, cost, "Best cost improved");
            if let Some(sink) = self.snapshot.as_mut() {
                if let Err(e) = sink.snapshot(best) {
                    warn!(iteration, error = %e, "Snapshot failed");
                }
            }
            debug!(iteration, stage = %EvaluationStage::BestUpdated);
        }

        info!(iteration, cost, stage = %EvaluationStage::Done, "Evaluation done");
        cost
    }

    fn log_row(&self, iteration: u64, physical: &[f64], cost: f64) {
        if let Err(e) = self.log.append(iteration, physical, cost) {
            warn!(iteration, error = %e, "Could not append iteration log");
        }
        debug!(iteration, stage = %EvaluationStage::Logged, cost);
    }

    /// Physical values for a vector of any length, one per parameter.
    fn padded_physical(&self, normalized: &[f64]) -> Vec<f64> {
        self.space
            .specs()
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.denormalize(normalized.get(i).copied().unwrap_or(0.0)))
            .collect()
    }
}
