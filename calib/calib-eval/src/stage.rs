//! Steps of one evaluation.

use std::fmt;

/// Where an evaluation is, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvaluationStage {
    /// A candidate vector arrived.
    ReceivedSample,
    /// Physical values and the property map exist.
    Denormalized,
    /// A fresh model set was built.
    ModelBuilt,
    /// Region materials were written into the tissue model.
    MaterialsApplied,
    /// The solver finished successfully.
    SolverRun,
    /// The result geometry was scored.
    Scored,
    /// The log row was appended.
    Logged,
    /// The best-result tracker saw the cost.
    BestUpdated,
    /// The cost was returned.
    Done,
}

impl EvaluationStage {
    /// Stage name as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReceivedSample => "received_sample",
            Self::Denormalized => "denormalized",
            Self::ModelBuilt => "model_built",
            Self::MaterialsApplied => "materials_applied",
            Self::SolverRun => "solver_run",
            Self::Scored => "scored",
            Self::Logged => "logged",
            Self::BestUpdated => "best_updated",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for EvaluationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An evaluation that stopped before producing a cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationFailure {
    /// Stage that could not be reached.
    pub stage: EvaluationStage,
    /// Human-readable cause.
    pub reason: String,
}

impl EvaluationFailure {
    /// Failure to reach `stage`.
    #[must_use]
    pub fn new(stage: EvaluationStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for EvaluationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}
