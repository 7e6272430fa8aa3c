//! Engine capabilities.
//!
//! Two loop shapes are supported. Population engines hand out a batch of
//! candidates, receive their costs and update ([`AskTellEngine`]). Direct
//! engines call the objective themselves within an evaluation budget
//! ([`CallbackEngine`]). Every engine searches the unit cube `[0, 1]^n`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DriverResult;
use crate::objective::Objective;

/// A point and its cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Normalized coordinates.
    pub x: Vec<f64>,
    /// Cost.
    pub cost: f64,
}

impl Candidate {
    /// Whether this candidate beats `other`. Non-finite costs never win.
    #[must_use]
    pub fn improves_on(&self, other: Option<&Self>) -> bool {
        self.cost.is_finite() && other.is_none_or(|o| self.cost < o.cost)
    }
}

/// Why an engine considers itself converged or exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStop {
    /// The search distribution or radius shrank below tolerance.
    TolX,
    /// Recent best costs no longer differ.
    TolFun,
    /// The covariance became too ill-conditioned to continue.
    Conditioning,
    /// The evaluation budget ran out.
    BudgetExhausted,
}

impl fmt::Display for EngineStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TolX => "tol_x",
            Self::TolFun => "tol_fun",
            Self::Conditioning => "conditioning",
            Self::BudgetExhausted => "budget_exhausted",
        })
    }
}

/// A generation-based engine.
pub trait AskTellEngine {
    /// Propose the next generation. Every candidate lies in `[0, 1]^n`.
    fn ask(&mut self) -> Vec<Vec<f64>>;

    /// Report the costs of the last [`ask`](Self::ask), in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch does not match the last proposal.
    fn tell(&mut self, candidates: &[Vec<f64>], costs: &[f64]) -> DriverResult<()>;

    /// The engine's own termination criterion, checked between generations.
    fn should_stop(&self) -> Option<EngineStop>;

    /// Best candidate told so far.
    fn best(&self) -> Option<&Candidate>;

    /// Completed generations.
    fn generation(&self) -> usize;
}

/// Summary of a [`CallbackEngine`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSummary {
    /// Best candidate evaluated.
    pub best: Option<Candidate>,
    /// Objective calls made.
    pub evaluations: usize,
    /// Why the engine returned.
    pub stop: EngineStop,
}

/// An engine that calls the objective itself.
pub trait CallbackEngine {
    /// Minimize `objective` with at most `budget` evaluations.
    fn optimize(&mut self, objective: &mut dyn Objective, budget: usize) -> EngineSummary;
}
