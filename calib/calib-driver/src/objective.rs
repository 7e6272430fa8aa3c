//! The function an engine minimizes.

use calib_eval::{EvaluationBackend, SimulationEvaluator};

/// A cost function over the normalized unit cube.
///
/// Engines only ever see this trait, so any engine can drive any objective
/// and the simulation harness never depends on engine internals.
pub trait Objective {
    /// Number of coordinates.
    fn dimension(&self) -> usize;

    /// Cost of `x`. Lower is better; implementations return a finite value.
    fn evaluate(&mut self, x: &[f64]) -> f64;
}

impl<B: EvaluationBackend> Objective for SimulationEvaluator<B> {
    fn dimension(&self) -> usize {
        self.space().dimension()
    }

    fn evaluate(&mut self, x: &[f64]) -> f64 {
        SimulationEvaluator::evaluate(self, x)
    }
}

/// Wraps a closure as an [`Objective`].
///
/// # Example
///
/// ```
/// use calib_driver::{FnObjective, Objective};
///
/// let mut sphere = FnObjective::new(2, |x: &[f64]| x.iter().map(|v| v * v).sum());
/// assert_eq!(sphere.dimension(), 2);
/// assert_eq!(sphere.evaluate(&[0.5, 0.5]), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct FnObjective<F> {
    dimension: usize,
    f: F,
}

impl<F> FnObjective<F>
where
    F: FnMut(&[f64]) -> f64,
{
    /// Objective of `dimension` coordinates computed by `f`.
    #[must_use]
    pub const fn new(dimension: usize, f: F) -> Self {
        Self { dimension, f }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: FnMut(&[f64]) -> f64,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn evaluate(&mut self, x: &[f64]) -> f64 {
        (self.f)(x)
    }
}
