//! The optimization loop.

use std::fmt;

use calib_eval::{EngineKind, OptimizerConfig};
use calib_params::{ParameterSpace, is_sentinel};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cmaes::{CmaesSettings, SeparableCmaEs};
use crate::engine::{AskTellEngine, CallbackEngine, Candidate, EngineStop};
use crate::error::{DriverError, DriverResult};
use crate::lhs::{LatinHypercubeSearch, LhsSettings};
use crate::objective::Objective;

/// Evaluation budget for callback engines when no ceiling is configured.
pub const DEFAULT_CALLBACK_BUDGET: usize = 200;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The engine's own criterion fired.
    Engine(EngineStop),
    /// The generation ceiling was reached.
    MaxGenerations,
    /// The evaluation ceiling was reached.
    MaxEvaluations,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(stop) => write!(f, "engine: {stop}"),
            Self::MaxGenerations => f.write_str("max_generations"),
            Self::MaxEvaluations => f.write_str("max_evaluations"),
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverReport {
    /// Best normalized candidate seen by the driver. Failed evaluations,
    /// scored as the sentinel, never count.
    pub best: Option<Candidate>,
    /// `best` mapped back to physical units.
    pub best_physical: Option<Vec<f64>>,
    /// Completed generations. Callback engines count one per evaluation.
    pub generations: usize,
    /// Objective calls made.
    pub evaluations: usize,
    /// Why the run ended.
    pub stop: StopReason,
}

/// Runs an engine against an objective until the engine stops or a ceiling
/// is reached, whichever comes first.
///
/// # Example
///
/// ```
/// use calib_driver::{CmaesSettings, FnObjective, OptimizationDriver, SeparableCmaEs, StopReason};
/// use calib_params::{ParameterSpace, ParameterSpec, PropertyKind};
///
/// let space = ParameterSpace::new(vec![
///     ParameterSpec::new("A", "RegionA", PropertyKind::Modulus, 1.0e5, 1.0e7).unwrap(),
/// ])
/// .unwrap();
/// let mut objective = FnObjective::new(1, |x: &[f64]| (x[0] - 0.3).powi(2));
/// let mut engine = SeparableCmaEs::new(CmaesSettings::centered(1, 7)).unwrap();
///
/// let report = OptimizationDriver::new(space)
///     .with_max_generations(5)
///     .run_ask_tell(&mut engine, &mut objective)
///     .unwrap();
/// assert_eq!(report.generations, 5);
/// assert_eq!(report.stop, StopReason::MaxGenerations);
/// ```
#[derive(Debug, Clone)]
pub struct OptimizationDriver {
    space: ParameterSpace,
    max_generations: Option<usize>,
    max_evaluations: Option<usize>,
}

impl OptimizationDriver {
    /// Driver over `space` without ceilings.
    #[must_use]
    pub const fn new(space: ParameterSpace) -> Self {
        Self {
            space,
            max_generations: None,
            max_evaluations: None,
        }
    }

    /// Driver with the ceilings from `settings`.
    #[must_use]
    pub const fn from_config(settings: &OptimizerConfig, space: ParameterSpace) -> Self {
        Self {
            space,
            max_generations: settings.max_generations,
            max_evaluations: settings.max_evaluations,
        }
    }

    /// Stop after this many generations.
    #[must_use]
    pub const fn with_max_generations(mut self, generations: usize) -> Self {
        self.max_generations = Some(generations);
        self
    }

    /// Stop after this many objective calls.
    #[must_use]
    pub const fn with_max_evaluations(mut self, evaluations: usize) -> Self {
        self.max_evaluations = Some(evaluations);
        self
    }

    /// The parameter space.
    #[must_use]
    pub const fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// Ask, evaluate and tell until a stop condition holds.
    ///
    /// The evaluation ceiling can end a run mid-generation. That partial
    /// generation is not told to the engine, but its candidates still count
    /// toward the best.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::DimensionMismatch`] if the objective does not
    /// match the space, and propagates engine errors from `tell`.
    pub fn run_ask_tell<E, O>(
        &self,
        engine: &mut E,
        objective: &mut O,
    ) -> DriverResult<DriverReport>
    where
        E: AskTellEngine + ?Sized,
        O: Objective + ?Sized,
    {
        self.check_dimension(objective.dimension())?;
        let mut best: Option<Candidate> = None;
        let mut generations = 0;
        let mut evaluations = 0;

        let stop = loop {
            if let Some(stop) = engine.should_stop() {
                break StopReason::Engine(stop);
            }
            if self.max_generations.is_some_and(|max| generations >= max) {
                break StopReason::MaxGenerations;
            }
            if self.evaluations_spent(evaluations) {
                break StopReason::MaxEvaluations;
            }

            let candidates = engine.ask();
            let mut costs = Vec::with_capacity(candidates.len());
            for x in &candidates {
                if self.evaluations_spent(evaluations) {
                    break;
                }
                let candidate = Candidate {
                    cost: objective.evaluate(x),
                    x: x.clone(),
                };
                evaluations += 1;
                costs.push(candidate.cost);
                if counts_as_best(&candidate, best.as_ref()) {
                    best = Some(candidate);
                }
            }
            if costs.len() < candidates.len() {
                info!(
                    evaluated = costs.len(),
                    proposed = candidates.len(),
                    "Evaluation ceiling reached mid-generation"
                );
                break StopReason::MaxEvaluations;
            }

            engine.tell(&candidates, &costs)?;
            generations += 1;
            info!(
                generation = generations,
                evaluations,
                best = best.as_ref().map_or(f64::INFINITY, |b| b.cost),
                "Generation complete"
            );
        };

        self.report(best, generations, evaluations, stop)
    }

    /// Hand the objective to a callback engine with a budget taken from the
    /// ceilings, or [`DEFAULT_CALLBACK_BUDGET`] when neither is set.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::DimensionMismatch`] if the objective does not
    /// match the space.
    pub fn run_callback<E, O>(
        &self,
        engine: &mut E,
        objective: &mut O,
    ) -> DriverResult<DriverReport>
    where
        E: CallbackEngine + ?Sized,
        O: Objective + ?Sized,
    {
        self.check_dimension(objective.dimension())?;
        let budget = match (self.max_generations, self.max_evaluations) {
            (Some(g), Some(e)) => g.min(e),
            (Some(g), None) => g,
            (None, Some(e)) => e,
            (None, None) => DEFAULT_CALLBACK_BUDGET,
        };

        let mut tracked = Tracked {
            inner: objective,
            best: None,
            evaluations: 0,
        };
        let summary = engine.optimize(&mut tracked, budget);
        let Tracked {
            best, evaluations, ..
        } = tracked;

        let stop = match summary.stop {
            EngineStop::BudgetExhausted if self.evaluations_spent(evaluations) => {
                StopReason::MaxEvaluations
            }
            EngineStop::BudgetExhausted if self.max_generations.is_some() => {
                StopReason::MaxGenerations
            }
            other => StopReason::Engine(other),
        };
        info!(evaluations, %stop, "Callback engine returned");
        let engine_best = summary.best.filter(|b| !is_sentinel(b.cost));
        self.report(best.or(engine_best), evaluations, evaluations, stop)
    }

    /// Build the engine named by `settings` and run it.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidSetting`] for engine settings out of
    /// range, plus anything the chosen run mode returns.
    pub fn run_configured<O>(
        &self,
        settings: &OptimizerConfig,
        objective: &mut O,
    ) -> DriverResult<DriverReport>
    where
        O: Objective + ?Sized,
    {
        let dimension = self.space.dimension();
        info!(
            engine = ?settings.engine,
            dimension,
            seed = settings.seed,
            "Starting optimization"
        );
        match settings.engine {
            EngineKind::Cmaes => {
                let mut cmaes =
                    CmaesSettings::centered(dimension, settings.seed).with_sigma(settings.sigma);
                if let Some(population) = settings.population {
                    cmaes = cmaes.with_population(population);
                }
                let mut engine = SeparableCmaEs::new(cmaes)?;
                self.run_ask_tell(&mut engine, objective)
            }
            EngineKind::Lhs => {
                let lhs = LhsSettings::seeded(settings.seed).with_radius(settings.sigma);
                let mut engine = LatinHypercubeSearch::new(lhs)?;
                self.run_callback(&mut engine, objective)
            }
        }
    }

    fn check_dimension(&self, objective: usize) -> DriverResult<()> {
        let space = self.space.dimension();
        if objective == space {
            Ok(())
        } else {
            Err(DriverError::DimensionMismatch { objective, space })
        }
    }

    fn evaluations_spent(&self, evaluations: usize) -> bool {
        self.max_evaluations.is_some_and(|max| evaluations >= max)
    }

    fn report(
        &self,
        best: Option<Candidate>,
        generations: usize,
        evaluations: usize,
        stop: StopReason,
    ) -> DriverResult<DriverReport> {
        let best_physical = best
            .as_ref()
            .map(|b| self.space.denormalize_all(&b.x))
            .transpose()?;
        info!(
            generations,
            evaluations,
            %stop,
            best = best.as_ref().map_or(f64::INFINITY, |b| b.cost),
            "Optimization finished"
        );
        Ok(DriverReport {
            best,
            best_physical,
            generations,
            evaluations,
            stop,
        })
    }
}

fn counts_as_best(candidate: &Candidate, best: Option<&Candidate>) -> bool {
    !is_sentinel(candidate.cost) && candidate.improves_on(best)
}

/// Counts calls and keeps the best point on behalf of the driver.
struct Tracked<'a, O: ?Sized> {
    inner: &'a mut O,
    best: Option<Candidate>,
    evaluations: usize,
}

impl<O: Objective + ?Sized> Objective for Tracked<'_, O> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn evaluate(&mut self, x: &[f64]) -> f64 {
        let candidate = Candidate {
            cost: self.inner.evaluate(x),
            x: x.to_vec(),
        };
        self.evaluations += 1;
        let cost = candidate.cost;
        if counts_as_best(&candidate, self.best.as_ref()) {
            self.best = Some(candidate);
        }
        cost
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::objective::FnObjective;
    use approx::assert_relative_eq;
    use calib_params::{ParameterSpec, PropertyKind};

    fn space(dimension: usize) -> ParameterSpace {
        let specs = (0..dimension)
            .map(|i| {
                let (name, region) = (format!("P{i}"), format!("Region{i}"));
                ParameterSpec::new(name, region, PropertyKind::Modulus, 1.0e5, 1.0e7).unwrap()
            })
            .collect();
        ParameterSpace::new(specs).unwrap()
    }

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 0.3).powi(2)).sum()
    }

    #[test]
    fn ask_tell_stops_at_the_generation_ceiling() {
        let mut objective = FnObjective::new(2, sphere);
        let mut engine = SeparableCmaEs::new(CmaesSettings::centered(2, 3)).unwrap();
        let lambda = engine.population();

        let report = OptimizationDriver::new(space(2))
            .with_max_generations(3)
            .run_ask_tell(&mut engine, &mut objective)
            .unwrap();

        assert_eq!(report.stop, StopReason::MaxGenerations);
        assert_eq!(report.generations, 3);
        assert_eq!(report.evaluations, 3 * lambda);
        assert_eq!(engine.generation(), 3);
    }

    #[test]
    fn evaluation_ceiling_can_end_a_generation_early() {
        let mut calls = 0;
        let mut objective = FnObjective::new(2, |x: &[f64]| {
            calls += 1;
            sphere(x)
        });
        let mut engine = SeparableCmaEs::new(CmaesSettings::centered(2, 3)).unwrap();
        let lambda = engine.population();
        let ceiling = lambda + lambda / 2;

        let report = OptimizationDriver::new(space(2))
            .with_max_evaluations(ceiling)
            .run_ask_tell(&mut engine, &mut objective)
            .unwrap();

        assert_eq!(report.stop, StopReason::MaxEvaluations);
        assert_eq!(report.evaluations, ceiling);
        assert_eq!(report.generations, 1);
        assert_eq!(engine.generation(), 1);
        assert_eq!(calls, ceiling);
    }

    #[test]
    fn best_is_reported_in_physical_units() {
        let mut objective = FnObjective::new(1, sphere);
        let mut engine = SeparableCmaEs::new(CmaesSettings::centered(1, 9)).unwrap();
        let report = OptimizationDriver::new(space(1))
            .with_max_generations(10)
            .run_ask_tell(&mut engine, &mut objective)
            .unwrap();

        let best = report.best.unwrap();
        let physical = report.best_physical.unwrap();
        let expected = best.x[0].mul_add(1.0e7 - 1.0e5, 1.0e5);
        assert_relative_eq!(physical[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn callback_budget_comes_from_the_tighter_ceiling() {
        let mut objective = FnObjective::new(2, sphere);
        let mut engine = LatinHypercubeSearch::new(LhsSettings::seeded(4)).unwrap();
        let report = OptimizationDriver::new(space(2))
            .with_max_generations(100)
            .with_max_evaluations(30)
            .run_callback(&mut engine, &mut objective)
            .unwrap();

        assert_eq!(report.evaluations, 30);
        assert_eq!(report.stop, StopReason::MaxEvaluations);
        assert!(report.best.is_some());
    }

    #[test]
    fn all_failed_runs_report_no_best() {
        let mut objective = FnObjective::new(2, |_: &[f64]| calib_params::SENTINEL_COST);
        let mut cmaes = SeparableCmaEs::new(CmaesSettings::centered(2, 3)).unwrap();
        let report = OptimizationDriver::new(space(2))
            .with_max_evaluations(12)
            .run_ask_tell(&mut cmaes, &mut objective)
            .unwrap();
        assert_eq!(report.evaluations, 12);
        assert!(report.best.is_none());
        assert!(report.best_physical.is_none());

        let mut lhs = LatinHypercubeSearch::new(LhsSettings::seeded(4)).unwrap();
        let report = OptimizationDriver::new(space(2))
            .with_max_evaluations(12)
            .run_callback(&mut lhs, &mut objective)
            .unwrap();
        assert!(report.best.is_none());
        assert!(report.best_physical.is_none());
    }

    #[test]
    fn callback_without_ceilings_uses_the_default_budget() {
        let mut calls = 0;
        let mut objective = FnObjective::new(2, |x: &[f64]| {
            calls += 1;
            sphere(x)
        });
        let mut engine = LatinHypercubeSearch::new(LhsSettings::seeded(4)).unwrap();
        let report = OptimizationDriver::new(space(2))
            .run_callback(&mut engine, &mut objective)
            .unwrap();

        assert!(report.evaluations <= DEFAULT_CALLBACK_BUDGET);
        assert_eq!(report.evaluations, calls);
    }

    #[test]
    fn mismatched_objective_is_rejected() {
        let mut objective = FnObjective::new(3, sphere);
        let mut engine = SeparableCmaEs::new(CmaesSettings::centered(3, 0)).unwrap();
        let err = OptimizationDriver::new(space(2))
            .run_ask_tell(&mut engine, &mut objective)
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::DimensionMismatch {
                objective: 3,
                space: 2
            }
        ));
    }

    #[test]
    fn configured_run_dispatches_on_engine_kind() {
        let driver = OptimizationDriver::new(space(2)).with_max_evaluations(15);

        let mut objective = FnObjective::new(2, sphere);
        let lhs = OptimizerConfig {
            engine: EngineKind::Lhs,
            ..OptimizerConfig::default()
        };
        let report = driver.run_configured(&lhs, &mut objective).unwrap();
        assert_eq!(report.evaluations, 15);

        let cmaes = OptimizerConfig {
            population: Some(5),
            ..OptimizerConfig::default()
        };
        let report = driver.run_configured(&cmaes, &mut objective).unwrap();
        assert_eq!(report.evaluations, 15);
        assert_eq!(report.generations, 3);
    }

    #[test]
    fn report_serializes_stop_reason() {
        let report = DriverReport {
            best: None,
            best_physical: None,
            generations: 0,
            evaluations: 0,
            stop: StopReason::Engine(EngineStop::TolFun),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""stop":{"engine":"tol_fun"}"#), "{json}");
        assert_eq!(StopReason::MaxEvaluations.to_string(), "max_evaluations");
    }
}
