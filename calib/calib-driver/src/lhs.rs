//! Latin hypercube design followed by local search.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{CallbackEngine, Candidate, EngineStop, EngineSummary};
use crate::error::{DriverError, DriverResult};
use crate::objective::Objective;

/// Latin hypercube samples in `[0, 1]^dimension`.
///
/// Each axis is split into `samples` equal bins and every bin holds exactly
/// one sample per axis.
///
/// # Example
///
/// ```
/// use calib_driver::latin_hypercube;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
/// let design = latin_hypercube(3, 4, &mut rng);
/// assert_eq!(design.len(), 4);
/// let mut bins: Vec<usize> = design.iter().map(|x| (x[0] * 4.0) as usize).collect();
/// bins.sort_unstable();
/// assert_eq!(bins, vec![0, 1, 2, 3]);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn latin_hypercube<R: Rng + ?Sized>(
    dimension: usize,
    samples: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    if samples == 0 || dimension == 0 {
        return Vec::new();
    }
    let width = 1.0 / samples as f64;
    let permutations: Vec<Vec<usize>> = (0..dimension)
        .map(|_| {
            let mut perm: Vec<usize> = (0..samples).collect();
            perm.shuffle(rng);
            perm
        })
        .collect();

    (0..samples)
        .map(|i| {
            permutations
                .iter()
                .map(|perm| {
                    let lo = perm[i] as f64 * width;
                    (lo + rng.gen_range(0.0..1.0) * width).min(1.0)
                })
                .collect()
        })
        .collect()
}

/// Settings for [`LatinHypercubeSearch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LhsSettings {
    /// Design size; `max(10, 2n + 1)` capped by the budget when unset.
    pub design_size: Option<usize>,
    /// Initial half-width of local perturbations.
    pub radius: f64,
    /// Radius factor after a run of failed perturbations.
    pub shrink: f64,
    /// Stop once the radius falls below this.
    pub min_radius: f64,
    /// RNG seed.
    pub seed: u64,
}

impl LhsSettings {
    /// Default settings with `seed`.
    #[must_use]
    pub const fn seeded(seed: u64) -> Self {
        Self {
            design_size: None,
            radius: 0.2,
            shrink: 0.5,
            min_radius: 1e-3,
            seed,
        }
    }

    /// Set the initial radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the design size.
    #[must_use]
    pub const fn with_design_size(mut self, size: usize) -> Self {
        self.design_size = Some(size);
        self
    }
}

/// Space-filling design, then perturbation around the incumbent.
///
/// After the design, each step perturbs the best point uniformly within
/// the current radius. After `2n` consecutive failures the radius shrinks.
/// The search ends when the budget runs out or the radius falls below
/// `min_radius`.
#[derive(Debug, Clone)]
pub struct LatinHypercubeSearch {
    settings: LhsSettings,
    rng: StdRng,
}

impl LatinHypercubeSearch {
    /// Engine from settings.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidSetting`] unless
    /// `0 < min_radius <= radius` and `0 < shrink < 1`.
    pub fn new(settings: LhsSettings) -> DriverResult<Self> {
        let radius_ok = settings.min_radius > 0.0 && settings.radius >= settings.min_radius;
        if !radius_ok {
            return Err(DriverError::InvalidSetting(format!(
                "radius {} and min_radius {} must satisfy 0 < min_radius <= radius",
                settings.radius, settings.min_radius
            )));
        }
        let shrink_ok = settings.shrink > 0.0 && settings.shrink < 1.0;
        if !shrink_ok {
            return Err(DriverError::InvalidSetting(format!(
                "shrink must be in (0, 1), got {}",
                settings.shrink
            )));
        }
        let rng = StdRng::seed_from_u64(settings.seed);
        Ok(Self { settings, rng })
    }

    fn design_size(&self, dimension: usize, budget: usize) -> usize {
        self.settings
            .design_size
            .unwrap_or_else(|| (2 * dimension + 1).max(10))
            .min(budget)
    }
}

impl CallbackEngine for LatinHypercubeSearch {
    fn optimize(&mut self, objective: &mut dyn Objective, budget: usize) -> EngineSummary {
        let n = objective.dimension();
        let mut best: Option<Candidate> = None;
        let mut evaluations = 0;
        let design = latin_hypercube(n, self.design_size(n, budget), &mut self.rng);
        for x in design {
            offer(objective, &mut best, x);
            evaluations += 1;
        }
        info!(
            evaluations,
            best = best.as_ref().map_or(f64::INFINITY, |b| b.cost),
            "Design phase done"
        );

        let mut radius = self.settings.radius;
        let patience = 2 * n.max(1);
        let mut failures = 0;
        while evaluations < budget {
            if radius < self.settings.min_radius {
                return EngineSummary {
                    best,
                    evaluations,
                    stop: EngineStop::TolX,
                };
            }
            let center = best.as_ref().map_or_else(|| vec![0.5; n], |b| b.x.clone());
            let x: Vec<f64> = center
                .iter()
                .map(|c| (c + self.rng.gen_range(-radius..=radius)).clamp(0.0, 1.0))
                .collect();
            let improved = offer(objective, &mut best, x);
            evaluations += 1;

            if improved {
                failures = 0;
            } else {
                failures += 1;
                if failures >= patience {
                    radius *= self.settings.shrink;
                    failures = 0;
                    debug!(radius, evaluations, "Shrinking search radius");
                }
            }
        }

        EngineSummary {
            best,
            evaluations,
            stop: EngineStop::BudgetExhausted,
        }
    }
}

/// Evaluate `x` and keep it if it improves; returns whether it did.
fn offer(objective: &mut dyn Objective, best: &mut Option<Candidate>, x: Vec<f64>) -> bool {
    let candidate = Candidate {
        cost: objective.evaluate(&x),
        x,
    };
    if candidate.improves_on(best.as_ref()) {
        *best = Some(candidate);
        true
    } else {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::objective::FnObjective;

    #[test]
    fn budget_is_never_exceeded() {
        let mut calls = 0;
        let mut objective = FnObjective::new(3, |x: &[f64]| {
            calls += 1;
            x.iter().sum()
        });
        let mut engine = LatinHypercubeSearch::new(LhsSettings::seeded(5)).unwrap();
        let summary = engine.optimize(&mut objective, 25);

        assert_eq!(summary.evaluations, 25);
        assert_eq!(calls, 25);
        assert_eq!(summary.stop, EngineStop::BudgetExhausted);
    }

    #[test]
    fn budget_smaller_than_design_truncates_it() {
        let mut objective = FnObjective::new(2, |x: &[f64]| x[0]);
        let mut engine = LatinHypercubeSearch::new(LhsSettings::seeded(1)).unwrap();
        let summary = engine.optimize(&mut objective, 3);
        assert_eq!(summary.evaluations, 3);
        assert!(summary.best.is_some());
    }

    #[test]
    fn local_search_refines_the_design() {
        let mut objective =
            FnObjective::new(2, |x: &[f64]| (x[0] - 0.62).powi(2) + (x[1] - 0.17).powi(2));
        let mut engine = LatinHypercubeSearch::new(LhsSettings::seeded(11)).unwrap();
        let summary = engine.optimize(&mut objective, 2000);
        let best = summary.best.unwrap();
        assert!(best.cost < 1e-4, "cost {}", best.cost);
    }

    #[test]
    fn constant_objective_ends_on_radius() {
        let mut objective = FnObjective::new(1, |_: &[f64]| 1.0);
        let mut engine = LatinHypercubeSearch::new(LhsSettings::seeded(2)).unwrap();
        let summary = engine.optimize(&mut objective, 10_000);
        assert_eq!(summary.stop, EngineStop::TolX);
        assert!(summary.evaluations < 10_000);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(LatinHypercubeSearch::new(LhsSettings::seeded(0).with_radius(0.0)).is_err());
        let mut bad = LhsSettings::seeded(0);
        bad.shrink = 1.0;
        assert!(LatinHypercubeSearch::new(bad).is_err());
    }
}
