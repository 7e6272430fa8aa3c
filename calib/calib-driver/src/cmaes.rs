//! Separable CMA-ES.
//!
//! CMA-ES with a diagonal covariance matrix (Ros and Hansen, 2008). The
//! diagonal model needs far fewer generations to adapt than a full matrix,
//! which matters when every evaluation is a full deployment simulation.
//!
//! Candidates are projected onto the unit cube before they are handed out,
//! and the update uses the projected points, so the mean never leaves the
//! cube.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{AskTellEngine, Candidate, EngineStop};
use crate::error::{DriverError, DriverResult};

/// Initial mean coordinate in normalized units.
pub const DEFAULT_X0: f64 = 0.5;
/// Initial step size in normalized units.
pub const DEFAULT_SIGMA: f64 = 0.2;

/// Settings for [`SeparableCmaEs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmaesSettings {
    /// Initial mean, one value per coordinate.
    pub x0: Vec<f64>,
    /// Initial step size.
    pub sigma: f64,
    /// Population size; `4 + ⌊3 ln n⌋` when unset.
    pub population: Option<usize>,
    /// Stop when every coordinate's step is below this.
    pub tol_x: f64,
    /// Stop when recent best costs span less than this.
    pub tol_fun: f64,
    /// RNG seed.
    pub seed: u64,
}

impl CmaesSettings {
    /// Centered start with the default step size.
    #[must_use]
    pub fn centered(dimension: usize, seed: u64) -> Self {
        Self {
            x0: vec![DEFAULT_X0; dimension],
            sigma: DEFAULT_SIGMA,
            population: None,
            tol_x: 1e-6,
            tol_fun: 1e-12,
            seed,
        }
    }

    /// Set the step size.
    #[must_use]
    pub const fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Set the population size.
    #[must_use]
    pub const fn with_population(mut self, population: usize) -> Self {
        self.population = Some(population);
        self
    }
}

/// Strategy constants derived from dimension and population size.
#[derive(Debug, Clone)]
struct Constants {
    lambda: usize,
    weights: Vec<f64>,
    mu_eff: f64,
    c_sigma: f64,
    d_sigma: f64,
    c_c: f64,
    c_1: f64,
    c_mu: f64,
    chi_n: f64,
    history: usize,
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
impl Constants {
    fn new(n: usize, lambda: usize) -> Self {
        let nf = n as f64;
        let mu = lambda / 2;
        let raw: Vec<f64> = (1..=mu)
            .map(|i| ((mu as f64) + 0.5).ln() - (i as f64).ln())
            .collect();
        let total: f64 = raw.iter().sum();
        let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (nf + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (nf + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / nf) / (nf + 4.0 + 2.0 * mu_eff / nf);

        // Diagonal learning rates are scaled up by (n + 2) / 3.
        let scale = (nf + 2.0) / 3.0;
        let c_1 = (scale * 2.0 / ((nf + 1.3).powi(2) + mu_eff)).min(1.0);
        let c_mu = (scale * 2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((nf + 2.0).powi(2) + mu_eff))
            .min(1.0 - c_1)
            .max(0.0);

        let chi_n = nf.sqrt() * (1.0 - 1.0 / (4.0 * nf) + 1.0 / (21.0 * nf * nf));
        let history = 10 + (30.0 * nf / lambda as f64).ceil() as usize;

        Self {
            lambda,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu,
            chi_n,
            history,
        }
    }
}

/// Diagonal-covariance CMA-ES on `[0, 1]^n`.
///
/// # Example
///
/// ```
/// use calib_driver::{AskTellEngine, CmaesSettings, SeparableCmaEs};
///
/// let mut es = SeparableCmaEs::new(CmaesSettings::centered(2, 7)).unwrap();
/// for _ in 0..150 {
///     let xs = es.ask();
///     let costs: Vec<f64> = xs
///         .iter()
///         .map(|x| (x[0] - 0.3).powi(2) + (x[1] - 0.8).powi(2))
///         .collect();
///     es.tell(&xs, &costs).unwrap();
/// }
/// assert!(es.best().unwrap().cost < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct SeparableCmaEs {
    k: Constants,
    tol_x: f64,
    tol_fun: f64,
    mean: Vec<f64>,
    sigma: f64,
    diag: Vec<f64>,
    p_sigma: Vec<f64>,
    p_c: Vec<f64>,
    generation: usize,
    pending: usize,
    recent_best: Vec<f64>,
    best: Option<Candidate>,
    rng: StdRng,
}

impl SeparableCmaEs {
    /// Engine from settings.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidSetting`] for an empty start point, a
    /// non-positive step size or a population below 2.
    pub fn new(settings: CmaesSettings) -> DriverResult<Self> {
        let n = settings.x0.len();
        if n == 0 {
            return Err(DriverError::InvalidSetting("x0 must not be empty".into()));
        }
        let sigma_ok = settings.sigma.is_finite() && settings.sigma > 0.0;
        if !sigma_ok {
            return Err(DriverError::InvalidSetting(format!(
                "sigma must be positive, got {}",
                settings.sigma
            )));
        }
        let lambda = settings.population.unwrap_or_else(|| default_population(n));
        if lambda < 2 {
            return Err(DriverError::InvalidSetting(format!(
                "population must be at least 2, got {lambda}"
            )));
        }

        Ok(Self {
            k: Constants::new(n, lambda),
            tol_x: settings.tol_x,
            tol_fun: settings.tol_fun,
            mean: settings.x0.iter().map(|v| v.clamp(0.0, 1.0)).collect(),
            sigma: settings.sigma,
            diag: vec![1.0; n],
            p_sigma: vec![0.0; n],
            p_c: vec![0.0; n],
            generation: 0,
            pending: 0,
            recent_best: Vec::new(),
            best: None,
            rng: StdRng::seed_from_u64(settings.seed),
        })
    }

    /// Population size.
    #[must_use]
    pub const fn population(&self) -> usize {
        self.k.lambda
    }

    /// Current distribution mean.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Current step size.
    #[must_use]
    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    fn dimension(&self) -> usize {
        self.mean.len()
    }
}

/// `4 + ⌊3 ln n⌋`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn default_population(dimension: usize) -> usize {
    4 + (3.0 * (dimension.max(1) as f64).ln()).floor() as usize
}

impl AskTellEngine for SeparableCmaEs {
    fn ask(&mut self) -> Vec<Vec<f64>> {
        self.pending = self.k.lambda;
        (0..self.k.lambda)
            .map(|_| {
                self.mean
                    .iter()
                    .zip(&self.diag)
                    .map(|(&m, &c)| {
                        let z: f64 = StandardNormal.sample(&mut self.rng);
                        (m + self.sigma * c.sqrt() * z).clamp(0.0, 1.0)
                    })
                    .collect()
            })
            .collect()
    }

    fn tell(&mut self, candidates: &[Vec<f64>], costs: &[f64]) -> DriverResult<()> {
        for found in [candidates.len(), costs.len()] {
            if found != self.pending {
                return Err(DriverError::BatchMismatch {
                    expected: self.pending,
                    found,
                });
            }
        }
        let n = self.dimension();
        if let Some(bad) = candidates.iter().find(|c| c.len() != n) {
            return Err(DriverError::DimensionMismatch {
                objective: bad.len(),
                space: n,
            });
        }
        self.pending = 0;

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));

        let leader = Candidate {
            x: candidates[order[0]].clone(),
            cost: costs[order[0]],
        };
        self.recent_best.push(leader.cost);
        if self.recent_best.len() > self.k.history {
            self.recent_best.remove(0);
        }
        if leader.improves_on(self.best.as_ref()) {
            self.best = Some(leader);
        }

        let k = &self.k;
        let old_mean = self.mean.clone();
        let steps: Vec<Vec<f64>> = order
            .iter()
            .take(k.weights.len())
            .map(|&i| {
                candidates[i]
                    .iter()
                    .zip(&old_mean)
                    .map(|(x, m)| (x - m) / self.sigma)
                    .collect()
            })
            .collect();

        let mut y_w = vec![0.0; n];
        for (w, y) in k.weights.iter().zip(&steps) {
            for (acc, v) in y_w.iter_mut().zip(y) {
                *acc += w * v;
            }
        }
        for ((m, old), y) in self.mean.iter_mut().zip(&old_mean).zip(&y_w) {
            *m = (old + self.sigma * y).clamp(0.0, 1.0);
        }

        let ps_gain = (k.c_sigma * (2.0 - k.c_sigma) * k.mu_eff).sqrt();
        for ((p, y), c) in self.p_sigma.iter_mut().zip(&y_w).zip(&self.diag) {
            *p = (1.0 - k.c_sigma) * *p + ps_gain * y / c.sqrt();
        }
        let ps_norm = self.p_sigma.iter().map(|p| p * p).sum::<f64>().sqrt();

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let decay = (1.0 - k.c_sigma).powi(2 * (self.generation as i32 + 1));
        #[allow(clippy::cast_precision_loss)]
        let threshold = (1.4 + 2.0 / (n as f64 + 1.0)) * k.chi_n;
        let h_sigma = ps_norm / (1.0 - decay).sqrt() < threshold;

        let pc_gain = if h_sigma {
            (k.c_c * (2.0 - k.c_c) * k.mu_eff).sqrt()
        } else {
            0.0
        };
        for (p, y) in self.p_c.iter_mut().zip(&y_w) {
            *p = (1.0 - k.c_c) * *p + pc_gain * y;
        }

        let stall = if h_sigma { 0.0 } else { k.c_c * (2.0 - k.c_c) };
        for (j, c) in self.diag.iter_mut().enumerate() {
            let rank_mu: f64 = k
                .weights
                .iter()
                .zip(&steps)
                .map(|(w, y)| w * y[j] * y[j])
                .sum();
            let rank_one = self.p_c[j] * self.p_c[j] + stall * *c;
            *c = (1.0 - k.c_1 - k.c_mu) * *c + k.c_1 * rank_one + k.c_mu * rank_mu;
            *c = c.max(f64::MIN_POSITIVE);
        }

        self.sigma *= ((k.c_sigma / k.d_sigma) * (ps_norm / k.chi_n - 1.0)).exp();
        self.sigma = self.sigma.min(1.0);
        self.generation += 1;

        debug!(
            generation = self.generation,
            sigma = self.sigma,
            best = self.best.as_ref().map_or(f64::INFINITY, |b| b.cost),
            "CMA-ES generation"
        );
        Ok(())
    }

    fn should_stop(&self) -> Option<EngineStop> {
        let max_step = self
            .diag
            .iter()
            .map(|c| self.sigma * c.sqrt())
            .fold(0.0, f64::max);
        if max_step < self.tol_x {
            return Some(EngineStop::TolX);
        }

        if self.recent_best.len() >= self.k.history {
            let (lo, hi) = self
                .recent_best
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| {
                    (lo.min(c), hi.max(c))
                });
            if hi - lo < self.tol_fun {
                return Some(EngineStop::TolFun);
            }
        }

        let (lo, hi) = self
            .diag
            .iter()
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), &c| (lo.min(c), hi.max(c)));
        if hi / lo > 1e14 {
            return Some(EngineStop::Conditioning);
        }
        None
    }

    fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    fn generation(&self) -> usize {
        self.generation
    }
}
