//! Conversions between engineering constants and Lamé parameters.

use serde::{Deserialize, Serialize};

/// Lamé parameters of an isotropic linear-elastic material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LameParameters {
    /// First Lamé parameter λ.
    pub lambda: f64,
    /// Shear modulus μ.
    pub mu: f64,
}

impl LameParameters {
    /// Construct directly from λ and μ.
    #[must_use]
    pub const fn new(lambda: f64, mu: f64) -> Self {
        Self { lambda, mu }
    }

    /// From Young's modulus and Poisson's ratio.
    #[must_use]
    pub fn from_elastic(youngs_modulus: f64, poisson_ratio: f64) -> Self {
        lame_from_elastic(youngs_modulus, poisson_ratio)
    }

    /// Young's modulus recovered from λ and μ.
    #[must_use]
    pub fn youngs_modulus(&self) -> f64 {
        elastic_from_lame(self.lambda, self.mu)
    }
}

/// `μ = E / (2(1 + ν))`, `λ = Eν / ((1 + ν)(1 − 2ν))`.
///
/// ν must lie in `(−1, 0.5)`; ν = 0.5 yields an infinite λ.
///
/// # Example
///
/// ```
/// use calib_material::lame_from_elastic;
///
/// let lame = lame_from_elastic(1.0e6, 0.25);
/// assert!((lame.mu - 4.0e5).abs() < 1e-6);
/// assert!((lame.lambda - 4.0e5).abs() < 1e-6);
/// ```
#[must_use]
pub fn lame_from_elastic(youngs_modulus: f64, poisson_ratio: f64) -> LameParameters {
    let mu = youngs_modulus / (2.0 * (1.0 + poisson_ratio));
    let lambda =
        youngs_modulus * poisson_ratio / ((1.0 + poisson_ratio) * 2.0f64.mul_add(-poisson_ratio, 1.0));
    LameParameters { lambda, mu }
}

/// `E = μ(3λ + 2μ) / (λ + μ)`; zero when `λ + μ = 0`.
#[must_use]
pub fn elastic_from_lame(lambda: f64, mu: f64) -> f64 {
    let denom = lambda + mu;
    if denom == 0.0 {
        return 0.0;
    }
    mu * 3.0f64.mul_add(lambda, 2.0 * mu) / denom
}
