//! Distance statistics and their reduction to a scalar cost.

use calib_params::SENTINEL_COST;

/// Weight of the RMS term in the registration cost.
pub const RMSE_WEIGHT: f64 = 0.8;

/// Weight of the maximum-distance term in the registration cost.
pub const MAX_WEIGHT: f64 = 0.2;

/// Point-to-surface distance statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscrepancyMetrics {
    /// Largest distance.
    pub max_distance: f64,
    /// Mean distance.
    pub mean_distance: f64,
    /// Root-mean-square distance.
    pub rmse: f64,
}

impl DiscrepancyMetrics {
    /// The failure triple `(1e9, 1e9, 1e9)`.
    #[must_use]
    pub const fn sentinel() -> Self {
        Self {
            max_distance: SENTINEL_COST,
            mean_distance: SENTINEL_COST,
            rmse: SENTINEL_COST,
        }
    }

    /// Reduce a list of unsigned distances. Empty input yields the sentinel.
    ///
    /// # Example
    ///
    /// ```
    /// use calib_discrepancy::DiscrepancyMetrics;
    ///
    /// let m = DiscrepancyMetrics::from_distances(&[0.0, 3.0, 4.0]);
    /// assert_eq!(m.max_distance, 4.0);
    /// assert!((m.mean_distance - 7.0 / 3.0).abs() < 1e-12);
    /// assert!((m.rmse - (25.0f64 / 3.0).sqrt()).abs() < 1e-12);
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // vertex counts fit in f64 mantissa
    pub fn from_distances(distances: &[f64]) -> Self {
        if distances.is_empty() {
            return Self::sentinel();
        }
        let n = distances.len() as f64;
        let (max, sum, sum_sq) = distances
            .iter()
            .fold((0.0f64, 0.0, 0.0), |(max, sum, sq), &d| {
                (max.max(d), sum + d, d.mul_add(d, sq))
            });
        Self {
            max_distance: max,
            mean_distance: sum / n,
            rmse: (sum_sq / n).sqrt(),
        }
    }

    /// `0.8·rmse + 0.2·max`.
    #[must_use]
    pub fn cost(&self) -> f64 {
        RMSE_WEIGHT.mul_add(self.rmse, MAX_WEIGHT * self.max_distance)
    }

    /// Whether these are the failure values.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.rmse >= SENTINEL_COST
    }
}
