//! Mode selection and the never-failing scoring entry point.

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics::DiscrepancyMetrics;
use crate::registration::{RegistrationSettings, load, registration_metrics};
use crate::slices::{SLICE_PENALTY, SliceScore, SliceTarget, score_slices, slice_cost};

const fn default_axis() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

/// Settings for slice-mode scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceSettings {
    /// Cutting-plane normal; planes are `axis · p = height`.
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],
    /// Measured sections.
    pub targets: Vec<SliceTarget>,
}

impl SliceSettings {
    /// Slices along +Y.
    #[must_use]
    pub fn along_y(targets: Vec<SliceTarget>) -> Self {
        Self {
            axis: default_axis(),
            targets,
        }
    }

    /// Axis as a vector.
    #[must_use]
    pub fn axis_vector(&self) -> Vector3<f64> {
        Vector3::from(self.axis)
    }
}

/// How simulated geometry is compared with ground truth. Exactly one mode
/// is active per configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringMode {
    /// Register a ground-truth surface and measure distances.
    Registration(RegistrationSettings),
    /// Fit ellipses to cross-sections and compare areas.
    Slices(SliceSettings),
}

/// Detailed result of one scoring call.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscrepancyReport {
    /// Distance statistics.
    Registration(DiscrepancyMetrics),
    /// Per-slice errors.
    Slices(Vec<SliceScore>),
}

impl DiscrepancyReport {
    /// Scalar cost: `0.8·rmse + 0.2·max`, or the sum of slice errors.
    #[must_use]
    pub fn cost(&self) -> f64 {
        match self {
            Self::Registration(m) => m.cost(),
            Self::Slices(scores) => slice_cost(scores),
        }
    }
}

/// Scores a simulated surface against ground truth.
///
/// # Example
///
/// ```
/// use calib_discrepancy::{GeometricDiscrepancyEngine, ScoringMode, SliceSettings, SliceTarget};
/// use std::path::Path;
///
/// let engine = GeometricDiscrepancyEngine::new(ScoringMode::Slices(SliceSettings::along_y(vec![
///     SliceTarget::with_area(20.5, 491.0),
/// ])));
///
/// // A missing result file scores the fixed penalty per slice.
/// assert_eq!(engine.score(Path::new("/nonexistent/result.obj")), 10.0);
/// ```
#[derive(Debug, Clone)]
pub struct GeometricDiscrepancyEngine {
    mode: ScoringMode,
}

impl GeometricDiscrepancyEngine {
    /// Engine for one scoring mode.
    #[must_use]
    pub const fn new(mode: ScoringMode) -> Self {
        Self { mode }
    }

    /// The active mode.
    #[must_use]
    pub const fn mode(&self) -> &ScoringMode {
        &self.mode
    }

    /// Score the surface at `simulated`. Never fails; failures appear as
    /// sentinel metrics or slice penalties.
    #[must_use]
    pub fn evaluate(&self, simulated: &Path) -> DiscrepancyReport {
        match &self.mode {
            ScoringMode::Registration(settings) => {
                DiscrepancyReport::Registration(registration_metrics(simulated, settings))
            }
            ScoringMode::Slices(settings) => match load(simulated) {
                Ok(surface) => DiscrepancyReport::Slices(score_slices(
                    &surface,
                    settings.axis_vector(),
                    &settings.targets,
                )),
                Err(err) => {
                    warn!(error = %err, "Simulated surface unavailable, penalizing all slices");
                    DiscrepancyReport::Slices(
                        settings
                            .targets
                            .iter()
                            .map(|t| SliceScore {
                                target: *t,
                                fit: None,
                                error: SLICE_PENALTY,
                            })
                            .collect(),
                    )
                }
            },
        }
    }

    /// Scalar cost of [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn score(&self, simulated: &Path) -> f64 {
        self.evaluate(simulated).cost()
    }
}
