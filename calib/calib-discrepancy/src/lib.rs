//! Geometric discrepancy between a simulated vessel and ground truth.
//!
//! Two scoring modes exist, selected per configuration:
//!
//! - **Registration**: the ground-truth surface is centroid-aligned and
//!   refined by rigid ICP onto the simulated surface; every aligned truth
//!   vertex is measured against the simulated surface and the distances
//!   reduce to `0.8·rmse + 0.2·max`.
//! - **Slices**: the simulated surface is cut at measured heights, each cut
//!   is fitted with an ellipse and its area compared with the measured one.
//!
//! [`GeometricDiscrepancyEngine::score`] never fails. Unloadable surfaces
//! score the sentinel `(1e9, 1e9, 1e9)` in registration mode; a slice that
//! cannot be fitted adds [`SLICE_PENALTY`] and the others are still scored.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod engine;
mod error;
mod metrics;
mod registration;
mod slices;

pub use engine::{DiscrepancyReport, GeometricDiscrepancyEngine, ScoringMode, SliceSettings};
pub use error::{DiscrepancyError, DiscrepancyResult};
pub use metrics::{DiscrepancyMetrics, MAX_WEIGHT, RMSE_WEIGHT};
pub use registration::{
    DEFAULT_ICP_ITERATIONS, RegisteredTruth, RegistrationSettings, register_and_measure,
    registration_metrics,
};
pub use slices::{
    SLICE_PENALTY, SliceFit, SliceScore, SliceTarget, fit_section, score_slices, slice_cost,
};
