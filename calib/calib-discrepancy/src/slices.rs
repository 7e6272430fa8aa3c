//! Slice scoring: cut, fit an ellipse, compare against measured sections.

use mesh_slice::{Ellipse, MIN_FIT_POINTS, Plane, SliceError, cut_mesh, fit_ellipse};
use mesh_types::IndexedMesh;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Error contribution of a slice that cannot be cut or fitted.
pub const SLICE_PENALTY: f64 = 10.0;

/// A measured cross-section of the real vessel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceTarget {
    /// Position of the cutting plane along the slice axis.
    pub height: f64,
    /// Measured semi-major axis.
    #[serde(default)]
    pub long_axis: f64,
    /// Measured semi-minor axis.
    #[serde(default)]
    pub short_axis: f64,
    /// Measured cross-sectional area.
    pub area: f64,
    /// Measured perimeter.
    #[serde(default)]
    pub circumference: f64,
}

impl SliceTarget {
    /// Target with only height and area known.
    #[must_use]
    pub const fn with_area(height: f64, area: f64) -> Self {
        Self {
            height,
            long_axis: 0.0,
            short_axis: 0.0,
            area,
            circumference: 0.0,
        }
    }
}

/// Measured values of a fitted section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceFit {
    /// Semi-major axis.
    pub long_axis: f64,
    /// Semi-minor axis.
    pub short_axis: f64,
    /// `π·a·b`.
    pub area: f64,
    /// Ramanujan perimeter.
    pub circumference: f64,
}

impl From<&Ellipse> for SliceFit {
    fn from(e: &Ellipse) -> Self {
        Self {
            long_axis: e.semi_major,
            short_axis: e.semi_minor,
            area: e.area(),
            circumference: e.circumference(),
        }
    }
}

/// Outcome for one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceScore {
    /// The target compared against.
    pub target: SliceTarget,
    /// The fitted section, if the cut produced one.
    pub fit: Option<SliceFit>,
    /// `|target area − fitted area| / target area`, or [`SLICE_PENALTY`].
    pub error: f64,
}

/// Cut and fit one section of `surface`.
///
/// # Errors
///
/// Returns a [`SliceError`] if the cut has fewer than
/// [`MIN_FIT_POINTS`] points or the fit is degenerate.
pub fn fit_section(surface: &IndexedMesh, axis: Vector3<f64>, height: f64) -> Result<SliceFit, SliceError> {
    let plane = Plane::at_height(axis, height)?;
    let section = cut_mesh(surface, &plane)?;
    if section.point_count() < MIN_FIT_POINTS {
        return Err(SliceError::TooFewPoints {
            found: section.point_count(),
            required: MIN_FIT_POINTS,
        });
    }
    let ellipse = fit_ellipse(&section.projected())?;
    Ok(SliceFit::from(&ellipse))
}

/// Score every target. Failed slices contribute [`SLICE_PENALTY`] and the
/// remaining slices are still processed.
#[must_use]
pub fn score_slices(surface: &IndexedMesh, axis: Vector3<f64>, targets: &[SliceTarget]) -> Vec<SliceScore> {
    targets
        .iter()
        .map(|target| match fit_section(surface, axis, target.height) {
            Ok(fit) if target.area > 0.0 => {
                let error = (target.area - fit.area).abs() / target.area;
                debug!(
                    height = target.height,
                    area = fit.area,
                    long_axis = fit.long_axis,
                    short_axis = fit.short_axis,
                    error,
                    "Fitted slice"
                );
                SliceScore {
                    target: *target,
                    fit: Some(fit),
                    error,
                }
            }
            Ok(fit) => {
                warn!(height = target.height, "Slice target has no positive area");
                SliceScore {
                    target: *target,
                    fit: Some(fit),
                    error: SLICE_PENALTY,
                }
            }
            Err(err) => {
                warn!(height = target.height, error = %err, "Slice fit failed, applying penalty");
                SliceScore {
                    target: *target,
                    fit: None,
                    error: SLICE_PENALTY,
                }
            }
        })
        .collect()
}

/// Sum of per-slice errors.
#[must_use]
pub fn slice_cost(scores: &[SliceScore]) -> f64 {
    scores.iter().map(|s| s.error).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_surface_penalizes_every_target() {
        let targets = [SliceTarget::with_area(-5.0, 775.1), SliceTarget::with_area(20.5, 491.0)];
        let scores = score_slices(&IndexedMesh::new(), Vector3::y(), &targets);
        assert_eq!(scores.len(), 2);
        assert_relative_eq!(slice_cost(&scores), 2.0 * SLICE_PENALTY);
        assert!(scores.iter().all(|s| s.fit.is_none()));
    }

    #[test]
    fn targets_parse_from_measurements() {
        let t: SliceTarget = serde_json::from_str(
            r#"{"height":20.5,"long_axis":13.52,"short_axis":11.55,"area":491.0,"circumference":78.9}"#,
        )
        .unwrap();
        assert_relative_eq!(t.short_axis, 11.55);
        let t: SliceTarget = serde_json::from_str(r#"{"height":1.0,"area":2.0}"#).unwrap();
        assert_relative_eq!(t.long_axis, 0.0);
    }
}
