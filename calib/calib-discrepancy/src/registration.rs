//! Full-surface scoring: rigid registration then point-to-surface distance.

use std::path::{Path, PathBuf};

use mesh_registration::{IcpParams, IcpResult, centroid_align, icp_align};
use mesh_sdf::SignedDistanceField;
use mesh_types::IndexedMesh;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::DiscrepancyMetrics;
use crate::{DiscrepancyError, DiscrepancyResult};

/// ICP iteration cap used for scoring.
pub const DEFAULT_ICP_ITERATIONS: u32 = 50;

const fn default_icp_iterations() -> u32 {
    DEFAULT_ICP_ITERATIONS
}

/// Settings for registration-mode scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSettings {
    /// Ground-truth surface (post-procedure scan).
    pub truth_surface: PathBuf,
    /// Where to write the aligned ground truth as binary STL, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_aligned: Option<PathBuf>,
    /// ICP iteration cap.
    #[serde(default = "default_icp_iterations")]
    pub icp_iterations: u32,
}

impl RegistrationSettings {
    /// Settings for a truth surface with defaults otherwise.
    #[must_use]
    pub fn new(truth_surface: impl Into<PathBuf>) -> Self {
        Self {
            truth_surface: truth_surface.into(),
            save_aligned: None,
            icp_iterations: DEFAULT_ICP_ITERATIONS,
        }
    }

    /// Also write the aligned ground truth to `path`.
    #[must_use]
    pub fn with_save_aligned(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_aligned = Some(path.into());
        self
    }
}

/// Ground truth after alignment, with its distance statistics.
#[derive(Debug, Clone)]
pub struct RegisteredTruth {
    /// Ground truth moved onto the simulated surface.
    pub aligned: IndexedMesh,
    /// Fine registration result.
    pub icp: IcpResult,
    /// Distances from every aligned truth vertex to the simulated surface.
    pub metrics: DiscrepancyMetrics,
}

/// Align `truth` onto `simulated` and measure the remaining distances.
///
/// The truth is first translated so the vertex centroids coincide, then
/// refined by rigid ICP for a fixed number of iterations. Every aligned
/// truth vertex is then measured against the simulated surface.
///
/// # Errors
///
/// Returns an error if either surface is empty or registration fails.
pub fn register_and_measure(
    simulated: &IndexedMesh,
    truth: &IndexedMesh,
    icp_iterations: u32,
) -> DiscrepancyResult<RegisteredTruth> {
    if simulated.vertices.is_empty() {
        return Err(DiscrepancyError::EmptySurface("simulated"));
    }
    if truth.vertices.is_empty() {
        return Err(DiscrepancyError::EmptySurface("truth"));
    }

    let coarse = centroid_align(truth, simulated)?;
    let params = IcpParams::default().with_max_iterations(icp_iterations);
    let icp = icp_align(&coarse, simulated, &params)?;
    let aligned = icp.transform.transform_mesh(&coarse);
    debug!(
        iterations = icp.iterations,
        rms = icp.rms_error,
        "Registered ground truth"
    );

    let field = SignedDistanceField::new(simulated.clone())?;
    let distances: Vec<f64> = aligned
        .vertices
        .par_iter()
        .map(|v| field.unsigned_distance(v.position))
        .collect();

    Ok(RegisteredTruth {
        aligned,
        icp,
        metrics: DiscrepancyMetrics::from_distances(&distances),
    })
}

/// Registration metrics between two surface files.
///
/// Never fails: a surface that cannot be loaded, or a registration that
/// cannot run, yields [`DiscrepancyMetrics::sentinel`].
#[must_use]
pub fn registration_metrics(simulated: &Path, settings: &RegistrationSettings) -> DiscrepancyMetrics {
    let (sim, truth) = match (load(simulated), load(&settings.truth_surface)) {
        (Ok(sim), Ok(truth)) => (sim, truth),
        (Err(err), _) | (_, Err(err)) => {
            warn!(error = %err, "Surface load failed, scoring as sentinel");
            return DiscrepancyMetrics::sentinel();
        }
    };

    let registered = match register_and_measure(&sim, &truth, settings.icp_iterations) {
        Ok(r) => r,
        Err(err) => {
            warn!(error = %err, "Registration failed, scoring as sentinel");
            return DiscrepancyMetrics::sentinel();
        }
    };

    if let Some(path) = &settings.save_aligned {
        match mesh_io::save_stl(&registered.aligned, path, true) {
            Ok(()) => debug!(path = %path.display(), "Saved aligned ground truth"),
            Err(err) => warn!(path = %path.display(), error = %err, "Could not save aligned ground truth"),
        }
    }

    let m = registered.metrics;
    info!(
        max = m.max_distance,
        mean = m.mean_distance,
        rmse = m.rmse,
        "Registration discrepancy"
    );
    m
}

pub(crate) fn load(path: &Path) -> DiscrepancyResult<IndexedMesh> {
    mesh_io::load_mesh(path).map_err(|source| DiscrepancyError::Load {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{Vector3, unit_cube};

    fn box_mesh(size: [f64; 3]) -> IndexedMesh {
        let mut mesh = unit_cube();
        for v in &mut mesh.vertices {
            v.position.x *= size[0];
            v.position.y *= size[1];
            v.position.z *= size[2];
        }
        mesh
    }

    #[test]
    fn identical_surfaces_measure_zero() {
        let sim = box_mesh([3.0, 2.0, 1.0]);
        let mut truth = sim.clone();
        truth.translate(Vector3::new(25.0, -4.0, 7.0));

        let r = register_and_measure(&sim, &truth, DEFAULT_ICP_ITERATIONS).unwrap();
        assert_relative_eq!(r.metrics.max_distance, 0.0, epsilon = 1e-9);
        assert_relative_eq!(r.metrics.mean_distance, 0.0, epsilon = 1e-9);
        assert_relative_eq!(r.metrics.rmse, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn scaled_truth_leaves_residual() {
        let sim = box_mesh([2.0, 2.0, 2.0]);
        let truth = box_mesh([2.2, 2.2, 2.2]);
        let r = register_and_measure(&sim, &truth, DEFAULT_ICP_ITERATIONS).unwrap();
        // Corners stick out by 0.1 along each axis after centering.
        assert_relative_eq!(r.metrics.max_distance, 0.1 * 3.0f64.sqrt(), epsilon = 1e-6);
        assert!(r.metrics.cost() > 0.0);
    }

    #[test]
    fn empty_surfaces_are_errors() {
        assert!(matches!(
            register_and_measure(&IndexedMesh::new(), &unit_cube(), 5),
            Err(DiscrepancyError::EmptySurface("simulated"))
        ));
    }

    #[test]
    fn missing_file_gives_sentinel_triple() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RegistrationSettings::new(dir.path().join("truth.stl"));
        let m = registration_metrics(&dir.path().join("sim.obj"), &settings);
        assert_eq!(m, DiscrepancyMetrics::sentinel());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let s: RegistrationSettings = serde_json::from_str(r#"{"truth_surface":"t.stl"}"#).unwrap();
        assert_eq!(s.icp_iterations, 50);
        assert!(s.save_aligned.is_none());
    }
}
