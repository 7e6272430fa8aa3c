//! Rigid iterative closest point.
//!
//! Each iteration:
//! 1. moves the landmark points with the current transform
//! 2. pairs each with its closest point on the target
//! 3. solves the paired problem with [`kabsch`](crate::kabsch)
//! 4. composes the increment onto the current transform
//!
//! Correspondences are found in parallel with `rayon`, against either the
//! target surface (closest point on any triangle) or the target vertices
//! (KD-tree nearest neighbour).

use crate::kabsch::{centroid, kabsch};
use crate::{RegistrationError, RegistrationResult, RigidTransform};
use kiddo::{KdTree, SquaredEuclidean};
use mesh_sdf::SignedDistanceField;
use mesh_types::IndexedMesh;
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::debug;

/// How a moving point finds its partner on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrespondenceMode {
    /// Closest point anywhere on the target triangles.
    #[default]
    Surface,
    /// Nearest target vertex.
    Vertex,
}

/// Parameters for ICP registration.
#[derive(Debug, Clone)]
pub struct IcpParams {
    /// Iteration cap (default: 50).
    pub max_iterations: u32,
    /// Stop early once the RMS change between iterations falls below this.
    /// `None` runs every iteration (default).
    pub convergence_threshold: Option<f64>,
    /// Correspondences farther than this are discarded (default: none).
    pub max_correspondence_distance: Option<f64>,
    /// Evenly strided subset of the source used as landmarks
    /// (default: 200; `None` uses every point).
    pub max_landmarks: Option<usize>,
    /// Translate the source centroid onto the target centroid before the
    /// first iteration (default: true).
    pub start_by_matching_centroids: bool,
    /// Correspondence search (default: [`CorrespondenceMode::Surface`]).
    pub correspondence: CorrespondenceMode,
    /// Starting transform (default: identity).
    pub initial_transform: RigidTransform,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_threshold: None,
            max_correspondence_distance: None,
            max_landmarks: Some(200),
            start_by_matching_centroids: true,
            correspondence: CorrespondenceMode::Surface,
            initial_transform: RigidTransform::identity(),
        }
    }
}

impl IcpParams {
    /// Default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Stop once the RMS change falls below `threshold`.
    #[must_use]
    pub const fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = Some(threshold);
        self
    }

    /// Discard correspondences farther than `distance`.
    #[must_use]
    pub const fn with_max_correspondence_distance(mut self, distance: f64) -> Self {
        self.max_correspondence_distance = Some(distance);
        self
    }

    /// Landmark cap; `None` uses every source point.
    #[must_use]
    pub const fn with_max_landmarks(mut self, max_landmarks: Option<usize>) -> Self {
        self.max_landmarks = max_landmarks;
        self
    }

    /// Enable or disable the centroid-matching start.
    #[must_use]
    pub const fn with_centroid_start(mut self, enabled: bool) -> Self {
        self.start_by_matching_centroids = enabled;
        self
    }

    /// Choose the correspondence search.
    #[must_use]
    pub const fn with_correspondence(mut self, mode: CorrespondenceMode) -> Self {
        self.correspondence = mode;
        self
    }

    /// Set the starting transform.
    #[must_use]
    pub const fn with_initial_transform(mut self, transform: RigidTransform) -> Self {
        self.initial_transform = transform;
        self
    }
}

/// Result of ICP registration.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// Transform mapping source onto target.
    pub transform: RigidTransform,
    /// RMS landmark-to-target distance under `transform`.
    pub rms_error: f64,
    /// Largest landmark-to-target distance under `transform`.
    pub max_error: f64,
    /// Iterations performed.
    pub iterations: u32,
    /// True if the convergence threshold stopped the loop early.
    pub converged: bool,
    /// Correspondences used in the final evaluation.
    pub correspondence_count: usize,
}

/// Closest-point oracle over the target.
enum Target {
    Surface(Box<SignedDistanceField>),
    Vertices {
        tree: KdTree<f64, 3>,
        points: Vec<Point3<f64>>,
    },
}

impl Target {
    fn build(target: &IndexedMesh, mode: CorrespondenceMode) -> RegistrationResult<Self> {
        if target.vertices.is_empty() {
            return Err(RegistrationError::EmptyTarget);
        }
        // A target without faces can only be matched by vertex.
        if mode == CorrespondenceMode::Surface && !target.is_empty() {
            return Ok(Self::Surface(Box::new(SignedDistanceField::new(
                target.clone(),
            )?)));
        }
        let points: Vec<Point3<f64>> = target.positions().copied().collect();
        let mut tree: KdTree<f64, 3> = KdTree::new();
        for (i, p) in points.iter().enumerate() {
            tree.add(&[p.x, p.y, p.z], i as u64);
        }
        Ok(Self::Vertices { tree, points })
    }

    #[allow(clippy::cast_possible_truncation)] // KD-tree items are vertex indices
    fn closest(&self, p: &Point3<f64>) -> Option<Point3<f64>> {
        match self {
            Self::Surface(sdf) => Some(sdf.closest_point(*p)),
            Self::Vertices { tree, points } => {
                let nearest = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]);
                points.get(nearest.item as usize).copied()
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Correspondence {
    moved: Point3<f64>,
    target: Point3<f64>,
    distance_sq: f64,
}

/// Align a source mesh's vertices onto a target mesh.
///
/// # Errors
///
/// Returns an error if either mesh has no vertices, no correspondence
/// survives the distance gate, or the transform solve fails.
///
/// # Example
///
/// ```
/// use mesh_registration::{IcpParams, icp_align};
/// use mesh_types::{Vector3, unit_cube};
///
/// let target = unit_cube();
/// let mut source = unit_cube();
/// source.translate(Vector3::new(0.3, -0.2, 0.1));
///
/// let result = icp_align(&source, &target, &IcpParams::default()).unwrap();
/// assert!(result.rms_error < 1e-6);
/// ```
pub fn icp_align(
    source: &IndexedMesh,
    target: &IndexedMesh,
    params: &IcpParams,
) -> RegistrationResult<IcpResult> {
    let points: Vec<Point3<f64>> = source.positions().copied().collect();
    icp_align_points(&points, target, params)
}

/// Align a point set onto a target mesh.
///
/// # Errors
///
/// See [`icp_align`].
pub fn icp_align_points(
    source: &[Point3<f64>],
    target: &IndexedMesh,
    params: &IcpParams,
) -> RegistrationResult<IcpResult> {
    if source.is_empty() {
        return Err(RegistrationError::EmptySource);
    }
    let oracle = Target::build(target, params.correspondence)?;
    let landmarks = select_landmarks(source, params.max_landmarks);
    let max_dist_sq = params
        .max_correspondence_distance
        .map_or(f64::INFINITY, |d| d * d);

    let mut transform = params.initial_transform;
    if params.start_by_matching_centroids {
        let moved: Vec<Point3<f64>> = landmarks.iter().map(|p| transform.transform_point(p)).collect();
        let target_points: Vec<Point3<f64>> = target.positions().copied().collect();
        let shift = centroid(&target_points) - centroid(&moved);
        transform = RigidTransform::from_translation(shift).compose(&transform);
    }

    let mut prev_rms = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..params.max_iterations {
        iterations = iter + 1;
        let pairs = correspondences(&landmarks, &transform, &oracle, max_dist_sq);
        if pairs.is_empty() {
            return Err(RegistrationError::NoCorrespondences);
        }

        let (moved, matched): (Vec<Point3<f64>>, Vec<Point3<f64>>) =
            pairs.iter().map(|c| (c.moved, c.target)).unzip();
        let increment = kabsch(&moved, &matched)?;
        transform = increment.compose(&transform);

        let (rms, _) = error_metrics(&pairs);
        debug!(iteration = iterations, rms, pairs = pairs.len(), "icp step");
        if let Some(threshold) = params.convergence_threshold {
            if (prev_rms - rms).abs() < threshold {
                converged = true;
                break;
            }
        }
        prev_rms = rms;
    }

    let pairs = correspondences(&landmarks, &transform, &oracle, max_dist_sq);
    if pairs.is_empty() {
        return Err(RegistrationError::NoCorrespondences);
    }
    let (rms_error, max_error) = error_metrics(&pairs);

    Ok(IcpResult {
        transform,
        rms_error,
        max_error,
        iterations,
        converged,
        correspondence_count: pairs.len(),
    })
}

/// Evenly strided subset of at most `cap` points.
fn select_landmarks(points: &[Point3<f64>], cap: Option<usize>) -> Vec<Point3<f64>> {
    match cap {
        Some(cap) if cap > 0 && points.len() > cap => {
            let step = points.len().div_ceil(cap);
            points.iter().step_by(step).copied().collect()
        }
        _ => points.to_vec(),
    }
}

fn correspondences(
    landmarks: &[Point3<f64>],
    transform: &RigidTransform,
    oracle: &Target,
    max_dist_sq: f64,
) -> Vec<Correspondence> {
    landmarks
        .par_iter()
        .filter_map(|p| {
            let moved = transform.transform_point(p);
            let target = oracle.closest(&moved)?;
            let distance_sq = (target - moved).norm_squared();
            (distance_sq <= max_dist_sq).then_some(Correspondence {
                moved,
                target,
                distance_sq,
            })
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn error_metrics(pairs: &[Correspondence]) -> (f64, f64) {
    let sum: f64 = pairs.iter().map(|c| c.distance_sq).sum();
    let max = pairs.iter().map(|c| c.distance_sq).fold(0.0, f64::max);
    ((sum / pairs.len() as f64).sqrt(), max.sqrt())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{Vertex, unit_cube};
    use nalgebra::{UnitQuaternion, Vector3};
    use rand::{Rng, SeedableRng};

    /// Scattered points; a regular grid would put too many values on one
    /// KD-tree split plane.
    fn cloud(seed: u64, n: usize) -> IndexedMesh {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut mesh = IndexedMesh::new();
        for _ in 0..n {
            mesh.vertices.push(Vertex::from_coords(
                rng.gen_range(0.0..10.0),
                rng.gen_range(0.0..6.0),
                rng.gen_range(0.0..3.0),
            ));
        }
        mesh
    }

    #[test]
    fn vertex_mode_recovers_translation() {
        let target = cloud(7, 300);
        let shift = Vector3::new(0.4, -0.3, 0.2);
        let source = RigidTransform::from_translation(-shift).transform_mesh(&target);

        let params = IcpParams::new()
            .with_correspondence(CorrespondenceMode::Vertex)
            .with_max_landmarks(None);
        let result = icp_align(&source, &target, &params).unwrap();

        assert_relative_eq!(result.transform.translation, shift, epsilon = 1e-9);
        assert!(result.rms_error < 1e-9);
        assert_eq!(result.correspondence_count, 300);
    }

    #[test]
    fn surface_mode_recovers_small_rotation() {
        let mut target = unit_cube();
        target.translate(Vector3::new(-0.5, -0.5, -0.5));
        target.vertices.iter_mut().for_each(|v| v.position.x *= 3.0);

        let truth = RigidTransform::new(
            UnitQuaternion::from_euler_angles(0.0, 0.0, 0.05),
            Vector3::new(0.1, 0.05, 0.0),
        );
        let source = truth.inverse().transform_mesh(&target);

        let result = icp_align(&source, &target, &IcpParams::default()).unwrap();
        assert!(result.rms_error < 1e-6, "rms {}", result.rms_error);
        assert_eq!(result.iterations, 50);
        assert!(!result.converged);
    }

    #[test]
    fn threshold_stops_early() {
        let target = unit_cube();
        let params = IcpParams::new().with_convergence_threshold(1e-9);
        let result = icp_align(&target, &target, &params).unwrap();
        assert!(result.converged);
        assert!(result.iterations < 50);
    }

    #[test]
    fn empty_inputs_are_errors() {
        let cube = unit_cube();
        assert!(matches!(
            icp_align(&IndexedMesh::new(), &cube, &IcpParams::default()),
            Err(RegistrationError::EmptySource)
        ));
        assert!(matches!(
            icp_align(&cube, &IndexedMesh::new(), &IcpParams::default()),
            Err(RegistrationError::EmptyTarget)
        ));
    }

    #[test]
    fn distance_gate_can_reject_everything() {
        let target = unit_cube();
        let mut source = unit_cube();
        source.translate(Vector3::new(50.0, 0.0, 0.0));
        let params = IcpParams::new()
            .with_centroid_start(false)
            .with_max_correspondence_distance(1.0);
        assert!(matches!(
            icp_align(&source, &target, &params),
            Err(RegistrationError::NoCorrespondences)
        ));
    }

    #[test]
    fn landmarks_are_strided() {
        let pts: Vec<Point3<f64>> = (0..1000).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
        let picked = select_landmarks(&pts, Some(200));
        assert_eq!(picked.len(), 200);
        assert_relative_eq!(picked[1].x, 5.0);
        assert_eq!(select_landmarks(&pts, None).len(), 1000);
    }
}
