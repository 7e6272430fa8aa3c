//! Coarse alignment.

use crate::{RegistrationError, RegistrationResult, RigidTransform};
use mesh_types::IndexedMesh;

/// Translation that moves the vertex centroid of `moving` onto that of `fixed`.
///
/// # Errors
///
/// Returns an error if either mesh has no vertices.
///
/// # Example
///
/// ```
/// use mesh_registration::centroid_alignment;
/// use mesh_types::{Vector3, unit_cube};
///
/// let fixed = unit_cube();
/// let mut moving = unit_cube();
/// moving.translate(Vector3::new(10.0, 0.0, 0.0));
///
/// let t = centroid_alignment(&moving, &fixed).unwrap();
/// assert!((t.translation - Vector3::new(-10.0, 0.0, 0.0)).norm() < 1e-12);
/// ```
pub fn centroid_alignment(
    moving: &IndexedMesh,
    fixed: &IndexedMesh,
) -> RegistrationResult<RigidTransform> {
    let from = moving.centroid().ok_or(RegistrationError::EmptySource)?;
    let to = fixed.centroid().ok_or(RegistrationError::EmptyTarget)?;
    Ok(RigidTransform::from_translation(to - from))
}

/// Copy of `moving` translated so its centroid coincides with `fixed`'s.
///
/// # Errors
///
/// Returns an error if either mesh has no vertices.
pub fn centroid_align(moving: &IndexedMesh, fixed: &IndexedMesh) -> RegistrationResult<IndexedMesh> {
    let t = centroid_alignment(moving, fixed)?;
    let mut out = moving.clone();
    out.translate(t.translation);
    Ok(out)
}
