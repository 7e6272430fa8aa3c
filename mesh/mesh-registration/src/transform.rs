//! Rigid-body transform.

use mesh_types::IndexedMesh;
use nalgebra::{Point3, UnitQuaternion, Vector3};

/// A rotation followed by a translation.
///
/// Registration of anatomical surfaces is rigid: scaling the ground truth
/// would hide real shape differences, so no scale component exists.
///
/// # Example
///
/// ```
/// use mesh_registration::RigidTransform;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
/// use std::f64::consts::FRAC_PI_2;
///
/// let t = RigidTransform::new(
///     UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
///     Vector3::new(1.0, 0.0, 0.0),
/// );
/// let p = t.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((p - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation.
    pub rotation: UnitQuaternion<f64>,
    /// Translation applied after rotation.
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Transform from rotation and translation.
    #[must_use]
    pub const fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self::new(UnitQuaternion::identity(), Vector3::zeros())
    }

    /// Pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(UnitQuaternion::identity(), translation)
    }

    /// Apply to a point.
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Apply to a direction (rotation only).
    #[must_use]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Return a copy of `mesh` with every vertex transformed.
    #[must_use]
    pub fn transform_mesh(&self, mesh: &IndexedMesh) -> IndexedMesh {
        let mut out = mesh.clone();
        for v in &mut out.vertices {
            v.position = self.transform_point(&v.position);
        }
        out
    }

    /// `self ∘ other`: applies `other` first, then `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    /// Inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Rotation angle in radians.
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    /// True if rotation angle and translation length are both below `epsilon`.
    #[must_use]
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.angle().abs() < epsilon && self.translation.norm() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> RigidTransform {
        RigidTransform::new(
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
            Vector3::new(4.0, -1.0, 2.5),
        )
    }

    #[test]
    fn inverse_undoes_transform() {
        let t = sample();
        let p = Point3::new(-3.0, 7.0, 0.5);
        let back = t.inverse().transform_point(&t.transform_point(&p));
        assert_relative_eq!(back, p, epsilon = 1e-12);
        assert!(t.compose(&t.inverse()).is_identity(1e-12));
    }

    #[test]
    fn compose_applies_right_operand_first() {
        let a = sample();
        let b = RigidTransform::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let p = Point3::new(0.5, 0.5, 0.5);
        let expected = a.transform_point(&b.transform_point(&p));
        assert_relative_eq!(a.compose(&b).transform_point(&p), expected, epsilon = 1e-12);
    }

    #[test]
    fn mesh_transform_keeps_faces() {
        let cube = mesh_types::unit_cube();
        let moved = RigidTransform::from_translation(Vector3::new(0.0, 0.0, 5.0)).transform_mesh(&cube);
        assert_eq!(moved.faces, cube.faces);
        assert_relative_eq!(moved.vertices[0].position.z, 5.0);
    }

    #[test]
    fn vectors_ignore_translation() {
        let t = RigidTransform::from_translation(Vector3::new(9.0, 9.0, 9.0));
        assert_relative_eq!(t.transform_vector(&Vector3::x()), Vector3::x());
    }
}
