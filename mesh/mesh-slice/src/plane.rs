//! Cutting planes and their in-plane coordinate frames.

use nalgebra::{Point2, Point3, UnitQuaternion, Vector3};

use crate::{SliceError, SliceResult};

/// An oriented plane through `origin` with unit `normal`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// A point on the plane.
    pub origin: Point3<f64>,
    /// Unit normal.
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Plane through `origin` with the given normal direction.
    ///
    /// # Errors
    ///
    /// Returns [`SliceError::ZeroNormal`] if `normal` cannot be normalized.
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> SliceResult<Self> {
        let normal = normal.try_normalize(1e-12).ok_or(SliceError::ZeroNormal)?;
        Ok(Self { origin, normal })
    }

    /// The plane `axis · p = height` for a direction `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`SliceError::ZeroNormal`] if `axis` has zero length.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_slice::Plane;
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let plane = Plane::at_height(Vector3::y(), 20.5).unwrap();
    /// assert_eq!(plane.origin, Point3::new(0.0, 20.5, 0.0));
    /// ```
    pub fn at_height(axis: Vector3<f64>, height: f64) -> SliceResult<Self> {
        let normal = axis.try_normalize(1e-12).ok_or(SliceError::ZeroNormal)?;
        Ok(Self {
            origin: Point3::from(normal * height),
            normal,
        })
    }

    /// Signed distance of `p` along the normal.
    #[must_use]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        (p - self.origin).dot(&self.normal)
    }

    /// Frame mapping plane points to 2D coordinates.
    #[must_use]
    pub fn frame(&self) -> PlaneFrame {
        PlaneFrame::new(self.origin, self.normal)
    }
}

/// Rigid map that rotates the plane normal onto +Z.
///
/// Points on the plane land at `z = 0`; their `x, y` are the 2D coordinates
/// used for fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFrame {
    origin: Point3<f64>,
    rotation: UnitQuaternion<f64>,
}

impl PlaneFrame {
    /// Frame centered at `origin` for a unit `normal`.
    #[must_use]
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Self {
        // rotation_between is undefined for antiparallel vectors.
        let rotation = UnitQuaternion::rotation_between(&normal, &Vector3::z()).unwrap_or_else(
            || UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI),
        );
        Self { origin, rotation }
    }

    /// In-plane coordinates of `p`. The out-of-plane component is dropped.
    #[must_use]
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let local = self.rotation * (p - self.origin);
        Point2::new(local.x, local.y)
    }

    /// Inverse of [`project`](Self::project) for points on the plane.
    #[must_use]
    pub fn lift(&self, p: &Point2<f64>) -> Point3<f64> {
        self.origin + self.rotation.inverse() * Vector3::new(p.x, p.y, 0.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_normal_is_rejected() {
        assert!(matches!(
            Plane::new(Point3::origin(), Vector3::zeros()),
            Err(SliceError::ZeroNormal)
        ));
    }

    #[test]
    fn height_plane_measures_along_axis() {
        let plane = Plane::at_height(Vector3::new(0.0, 2.0, 0.0), -5.0).unwrap();
        assert_relative_eq!(plane.signed_distance(&Point3::new(3.0, -5.0, 8.0)), 0.0);
        assert_relative_eq!(plane.signed_distance(&Point3::new(0.0, -4.0, 0.0)), 1.0);
    }

    #[test]
    fn projection_preserves_in_plane_distances() {
        let plane = Plane::at_height(Vector3::y(), 3.0).unwrap();
        let frame = plane.frame();
        let a = Point3::new(1.0, 3.0, 2.0);
        let b = Point3::new(-4.0, 3.0, 7.0);
        let (pa, pb) = (frame.project(&a), frame.project(&b));
        assert_relative_eq!((pa - pb).norm(), (a - b).norm(), epsilon = 1e-12);
        assert_relative_eq!(frame.lift(&pa), a, epsilon = 1e-12);
    }

    #[test]
    fn antiparallel_normal_still_flattens() {
        let frame = PlaneFrame::new(Point3::origin(), -Vector3::z());
        let p = Point3::new(1.0, 2.0, 0.0);
        assert_relative_eq!(frame.lift(&frame.project(&p)), p, epsilon = 1e-12);
    }
}
