//! Least-squares rigid fit between paired point sets (Kabsch).

use crate::{RegistrationError, RegistrationResult, RigidTransform};
use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};

/// Rigid transform minimizing `Σ |R·sᵢ + t − tᵢ|²` over paired points.
///
/// The cross-covariance of the centered sets is decomposed with SVD; a
/// negative determinant (reflection) is corrected by flipping the axis of
/// the smallest singular value.
///
/// # Errors
///
/// Returns an error if either set is empty, the lengths differ, or SVD
/// fails to produce both factors.
///
/// # Example
///
/// ```
/// use mesh_registration::kabsch;
/// use nalgebra::Point3;
///
/// let source = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let target = source.map(|p| p + nalgebra::Vector3::new(1.0, 2.0, 3.0));
///
/// let t = kabsch(&source, &target).unwrap();
/// assert!((t.transform_point(&source[2]) - target[2]).norm() < 1e-9);
/// ```
pub fn kabsch(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    if source.is_empty() {
        return Err(RegistrationError::EmptySource);
    }
    if target.is_empty() {
        return Err(RegistrationError::EmptyTarget);
    }
    if source.len() != target.len() {
        return Err(RegistrationError::LengthMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }

    let cs = centroid(source);
    let ct = centroid(target);

    let h = source
        .iter()
        .zip(target)
        .fold(Matrix3::zeros(), |acc, (s, t)| {
            acc + (s.coords - cs) * (t.coords - ct).transpose()
        });

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(RegistrationError::SvdFailed)?;
    let v = svd.v_t.ok_or(RegistrationError::SvdFailed)?.transpose();

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        // nalgebra sorts singular values in descending order.
        let mut v_fixed = v;
        v_fixed.column_mut(2).neg_mut();
        r = v_fixed * u.transpose();
    }

    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    let translation = ct - rotation * cs;
    Ok(RigidTransform::new(rotation, translation))
}

/// Mean of a point set as a vector; zero for an empty set.
#[must_use]
#[allow(clippy::cast_precision_loss)] // point counts fit in f64 mantissa
pub fn centroid(points: &[Point3<f64>]) -> Vector3<f64> {
    if points.is_empty() {
        return Vector3::zeros();
    }
    points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / points.len() as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetra() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
            Point3::new(1.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn recovers_rotation_and_translation() {
        let truth = RigidTransform::new(
            UnitQuaternion::from_euler_angles(0.4, 0.1, -0.7),
            Vector3::new(-2.0, 5.0, 1.0),
        );
        let source = tetra();
        let target: Vec<_> = source.iter().map(|p| truth.transform_point(p)).collect();

        let fit = kabsch(&source, &target).unwrap();
        assert_relative_eq!(fit.rotation.angle_to(&truth.rotation), 0.0, epsilon = 1e-9);
        assert_relative_eq!(fit.translation, truth.translation, epsilon = 1e-9);
    }

    #[test]
    fn never_returns_a_reflection() {
        let source = tetra();
        let mirrored: Vec<_> = source.iter().map(|p| Point3::new(-p.x, p.y, p.z)).collect();
        let fit = kabsch(&source, &mirrored).unwrap();
        let det = fit.rotation.to_rotation_matrix().matrix().determinant();
        assert_relative_eq!(det, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(kabsch(&[], &tetra()), Err(RegistrationError::EmptySource)));
        assert!(matches!(kabsch(&tetra(), &[]), Err(RegistrationError::EmptyTarget)));
        assert!(matches!(
            kabsch(&tetra()[..2], &tetra()),
            Err(RegistrationError::LengthMismatch {
                source_len: 2,
                target_len: 5
            })
        ));
    }

    #[test]
    fn centroid_of_empty_is_zero() {
        assert_relative_eq!(centroid(&[]), Vector3::zeros());
    }
}
