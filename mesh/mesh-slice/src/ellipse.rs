//! Direct least-squares ellipse fitting.
//!
//! Implements the numerically stable variant of Fitzgibbon's direct fit
//! (Halíř and Flusser, 1998). The conic `ax² + bxy + cy² + dx + ey + f = 0`
//! is constrained by `4ac − b² = 1`, which guarantees an ellipse. Input
//! points are centered and scaled first so the scatter matrices stay well
//! conditioned for coordinates in millimetres far from the origin.

// Point counts fit in f64 mantissa
#![allow(clippy::cast_precision_loss)]

use std::f64::consts::PI;

use nalgebra::{Matrix3, Point2, Vector3, Vector6};

use crate::{SliceError, SliceResult};

/// Minimum number of points for a conic fit.
pub const MIN_FIT_POINTS: usize = 5;

/// Geometric ellipse parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    /// Center in the fitting frame.
    pub center: Point2<f64>,
    /// Semi-major axis length (long axis).
    pub semi_major: f64,
    /// Semi-minor axis length (short axis).
    pub semi_minor: f64,
    /// Angle of the major axis from +X, in radians.
    pub angle: f64,
}

impl Ellipse {
    /// Enclosed area `π·a·b`.
    #[must_use]
    pub fn area(&self) -> f64 {
        PI * self.semi_major * self.semi_minor
    }

    /// Perimeter by Ramanujan's second approximation.
    ///
    /// Exact for circles.
    #[must_use]
    pub fn circumference(&self) -> f64 {
        let (a, b) = (self.semi_major, self.semi_minor);
        if a + b <= 0.0 {
            return 0.0;
        }
        let h = ((a - b) / (a + b)).powi(2);
        PI * (a + b) * (1.0 + 3.0 * h / (10.0 + 3.0f64.mul_add(-h, 4.0).sqrt()))
    }
}

/// Fit an ellipse to 2D points in the least-squares sense.
///
/// # Errors
///
/// Returns [`SliceError::TooFewPoints`] for fewer than
/// [`MIN_FIT_POINTS`] points and [`SliceError::DegenerateFit`] when the
/// points admit no ellipse (collinear, or a singular scatter matrix).
///
/// # Example
///
/// ```
/// use mesh_slice::fit_ellipse;
/// use nalgebra::Point2;
///
/// let points: Vec<_> = (0..32)
///     .map(|i| {
///         let t = f64::from(i) * std::f64::consts::TAU / 32.0;
///         Point2::new(4.0 * t.cos() + 10.0, 2.0 * t.sin() - 3.0)
///     })
///     .collect();
///
/// let e = fit_ellipse(&points).unwrap();
/// assert!((e.semi_major - 4.0).abs() < 1e-9);
/// assert!((e.semi_minor - 2.0).abs() < 1e-9);
/// assert!((e.center.x - 10.0).abs() < 1e-9);
/// ```
pub fn fit_ellipse(points: &[Point2<f64>]) -> SliceResult<Ellipse> {
    if points.len() < MIN_FIT_POINTS {
        return Err(SliceError::TooFewPoints {
            found: points.len(),
            required: MIN_FIT_POINTS,
        });
    }

    let n = points.len() as f64;
    let mean = points.iter().fold(Vector3::zeros(), |acc, p| {
        acc + Vector3::new(p.x, p.y, 0.0)
    }) / n;
    let spread = (points
        .iter()
        .map(|p| (p.x - mean.x).powi(2) + (p.y - mean.y).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    if spread < 1e-12 {
        return Err(SliceError::DegenerateFit("coincident points"));
    }
    let scale = spread / std::f64::consts::SQRT_2;

    // Scatter blocks: quadratic terms (S1), cross (S2), linear terms (S3).
    let mut s1 = Matrix3::zeros();
    let mut s2 = Matrix3::zeros();
    let mut s3 = Matrix3::zeros();
    for p in points {
        let x = (p.x - mean.x) / scale;
        let y = (p.y - mean.y) / scale;
        let quad = Vector3::new(x * x, x * y, y * y);
        let lin = Vector3::new(x, y, 1.0);
        s1 += quad * quad.transpose();
        s2 += quad * lin.transpose();
        s3 += lin * lin.transpose();
    }

    let s3_inv = s3
        .try_inverse()
        .ok_or(SliceError::DegenerateFit("collinear points"))?;
    let t = -(s3_inv * s2.transpose());
    let m = s1 + s2 * t;
    // Premultiply by the inverse of the constraint matrix.
    let reduced = Matrix3::from_rows(&[m.row(2) / 2.0, m.row(1) * -1.0, m.row(0) / 2.0]);

    let quad = best_eigenvector(&reduced)?;
    let lin = t * quad;
    let conic = Vector6::new(quad.x, quad.y, quad.z, lin.x, lin.y, lin.z);
    let unit = conic_to_ellipse(&conic)?;

    Ok(Ellipse {
        center: Point2::new(
            unit.center.x.mul_add(scale, mean.x),
            unit.center.y.mul_add(scale, mean.y),
        ),
        semi_major: unit.semi_major * scale,
        semi_minor: unit.semi_minor * scale,
        angle: unit.angle,
    })
}

/// Eigenvector of `m` satisfying the ellipse constraint `4ac − b² > 0`.
///
/// Only one eigenvector satisfies it in theory. Repeated eigenvalues make
/// the null-space estimate of the others arbitrary, so candidates are also
/// checked against the eigen equation before the constraint is trusted.
fn best_eigenvector(m: &Matrix3<f64>) -> SliceResult<Vector3<f64>> {
    let eigenvalues = m
        .eigenvalues()
        .ok_or(SliceError::DegenerateFit("complex eigenvalues"))?;
    let tolerance = 1e-8 * m.norm().max(1.0);

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for &lambda in eigenvalues.iter() {
        let Some(v) = null_vector(&(m - Matrix3::identity() * lambda)) else {
            continue;
        };
        if (m * v - v * lambda).norm() > tolerance {
            continue;
        }
        let constraint = 4.0 * v.x * v.z - v.y * v.y;
        if constraint > 0.0 && best.is_none_or(|(l, _)| lambda.abs() < l.abs()) {
            best = Some((lambda, v));
        }
    }
    best.map(|(_, v)| v)
        .ok_or(SliceError::DegenerateFit("no elliptical solution"))
}

/// Unit vector spanning the null space of a rank-2 matrix.
///
/// Taken as the largest cross product of two rows.
fn null_vector(a: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let rows = [
        a.row(0).transpose(),
        a.row(1).transpose(),
        a.row(2).transpose(),
    ];
    [(0, 1), (0, 2), (1, 2)]
        .iter()
        .map(|&(i, j)| rows[i].cross(&rows[j]))
        .max_by(|u, v| u.norm_squared().total_cmp(&v.norm_squared()))
        .and_then(|v| v.try_normalize(1e-300))
}

/// Convert general conic coefficients to center, semi-axes and angle.
fn conic_to_ellipse(c: &Vector6<f64>) -> SliceResult<Ellipse> {
    // The angle formula assumes a + c > 0.
    let c = if c[0] + c[2] < 0.0 { -c } else { *c };
    let (a, b, cc, d, e, f) = (c[0], c[1], c[2], c[3], c[4], c[5]);
    let den = b.mul_add(b, -4.0 * a * cc);
    if den >= 0.0 {
        return Err(SliceError::DegenerateFit("conic is not an ellipse"));
    }

    let x0 = (2.0 * cc * d - b * e) / den;
    let y0 = (2.0 * a * e - b * d) / den;

    let num = 2.0 * (a * e * e + cc * d * d - b * d * e + den * f);
    let root = (a - cc).hypot(b);
    let major_sq = num * (a + cc + root);
    let minor_sq = num * (a + cc - root);
    if major_sq <= 0.0 || minor_sq <= 0.0 {
        return Err(SliceError::DegenerateFit("imaginary ellipse"));
    }
    let semi_major = -major_sq.sqrt() / den;
    let semi_minor = -minor_sq.sqrt() / den;

    let angle = if b.abs() < 1e-15 {
        if a <= cc { 0.0 } else { PI / 2.0 }
    } else {
        ((cc - a - root) / b).atan()
    };

    Ok(Ellipse {
        center: Point2::new(x0, y0),
        semi_major,
        semi_minor,
        angle,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(a: f64, b: f64, angle: f64, center: (f64, f64), count: u32) -> Vec<Point2<f64>> {
        let (s, c) = angle.sin_cos();
        (0..count)
            .map(|i| {
                let t = f64::from(i) * std::f64::consts::TAU / f64::from(count);
                let (x, y) = (a * t.cos(), b * t.sin());
                Point2::new(c * x - s * y + center.0, s * x + c * y + center.1)
            })
            .collect()
    }

    #[test]
    fn circle_fit_recovers_radius_and_area() {
        let r = 7.5;
        let e = fit_ellipse(&sample(r, r, 0.0, (120.0, -40.0), 60)).unwrap();
        assert_relative_eq!(e.semi_major, r, epsilon = 1e-8);
        assert_relative_eq!(e.semi_minor, r, epsilon = 1e-8);
        assert_relative_eq!(e.area(), PI * r * r, epsilon = 1e-6);
        assert_relative_eq!(e.circumference(), 2.0 * PI * r, epsilon = 1e-6);
    }

    #[test]
    fn rotated_ellipse_is_recovered() {
        let e = fit_ellipse(&sample(9.0, 4.0, 0.6, (-3.0, 11.0), 40)).unwrap();
        assert_relative_eq!(e.semi_major, 9.0, epsilon = 1e-8);
        assert_relative_eq!(e.semi_minor, 4.0, epsilon = 1e-8);
        assert_relative_eq!(e.center.x, -3.0, epsilon = 1e-8);
        assert_relative_eq!(e.center.y, 11.0, epsilon = 1e-8);
        // Axis direction is defined modulo π.
        let diff = (e.angle - 0.6).rem_euclid(PI);
        assert!(diff < 1e-6 || PI - diff < 1e-6, "angle {}", e.angle);
    }

    #[test]
    fn minimal_point_count_is_enforced() {
        let pts = sample(2.0, 1.0, 0.0, (0.0, 0.0), 4);
        assert!(matches!(
            fit_ellipse(&pts),
            Err(SliceError::TooFewPoints {
                found: 4,
                required: 5
            })
        ));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let pts: Vec<_> = (0..10).map(|i| Point2::new(f64::from(i), 2.0 * f64::from(i))).collect();
        assert!(matches!(fit_ellipse(&pts), Err(SliceError::DegenerateFit(_))));
    }

    #[test]
    fn ramanujan_matches_known_perimeter() {
        // a = 2, b = 1: exact perimeter 9.688448220547...
        let e = Ellipse {
            center: Point2::origin(),
            semi_major: 2.0,
            semi_minor: 1.0,
            angle: 0.0,
        };
        assert_relative_eq!(e.circumference(), 9.688_448_220_547_6, epsilon = 1e-7);
    }
}
