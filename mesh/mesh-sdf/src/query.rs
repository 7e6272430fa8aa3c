//! Point-to-triangle queries.

use nalgebra::Point3;

/// The part of a triangle that holds the closest point to a query.
///
/// Distance signs are taken from the pseudonormal of this feature, so the
/// classification must be exact for points in vertex and edge regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleFeature {
    /// Corner `0`, `1` or `2`.
    Vertex(usize),
    /// Edge starting at corner `i` (`0 = v0v1`, `1 = v1v2`, `2 = v2v0`).
    Edge(usize),
    /// Interior of the face.
    Face,
}

/// Closest point on triangle `(v0, v1, v2)` to `point`.
///
/// Voronoi-region walk from Ericson, *Real-Time Collision Detection*, 5.1.5.
///
/// # Example
///
/// ```
/// use mesh_sdf::closest_point_on_triangle;
/// use nalgebra::Point3;
///
/// let p = closest_point_on_triangle(
///     Point3::new(0.25, 0.25, 3.0),
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// );
/// assert_eq!(p, Point3::new(0.25, 0.25, 0.0));
/// ```
#[must_use]
pub fn closest_point_on_triangle(
    point: Point3<f64>,
    v0: Point3<f64>,
    v1: Point3<f64>,
    v2: Point3<f64>,
) -> Point3<f64> {
    closest_feature_on_triangle(point, v0, v1, v2).0
}

/// Closest point on a triangle together with the feature that holds it.
#[must_use]
pub fn closest_feature_on_triangle(
    point: Point3<f64>,
    v0: Point3<f64>,
    v1: Point3<f64>,
    v2: Point3<f64>,
) -> (Point3<f64>, TriangleFeature) {
    let ab = v1 - v0;
    let ac = v2 - v0;

    let ap = point - v0;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (v0, TriangleFeature::Vertex(0));
    }

    let bp = point - v1;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (v1, TriangleFeature::Vertex(1));
    }

    let vc = d1.mul_add(d4, -(d3 * d2));
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let t = d1 / (d1 - d3);
        return (v0 + ab * t, TriangleFeature::Edge(0));
    }

    let cp = point - v2;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (v2, TriangleFeature::Vertex(2));
    }

    let vb = d5.mul_add(d2, -(d1 * d6));
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let t = d2 / (d2 - d6);
        return (v0 + ac * t, TriangleFeature::Edge(2));
    }

    let va = d3.mul_add(d6, -(d5 * d4));
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (v1 + (v2 - v1) * t, TriangleFeature::Edge(1));
    }

    let denom = va + vb + vc;
    if denom.abs() < f64::MIN_POSITIVE {
        // Degenerate sliver: fall back to the nearest corner.
        let corner = [v0, v1, v2]
            .into_iter()
            .enumerate()
            .min_by(|a, b| {
                (a.1 - point)
                    .norm_squared()
                    .total_cmp(&(b.1 - point).norm_squared())
            })
            .map_or((v0, 0), |(i, p)| (p, i));
        return (corner.0, TriangleFeature::Vertex(corner.1));
    }
    let v = vb / denom;
    let w = vc / denom;
    (v0 + ab * v + ac * w, TriangleFeature::Face)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri() -> (Point3<f64>, Point3<f64>, Point3<f64>) {
        (
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        )
    }

    #[test]
    fn interior_projection_is_face_feature() {
        let (a, b, c) = tri();
        let (p, f) = closest_feature_on_triangle(Point3::new(0.5, 0.5, -4.0), a, b, c);
        assert_eq!(f, TriangleFeature::Face);
        assert_relative_eq!(p, Point3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn corner_regions_snap_to_vertices() {
        let (a, b, c) = tri();
        let cases = [
            (Point3::new(-1.0, -1.0, 0.0), 0),
            (Point3::new(3.0, -0.5, 1.0), 1),
            (Point3::new(-0.5, 3.0, 0.0), 2),
        ];
        for (q, corner) in cases {
            let (_, f) = closest_feature_on_triangle(q, a, b, c);
            assert_eq!(f, TriangleFeature::Vertex(corner));
        }
    }

    #[test]
    fn edge_regions_project_onto_edges() {
        let (a, b, c) = tri();
        let (p, f) = closest_feature_on_triangle(Point3::new(1.0, -3.0, 0.0), a, b, c);
        assert_eq!(f, TriangleFeature::Edge(0));
        assert_relative_eq!(p, Point3::new(1.0, 0.0, 0.0));

        let (p, f) = closest_feature_on_triangle(Point3::new(2.0, 2.0, 0.0), a, b, c);
        assert_eq!(f, TriangleFeature::Edge(1));
        assert_relative_eq!(p, Point3::new(1.0, 1.0, 0.0));

        let (p, f) = closest_feature_on_triangle(Point3::new(-1.0, 1.0, 0.0), a, b, c);
        assert_eq!(f, TriangleFeature::Edge(2));
        assert_relative_eq!(p, Point3::new(0.0, 1.0, 0.0));
    }
}
