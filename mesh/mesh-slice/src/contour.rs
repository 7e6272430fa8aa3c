//! Plane cuts of triangle surfaces and stitching into polylines.

use mesh_types::IndexedMesh;
use nalgebra::{Point2, Point3};
use tracing::debug;

use crate::plane::{Plane, PlaneFrame};
use crate::{SliceError, SliceResult};

/// Distance under which two cut points are considered the same.
pub const STITCH_TOLERANCE: f64 = 1e-6;

/// A connected chain of cut points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    /// Points in chain order. A closed loop does not repeat its first point.
    pub points: Vec<Point3<f64>>,
    /// Whether the last point connects back to the first.
    pub closed: bool,
}

impl Polyline {
    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the chain has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total length, including the closing edge of a loop.
    #[must_use]
    pub fn length(&self) -> f64 {
        let open: f64 = self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
        match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(first), Some(last)) => open + (first - last).norm(),
            _ => open,
        }
    }
}

/// Result of cutting a surface with a plane.
#[derive(Debug, Clone)]
pub struct CrossSection {
    /// The cutting plane.
    pub plane: Plane,
    /// Stitched polylines.
    pub polylines: Vec<Polyline>,
}

impl CrossSection {
    /// Total number of distinct cut points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.polylines.iter().map(Polyline::len).sum()
    }

    /// All cut points across polylines.
    pub fn points(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.polylines.iter().flat_map(|p| p.points.iter())
    }

    /// Cut points expressed in the plane's 2D frame.
    #[must_use]
    pub fn projected(&self) -> Vec<Point2<f64>> {
        let frame: PlaneFrame = self.plane.frame();
        self.points().map(|p| frame.project(p)).collect()
    }
}

/// Cut `mesh` with `plane` and stitch the pieces into polylines.
///
/// # Errors
///
/// Returns [`SliceError::NoFaces`] if the mesh has no faces. A plane that
/// misses the mesh is not an error; it yields an empty cross-section.
///
/// # Example
///
/// ```
/// use mesh_slice::{Plane, cut_mesh};
/// use mesh_types::unit_cube;
/// use nalgebra::Vector3;
///
/// let section = cut_mesh(&unit_cube(), &Plane::at_height(Vector3::z(), 0.5).unwrap()).unwrap();
/// assert_eq!(section.polylines.len(), 1);
/// assert!(section.polylines[0].closed);
/// assert!((section.polylines[0].length() - 4.0).abs() < 1e-12);
/// ```
pub fn cut_mesh(mesh: &IndexedMesh, plane: &Plane) -> SliceResult<CrossSection> {
    if mesh.faces.is_empty() {
        return Err(SliceError::NoFaces);
    }

    let mut segments = Vec::new();
    for tri in mesh.triangles() {
        let mut hits: Vec<Point3<f64>> = Vec::with_capacity(3);
        for (a, b) in tri.edges() {
            if let Some(p) = plane_edge_intersection(plane, a, b) {
                if hits.iter().all(|h| (h - p).norm() > STITCH_TOLERANCE) {
                    hits.push(p);
                }
            }
        }
        // Both crossings can land on one vertex that touches the plane.
        if hits.len() == 2 {
            segments.push((hits[0], hits[1]));
        }
    }

    let polylines = stitch_segments(&segments, STITCH_TOLERANCE);
    debug!(
        segments = segments.len(),
        polylines = polylines.len(),
        "Cut surface"
    );
    Ok(CrossSection {
        plane: *plane,
        polylines,
    })
}

/// Chain unordered segments into polylines by matching endpoints.
///
/// Each polyline is grown at both ends until no remaining segment touches
/// it. A chain whose ends meet is marked closed.
#[must_use]
pub fn stitch_segments(segments: &[(Point3<f64>, Point3<f64>)], tolerance: f64) -> Vec<Polyline> {
    let mut remaining: Vec<_> = segments
        .iter()
        .filter(|(a, b)| (b - a).norm() > tolerance)
        .copied()
        .collect();
    let mut polylines = Vec::new();

    while let Some(first) = remaining.pop() {
        let mut chain = std::collections::VecDeque::from([first.0, first.1]);

        let mut changed = true;
        while changed {
            changed = false;
            for i in (0..remaining.len()).rev() {
                let (Some(&start), Some(&end)) = (chain.front(), chain.back()) else {
                    break;
                };
                let seg = remaining[i];
                if (seg.0 - end).norm() < tolerance {
                    chain.push_back(seg.1);
                } else if (seg.1 - end).norm() < tolerance {
                    chain.push_back(seg.0);
                } else if (seg.0 - start).norm() < tolerance {
                    chain.push_front(seg.1);
                } else if (seg.1 - start).norm() < tolerance {
                    chain.push_front(seg.0);
                } else {
                    continue;
                }
                remaining.swap_remove(i);
                changed = true;
            }
        }

        let mut points: Vec<_> = chain.into_iter().collect();
        let closed = points.len() > 3
            && matches!((points.first(), points.last()), (Some(a), Some(b)) if (a - b).norm() < tolerance);
        if closed {
            points.pop();
        }
        polylines.push(Polyline { points, closed });
    }

    polylines
}

fn plane_edge_intersection(plane: &Plane, a: Point3<f64>, b: Point3<f64>) -> Option<Point3<f64>> {
    let d_a = plane.signed_distance(&a);
    let d_b = plane.signed_distance(&b);

    // Points on the plane count as positive, so every triangle has zero or
    // two crossing edges and edges lying in the plane are emitted once.
    if (d_a < 0.0) == (d_b < 0.0) {
        return None;
    }

    let t = d_a / (d_a - d_b);
    Some(a + (b - a) * t)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{Vector3, unit_cube};

    #[test]
    fn cube_cut_is_one_closed_square() {
        let plane = Plane::at_height(Vector3::y(), 0.25).unwrap();
        let section = cut_mesh(&unit_cube(), &plane).unwrap();

        assert_eq!(section.polylines.len(), 1);
        let loop_ = &section.polylines[0];
        assert!(loop_.closed);
        assert_relative_eq!(loop_.length(), 4.0, epsilon = 1e-12);
        for p in section.points() {
            assert_relative_eq!(p.y, 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn plane_missing_mesh_gives_empty_section() {
        let plane = Plane::at_height(Vector3::z(), 7.0).unwrap();
        let section = cut_mesh(&unit_cube(), &plane).unwrap();
        assert_eq!(section.point_count(), 0);
        assert!(section.projected().is_empty());
    }

    #[test]
    fn empty_mesh_is_an_error() {
        let plane = Plane::at_height(Vector3::z(), 0.0).unwrap();
        assert!(matches!(
            cut_mesh(&IndexedMesh::new(), &plane),
            Err(SliceError::NoFaces)
        ));
    }

    #[test]
    fn stitching_orders_shuffled_segments() {
        let p = |x: f64, y: f64| Point3::new(x, y, 0.0);
        let segments = [
            (p(1.0, 1.0), p(0.0, 1.0)),
            (p(0.0, 0.0), p(1.0, 0.0)),
            (p(0.0, 1.0), p(0.0, 0.0)),
            (p(1.0, 0.0), p(1.0, 1.0)),
        ];
        let lines = stitch_segments(&segments, 1e-9);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
        assert_eq!(lines[0].len(), 4);
    }

    #[test]
    fn disjoint_open_chains_stay_separate() {
        let p = |x: f64| Point3::new(x, 0.0, 0.0);
        let segments = [(p(0.0), p(1.0)), (p(1.0), p(2.0)), (p(5.0), p(6.0))];
        let mut lines = stitch_segments(&segments, 1e-9);
        lines.sort_by_key(Polyline::len);
        assert_eq!(lines.len(), 2);
        assert!(!lines[1].closed);
        assert_eq!(lines[1].len(), 3);
        assert_relative_eq!(lines[1].length(), 2.0);
    }
}
