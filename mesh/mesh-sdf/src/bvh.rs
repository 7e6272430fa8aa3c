//! Bounding volume hierarchy over mesh triangles.
//!
//! Median split on the longest centroid axis, stored as a flat node array.
//! Nearest-triangle queries descend the closer child first and prune any
//! subtree whose box lies farther than the best hit so far.

use mesh_types::{Aabb, Triangle};
use nalgebra::Point3;

use crate::query::{TriangleFeature, closest_feature_on_triangle};

const LEAF_SIZE: usize = 4;

#[derive(Debug, Clone)]
enum Node {
    Leaf { bounds: Aabb, start: usize, end: usize },
    Inner { bounds: Aabb, left: usize, right: usize },
}

impl Node {
    const fn bounds(&self) -> &Aabb {
        match self {
            Self::Leaf { bounds, .. } | Self::Inner { bounds, .. } => bounds,
        }
    }
}

/// Result of a nearest-triangle query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit {
    /// Index of the closest face.
    pub face: usize,
    /// Closest point on that face.
    pub point: Point3<f64>,
    /// Feature of the face holding `point`.
    pub feature: TriangleFeature,
    /// Squared distance from the query to `point`.
    pub distance_squared: f64,
}

/// Triangle hierarchy for closest-point queries.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<Node>,
    order: Vec<usize>,
}

impl Bvh {
    /// Build a hierarchy over `triangles`. Returns `None` when empty.
    #[must_use]
    pub fn build(triangles: &[Triangle]) -> Option<Self> {
        if triangles.is_empty() {
            return None;
        }
        let centroids: Vec<Point3<f64>> = triangles.iter().map(Triangle::centroid).collect();
        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * triangles.len() / LEAF_SIZE + 1),
            order: (0..triangles.len()).collect(),
        };
        bvh.split(triangles, &centroids, 0, triangles.len());
        Some(bvh)
    }

    fn split(&mut self, triangles: &[Triangle], centroids: &[Point3<f64>], start: usize, end: usize) -> usize {
        let bounds = self.order[start..end]
            .iter()
            .map(|&i| Aabb::from_points(triangles[i].vertices().iter()))
            .fold(Aabb::empty(), |acc, b| acc.union(&b));

        let index = self.nodes.len();
        if end - start <= LEAF_SIZE {
            self.nodes.push(Node::Leaf { bounds, start, end });
            return index;
        }

        let axis = Aabb::from_points(self.order[start..end].iter().map(|&i| &centroids[i])).longest_axis();
        let mid = start + (end - start) / 2;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            centroids[a][axis].total_cmp(&centroids[b][axis])
        });

        // Placeholder until children are known.
        self.nodes.push(Node::Leaf { bounds, start, end });
        let left = self.split(triangles, centroids, start, mid);
        let right = self.split(triangles, centroids, mid, end);
        self.nodes[index] = Node::Inner { bounds, left, right };
        index
    }

    /// Closest triangle to `point`.
    #[must_use]
    pub fn nearest(&self, triangles: &[Triangle], point: &Point3<f64>) -> Option<NearestHit> {
        let mut best: Option<NearestHit> = None;
        let mut stack = vec![0usize];

        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            let bound = best.map_or(f64::INFINITY, |b| b.distance_squared);
            if node.bounds().distance_squared_to_point(point) > bound {
                continue;
            }
            match *node {
                Node::Leaf { start, end, .. } => {
                    for &face in &self.order[start..end] {
                        let tri = &triangles[face];
                        let (closest, feature) =
                            closest_feature_on_triangle(*point, tri.v0, tri.v1, tri.v2);
                        let distance_squared = (closest - point).norm_squared();
                        if best.is_none_or(|b| distance_squared < b.distance_squared) {
                            best = Some(NearestHit {
                                face,
                                point: closest,
                                feature,
                                distance_squared,
                            });
                        }
                    }
                }
                Node::Inner { left, right, .. } => {
                    let dl = self.nodes[left].bounds().distance_squared_to_point(point);
                    let dr = self.nodes[right].bounds().distance_squared_to_point(point);
                    // Push the farther child first so the closer one is popped next.
                    if dl <= dr {
                        stack.push(right);
                        stack.push(left);
                    } else {
                        stack.push(left);
                        stack.push(right);
                    }
                }
            }
        }
        best
    }
}
