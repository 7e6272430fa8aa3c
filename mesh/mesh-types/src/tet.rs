//! Tetrahedral volume mesh.

use std::collections::BTreeMap;

use nalgebra::Point3;

use crate::Aabb;

/// A linear tetrahedral volume mesh.
///
/// Nodes are stored in rest configuration. Element and node sets are named
/// groups of indices (into `elements` and `nodes` respectively), as carried
/// by Abaqus-style input decks. Part membership is expressed as element
/// sets too, so a part named `AORTA` appears as an element set of that name.
///
/// # Example
///
/// ```
/// use mesh_types::{TetMesh, Point3};
///
/// let mut tet = TetMesh::new();
/// tet.nodes = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(4.0, 0.0, 0.0),
///     Point3::new(0.0, 4.0, 0.0),
///     Point3::new(0.0, 0.0, 4.0),
/// ];
/// tet.elements.push([0, 1, 2, 3]);
///
/// let c = tet.element_centroid(0).unwrap();
/// assert_eq!(c, Point3::new(1.0, 1.0, 1.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TetMesh {
    /// Rest-state node positions.
    pub nodes: Vec<Point3<f64>>,

    /// Tetrahedra as indices into `nodes`.
    pub elements: Vec<[u32; 4]>,

    /// Named element groups (indices into `elements`).
    pub element_sets: BTreeMap<String, Vec<usize>>,

    /// Named node groups (indices into `nodes`).
    pub node_sets: BTreeMap<String, Vec<usize>>,
}

impl TetMesh {
    /// Create an empty mesh.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            elements: Vec::new(),
            element_sets: BTreeMap::new(),
            node_sets: BTreeMap::new(),
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of tetrahedra.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// The four rest positions of element `index`.
    #[must_use]
    pub fn element_nodes(&self, index: usize) -> Option<[Point3<f64>; 4]> {
        let [a, b, c, d] = *self.elements.get(index)?;
        Some([
            *self.nodes.get(a as usize)?,
            *self.nodes.get(b as usize)?,
            *self.nodes.get(c as usize)?,
            *self.nodes.get(d as usize)?,
        ])
    }

    /// Mean of the four rest vertices of element `index`.
    #[must_use]
    pub fn element_centroid(&self, index: usize) -> Option<Point3<f64>> {
        let [a, b, c, d] = self.element_nodes(index)?;
        Some(Point3::from((a.coords + b.coords + c.coords + d.coords) / 4.0))
    }

    /// Element indices of the named set, or an empty slice if absent.
    #[must_use]
    pub fn element_set(&self, name: &str) -> &[usize] {
        self.element_sets.get(name).map_or(&[], Vec::as_slice)
    }

    /// Mask of elements belonging to any set whose name contains one of
    /// `keywords` (case-sensitive substring match).
    #[must_use]
    pub fn elements_in_sets_matching(&self, keywords: &[String]) -> Vec<bool> {
        let mut mask = vec![false; self.elements.len()];
        for (name, members) in &self.element_sets {
            if !keywords.iter().any(|k| name.contains(k.as_str())) {
                continue;
            }
            for &e in members {
                if let Some(slot) = mask.get_mut(e) {
                    *slot = true;
                }
            }
        }
        mask
    }

    /// Bounding box of all nodes.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.nodes.iter())
    }
}
