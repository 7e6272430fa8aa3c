//! Tetrahedral tissue model with per-element materials.

use mesh_types::TetMesh;

use crate::lame::LameParameters;
use crate::{MaterialError, MaterialResult};

/// A volume mesh plus one material slot per element.
///
/// Every slot starts at the model's default material; assignment only
/// overwrites slots.
#[derive(Debug, Clone)]
pub struct TissueModel {
    mesh: TetMesh,
    materials: Vec<LameParameters>,
    default_material: LameParameters,
}

impl TissueModel {
    /// Model with every element set to `default_material`.
    #[must_use]
    pub fn new(mesh: TetMesh, default_material: LameParameters) -> Self {
        let materials = vec![default_material; mesh.element_count()];
        Self {
            mesh,
            materials,
            default_material,
        }
    }

    /// Model with an explicit material table.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialError::TableMismatch`] if the table length differs
    /// from the element count.
    pub fn with_materials(
        mesh: TetMesh,
        materials: Vec<LameParameters>,
        default_material: LameParameters,
    ) -> MaterialResult<Self> {
        if materials.len() != mesh.element_count() {
            return Err(MaterialError::TableMismatch {
                materials: materials.len(),
                elements: mesh.element_count(),
            });
        }
        Ok(Self {
            mesh,
            materials,
            default_material,
        })
    }

    /// The volume mesh.
    #[must_use]
    pub const fn mesh(&self) -> &TetMesh {
        &self.mesh
    }

    /// Number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.materials.len()
    }

    /// Material assigned when no region matches.
    #[must_use]
    pub const fn default_material(&self) -> LameParameters {
        self.default_material
    }

    /// Material of element `index`.
    #[must_use]
    pub fn material(&self, index: usize) -> Option<LameParameters> {
        self.materials.get(index).copied()
    }

    /// All element materials in element order.
    #[must_use]
    pub fn materials(&self) -> &[LameParameters] {
        &self.materials
    }

    /// Overwrite one element's material. Returns false if out of range.
    pub fn set_material(&mut self, index: usize, material: LameParameters) -> bool {
        self.materials
            .get_mut(index)
            .map(|slot| *slot = material)
            .is_some()
    }

    /// Overwrite every element of a named set. Returns the count written;
    /// zero if the set does not exist.
    pub fn set_element_set(&mut self, name: &str, material: LameParameters) -> usize {
        let mut written = 0;
        for &e in self.mesh.element_set(name) {
            if let Some(slot) = self.materials.get_mut(e) {
                *slot = material;
                written += 1;
            }
        }
        written
    }

    /// Read-only mesh alongside mutable material slots.
    pub fn split_mut(&mut self) -> (&TetMesh, &mut [LameParameters]) {
        (&self.mesh, &mut self.materials)
    }

    /// Young's modulus per node, averaged over incident elements.
    ///
    /// Nodes used by no element report zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // incidence counts are small
    pub fn nodal_modulus(&self) -> Vec<f64> {
        let mut sum = vec![0.0; self.mesh.node_count()];
        let mut count = vec![0_u32; self.mesh.node_count()];
        for (element, material) in self.mesh.elements.iter().zip(&self.materials) {
            let e = material.youngs_modulus();
            for &n in element {
                let n = n as usize;
                if let (Some(s), Some(c)) = (sum.get_mut(n), count.get_mut(n)) {
                    *s += e;
                    *c += 1;
                }
            }
        }
        sum.iter()
            .zip(&count)
            .map(|(&s, &c)| if c > 0 { s / f64::from(c) } else { 0.0 })
            .collect()
    }
}
