//! Fresh simulation inputs for every evaluation.

use std::path::{Path, PathBuf};

use calib_material::{LameParameters, TissueModel};
use mesh_io::load_inp;
use tracing::{debug, warn};

use crate::config::CalibrationConfig;
use crate::device::DeviceModel;
use crate::error::{ConfigResult, EvalError, EvalResult};

/// Node sets whose name contains this are held fixed during deployment.
pub const BOUNDARY_KEYWORD: &str = "BOUNDARY";

/// Everything the solver needs for one run.
///
/// A set is built per evaluation and dropped afterwards; nothing in it is
/// shared between evaluations.
#[derive(Debug, Clone)]
pub struct ModelSet {
    /// The deployed device.
    pub device: DeviceModel,
    /// Tissue mesh with per-element materials.
    pub tissue: TissueModel,
    /// Tissue mesh file the model was read from.
    pub tissue_mesh: PathBuf,
    /// Pre-expanded tissue mesh, if the solver uses one.
    pub expanded_tissue_mesh: Option<PathBuf>,
    /// Tissue nodes held fixed, sorted and unique.
    pub boundary_nodes: Vec<usize>,
}

/// Builds a [`ModelSet`] from files on every call.
#[derive(Debug, Clone)]
pub struct ModelSetBuilder {
    device: DeviceModel,
    tissue_mesh: PathBuf,
    expanded_tissue_mesh: Option<PathBuf>,
    default_material: LameParameters,
}

impl ModelSetBuilder {
    /// Builder for a device and a tissue input deck.
    #[must_use]
    pub fn new(
        device: DeviceModel,
        tissue_mesh: impl Into<PathBuf>,
        default_material: LameParameters,
    ) -> Self {
        Self {
            device,
            tissue_mesh: tissue_mesh.into(),
            expanded_tissue_mesh: None,
            default_material,
        }
    }

    /// Also pass a pre-expanded tissue mesh to the solver.
    #[must_use]
    pub fn with_expanded_tissue(mut self, path: impl Into<PathBuf>) -> Self {
        self.expanded_tissue_mesh = Some(path.into());
        self
    }

    /// Builder for the configured variant and tissue mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the device variant is unknown.
    pub fn from_config(config: &CalibrationConfig) -> ConfigResult<Self> {
        let material = LameParameters::from_elastic(
            config.default_material.modulus,
            config.default_material.poisson_ratio,
        );
        let mut builder = Self::new(config.device()?, config.mesh_path(&config.tissue_mesh), material);
        if let Some(expanded) = &config.expanded_tissue_mesh {
            builder = builder.with_expanded_tissue(config.mesh_path(expanded));
        }
        Ok(builder)
    }

    /// Tissue input deck path.
    #[must_use]
    pub fn tissue_mesh(&self) -> &Path {
        &self.tissue_mesh
    }

    /// Load the tissue deck and assemble a new model set.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::TissueMesh`] if the deck cannot be read.
    pub fn build(&self) -> EvalResult<ModelSet> {
        let deck = load_inp(&self.tissue_mesh).map_err(|source| EvalError::TissueMesh {
            path: self.tissue_mesh.clone(),
            source,
        })?;
        if deck.skipped_elements > 0 {
            warn!(
                path = %self.tissue_mesh.display(),
                skipped = deck.skipped_elements,
                "Skipped non-tetrahedral elements"
            );
        }

        let mut boundary_nodes: Vec<usize> = deck
            .mesh
            .node_sets
            .iter()
            .filter(|(name, _)| name.to_ascii_uppercase().contains(BOUNDARY_KEYWORD))
            .flat_map(|(_, nodes)| nodes.iter().copied())
            .collect();
        boundary_nodes.sort_unstable();
        boundary_nodes.dedup();

        debug!(
            nodes = deck.mesh.node_count(),
            elements = deck.mesh.element_count(),
            boundary = boundary_nodes.len(),
            variant = %self.device.variant,
            "Built model set"
        );

        Ok(ModelSet {
            device: self.device.clone(),
            tissue: TissueModel::new(deck.mesh, self.default_material),
            tissue_mesh: self.tissue_mesh.clone(),
            expanded_tissue_mesh: self.expanded_tissue_mesh.clone(),
            boundary_nodes,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::device::default_device_variants;

    pub(crate) const DECK: &str = "\
*PART, NAME=PART-AORTA
*NODE
1, 0.0, 0.0, 0.0
2, 1.0, 0.0, 0.0
3, 0.0, 1.0, 0.0
4, 0.0, 0.0, 1.0
5, 1.0, 1.0, 1.0
*ELEMENT, TYPE=C3D4
1, 1, 2, 3, 4
2, 2, 3, 4, 5
*NSET, NSET=Inlet_Boundary
1, 2
*NSET, NSET=OUTLET_BOUNDARY
2, 5
*NSET, NSET=Tip
5
*END PART
";

    pub(crate) fn builder(dir: &Path) -> ModelSetBuilder {
        let deck = dir.join("tissue.inp");
        std::fs::write(&deck, DECK).unwrap();
        let device =
            DeviceModel::resolve("VenusA_L26", &default_device_variants(), dir).unwrap();
        ModelSetBuilder::new(device, deck, LameParameters::from_elastic(1.0e6, 0.4))
    }

    #[test]
    fn build_collects_boundary_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let set = builder(dir.path()).build().unwrap();

        assert_eq!(set.tissue.element_count(), 2);
        assert_eq!(set.boundary_nodes, vec![0, 1, 4]);
        assert_eq!(set.device.variant, "VenusA_L26");
        assert!(set.expanded_tissue_mesh.is_none());
    }

    #[test]
    fn every_build_is_independent() {
        let dir = tempfile::tempdir().unwrap();
        let builder = builder(dir.path());

        let mut first = builder.build().unwrap();
        first.tissue.set_material(0, LameParameters::new(1.0, 1.0));
        let second = builder.build().unwrap();
        assert_eq!(second.tissue.material(0), Some(builder.default_material));
    }

    #[test]
    fn missing_deck_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ModelSetBuilder::new(
            DeviceModel::resolve("VenusA_L23", &default_device_variants(), dir.path()).unwrap(),
            dir.path().join("absent.inp"),
            LameParameters::from_elastic(1.0e6, 0.4),
        );
        assert!(matches!(builder.build(), Err(EvalError::TissueMesh { .. })));
    }
}
