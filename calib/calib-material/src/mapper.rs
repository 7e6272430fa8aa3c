//! Priority-ordered spatial material assignment.

use std::sync::atomic::{AtomicUsize, Ordering};

use calib_params::{AlwaysAppliedRegion, PropertyMap};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::lame::{LameParameters, lame_from_elastic};
use crate::model::TissueModel;
use crate::region::{AnatomicalRegion, SurfaceSource};
use crate::{MaterialError, MaterialResult};

/// Default distance band around region surfaces, in model units.
pub const DEFAULT_SEARCH_RADIUS: f64 = 2.5;

/// Part-name keywords whose elements take part in spatial assignment.
pub const DEFAULT_PARTITION_KEYWORDS: [&str; 2] = ["AORTA", "LBB"];

/// Counts from one [`MaterialMapper::apply_materials`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialReport {
    /// `(region, elements written)` for each always-applied region present
    /// in the property map.
    pub always_applied: Vec<(String, usize)>,
    /// Elements inside allow-listed parts.
    pub eligible_elements: usize,
    /// Eligible elements that matched a region.
    pub assigned_elements: usize,
}

/// Assigns materials to tetrahedra by proximity to anatomical surfaces.
///
/// Regions are tested in descending priority. Equal priorities keep
/// registration order, so the region added first wins a tie.
///
/// # Example
///
/// ```
/// use calib_material::{LameParameters, MaterialMapper, TissueModel};
/// use calib_params::PropertyMap;
/// use mesh_types::{Point3, TetMesh, unit_cube};
///
/// let mut mesh = TetMesh::new();
/// mesh.nodes = vec![
///     Point3::new(0.1, 0.1, 0.1),
///     Point3::new(0.5, 0.1, 0.1),
///     Point3::new(0.1, 0.5, 0.1),
///     Point3::new(0.1, 0.1, 0.5),
/// ];
/// mesh.elements.push([0, 1, 2, 3]);
/// mesh.element_sets.insert("PART-1-AORTA".into(), vec![0]);
///
/// let mut mapper = MaterialMapper::new();
/// mapper.add_region("Annulus", unit_cube(), 10).unwrap();
/// mapper.initialize().unwrap();
///
/// let mut model = TissueModel::new(mesh, LameParameters::new(1.0, 1.0));
/// let map: PropertyMap = [("Annulus_E", 2.0e6)].into_iter().collect();
/// let report = mapper.apply_materials(&mut model, &map, 0.0).unwrap();
///
/// assert_eq!(report.assigned_elements, 1);
/// assert!((model.material(0).unwrap().youngs_modulus() - 2.0e6).abs() < 1e-6);
/// ```
#[derive(Debug)]
pub struct MaterialMapper {
    regions: Vec<AnatomicalRegion>,
    always_applied: Vec<AlwaysAppliedRegion>,
    partition_keywords: Vec<String>,
    initialized: bool,
}

impl Default for MaterialMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialMapper {
    /// Mapper with the default always-applied regions and part keywords.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            always_applied: AlwaysAppliedRegion::defaults(),
            partition_keywords: DEFAULT_PARTITION_KEYWORDS.map(String::from).to_vec(),
            initialized: false,
        }
    }

    /// Replace the always-applied regions.
    #[must_use]
    pub fn with_always_applied(mut self, regions: Vec<AlwaysAppliedRegion>) -> Self {
        self.always_applied = regions;
        self
    }

    /// Replace the part-name keyword allow-list.
    #[must_use]
    pub fn with_partition_keywords(mut self, keywords: Vec<String>) -> Self {
        self.partition_keywords = keywords;
        self
    }

    /// Register a region.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialError::DuplicateRegion`] if the name is taken.
    pub fn add_region(
        &mut self,
        name: impl Into<String>,
        source: impl Into<SurfaceSource>,
        priority: i32,
    ) -> MaterialResult<()> {
        let name = name.into();
        if self.regions.iter().any(|r| r.name() == name) {
            return Err(MaterialError::DuplicateRegion(name));
        }
        self.regions
            .push(AnatomicalRegion::new(name, source.into(), priority));
        self.initialized = false;
        Ok(())
    }

    /// Regions, in priority order once initialized.
    #[must_use]
    pub fn regions(&self) -> &[AnatomicalRegion] {
        &self.regions
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Load every region surface once and sort by descending priority.
    ///
    /// Calling again without new regions does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a surface cannot be loaded or has no faces.
    pub fn initialize(&mut self) -> MaterialResult<()> {
        if self.initialized {
            return Ok(());
        }
        for region in &mut self.regions {
            if !region.is_initialized() {
                region.initialize()?;
                info!(region = region.name(), priority = region.priority(), "Initialized region");
            }
        }
        self.regions
            .sort_by(|a, b| b.priority().cmp(&a.priority()));
        self.initialized = true;
        Ok(())
    }

    /// Write materials from `properties` into `model`.
    ///
    /// Always-applied regions go first, onto their element sets. Then every
    /// element of an allow-listed part takes the material of the first
    /// region, by priority, whose surface lies within `search_radius` of
    /// the element centroid and whose modulus is in the map. Unmatched
    /// elements keep their current material.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialError::NotInitialized`] before
    /// [`initialize`](Self::initialize).
    pub fn apply_materials(
        &self,
        model: &mut TissueModel,
        properties: &PropertyMap,
        search_radius: f64,
    ) -> MaterialResult<MaterialReport> {
        if !self.initialized {
            return Err(MaterialError::NotInitialized);
        }
        let mut report = MaterialReport::default();

        for fixed in &self.always_applied {
            let Some((e, nu)) = properties.elastic(&fixed.region) else {
                continue;
            };
            let written = model.set_element_set(&fixed.element_set, lame_from_elastic(e, nu));
            if written == 0 {
                warn!(
                    region = %fixed.region,
                    element_set = %fixed.element_set,
                    "Always-applied region matched no elements"
                );
            }
            report.always_applied.push((fixed.region.clone(), written));
        }

        // Regions without a modulus in the map can never match.
        let candidates: Vec<(&AnatomicalRegion, LameParameters)> = self
            .regions
            .iter()
            .filter_map(|r| {
                properties
                    .elastic(r.name())
                    .map(|(e, nu)| (r, lame_from_elastic(e, nu)))
            })
            .collect();

        let (mesh, slots) = model.split_mut();
        let eligible = mesh.elements_in_sets_matching(&self.partition_keywords);
        report.eligible_elements = eligible.iter().filter(|&&e| e).count();

        let assigned = AtomicUsize::new(0);
        if !candidates.is_empty() {
            slots
                .par_iter_mut()
                .enumerate()
                .filter(|(i, _)| eligible[*i])
                .for_each(|(i, slot)| {
                    let Some(centroid) = mesh.element_centroid(i) else {
                        return;
                    };
                    let hit = candidates
                        .iter()
                        .find(|(region, _)| region.distance(centroid) <= search_radius);
                    if let Some((_, material)) = hit {
                        *slot = *material;
                        assigned.fetch_add(1, Ordering::Relaxed);
                    }
                });
        }
        report.assigned_elements = assigned.into_inner();

        debug!(
            candidates = candidates.len(),
            search_radius, "Spatial assignment finished"
        );
        info!(
            eligible = report.eligible_elements,
            assigned = report.assigned_elements,
            "Applied materials"
        );
        Ok(report)
    }
}
