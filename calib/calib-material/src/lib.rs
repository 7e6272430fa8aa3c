//! Spatially varying material assignment for tetrahedral tissue models.
//!
//! Anatomical sub-regions (annulus, aortomitral curtain, ventricle) are not
//! separate parts of the volume mesh; they are described by reference
//! surfaces. A [`MaterialMapper`] assigns each tetrahedron the material of
//! the highest-priority region whose surface lies within a search radius of
//! the element centroid:
//!
//! - [`lame_from_elastic`] / [`elastic_from_lame`] - unit conversions
//! - [`TissueModel`] - volume mesh plus per-element Lamé parameters
//! - [`MaterialMapper`] - priority-ordered, data-parallel assignment
//! - [`export_modulus`] - nodal modulus export for visual inspection
//!
//! Assignment runs in parallel over elements. Each element writes only its
//! own slot, so the result is independent of thread count.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod export;
mod lame;
mod mapper;
mod model;
mod region;

pub use error::{MaterialError, MaterialResult};
pub use export::{MODULUS_ZONE, export_modulus, write_modulus_zone};
pub use lame::{LameParameters, elastic_from_lame, lame_from_elastic};
pub use mapper::{
    DEFAULT_PARTITION_KEYWORDS, DEFAULT_SEARCH_RADIUS, MaterialMapper, MaterialReport,
};
pub use model::TissueModel;
pub use region::{AnatomicalRegion, SurfaceSource};
