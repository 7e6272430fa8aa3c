//! Anatomical regions backed by reference surfaces.

use std::path::PathBuf;

use mesh_sdf::SignedDistanceField;
use mesh_types::{IndexedMesh, Point3};

use crate::{MaterialError, MaterialResult};

/// Where a region's reference surface comes from.
#[derive(Debug, Clone)]
pub enum SurfaceSource {
    /// A surface file (STL or OBJ) loaded at initialization.
    File(PathBuf),
    /// An in-memory surface.
    Mesh(IndexedMesh),
}

impl From<PathBuf> for SurfaceSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&std::path::Path> for SurfaceSource {
    fn from(path: &std::path::Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<IndexedMesh> for SurfaceSource {
    fn from(mesh: IndexedMesh) -> Self {
        Self::Mesh(mesh)
    }
}

/// A named sub-domain with a priority and, once initialized, a distance
/// query against its surface.
#[derive(Debug)]
pub struct AnatomicalRegion {
    name: String,
    priority: i32,
    source: SurfaceSource,
    field: Option<SignedDistanceField>,
}

impl AnatomicalRegion {
    pub(crate) fn new(name: String, source: SurfaceSource, priority: i32) -> Self {
        Self {
            name,
            priority,
            source,
            field: None,
        }
    }

    /// Region name, as used in property keys.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Higher priorities are tested first.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the distance query has been built.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.field.is_some()
    }

    /// Load the surface and build its distance query. Idempotent.
    pub(crate) fn initialize(&mut self) -> MaterialResult<()> {
        if self.field.is_some() {
            return Ok(());
        }
        let mesh = match &self.source {
            SurfaceSource::File(path) => {
                mesh_io::load_mesh(path).map_err(|source| MaterialError::Load {
                    region: self.name.clone(),
                    path: path.clone(),
                    source,
                })?
            }
            SurfaceSource::Mesh(mesh) => mesh.clone(),
        };
        let field = SignedDistanceField::new(mesh).map_err(|source| MaterialError::Surface {
            region: self.name.clone(),
            source,
        })?;
        self.field = Some(field);
        Ok(())
    }

    /// Signed distance from `p` to the surface; negative inside.
    ///
    /// Infinite before initialization.
    #[must_use]
    pub fn distance(&self, p: Point3<f64>) -> f64 {
        self.field
            .as_ref()
            .map_or(f64::INFINITY, |field| field.distance(p))
    }
}
