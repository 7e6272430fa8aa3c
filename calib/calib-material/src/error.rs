//! Error types for material assignment.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing or applying materials.
#[derive(Debug, Error)]
pub enum MaterialError {
    /// A region with this name is already registered.
    #[error("region '{0}' is already registered")]
    DuplicateRegion(String),

    /// `apply_materials` was called before `initialize`.
    #[error("material mapper used before initialize()")]
    NotInitialized,

    /// A region surface could not be loaded.
    #[error("failed to load surface for region '{region}' from {path}: {source}")]
    Load {
        /// Region name.
        region: String,
        /// Surface path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: mesh_io::IoError,
    },

    /// A region surface could not be indexed for distance queries.
    #[error("surface for region '{region}' is unusable: {source}")]
    Surface {
        /// Region name.
        region: String,
        /// Underlying error.
        #[source]
        source: mesh_sdf::SdfError,
    },

    /// The material table does not match the element count.
    #[error("material table has {materials} entries for {elements} elements")]
    TableMismatch {
        /// Materials supplied.
        materials: usize,
        /// Elements in the mesh.
        elements: usize,
    },

    /// Writing a diagnostic export failed.
    #[error("failed to write {path}: {source}")]
    Export {
        /// Output path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for material operations.
pub type MaterialResult<T> = Result<T, MaterialError>;
