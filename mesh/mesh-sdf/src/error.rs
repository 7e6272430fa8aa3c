//! Error types for distance queries.

use thiserror::Error;

/// Result type for distance-field construction.
pub type SdfResult<T> = Result<T, SdfError>;

/// Errors raised while building a distance field.
#[derive(Debug, Error)]
pub enum SdfError {
    /// Mesh has no faces.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A face references a vertex index that does not exist.
    #[error("face {face} references a missing vertex")]
    InvalidFace {
        /// Index of the offending face.
        face: usize,
    },
}
