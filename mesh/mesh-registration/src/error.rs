//! Error types for registration.

use thiserror::Error;

/// Errors raised by rigid registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The moving point set is empty.
    #[error("source has no points")]
    EmptySource,

    /// The fixed surface or point set is empty.
    #[error("target has no points")]
    EmptyTarget,

    /// Paired point sets differ in length.
    #[error("paired point sets differ in length: {source_len} vs {target_len}")]
    LengthMismatch {
        /// Number of source points.
        source_len: usize,
        /// Number of target points.
        target_len: usize,
    },

    /// SVD did not produce both singular-vector factors.
    #[error("SVD failed during transform estimation")]
    SvdFailed,

    /// Every correspondence was rejected by the distance gate.
    #[error("no valid correspondences found")]
    NoCorrespondences,

    /// The target surface could not be indexed for closest-point queries.
    #[error("target surface rejected: {0}")]
    Surface(#[from] mesh_sdf::SdfError),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
