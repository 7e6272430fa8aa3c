//! Error types for discrepancy scoring.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while measuring geometric discrepancy.
///
/// The engine converts all of these to sentinel metrics; they surface only
/// through the lower-level functions.
#[derive(Debug, Error)]
pub enum DiscrepancyError {
    /// A surface file could not be loaded.
    #[error("failed to load {path}: {source}")]
    Load {
        /// Surface path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: mesh_io::IoError,
    },

    /// A surface has no vertices.
    #[error("surface '{0}' has no vertices")]
    EmptySurface(&'static str),

    /// Rigid registration failed.
    #[error("registration failed: {0}")]
    Registration(#[from] mesh_registration::RegistrationError),

    /// The simulated surface cannot be queried for distances.
    #[error("distance query failed: {0}")]
    Distance(#[from] mesh_sdf::SdfError),
}

/// Result type for discrepancy operations.
pub type DiscrepancyResult<T> = Result<T, DiscrepancyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiscrepancyError::EmptySurface("truth");
        assert_eq!(err.to_string(), "surface 'truth' has no vertices");
    }
}
