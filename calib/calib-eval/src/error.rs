//! Error types for configuration and evaluation.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable configuration.
///
/// These skip the affected run, except [`ConfigError::is_fatal`] ones which
/// stop the batch. None of them reach the optimizer.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The device variant tag has no file set.
    #[error("unknown device variant '{0}'")]
    UnknownVariant(String),

    /// Registration scoring needs a ground-truth surface that is missing.
    #[error("ground-truth surface not found: {0}")]
    MissingGroundTruth(PathBuf),

    /// The parameter list is invalid.
    #[error("invalid parameters: {0}")]
    Parameters(#[from] calib_params::ParamError),

    /// A setting is out of range.
    #[error("invalid setting: {0}")]
    Invalid(String),

    /// A dataset directory, mesh or executable needed by every evaluation
    /// does not exist.
    #[error("{what} not found: {path}")]
    MissingInput {
        /// What the path was expected to be.
        what: &'static str,
        /// Path as configured or resolved.
        path: PathBuf,
    },
}

impl ConfigError {
    /// True for errors that abort a whole batch instead of skipping one
    /// configuration.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingInput { .. })
    }
}

/// Result type for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while building or persisting an evaluation.
///
/// [`SimulationEvaluator`](crate::SimulationEvaluator) turns the ones that
/// occur inside an evaluation into the sentinel cost.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tissue volume mesh could not be loaded.
    #[error("failed to load tissue mesh {path}: {source}")]
    TissueMesh {
        /// Mesh path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: mesh_io::IoError,
    },

    /// Material assignment failed.
    #[error("material assignment failed: {0}")]
    Material(#[from] calib_material::MaterialError),

    /// A file the harness keeps, such as the iteration log, could not be
    /// read back.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file written by the harness could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// Result type for evaluation plumbing.
pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::UnknownVariant("VenusA_L40".into());
        assert_eq!(err.to_string(), "unknown device variant 'VenusA_L40'");

        let err = EvalError::from(ConfigError::Invalid("search_radius must be >= 0".into()));
        assert_eq!(err.to_string(), "invalid setting: search_radius must be >= 0");
    }
}
