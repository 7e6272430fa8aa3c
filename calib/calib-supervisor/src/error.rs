//! Error types for the worker protocol and evaluation workspaces.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed worker input artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A mandatory line is absent.
    #[error("missing {0} line")]
    MissingLine(&'static str),

    /// The parameter count is not a non-negative integer.
    #[error("invalid parameter count '{0}'")]
    BadCount(String),

    /// A parameter value is not a finite real number.
    #[error("invalid parameter value '{token}' at position {index}")]
    BadValue {
        /// Zero-based position in the value line.
        index: usize,
        /// Offending token.
        token: String,
    },

    /// The value line holds a different number of values than declared.
    #[error("declared {declared} parameters, found {found}")]
    CountMismatch {
        /// Count from line 4.
        declared: usize,
        /// Values present on line 5.
        found: usize,
    },
}

/// Errors raised while preparing or reading worker artifacts.
///
/// [`ProcessSupervisor`](crate::ProcessSupervisor) converts all of these to
/// the sentinel cost; they surface only through the artifact helpers.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Filesystem operation on an artifact or workspace failed.
    #[error("{path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The input artifact could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SupervisorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
