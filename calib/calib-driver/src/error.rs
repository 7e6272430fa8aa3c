//! Error types for optimizer engines and the driver.

use thiserror::Error;

/// Errors raised while setting up or feeding an engine.
#[derive(Debug, Error)]
pub enum DriverError {
    /// An engine or driver setting is out of range.
    #[error("invalid optimizer setting: {0}")]
    InvalidSetting(String),

    /// The objective and the parameter space disagree on dimension.
    #[error("objective has dimension {objective}, parameter space has {space}")]
    DimensionMismatch {
        /// Objective dimension.
        objective: usize,
        /// Parameter space dimension.
        space: usize,
    },

    /// `tell` received a different batch than the last `ask` produced.
    #[error("expected {expected} evaluated candidates, got {found}")]
    BatchMismatch {
        /// Candidates handed out by `ask`.
        expected: usize,
        /// Candidates or costs returned.
        found: usize,
    },

    /// Mapping between normalized and physical values failed.
    #[error(transparent)]
    Param(#[from] calib_params::ParamError),
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriverError::DimensionMismatch {
            objective: 3,
            space: 5,
        };
        assert_eq!(err.to_string(), "objective has dimension 3, parameter space has 5");

        let err = DriverError::BatchMismatch {
            expected: 8,
            found: 7,
        };
        assert!(err.to_string().contains("expected 8"));
    }
}
