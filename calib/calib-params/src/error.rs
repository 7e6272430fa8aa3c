//! Error types for parameter declarations.

use thiserror::Error;

/// Errors raised while declaring or using parameters.
#[derive(Debug, Error)]
pub enum ParamError {
    /// Lower bound is not strictly below the upper bound.
    #[error("parameter '{name}' has invalid bounds [{min}, {max}]")]
    InvalidBounds {
        /// Parameter name.
        name: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// Two parameters share a name or write the same property key.
    #[error("duplicate parameter: {0}")]
    Duplicate(String),

    /// A vector does not match the number of declared parameters.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Declared dimension.
        expected: usize,
        /// Length of the vector supplied.
        got: usize,
    },

    /// A property kind name was not recognized.
    #[error("unknown property kind '{0}' (expected E/Modulus or Nu/PoissonRatio)")]
    UnknownKind(String),
}

/// Result type for parameter operations.
pub type ParamResult<T> = Result<T, ParamError>;
