//! Error types for cross-section operations.

use thiserror::Error;

/// Errors that can occur while cutting or fitting a cross-section.
#[derive(Debug, Error)]
pub enum SliceError {
    /// Mesh has no faces to cut.
    #[error("mesh has no faces")]
    NoFaces,

    /// Plane normal has zero length.
    #[error("plane normal has zero length")]
    ZeroNormal,

    /// The cut produced too few points to fit a conic.
    #[error("cross-section has {found} points, at least {required} required")]
    TooFewPoints {
        /// Points found on the cut.
        found: usize,
        /// Minimum required.
        required: usize,
    },

    /// The least-squares system has no ellipse solution.
    #[error("degenerate ellipse fit: {0}")]
    DegenerateFit(&'static str),
}

/// Result type for cross-section operations.
pub type SliceResult<T> = std::result::Result<T, SliceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SliceError::TooFewPoints {
            found: 3,
            required: 5,
        };
        assert_eq!(format!("{err}"), "cross-section has 3 points, at least 5 required");

        let err = SliceError::DegenerateFit("collinear points");
        assert!(format!("{err}").contains("collinear"));
    }
}
