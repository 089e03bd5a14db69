//! Error types for segmentation operations.
//!
//! Every failure is detected before a module touches its cached output, so
//! the last valid result survives an error. Non-convergence of a refinement
//! stage is not an error; it is reported through
//! [`RefinementStatus`](crate::level_set::RefinementStatus).

use thiserror::Error;

/// Main error type for segmentation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    /// Invalid or out-of-range parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A required input (image, seeds, upstream output) was never provided.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Two grids that must coincide do not.
    #[error("Input mismatch: {0}")]
    InputMismatch(String),

    /// Shape mismatch between two grids.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Input data outside the algorithm's domain (negative speed, seed
    /// outside the grid, empty seed set, too few dimensions).
    #[error("Domain violation: {0}")]
    DomainViolation(String),
}

/// Result type for segmentation operations.
pub type Result<T> = std::result::Result<T, SegmentationError>;

impl SegmentationError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a missing input error.
    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    /// Create an input mismatch error.
    pub fn input_mismatch(msg: impl Into<String>) -> Self {
        Self::InputMismatch(msg.into())
    }

    /// Create a domain violation error.
    pub fn domain_violation(msg: impl Into<String>) -> Self {
        Self::DomainViolation(msg.into())
    }

    /// True for configuration-class errors (bad or missing parameters/inputs).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_) | Self::MissingInput(_))
    }

    /// True for grid geometry mismatches.
    pub fn is_input_mismatch(&self) -> bool {
        matches!(self, Self::InputMismatch(_) | Self::ShapeMismatch { .. })
    }

    /// True for domain violations.
    pub fn is_domain_violation(&self) -> bool {
        matches!(self, Self::DomainViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SegmentationError::domain_violation("seed set is empty");
        assert_eq!(err.to_string(), "Domain violation: seed set is empty");
    }

    #[test]
    fn test_error_classes() {
        assert!(SegmentationError::invalid_configuration("x").is_configuration());
        assert!(SegmentationError::missing_input("x").is_configuration());
        assert!(SegmentationError::input_mismatch("x").is_input_mismatch());
        assert!(SegmentationError::domain_violation("x").is_domain_violation());
        assert!(!SegmentationError::domain_violation("x").is_configuration());
    }

    #[test]
    fn test_shape_mismatch() {
        let err = SegmentationError::ShapeMismatch {
            expected: vec![10, 10],
            actual: vec![5, 5],
        };
        assert!(err.is_input_mismatch());
        let err_str = err.to_string();
        assert!(err_str.contains("expected"));
        assert!(err_str.contains("got"));
    }
}
