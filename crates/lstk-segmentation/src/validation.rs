//! Validation utilities for segmentation parameters and inputs.
//!
//! Modules call these before touching any cached state, so a rejected
//! parameter or input leaves the previous output intact.

use lstk_core::ImageGeometry;
use crate::error::{SegmentationError, Result};

/// Validate the number of spatial dimensions an algorithm receives.
pub fn validate_dimension(dimension: usize, minimum: usize) -> Result<()> {
    if dimension < minimum {
        return Err(SegmentationError::domain_violation(format!(
            "input image has {} dimension(s), at least {} required",
            dimension, minimum
        )));
    }
    Ok(())
}

/// Validate a multiscale range `[minimum, maximum]` sampled at `steps` scales.
pub fn validate_scale_range(minimum: f64, maximum: f64, steps: usize) -> Result<()> {
    if steps == 0 {
        return Err(SegmentationError::invalid_configuration(
            "scale range must contain at least one scale",
        ));
    }
    if !minimum.is_finite() || !maximum.is_finite() || minimum <= 0.0 || maximum <= 0.0 {
        return Err(SegmentationError::invalid_configuration(format!(
            "scale range bounds must be finite and positive, got [{}, {}]",
            minimum, maximum
        )));
    }
    if minimum > maximum {
        return Err(SegmentationError::invalid_configuration(format!(
            "scale range is empty: minimum {} exceeds maximum {}",
            minimum, maximum
        )));
    }
    Ok(())
}

/// Validate sigmoid parameters. `alpha` sets slope and sign and must be non-zero.
pub fn validate_sigmoid(alpha: f64, beta: f64) -> Result<()> {
    if !alpha.is_finite() || alpha == 0.0 {
        return Err(SegmentationError::invalid_configuration(format!(
            "sigmoid alpha must be finite and non-zero, got {}",
            alpha
        )));
    }
    if !beta.is_finite() {
        return Err(SegmentationError::invalid_configuration(format!(
            "sigmoid beta must be finite, got {}",
            beta
        )));
    }
    Ok(())
}

/// Validate a parameter that must be finite and non-negative.
pub fn validate_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(SegmentationError::invalid_configuration(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validate a parameter that must be finite and strictly positive.
pub fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SegmentationError::invalid_configuration(format!(
            "{} must be finite and positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validate a weighting coefficient (any finite value).
pub fn validate_weight(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(SegmentationError::invalid_configuration(format!(
            "{} must be finite, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(SegmentationError::invalid_configuration(
            "Iterations must be positive",
        ));
    }

    if iterations > 1_000_000 {
        return Err(SegmentationError::invalid_configuration(
            format!("Iterations too large: {}", iterations),
        ));
    }

    Ok(())
}

/// Validate that two images sample the same grid.
pub fn validate_same_grid<const D: usize>(
    expected: &ImageGeometry<D>,
    actual: &ImageGeometry<D>,
    what: &str,
) -> Result<()> {
    if expected.shape() != actual.shape() {
        return Err(SegmentationError::ShapeMismatch {
            expected: expected.shape().to_vec(),
            actual: actual.shape().to_vec(),
        });
    }
    if let Some(difference) = expected.mismatch(actual) {
        return Err(SegmentationError::input_mismatch(format!(
            "{}: {}",
            what, difference
        )));
    }
    Ok(())
}

/// Validate a speed buffer: every sample finite and non-negative.
pub fn validate_speed(values: &[f64]) -> Result<()> {
    if let Some((offset, value)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(SegmentationError::domain_violation(format!(
            "speed image must be finite and non-negative, found {} at offset {}",
            value, offset
        )));
    }
    Ok(())
}

/// Convergence test on the root-mean-square change of an evolving field.
#[derive(Debug, Clone)]
pub struct ConvergenceChecker {
    /// RMS change below which the evolution counts as converged.
    pub threshold: f64,
    /// Number of consecutive iterations that must stay below the threshold.
    pub patience: usize,
    below: usize,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self::new(0.002, 1)
    }
}

impl ConvergenceChecker {
    /// Create a new convergence checker.
    pub fn new(threshold: f64, patience: usize) -> Self {
        Self {
            threshold,
            patience: patience.max(1),
            below: 0,
        }
    }

    /// Feed one iteration's RMS change. Returns true once converged.
    pub fn observe(&mut self, rms_change: f64) -> bool {
        if rms_change < self.threshold {
            self.below += 1;
        } else {
            self.below = 0;
        }
        self.below >= self.patience
    }

    pub fn reset(&mut self) {
        self.below = 0;
    }
}
