//! Sigmoid intensity remap.
//!
//! `f(x) = 1 / (1 + exp(-(x - beta) / alpha))`: strictly monotone, bounded in
//! (0, 1) for finite `x`, and exactly 0.5 at `x == beta`. A negative `alpha`
//! makes the map decreasing, so strong responses become slow speeds.

use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use crate::error::Result;
use crate::validation::validate_sigmoid;

/// Distance kept from 0 and 1 by [`Sigmoid::apply_as_speed`]. Feature
/// images are stored as `f32`, where values closer to the bounds than this
/// round onto them.
pub const SPEED_MARGIN: f64 = f32::EPSILON as f64;

/// Sigmoid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sigmoid {
    pub alpha: f64,
    pub beta: f64,
}

impl Sigmoid {
    /// Validated constructor.
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        validate_sigmoid(alpha, beta)?;
        Ok(Self { alpha, beta })
    }

    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-(x - self.beta) / self.alpha).exp())
    }

    /// Remap a buffer into a speed map, saturating at
    /// `[SPEED_MARGIN, 1 - SPEED_MARGIN]`.
    pub fn apply_as_speed(&self, values: &mut [f64]) {
        values
            .par_iter_mut()
            .for_each(|v| *v = self.apply(*v).clamp(SPEED_MARGIN, 1.0 - SPEED_MARGIN));
    }
}
