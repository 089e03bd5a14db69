//! Gradient-magnitude speed map.

use burn::tensor::backend::Backend;
use lstk_core::{GaussianFilter, Image, Lattice, Spacing};
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use super::{FeatureGenerator, FeatureStage, Sigmoid};
use crate::error::Result;
use crate::pipeline::Stamp;
use crate::validation::{validate_non_negative, validate_sigmoid};

/// Parameters of [`GradientMagnitudeSigmoidFeatureGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientMagnitudeParams {
    /// Gaussian derivative scale in physical units (0 disables smoothing).
    pub sigma: f64,
    pub sigmoid_alpha: f64,
    pub sigmoid_beta: f64,
}

impl Default for GradientMagnitudeParams {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            sigmoid_alpha: -1.0,
            sigmoid_beta: 90.0,
        }
    }
}

impl GradientMagnitudeParams {
    /// Edge term for intensities normalised to `[0, 1]`: gradient magnitudes
    /// above about 0.15 per unit length become slow.
    pub fn unit_contrast() -> Self {
        Self {
            sigma: 1.0,
            sigmoid_alpha: -0.03,
            sigmoid_beta: 0.15,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_non_negative("gradient sigma", self.sigma)?;
        validate_sigmoid(self.sigmoid_alpha, self.sigmoid_beta)
    }
}

/// Central-difference gradient magnitude (physical units, replicated borders).
pub fn gradient_magnitude<const D: usize>(values: &[f64], lattice: &Lattice<D>, spacing: &Spacing<D>) -> Vec<f64> {
    (0..lattice.len())
        .into_par_iter()
        .map(|offset| {
            let mut sum = 0.0;
            for axis in 0..D {
                let plus = values[lattice.clamped(offset, axis, 1)];
                let minus = values[lattice.clamped(offset, axis, -1)];
                let d = (plus - minus) / (2.0 * spacing[axis]);
                sum += d * d;
            }
            sum.sqrt()
        })
        .collect()
}

/// Speed map that is slow on strong edges: Gaussian gradient magnitude
/// remapped by a (usually decreasing) sigmoid.
#[derive(Debug, Clone)]
pub struct GradientMagnitudeSigmoidFeatureGenerator<B: Backend, const D: usize> {
    params: GradientMagnitudeParams,
    stage: FeatureStage<B, D>,
}

impl<B: Backend, const D: usize> Default for GradientMagnitudeSigmoidFeatureGenerator<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> GradientMagnitudeSigmoidFeatureGenerator<B, D> {
    pub fn new() -> Self {
        Self {
            params: GradientMagnitudeParams::default(),
            stage: FeatureStage::new(),
        }
    }

    /// Generator with [`GradientMagnitudeParams::unit_contrast`].
    pub fn unit_contrast() -> Self {
        Self {
            params: GradientMagnitudeParams::unit_contrast(),
            stage: FeatureStage::new(),
        }
    }

    pub fn with_params(params: GradientMagnitudeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            stage: FeatureStage::new(),
        })
    }

    pub fn params(&self) -> &GradientMagnitudeParams {
        &self.params
    }

    pub fn set_params(&mut self, params: GradientMagnitudeParams) -> Result<()> {
        params.validate()?;
        if params != self.params {
            self.params = params;
            self.stage.touch();
        }
        Ok(())
    }

    pub fn set_sigma(&mut self, sigma: f64) -> Result<()> {
        self.set_params(GradientMagnitudeParams { sigma, ..self.params })
    }

    pub fn set_sigmoid(&mut self, alpha: f64, beta: f64) -> Result<()> {
        self.set_params(GradientMagnitudeParams {
            sigmoid_alpha: alpha,
            sigmoid_beta: beta,
            ..self.params
        })
    }
}

impl<B: Backend, const D: usize> FeatureGenerator<B, D> for GradientMagnitudeSigmoidFeatureGenerator<B, D> {
    fn name(&self) -> &'static str {
        "gradient-magnitude"
    }

    fn set_input(&mut self, image: Image<B, D>) {
        self.stage.set_input(image);
    }

    fn update(&mut self) -> Result<()> {
        self.params.validate()?;
        let params = self.params;
        self.stage.run("gradient-magnitude", move |image| {
            let smoothed = if params.sigma > 0.0 {
                GaussianFilter::<B>::isotropic(params.sigma).apply(image).to_voxels()
            } else {
                image.to_voxels()
            };
            let lattice = image.geometry().lattice();
            let mut values = gradient_magnitude(&smoothed, &lattice, image.spacing());
            Sigmoid::new(params.sigmoid_alpha, params.sigmoid_beta)?.apply_as_speed(&mut values);
            Ok(image.with_voxels(&values))
        })
    }

    fn output(&self) -> Option<&Image<B, D>> {
        self.stage.output()
    }

    fn output_stamp(&self) -> Option<Stamp> {
        self.stage.output_stamp()
    }

    fn is_dirty(&self) -> bool {
        self.stage.is_dirty()
    }
}
