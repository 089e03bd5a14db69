//! Signed-pressure-force (SPF) refinement.
//!
//! Region competition on the feature image: with `c1` and `c2` the mean
//! feature inside and outside the current surface, the pressure
//! `spf = (g - (c1 + c2) / 2) / max |g - (c1 + c2) / 2|` inflates the
//! surface where the speed is above the midpoint of the two means and
//! deflates it below. On a speed map the front therefore settles on the
//! inner flank of the slow edge shell. A light curvature term keeps the
//! front regular; Gaussian smoothing of `φ` after every step is optional.

use std::sync::Arc;

use burn::tensor::backend::Backend;
use lstk_core::{GaussianFilter, Image};
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use super::evolution::{evolve, EvolutionParams, Refinement, RefinerStage, Velocity};
use super::{LevelSetRefiner, RefinementStatus, Stencil};
use crate::error::Result;
use crate::pipeline::Stamp;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::validation::{validate_non_negative, validate_weight};

/// Weights and iteration control of the SPF model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpfParams {
    pub spf_weight: f64,
    pub curvature_weight: f64,
    /// Gaussian smoothing of `φ` after every step, in physical units.
    /// `None` or `Some(0.0)` disables it. Smoothing acts as extra curvature
    /// flow and shrinks convex fronts.
    pub smoothing_sigma: Option<f64>,
    #[serde(flatten)]
    pub evolution: EvolutionParams,
}

impl Default for SpfParams {
    fn default() -> Self {
        Self {
            spf_weight: 1.0,
            curvature_weight: 0.2,
            smoothing_sigma: None,
            evolution: EvolutionParams::default(),
        }
    }
}

impl SpfParams {
    pub fn validate(&self) -> Result<()> {
        validate_weight("spf weight", self.spf_weight)?;
        validate_weight("curvature weight", self.curvature_weight)?;
        if let Some(sigma) = self.smoothing_sigma {
            validate_non_negative("smoothing sigma", sigma)?;
        }
        self.evolution.validate()
    }
}

/// Region means `(c1, c2)` of `feature` inside (`φ < 0`) and outside the
/// surface. An empty region takes the other region's mean.
pub fn region_means(phi: &[f64], feature: &[f64]) -> (f64, f64) {
    let (mut sum_in, mut n_in, mut sum_out, mut n_out) = (0.0, 0usize, 0.0, 0usize);
    for (p, g) in phi.iter().zip(feature) {
        if *p < 0.0 {
            sum_in += g;
            n_in += 1;
        } else {
            sum_out += g;
            n_out += 1;
        }
    }
    match (n_in, n_out) {
        (0, 0) => (0.0, 0.0),
        (0, _) => (sum_out / n_out as f64, sum_out / n_out as f64),
        (_, 0) => (sum_in / n_in as f64, sum_in / n_in as f64),
        _ => (sum_in / n_in as f64, sum_out / n_out as f64),
    }
}

/// Signed pressure force for every sample, in `[-1, 1]`.
pub fn signed_pressure(phi: &[f64], feature: &[f64]) -> Vec<f64> {
    let (c1, c2) = region_means(phi, feature);
    let mid = 0.5 * (c1 + c2);
    let scale = feature.iter().map(|g| (g - mid).abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return vec![0.0; feature.len()];
    }
    feature.iter().map(|g| (g - mid) / scale).collect()
}

#[derive(Debug, Clone)]
pub struct SpfLevelSetModule<B: Backend, const D: usize> {
    params: SpfParams,
    stage: RefinerStage<B, D>,
}

impl<B: Backend, const D: usize> Default for SpfLevelSetModule<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> SpfLevelSetModule<B, D> {
    pub fn new() -> Self {
        Self {
            params: SpfParams::default(),
            stage: RefinerStage::new(),
        }
    }

    pub fn with_params(params: SpfParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            stage: RefinerStage::new(),
        })
    }

    pub fn params(&self) -> &SpfParams {
        &self.params
    }

    pub fn set_params(&mut self, params: SpfParams) -> Result<()> {
        params.validate()?;
        if params != self.params {
            self.params = params;
            self.stage.touch();
        }
        Ok(())
    }

    pub fn spf_weight(&self) -> f64 {
        self.params.spf_weight
    }

    pub fn set_spf_weight(&mut self, weight: f64) -> Result<()> {
        self.set_params(SpfParams {
            spf_weight: weight,
            ..self.params
        })
    }

    pub fn set_smoothing_sigma(&mut self, sigma: Option<f64>) -> Result<()> {
        self.set_params(SpfParams {
            smoothing_sigma: sigma,
            ..self.params
        })
    }
}

fn refine<B: Backend, const D: usize>(
    params: &SpfParams,
    surface: &Image<B, D>,
    feature: &Image<B, D>,
    tracker: &mut ProgressTracker,
) -> Result<Refinement<B, D>> {
    let geometry = feature.geometry();
    let stencil = Stencil::new(geometry.lattice(), geometry.spacing());
    let g = feature.to_voxels();
    let n = g.len();
    let h_min = stencil.min_spacing();
    let sigma = params.smoothing_sigma.unwrap_or(0.0);
    let w_spf = params.spf_weight;
    let w_c = params.curvature_weight;
    let diffusion_bound = 2.0 * D as f64 / (h_min * h_min);
    tracing::debug!(
        "spf: w_spf = {}, w_c = {}, smoothing sigma = {}",
        w_spf,
        w_c,
        sigma
    );

    let velocity = |phi: &[f64]| {
        let pressure = signed_pressure(phi, &g);
        let (values, rates): (Vec<f64>, Vec<f64>) = (0..n)
            .into_par_iter()
            .map(|o| {
                let speed = w_spf * pressure[o];
                let propagation = speed * stencil.upwind_norm(phi, o, speed);
                let curvature = w_c * stencil.curvature_flow(phi, o);
                let rate = speed.abs() / h_min + w_c.abs() * diffusion_bound;
                (curvature - propagation, rate)
            })
            .unzip();
        let max_rate = rates.into_iter().fold(0.0, f64::max);
        Velocity { values, max_rate }
    };

    let smoother = GaussianFilter::<B>::isotropic(sigma);
    let regularize = |phi: Vec<f64>| {
        if sigma > 0.0 {
            smoother.apply(&feature.with_voxels(&phi)).to_voxels()
        } else {
            phi
        }
    };

    let (phi, status) = evolve(
        "spf",
        surface.to_voxels(),
        &stencil,
        &params.evolution,
        tracker,
        velocity,
        regularize,
    )?;
    Ok(Refinement {
        surface: feature.with_voxels(&phi),
        status,
    })
}

impl<B: Backend, const D: usize> LevelSetRefiner<B, D> for SpfLevelSetModule<B, D> {
    fn name(&self) -> &'static str {
        "spf"
    }

    fn set_initial_surface(&mut self, surface: Image<B, D>) {
        self.stage.set_surface(surface);
    }

    fn set_feature_image(&mut self, feature: Image<B, D>) {
        self.stage.set_feature(feature);
    }

    fn connect_inputs(
        &mut self,
        surface: &Image<B, D>,
        surface_stamp: Stamp,
        feature: &Image<B, D>,
        feature_stamp: Stamp,
    ) {
        self.stage.connect(surface, surface_stamp, feature, feature_stamp);
    }

    fn input_stamps(&self) -> (Option<Stamp>, Option<Stamp>) {
        self.stage.input_stamps()
    }

    fn update(&mut self) -> Result<()> {
        self.params.validate()?;
        let params = self.params;
        self.stage
            .run("spf", move |surface, feature, tracker| refine(&params, surface, feature, tracker))
    }

    fn output(&self) -> Option<&Image<B, D>> {
        self.stage.output()
    }

    fn output_stamp(&self) -> Option<Stamp> {
        self.stage.output_stamp()
    }

    fn status(&self) -> Option<RefinementStatus> {
        self.stage.status()
    }

    fn is_dirty(&self) -> bool {
        self.stage.is_dirty()
    }

    fn add_progress_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.stage.tracker.add_callback(callback);
    }

    fn evolution(&self) -> &EvolutionParams {
        &self.params.evolution
    }

    fn set_evolution(&mut self, evolution: EvolutionParams) -> Result<()> {
        self.set_params(SpfParams { evolution, ..self.params })
    }

    fn curvature_weight(&self) -> f64 {
        self.params.curvature_weight
    }

    fn set_curvature_weight(&mut self, weight: f64) -> Result<()> {
        self.set_params(SpfParams {
            curvature_weight: weight,
            ..self.params
        })
    }
}
