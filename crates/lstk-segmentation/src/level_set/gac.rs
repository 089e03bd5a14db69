//! Geodesic active contour refinement.
//!
//! `φ_t = w_c g κ|∇φ| - w_p g |∇φ| + w_a ∇g · ∇φ`
//!
//! Curvature smooths the front, propagation inflates it where the feature
//! `g` is high, and advection pulls it into the valleys of `g` (strong
//! edges). Propagation and advection use upwind differences, curvature
//! central differences.

use std::sync::Arc;

use burn::tensor::backend::Backend;
use lstk_core::Image;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use super::evolution::{evolve, EvolutionParams, Refinement, RefinerStage, Velocity};
use super::{LevelSetRefiner, RefinementStatus, Stencil};
use crate::error::Result;
use crate::pipeline::Stamp;
use crate::progress::ProgressCallback;
use crate::validation::validate_weight;

/// Weights and iteration control of the geodesic active contour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GacParams {
    pub curvature_weight: f64,
    pub propagation_weight: f64,
    pub advection_weight: f64,
    #[serde(flatten)]
    pub evolution: EvolutionParams,
}

impl Default for GacParams {
    fn default() -> Self {
        Self {
            curvature_weight: 1.0,
            propagation_weight: 1.0,
            advection_weight: 1.0,
            evolution: EvolutionParams::default(),
        }
    }
}

impl GacParams {
    pub fn validate(&self) -> Result<()> {
        validate_weight("curvature weight", self.curvature_weight)?;
        validate_weight("propagation weight", self.propagation_weight)?;
        validate_weight("advection weight", self.advection_weight)?;
        self.evolution.validate()
    }
}

#[derive(Debug, Clone)]
pub struct GeodesicActiveContourModule<B: Backend, const D: usize> {
    params: GacParams,
    stage: RefinerStage<B, D>,
}

impl<B: Backend, const D: usize> Default for GeodesicActiveContourModule<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> GeodesicActiveContourModule<B, D> {
    pub fn new() -> Self {
        Self {
            params: GacParams::default(),
            stage: RefinerStage::new(),
        }
    }

    pub fn with_params(params: GacParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            stage: RefinerStage::new(),
        })
    }

    pub fn params(&self) -> &GacParams {
        &self.params
    }

    pub fn set_params(&mut self, params: GacParams) -> Result<()> {
        params.validate()?;
        if params != self.params {
            self.params = params;
            self.stage.touch();
        }
        Ok(())
    }

    pub fn propagation_weight(&self) -> f64 {
        self.params.propagation_weight
    }

    pub fn set_propagation_weight(&mut self, weight: f64) -> Result<()> {
        self.set_params(GacParams {
            propagation_weight: weight,
            ..self.params
        })
    }

    pub fn advection_weight(&self) -> f64 {
        self.params.advection_weight
    }

    pub fn set_advection_weight(&mut self, weight: f64) -> Result<()> {
        self.set_params(GacParams {
            advection_weight: weight,
            ..self.params
        })
    }
}

fn refine<B: Backend, const D: usize>(
    params: &GacParams,
    surface: &Image<B, D>,
    feature: &Image<B, D>,
    tracker: &mut crate::progress::ProgressTracker,
) -> Result<Refinement<B, D>> {
    let geometry = feature.geometry();
    let stencil = Stencil::new(geometry.lattice(), geometry.spacing());
    let g = feature.to_voxels();
    let n = g.len();
    tracing::debug!(
        "geodesic active contour: w_c = {}, w_p = {}, w_a = {}, {} voxels",
        params.curvature_weight,
        params.propagation_weight,
        params.advection_weight,
        n
    );

    // advection velocity V = -w_a ∇g, fixed for the whole run
    let advection: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|o| {
            let grad = stencil.gradient(&g, o);
            grad.into_iter().map(move |v| -params.advection_weight * v)
        })
        .collect();

    let h_min = stencil.min_spacing();
    let diffusion_bound = 2.0 * D as f64 / (h_min * h_min);
    let w_c = params.curvature_weight;
    let w_p = params.propagation_weight;

    let velocity = |phi: &[f64]| {
        let (values, rates): (Vec<f64>, Vec<f64>) = (0..n)
            .into_par_iter()
            .map(|o| {
                let v = &advection[o * D..(o + 1) * D];
                let speed = w_p * g[o];

                let curvature = w_c * g[o] * stencil.curvature_flow(phi, o);
                let propagation = speed * stencil.upwind_norm(phi, o, speed);
                let transport = stencil.upwind_advection(phi, o, v);

                let mut rate = speed.abs() / h_min + (w_c * g[o]).abs() * diffusion_bound;
                for (axis, component) in v.iter().enumerate() {
                    rate += component.abs() / stencil.spacing(axis);
                }
                (curvature - propagation - transport, rate)
            })
            .unzip();
        let max_rate = rates.into_iter().fold(0.0, f64::max);
        Velocity { values, max_rate }
    };

    let (phi, status) = evolve(
        "geodesic-active-contour",
        surface.to_voxels(),
        &stencil,
        &params.evolution,
        tracker,
        velocity,
        |phi| phi,
    )?;
    Ok(Refinement {
        surface: feature.with_voxels(&phi),
        status,
    })
}

impl<B: Backend, const D: usize> LevelSetRefiner<B, D> for GeodesicActiveContourModule<B, D> {
    fn name(&self) -> &'static str {
        "geodesic-active-contour"
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
        self.stage.run("geodesic-active-contour", move |surface, feature, tracker| {
            refine(&params, surface, feature, tracker)
        })
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
        self.set_params(GacParams { evolution, ..self.params })
    }

    fn curvature_weight(&self) -> f64 {
        self.params.curvature_weight
    }

    fn set_curvature_weight(&mut self, weight: f64) -> Result<()> {
        self.set_params(GacParams {
            curvature_weight: weight,
            ..self.params
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use lstk_core::ImageGeometry;

    type Backend = NdArray<f32>;

    fn disk_surface(geometry: &ImageGeometry<2>, radius: f64) -> Image<Backend, 2> {
        let lattice = geometry.lattice();
        let phi: Vec<f64> = (0..lattice.len())
            .map(|o| {
                let i = lattice.index(o);
                ((i[0] as f64 - 20.0).powi(2) + (i[1] as f64 - 20.0).powi(2)).sqrt() - radius
            })
            .collect();
        Image::from_voxels(&phi, geometry, &Default::default())
    }

    fn zero_crossing_along_axis(phi: &[f64], lattice: &lstk_core::Lattice<2>) -> f64 {
        for x in 20..39 {
            let a = phi[lattice.offset([x, 20])];
            let b = phi[lattice.offset([x + 1, 20])];
            if a < 0.0 && b >= 0.0 {
                return x as f64 + a / (a - b) - 20.0;
            }
        }
        f64::NAN
    }

    #[test]
    fn test_propagation_inflates_on_uniform_feature() {
        let geometry = ImageGeometry::<2>::from_shape([41, 41]);
        let mut gac = GeodesicActiveContourModule::<Backend, 2>::new();
        gac.set_curvature_weight(0.0).unwrap();
        gac.set_advection_weight(0.0).unwrap();
        gac.set_evolution(EvolutionParams { max_iterations: 10, ..Default::default() }).unwrap();
        gac.set_initial_surface(disk_surface(&geometry, 8.0));
        gac.set_feature_image(Image::from_voxels(&vec![1.0; geometry.len()], &geometry, &Default::default()));
        gac.update().unwrap();

        let phi = gac.output().unwrap().to_voxels();
        let radius = zero_crossing_along_axis(&phi, &geometry.lattice());
        // ten steps of dt = 0.45
        assert!((radius - 12.5).abs() < 0.6, "radius {}", radius);
        assert!(matches!(gac.status(), Some(RefinementStatus::IterationLimitReached { iterations: 10, .. })));
    }

    #[test]
    fn test_zero_feature_freezes_front() {
        let geometry = ImageGeometry::<2>::from_shape([41, 41]);
        let mut gac = GeodesicActiveContourModule::<Backend, 2>::new();
        gac.set_initial_surface(disk_surface(&geometry, 8.0));
        gac.set_feature_image(Image::from_voxels(&vec![0.0; geometry.len()], &geometry, &Default::default()));
        gac.update().unwrap();

        assert!(gac.status().unwrap().is_converged());
        let phi = gac.output().unwrap().to_voxels();
        let radius = zero_crossing_along_axis(&phi, &geometry.lattice());
        assert!((radius - 8.0).abs() < 0.05, "radius {}", radius);
    }

    #[test]
    fn test_geometry_mismatch_is_input_mismatch() {
        let geometry = ImageGeometry::<2>::from_shape([41, 41]);
        let shifted = geometry.clone().with_origin(lstk_core::Point::new([0.5, 0.0]));
        let mut gac = GeodesicActiveContourModule::<Backend, 2>::new();
        gac.set_initial_surface(disk_surface(&geometry, 8.0));
        gac.set_feature_image(Image::from_voxels(&vec![1.0; shifted.len()], &shifted, &Default::default()));
        assert!(gac.update().unwrap_err().is_input_mismatch());
        assert!(gac.output().is_none());
    }
}
