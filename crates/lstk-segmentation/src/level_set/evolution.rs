//! Explicit level-set time stepping shared by the refiners.

use burn::tensor::backend::Backend;
use lstk_core::Image;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use super::{reinitialize, RefinementStatus, Stencil};
use crate::error::{SegmentationError, Result};
use crate::fast_marching::FastMarcher;
use crate::pipeline::{self, Cached, Dependencies, Stamp, Stamped};
use crate::progress::ProgressTracker;
use crate::validation::{validate_iterations, validate_positive, validate_same_grid, ConvergenceChecker};

/// Iteration control and numerical safeguards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionParams {
    pub max_iterations: usize,
    /// RMS change per iteration below which the evolution stops.
    pub convergence_threshold: f64,
    /// Iterations between signed-distance reinitialisations.
    pub reinitialization_interval: usize,
    /// Half width of the clamped band, in voxels of the largest spacing.
    pub narrow_band: f64,
    /// CFL number.
    pub cfl: f64,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 0.002,
            reinitialization_interval: 5,
            narrow_band: 4.0,
            cfl: 0.45,
        }
    }
}

impl EvolutionParams {
    pub fn validate(&self) -> Result<()> {
        validate_iterations(self.max_iterations)?;
        validate_positive("convergence threshold", self.convergence_threshold)?;
        if self.reinitialization_interval == 0 {
            return Err(SegmentationError::invalid_configuration(
                "reinitialization interval must be positive",
            ));
        }
        if !(self.narrow_band >= 2.0) || !self.narrow_band.is_finite() {
            return Err(SegmentationError::invalid_configuration(format!(
                "narrow band must be at least 2 voxels, got {}",
                self.narrow_band
            )));
        }
        if !(self.cfl > 0.0 && self.cfl <= 1.0) {
            return Err(SegmentationError::invalid_configuration(format!(
                "CFL number must lie in (0, 1], got {}",
                self.cfl
            )));
        }
        Ok(())
    }
}

/// Per-iteration velocity field `φ_t` and the largest local rate used for
/// the CFL time step.
pub(crate) struct Velocity {
    pub values: Vec<f64>,
    pub max_rate: f64,
}

/// RMS difference of two signed-distance fields over the samples within
/// `width` of either zero level. `None` when neither field has such samples.
fn interface_rms_change(before: &[f64], after: &[f64], width: f64) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (old, new) in before.iter().zip(after) {
        if old.abs() <= width || new.abs() <= width {
            let d = new - old;
            sum += d * d;
            count += 1;
        }
    }
    (count > 0).then(|| (sum / count as f64).sqrt())
}

fn has_interface(phi: &[f64]) -> bool {
    phi.iter().any(|v| *v < 0.0) && phi.iter().any(|v| *v >= 0.0)
}

/// Evolve `phi` with the velocity returned by `velocity` until convergence
/// or the iteration cap. `regularize` post-processes every step.
///
/// Convergence is judged on the motion of the zero level: every step is
/// reinitialised and compared with the previous signed distance, so values
/// drifting away from the interface do not count.
pub(crate) fn evolve<const D: usize, V, R>(
    stage: &'static str,
    phi: Vec<f64>,
    stencil: &Stencil<D>,
    params: &EvolutionParams,
    tracker: &mut ProgressTracker,
    mut velocity: V,
    mut regularize: R,
) -> Result<(Vec<f64>, RefinementStatus)>
where
    V: FnMut(&[f64]) -> Velocity,
    R: FnMut(Vec<f64>) -> Vec<f64>,
{
    let h_max = stencil.max_spacing();
    let band = params.narrow_band * h_max;
    let measure_width = 2.0 * h_max;
    let marcher = FastMarcher::from_parts(*stencil.lattice(), stencil.spacings());

    let mut checker = ConvergenceChecker::new(params.convergence_threshold, 1);
    let mut phi = reinitialize(&phi, &marcher, band);
    let mut distance = phi.clone();
    let mut rms_change = f64::INFINITY;
    let mut iterations = params.max_iterations;
    let mut converged = false;

    tracker.start(stage);
    for iteration in 1..=params.max_iterations {
        let Velocity { values, max_rate } = velocity(&phi);
        let dt = if max_rate > 0.0 { params.cfl / max_rate } else { 0.0 };

        let stepped: Vec<f64> = phi
            .par_iter()
            .zip(values.par_iter())
            .map(|(p, v)| (p + dt * v).clamp(-band, band))
            .collect();
        let next = regularize(stepped);

        let next_distance = reinitialize(&next, &marcher, band);
        let change = interface_rms_change(&distance, &next_distance, measure_width);
        if let Some(change) = change {
            rms_change = change;
        }
        phi = if iteration % params.reinitialization_interval == 0 {
            next_distance.clone()
        } else {
            next
        };
        distance = next_distance;

        tracker.update(stage, iteration, Some(params.max_iterations), rms_change, dt);
        if change.is_none() {
            iterations = iteration;
            break;
        }
        if checker.observe(rms_change) {
            iterations = iteration;
            converged = true;
            break;
        }
    }

    let phi = reinitialize(&phi, &marcher, band);
    let status = if !has_interface(&phi) {
        tracing::warn!("{}: surface has no zero crossing after {} iterations", stage, iterations);
        RefinementStatus::NoInterface { iterations, rms_change }
    } else if converged {
        RefinementStatus::Converged { iterations, rms_change }
    } else {
        tracing::warn!(
            "{}: no convergence after {} iterations (RMS change {:.6}, threshold {})",
            stage,
            iterations,
            rms_change,
            params.convergence_threshold
        );
        RefinementStatus::IterationLimitReached { iterations, rms_change }
    };
    tracker.complete(stage, status.iterations(), rms_change, status.is_converged());

    Ok((phi, status))
}

/// A refined surface together with how its run ended.
#[derive(Debug, Clone)]
pub(crate) struct Refinement<B: Backend, const D: usize> {
    pub surface: Image<B, D>,
    pub status: RefinementStatus,
}

/// Inputs, parameter stamp, cache and progress reporting of a refiner.
#[derive(Debug, Clone)]
pub(crate) struct RefinerStage<B: Backend, const D: usize> {
    surface: Option<Stamped<Image<B, D>>>,
    feature: Option<Stamped<Image<B, D>>>,
    parameters: Stamp,
    cache: Option<Cached<Refinement<B, D>>>,
    pub tracker: ProgressTracker,
}

impl<B: Backend, const D: usize> RefinerStage<B, D> {
    pub fn new() -> Self {
        Self {
            surface: None,
            feature: None,
            parameters: Stamp::next(),
            cache: None,
            tracker: ProgressTracker::new(),
        }
    }

    pub fn touch(&mut self) {
        self.parameters = Stamp::next();
    }

    pub fn set_surface(&mut self, surface: Image<B, D>) {
        self.surface = Some(Stamped::new(surface));
    }

    pub fn set_feature(&mut self, feature: Image<B, D>) {
        self.feature = Some(Stamped::new(feature));
    }

    pub fn connect(&mut self, surface: &Image<B, D>, surface_stamp: Stamp, feature: &Image<B, D>, feature_stamp: Stamp) {
        if self.surface.as_ref().map(|s| s.stamp()) != Some(surface_stamp) {
            self.surface = Some(Stamped::with_stamp(surface.clone(), surface_stamp));
        }
        if self.feature.as_ref().map(|f| f.stamp()) != Some(feature_stamp) {
            self.feature = Some(Stamped::with_stamp(feature.clone(), feature_stamp));
        }
    }

    pub fn input_stamps(&self) -> (Option<Stamp>, Option<Stamp>) {
        (
            self.surface.as_ref().map(|s| s.stamp()),
            self.feature.as_ref().map(|f| f.stamp()),
        )
    }

    fn dependencies(&self) -> Option<Dependencies> {
        match (&self.surface, &self.feature) {
            (Some(s), Some(f)) => Some(Dependencies::new([s.stamp(), f.stamp(), self.parameters])),
            _ => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self.dependencies() {
            Some(deps) => pipeline::current(&self.cache, &deps).is_none(),
            None => true,
        }
    }

    pub fn output(&self) -> Option<&Image<B, D>> {
        self.cache.as_ref().map(|c| &c.value().surface)
    }

    pub fn status(&self) -> Option<RefinementStatus> {
        self.cache.as_ref().map(|c| c.value().status)
    }

    pub fn output_stamp(&self) -> Option<Stamp> {
        self.cache.as_ref().map(|c| c.stamp())
    }

    /// Validate the inputs and run `refine(surface, feature, tracker)` when
    /// stale. Errors leave the cache untouched.
    pub fn run<F>(&mut self, name: &'static str, refine: F) -> Result<()>
    where
        F: FnOnce(&Image<B, D>, &Image<B, D>, &mut ProgressTracker) -> Result<Refinement<B, D>>,
    {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| SegmentationError::missing_input(format!("{}: no initial surface", name)))?;
        let feature = self
            .feature
            .as_ref()
            .ok_or_else(|| SegmentationError::missing_input(format!("{}: no feature image", name)))?;
        validate_same_grid(
            &feature.value().geometry(),
            &surface.value().geometry(),
            "initial surface and feature image",
        )?;

        let deps = Dependencies::new([surface.stamp(), feature.stamp(), self.parameters]);
        if pipeline::current(&self.cache, &deps).is_some() {
            tracing::debug!("{}: refined surface is up to date", name);
            return Ok(());
        }

        let started = std::time::Instant::now();
        let refinement = refine(surface.value(), feature.value(), &mut self.tracker)?;
        tracing::info!(
            "{}: {:?} in {:.3}s",
            name,
            refinement.status,
            started.elapsed().as_secs_f64()
        );
        self.cache = Some(Cached::new(refinement, deps));
        Ok(())
    }
}
