//! Seed-driven initial surface.

use burn::tensor::backend::Backend;
use lstk_core::Image;
use serde::{Serialize, Deserialize};

use super::marcher::{FastMarcher, Speed};
use crate::error::{SegmentationError, Result};
use crate::pipeline::{self, Cached, Dependencies, Stamp, Stamped};
use crate::seeds::SeedSet;
use crate::validation::{validate_non_negative, validate_speed};

/// Fast-marching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastMarchingParams {
    /// Arrival time at which the front stops; becomes the zero level.
    pub stopping_value: f64,
    /// Seeds start at arrival time `-distance_from_seeds`.
    pub distance_from_seeds: f64,
}

impl Default for FastMarchingParams {
    fn default() -> Self {
        Self {
            stopping_value: 100.0,
            distance_from_seeds: 0.5,
        }
    }
}

impl FastMarchingParams {
    pub fn validate(&self) -> Result<()> {
        validate_non_negative("stopping value", self.stopping_value)?;
        validate_non_negative("distance from seeds", self.distance_from_seeds)
    }
}

/// Propagates a front from the seeds over the speed image and returns the
/// arrival-time field shifted so that the front at `stopping_value` is the
/// zero level set (negative inside).
#[derive(Debug, Clone)]
pub struct FastMarchingModule<B: Backend, const D: usize> {
    params: FastMarchingParams,
    params_stamp: Stamp,
    speed: Option<Stamped<Image<B, D>>>,
    seeds: Option<Stamped<SeedSet<D>>>,
    cache: Option<Cached<Image<B, D>>>,
}

impl<B: Backend, const D: usize> Default for FastMarchingModule<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> FastMarchingModule<B, D> {
    pub fn new() -> Self {
        Self {
            params: FastMarchingParams::default(),
            params_stamp: Stamp::next(),
            speed: None,
            seeds: None,
            cache: None,
        }
    }

    pub fn with_params(params: FastMarchingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ..Self::new()
        })
    }

    pub fn params(&self) -> &FastMarchingParams {
        &self.params
    }

    pub fn set_params(&mut self, params: FastMarchingParams) -> Result<()> {
        params.validate()?;
        if params != self.params {
            self.params = params;
            self.params_stamp = Stamp::next();
        }
        Ok(())
    }

    pub fn stopping_value(&self) -> f64 {
        self.params.stopping_value
    }

    pub fn set_stopping_value(&mut self, value: f64) -> Result<()> {
        self.set_params(FastMarchingParams {
            stopping_value: value,
            ..self.params
        })
    }

    pub fn distance_from_seeds(&self) -> f64 {
        self.params.distance_from_seeds
    }

    pub fn set_distance_from_seeds(&mut self, value: f64) -> Result<()> {
        self.set_params(FastMarchingParams {
            distance_from_seeds: value,
            ..self.params
        })
    }

    /// Set the speed (feature) image.
    pub fn set_input(&mut self, speed: Image<B, D>) {
        self.speed = Some(Stamped::new(speed));
    }

    /// Connect an upstream output; a no-op when `stamp` is already connected.
    pub(crate) fn connect_input(&mut self, speed: &Image<B, D>, stamp: Stamp) {
        if self.speed.as_ref().map(|s| s.stamp()) != Some(stamp) {
            self.speed = Some(Stamped::with_stamp(speed.clone(), stamp));
        }
    }

    pub(crate) fn input_stamp(&self) -> Option<Stamp> {
        self.speed.as_ref().map(|s| s.stamp())
    }

    pub fn set_seeds(&mut self, seeds: SeedSet<D>) {
        self.seeds = Some(Stamped::new(seeds));
    }

    pub fn seeds(&self) -> Option<&SeedSet<D>> {
        self.seeds.as_ref().map(|s| s.value())
    }

    fn dependencies(&self) -> Option<Dependencies> {
        match (&self.speed, &self.seeds) {
            (Some(speed), Some(seeds)) => Some(Dependencies::new([
                speed.stamp(),
                seeds.stamp(),
                self.params_stamp,
            ])),
            _ => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self.dependencies() {
            Some(deps) => pipeline::current(&self.cache, &deps).is_none(),
            None => true,
        }
    }

    /// Last computed initial surface.
    pub fn output(&self) -> Option<&Image<B, D>> {
        self.cache.as_ref().map(|c| c.value())
    }

    pub fn output_stamp(&self) -> Option<Stamp> {
        self.cache.as_ref().map(|c| c.stamp())
    }

    /// Compute the initial surface if stale and return it.
    pub fn update(&mut self) -> Result<&Image<B, D>> {
        let speed = self
            .speed
            .as_ref()
            .ok_or_else(|| SegmentationError::missing_input("fast marching: no speed image"))?;
        let seeds = self
            .seeds
            .as_ref()
            .ok_or_else(|| SegmentationError::missing_input("fast marching: no seed set"))?;
        self.params.validate()?;

        let deps = Dependencies::new([speed.stamp(), seeds.stamp(), self.params_stamp]);
        if pipeline::current(&self.cache, &deps).is_none() {
            let surface = march_from_seeds(speed.value(), seeds.value(), &self.params)?;
            self.cache = Some(Cached::new(surface, deps));
        }

        self.output()
            .ok_or_else(|| SegmentationError::missing_input("fast marching produced no surface"))
    }
}

fn march_from_seeds<B: Backend, const D: usize>(
    speed: &Image<B, D>,
    seeds: &SeedSet<D>,
    params: &FastMarchingParams,
) -> Result<Image<B, D>> {
    let started = std::time::Instant::now();
    let indices = seeds.to_indices(speed)?;
    let values = speed.to_voxels();
    validate_speed(&values)?;

    let geometry = speed.geometry();
    let lattice = geometry.lattice();
    tracing::debug!(
        "fast marching: {} seed(s), stopping value {}, distance from seeds {}",
        indices.len(),
        params.stopping_value,
        params.distance_from_seeds
    );

    let trial: Vec<(usize, f64)> = indices
        .iter()
        .map(|&index| (lattice.offset(index), -params.distance_from_seeds))
        .collect();
    let marcher = FastMarcher::new(lattice, geometry.spacing());
    let arrival = marcher.march(Speed::Field(&values), &trial, params.stopping_value);

    let stopping = params.stopping_value;
    let outside = arrival.max_reached().map_or(0.0, |t| t - stopping).max(0.0)
        + geometry.spacing().max_spacing();
    let phi: Vec<f64> = (0..lattice.len())
        .map(|o| {
            if arrival.is_reached(o) {
                arrival.time(o) - stopping
            } else {
                outside
            }
        })
        .collect();

    tracing::info!(
        "fast marching: {} voxels known in {:.3}s",
        arrival.known_count(),
        started.elapsed().as_secs_f64()
    );
    Ok(speed.with_voxels(&phi))
}
