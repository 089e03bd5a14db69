//! Feature (speed) image generators.
//!
//! A feature generator turns an intensity image into a speed map in (0, 1):
//! close to 1 where a front may grow freely and close to 0 where it should
//! stop. Generators cache their output and recompute only when their input
//! image or a parameter changes.

pub mod sigmoid;
pub mod hessian;
pub mod vesselness;
pub mod gradient;
pub mod aggregator;
pub mod lesion;

pub use sigmoid::Sigmoid;
pub use hessian::{SatoMeasure, HessianAnalysis};
pub use vesselness::{VesselnessFeatureGenerator, VesselnessParams, ScaleRange};
pub use gradient::{GradientMagnitudeSigmoidFeatureGenerator, GradientMagnitudeParams};
pub use aggregator::MinimumFeatureAggregator;
pub use lesion::LesionFeatureGenerator;

use burn::tensor::backend::Backend;
use lstk_core::Image;
use crate::error::{SegmentationError, Result};
use crate::pipeline::{self, Cached, Dependencies, Stamp, Stamped};

/// Common interface of all speed-map generators.
pub trait FeatureGenerator<B: Backend, const D: usize>: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Set (or replace) the intensity image.
    fn set_input(&mut self, image: Image<B, D>);

    /// Recompute the feature image if it is stale.
    fn update(&mut self) -> Result<()>;

    /// Last computed feature image, current or not.
    fn output(&self) -> Option<&Image<B, D>>;

    /// Stamp of the last computed feature image.
    fn output_stamp(&self) -> Option<Stamp>;

    /// True when [`update`](Self::update) would recompute.
    fn is_dirty(&self) -> bool;
}

/// Input, parameter stamp and cache shared by the concrete generators.
#[derive(Debug, Clone)]
pub(crate) struct FeatureStage<B: Backend, const D: usize> {
    input: Option<Stamped<Image<B, D>>>,
    parameters: Stamp,
    cache: Option<Cached<Image<B, D>>>,
}

impl<B: Backend, const D: usize> FeatureStage<B, D> {
    pub(crate) fn new() -> Self {
        Self {
            input: None,
            parameters: Stamp::next(),
            cache: None,
        }
    }

    pub(crate) fn set_input(&mut self, image: Image<B, D>) {
        self.input = Some(Stamped::new(image));
    }

    /// Record a parameter change.
    pub(crate) fn touch(&mut self) {
        self.parameters = Stamp::next();
    }

    fn dependencies(&self) -> Option<Dependencies> {
        self.input
            .as_ref()
            .map(|input| Dependencies::new([input.stamp(), self.parameters]))
    }

    pub(crate) fn is_dirty(&self) -> bool {
        match self.dependencies() {
            Some(deps) => pipeline::current(&self.cache, &deps).is_none(),
            None => true,
        }
    }

    pub(crate) fn output(&self) -> Option<&Image<B, D>> {
        self.cache.as_ref().map(|c| c.value())
    }

    pub(crate) fn output_stamp(&self) -> Option<Stamp> {
        self.cache.as_ref().map(|c| c.stamp())
    }

    /// Run `compute` on the input when stale. Errors leave the cache untouched.
    pub(crate) fn run<F>(&mut self, name: &'static str, compute: F) -> Result<()>
    where
        F: FnOnce(&Image<B, D>) -> Result<Image<B, D>>,
    {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| SegmentationError::missing_input(format!("{}: no input image", name)))?;
        let deps = Dependencies::new([input.stamp(), self.parameters]);
        if pipeline::current(&self.cache, &deps).is_some() {
            tracing::debug!("{}: feature image is up to date", name);
            return Ok(());
        }

        let started = std::time::Instant::now();
        let feature = compute(input.value())?;
        tracing::info!(
            "{}: computed feature image {:?} in {:.3}s",
            name,
            feature.shape(),
            started.elapsed().as_secs_f64()
        );
        self.cache = Some(Cached::new(feature, deps));
        Ok(())
    }
}
