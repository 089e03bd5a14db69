//! Fast marching followed by level-set refinement.
//!
//! [`HybridSegmentationModule`] owns the feature generator, the fast-marching
//! module and both refiners. Each stage caches its output; the pipeline state
//! is read off those caches, so a parameter change anywhere rolls the state
//! back to just before the affected stage and the next [`update`] recomputes
//! only what is downstream of it.
//!
//! [`update`]: HybridSegmentationModule::update

use std::sync::Arc;

use burn::tensor::backend::Backend;
use lstk_core::Image;

use crate::config::SegmentationConfig;
use crate::error::{SegmentationError, Result};
use crate::fast_marching::FastMarchingModule;
use crate::feature::{
    FeatureGenerator, GradientMagnitudeParams, LesionFeatureGenerator, ScaleRange, VesselnessFeatureGenerator,
};
use crate::level_set::{
    GeodesicActiveContourModule, LevelSetRefiner, RefinementStatus, RefinementStrategy, SpfLevelSetModule,
};
use crate::progress::ProgressCallback;
use crate::seeds::SeedSet;

/// Pipeline progress, derived from which stage outputs are current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SegmentationState {
    /// Missing input, no valid seed set, or the feature image is stale.
    Idle,
    SeedsAndFeatureReady,
    InitialSurfaceComputed,
    RefinedSurfaceComputed,
}

enum FeatureSource<B: Backend, const D: usize> {
    Lesion(LesionFeatureGenerator<B, D>),
    Custom(Box<dyn FeatureGenerator<B, D>>),
}

impl<B: Backend, const D: usize> FeatureSource<B, D> {
    fn generator(&self) -> &dyn FeatureGenerator<B, D> {
        match self {
            FeatureSource::Lesion(g) => g,
            FeatureSource::Custom(g) => g.as_ref(),
        }
    }

    fn generator_mut(&mut self) -> &mut dyn FeatureGenerator<B, D> {
        match self {
            FeatureSource::Lesion(g) => g,
            FeatureSource::Custom(g) => g.as_mut(),
        }
    }
}

/// Seeded lesion segmentation: feature image → fast marching → GAC or SPF.
pub struct HybridSegmentationModule<B: Backend, const D: usize> {
    input: Option<Image<B, D>>,
    feature: FeatureSource<B, D>,
    fast_marching: FastMarchingModule<B, D>,
    gac: GeodesicActiveContourModule<B, D>,
    spf: SpfLevelSetModule<B, D>,
    strategy: RefinementStrategy,
}

impl<B: Backend, const D: usize> std::fmt::Debug for HybridSegmentationModule<B, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSegmentationModule")
            .field("state", &self.state())
            .field("feature", &self.feature.generator().name())
            .field("strategy", &self.strategy)
            .field("fast_marching", self.fast_marching.params())
            .finish()
    }
}

impl<B: Backend, const D: usize> Default for HybridSegmentationModule<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> HybridSegmentationModule<B, D> {
    /// Lesion feature stage (vesselness limited by an edge term for
    /// intensities in `[0, 1]`), default fast marching and GAC refinement.
    pub fn new() -> Self {
        Self {
            input: None,
            feature: FeatureSource::Lesion(LesionFeatureGenerator::new()),
            fast_marching: FastMarchingModule::new(),
            gac: GeodesicActiveContourModule::new(),
            spf: SpfLevelSetModule::new(),
            strategy: RefinementStrategy::default(),
        }
    }

    /// Module configured from `config`. Everything is validated first.
    pub fn from_config(config: &SegmentationConfig) -> Result<Self> {
        config.validate()?;
        let mut module = Self::new();
        module.apply_config(config)?;
        Ok(module)
    }

    /// Apply `config` to the existing stages. Unchanged values keep caches.
    pub fn apply_config(&mut self, config: &SegmentationConfig) -> Result<()> {
        config.validate()?;
        if let FeatureSource::Lesion(g) = &mut self.feature {
            g.vesselness_mut().set_params(config.feature)?;
            g.set_edge_params(config.edges)?;
        }
        self.fast_marching.set_params(config.fast_marching)?;
        self.gac.set_params(config.refinement)?;
        self.spf.set_params(config.spf)?;
        self.set_refinement_strategy(config.strategy);
        Ok(())
    }

    /// Replace the feature stage. A previously set input image carries over.
    pub fn with_feature_generator(mut self, mut generator: Box<dyn FeatureGenerator<B, D>>) -> Self {
        if let Some(image) = &self.input {
            generator.set_input(image.clone());
        }
        tracing::debug!("hybrid: feature stage replaced by {}", generator.name());
        self.feature = FeatureSource::Custom(generator);
        self
    }

    pub fn set_input(&mut self, image: Image<B, D>) {
        self.feature.generator_mut().set_input(image.clone());
        self.input = Some(image);
    }

    pub fn input(&self) -> Option<&Image<B, D>> {
        self.input.as_ref()
    }

    pub fn set_seeds(&mut self, seeds: SeedSet<D>) {
        self.fast_marching.set_seeds(seeds);
    }

    pub fn seeds(&self) -> Option<&SeedSet<D>> {
        self.fast_marching.seeds()
    }

    /// Compute the feature image and hand it to fast marching. The seed set
    /// must be non-empty and inside the input grid.
    pub fn prepare(&mut self) -> Result<&Image<B, D>> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| SegmentationError::missing_input("hybrid: no input image"))?;
        let seeds = self
            .fast_marching
            .seeds()
            .ok_or_else(|| SegmentationError::missing_input("hybrid: no seed set"))?;
        seeds.to_indices(input)?;

        let generator = self.feature.generator_mut();
        generator.update()?;
        let stamp = generator
            .output_stamp()
            .ok_or_else(|| SegmentationError::missing_input("hybrid: feature stage produced no output"))?;
        let feature = self
            .feature
            .generator()
            .output()
            .ok_or_else(|| SegmentationError::missing_input("hybrid: feature stage produced no output"))?;
        self.fast_marching.connect_input(feature, stamp);
        tracing::debug!("hybrid: state {:?}", SegmentationState::SeedsAndFeatureReady);
        Ok(feature)
    }

    /// Run fast marching on the current feature image.
    pub fn compute_initial_surface(&mut self) -> Result<&Image<B, D>> {
        self.prepare()?;
        self.fast_marching.update()
    }

    /// Bring every stale stage up to date and return the refined surface.
    pub fn update(&mut self) -> Result<&Image<B, D>> {
        self.compute_initial_surface()?;

        let missing = || SegmentationError::missing_input("hybrid: upstream stage produced no output");
        let feature = self.feature.generator().output().ok_or_else(missing)?;
        let feature_stamp = self.feature.generator().output_stamp().ok_or_else(missing)?;
        let surface = self.fast_marching.output().ok_or_else(missing)?;
        let surface_stamp = self.fast_marching.output_stamp().ok_or_else(missing)?;

        let refiner: &mut dyn LevelSetRefiner<B, D> = match self.strategy {
            RefinementStrategy::GeodesicActiveContour => &mut self.gac,
            RefinementStrategy::Spf => &mut self.spf,
        };
        refiner.connect_inputs(surface, surface_stamp, feature, feature_stamp);
        refiner.update()?;
        if let Some(status) = refiner.status().filter(|s| !s.is_converged()) {
            tracing::debug!(
                "hybrid: refinement returned best effort after {} iterations ({:?})",
                status.iterations(),
                status
            );
        }
        refiner
            .output()
            .ok_or_else(|| SegmentationError::missing_input("hybrid: refinement produced no output"))
    }

    pub fn state(&self) -> SegmentationState {
        let generator = self.feature.generator();
        let feature_stamp = match generator.output_stamp() {
            Some(stamp) if self.seeds_valid() && !generator.is_dirty() => stamp,
            _ => return SegmentationState::Idle,
        };

        let surface_stamp = match self.fast_marching.output_stamp() {
            Some(stamp) if self.fast_marching.input_stamp() == Some(feature_stamp) && !self.fast_marching.is_dirty() => stamp,
            _ => return SegmentationState::SeedsAndFeatureReady,
        };

        let refiner = self.refiner();
        if refiner.output_stamp().is_some()
            && refiner.input_stamps() == (Some(surface_stamp), Some(feature_stamp))
            && !refiner.is_dirty()
        {
            SegmentationState::RefinedSurfaceComputed
        } else {
            SegmentationState::InitialSurfaceComputed
        }
    }

    fn seeds_valid(&self) -> bool {
        match (&self.input, self.fast_marching.seeds()) {
            (Some(input), Some(seeds)) => seeds.to_indices(input).is_ok(),
            _ => false,
        }
    }

    /// Last computed feature image.
    pub fn feature(&self) -> Option<&Image<B, D>> {
        self.feature.generator().output()
    }

    /// Last computed initial surface.
    pub fn initial_surface(&self) -> Option<&Image<B, D>> {
        self.fast_marching.output()
    }

    /// Last refined surface of the active strategy.
    pub fn refined_surface(&self) -> Option<&Image<B, D>> {
        self.refiner().output()
    }

    pub fn refinement_status(&self) -> Option<RefinementStatus> {
        self.refiner().status()
    }

    pub fn stopping_value(&self) -> f64 {
        self.fast_marching.stopping_value()
    }

    pub fn set_stopping_value(&mut self, value: f64) -> Result<()> {
        self.fast_marching.set_stopping_value(value)
    }

    pub fn distance_from_seeds(&self) -> f64 {
        self.fast_marching.distance_from_seeds()
    }

    pub fn set_distance_from_seeds(&mut self, value: f64) -> Result<()> {
        self.fast_marching.set_distance_from_seeds(value)
    }

    pub fn fast_marching(&self) -> &FastMarchingModule<B, D> {
        &self.fast_marching
    }

    /// The built-in lesion feature stage, unless replaced.
    pub fn lesion_features(&self) -> Option<&LesionFeatureGenerator<B, D>> {
        match &self.feature {
            FeatureSource::Lesion(g) => Some(g),
            FeatureSource::Custom(_) => None,
        }
    }

    fn lesion_features_mut(&mut self) -> Result<&mut LesionFeatureGenerator<B, D>> {
        match &mut self.feature {
            FeatureSource::Lesion(g) => Ok(g),
            FeatureSource::Custom(g) => Err(SegmentationError::invalid_configuration(format!(
                "feature stage is '{}', not the built-in lesion features",
                g.name()
            ))),
        }
    }

    /// Vesselness generator of the built-in feature stage.
    pub fn vesselness(&self) -> Option<&VesselnessFeatureGenerator<B, D>> {
        self.lesion_features().map(|g| g.vesselness())
    }

    fn vesselness_mut(&mut self) -> Result<&mut VesselnessFeatureGenerator<B, D>> {
        self.lesion_features_mut().map(|g| g.vesselness_mut())
    }

    /// Edge term of the built-in feature stage; `None` when disabled or
    /// replaced.
    pub fn edge_params(&self) -> Option<GradientMagnitudeParams> {
        self.lesion_features().and_then(|g| g.edge_params())
    }

    pub fn set_edge_params(&mut self, params: Option<GradientMagnitudeParams>) -> Result<()> {
        self.lesion_features_mut()?.set_edge_params(params)
    }

    pub fn sigmoid_alpha(&self) -> Option<f64> {
        self.vesselness().map(|g| g.sigmoid_alpha())
    }

    pub fn set_sigmoid_alpha(&mut self, alpha: f64) -> Result<()> {
        self.vesselness_mut()?.set_sigmoid_alpha(alpha)
    }

    pub fn sigmoid_beta(&self) -> Option<f64> {
        self.vesselness().map(|g| g.sigmoid_beta())
    }

    pub fn set_sigmoid_beta(&mut self, beta: f64) -> Result<()> {
        self.vesselness_mut()?.set_sigmoid_beta(beta)
    }

    pub fn scale_range(&self) -> Option<ScaleRange> {
        self.vesselness().map(|g| g.scale_range())
    }

    pub fn set_scale_range(&mut self, minimum: f64, maximum: f64, steps: usize) -> Result<()> {
        self.vesselness_mut()?.set_scale_range(minimum, maximum, steps)
    }

    pub fn refinement_strategy(&self) -> RefinementStrategy {
        self.strategy
    }

    pub fn set_refinement_strategy(&mut self, strategy: RefinementStrategy) {
        if strategy != self.strategy {
            tracing::debug!("hybrid: refinement strategy {:?}", strategy);
            self.strategy = strategy;
        }
    }

    fn refiner(&self) -> &dyn LevelSetRefiner<B, D> {
        match self.strategy {
            RefinementStrategy::GeodesicActiveContour => &self.gac,
            RefinementStrategy::Spf => &self.spf,
        }
    }

    fn refiner_mut(&mut self) -> &mut dyn LevelSetRefiner<B, D> {
        match self.strategy {
            RefinementStrategy::GeodesicActiveContour => &mut self.gac,
            RefinementStrategy::Spf => &mut self.spf,
        }
    }

    pub fn geodesic_active_contour(&self) -> &GeodesicActiveContourModule<B, D> {
        &self.gac
    }

    pub fn geodesic_active_contour_mut(&mut self) -> &mut GeodesicActiveContourModule<B, D> {
        &mut self.gac
    }

    pub fn spf(&self) -> &SpfLevelSetModule<B, D> {
        &self.spf
    }

    pub fn spf_mut(&mut self) -> &mut SpfLevelSetModule<B, D> {
        &mut self.spf
    }

    /// Curvature weight of the active strategy.
    pub fn curvature_weight(&self) -> f64 {
        self.refiner().curvature_weight()
    }

    pub fn set_curvature_weight(&mut self, weight: f64) -> Result<()> {
        self.refiner_mut().set_curvature_weight(weight)
    }

    pub fn propagation_weight(&self) -> f64 {
        self.gac.propagation_weight()
    }

    pub fn set_propagation_weight(&mut self, weight: f64) -> Result<()> {
        self.gac.set_propagation_weight(weight)
    }

    pub fn advection_weight(&self) -> f64 {
        self.gac.advection_weight()
    }

    pub fn set_advection_weight(&mut self, weight: f64) -> Result<()> {
        self.gac.set_advection_weight(weight)
    }

    pub fn spf_weight(&self) -> f64 {
        self.spf.spf_weight()
    }

    pub fn set_spf_weight(&mut self, weight: f64) -> Result<()> {
        self.spf.set_spf_weight(weight)
    }

    pub fn max_iterations(&self) -> usize {
        self.refiner().evolution().max_iterations
    }

    /// Iteration cap for both strategies.
    pub fn set_max_iterations(&mut self, iterations: usize) -> Result<()> {
        let gac = crate::level_set::EvolutionParams {
            max_iterations: iterations,
            ..*self.gac.evolution()
        };
        let spf = crate::level_set::EvolutionParams {
            max_iterations: iterations,
            ..*self.spf.evolution()
        };
        gac.validate()?;
        spf.validate()?;
        self.gac.set_evolution(gac)?;
        self.spf.set_evolution(spf)
    }

    pub fn convergence_threshold(&self) -> f64 {
        self.refiner().evolution().convergence_threshold
    }

    /// Convergence threshold for both strategies.
    pub fn set_convergence_threshold(&mut self, threshold: f64) -> Result<()> {
        let gac = crate::level_set::EvolutionParams {
            convergence_threshold: threshold,
            ..*self.gac.evolution()
        };
        let spf = crate::level_set::EvolutionParams {
            convergence_threshold: threshold,
            ..*self.spf.evolution()
        };
        gac.validate()?;
        spf.validate()?;
        self.gac.set_evolution(gac)?;
        self.spf.set_evolution(spf)
    }

    /// Register a progress callback with both refiners.
    pub fn add_progress_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.gac.add_progress_callback(callback.clone());
        self.spf.add_progress_callback(callback);
    }
}
