//! Seeded lesion segmentation on N-dimensional images.
//!
//! A feature (speed) image is derived from the input, fast marching grows an
//! initial surface from user seeds over it, and a level-set evolution
//! (geodesic active contour or signed pressure force) refines that surface.
//! [`HybridSegmentationModule`] chains the stages and recomputes only what a
//! parameter change invalidates.

pub mod error;
pub mod validation;
pub mod progress;
pub mod pipeline;
pub mod seeds;
pub mod feature;
pub mod fast_marching;
pub mod level_set;
pub mod hybrid;
pub mod config;

pub use error::{SegmentationError, Result};
pub use validation::ConvergenceChecker;
pub use progress::{ProgressCallback, ProgressTracker, ConsoleProgressCallback, HistoryCallback, ProgressInfo};
pub use pipeline::Stamp;
pub use seeds::SeedSet;
pub use feature::{
    FeatureGenerator, GradientMagnitudeParams, GradientMagnitudeSigmoidFeatureGenerator, LesionFeatureGenerator,
    MinimumFeatureAggregator, ScaleRange, Sigmoid, VesselnessFeatureGenerator, VesselnessParams,
};
pub use fast_marching::{FastMarchingModule, FastMarchingParams};
pub use level_set::{
    EvolutionParams, GacParams, GeodesicActiveContourModule, LevelSetRefiner, RefinementStatus, RefinementStrategy,
    SpfLevelSetModule, SpfParams,
};
pub use hybrid::{HybridSegmentationModule, SegmentationState};
pub use config::SegmentationConfig;
