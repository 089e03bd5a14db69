//! Level-set refinement of an initial surface.
//!
//! Both refiners evolve a dense signed-distance field over the feature
//! image's grid and share the same contract: an initial surface and a
//! feature image in, a refined surface and a [`RefinementStatus`] out.

pub mod stencil;
pub mod reinit;
pub mod energy;
pub mod evolution;
pub mod gac;
pub mod spf;

pub use stencil::Stencil;
pub use reinit::reinitialize;
pub use energy::{curvature_energy, interface_voxels};
pub use evolution::EvolutionParams;
pub use gac::{GeodesicActiveContourModule, GacParams};
pub use spf::{SpfLevelSetModule, SpfParams};

use std::sync::Arc;

use burn::tensor::backend::Backend;
use lstk_core::Image;
use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::pipeline::Stamp;
use crate::progress::ProgressCallback;

/// How a refinement run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefinementStatus {
    /// RMS change fell below the convergence threshold.
    Converged { iterations: usize, rms_change: f64 },
    /// The iteration cap was hit first; the surface is best effort.
    IterationLimitReached { iterations: usize, rms_change: f64 },
    /// The zero level left the grid: the output is all inside or all
    /// outside. `rms_change` is the last measured value (infinite when there
    /// was no interface to measure).
    NoInterface { iterations: usize, rms_change: f64 },
}

impl RefinementStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn iterations(&self) -> usize {
        match self {
            Self::Converged { iterations, .. }
            | Self::IterationLimitReached { iterations, .. }
            | Self::NoInterface { iterations, .. } => *iterations,
        }
    }

    pub fn rms_change(&self) -> f64 {
        match self {
            Self::Converged { rms_change, .. }
            | Self::IterationLimitReached { rms_change, .. }
            | Self::NoInterface { rms_change, .. } => *rms_change,
        }
    }
}

/// Which evolution law refines the initial surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefinementStrategy {
    #[default]
    GeodesicActiveContour,
    Spf,
}

/// Common interface of the refinement modules.
pub trait LevelSetRefiner<B: Backend, const D: usize>: Send {
    fn name(&self) -> &'static str;

    fn set_initial_surface(&mut self, surface: Image<B, D>);

    fn set_feature_image(&mut self, feature: Image<B, D>);

    /// Connect upstream outputs by stamp; unchanged stamps are no-ops.
    fn connect_inputs(
        &mut self,
        surface: &Image<B, D>,
        surface_stamp: Stamp,
        feature: &Image<B, D>,
        feature_stamp: Stamp,
    );

    /// Stamps of the connected initial surface and feature image.
    fn input_stamps(&self) -> (Option<Stamp>, Option<Stamp>);

    /// Refine if stale.
    fn update(&mut self) -> Result<()>;

    fn output(&self) -> Option<&Image<B, D>>;

    fn output_stamp(&self) -> Option<Stamp>;

    fn status(&self) -> Option<RefinementStatus>;

    fn is_dirty(&self) -> bool;

    fn add_progress_callback(&mut self, callback: Arc<dyn ProgressCallback>);

    fn evolution(&self) -> &EvolutionParams;

    fn set_evolution(&mut self, evolution: EvolutionParams) -> Result<()>;

    fn curvature_weight(&self) -> f64;

    fn set_curvature_weight(&mut self, weight: f64) -> Result<()>;
}
