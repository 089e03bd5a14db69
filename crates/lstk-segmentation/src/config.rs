//! Serialisable configuration of a whole segmentation run.

use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::fast_marching::FastMarchingParams;
use crate::feature::{GradientMagnitudeParams, VesselnessParams};
use crate::level_set::{GacParams, RefinementStrategy, SpfParams};

/// Parameters of every stage of [`HybridSegmentationModule`].
///
/// Missing sections and fields take their defaults, so a configuration file
/// only needs the values it changes:
///
/// ```json
/// { "fast_marching": { "stopping_value": 20.0 }, "strategy": "Spf" }
/// ```
///
/// `"edges": null` drops the edge term from the built-in feature stage.
///
/// [`HybridSegmentationModule`]: crate::hybrid::HybridSegmentationModule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub feature: VesselnessParams,
    /// Edge-stopping term combined with the vesselness speed map.
    pub edges: Option<GradientMagnitudeParams>,
    pub fast_marching: FastMarchingParams,
    /// Geodesic active contour weights and iteration control.
    pub refinement: GacParams,
    pub spf: SpfParams,
    pub strategy: RefinementStrategy,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            feature: VesselnessParams::default(),
            edges: Some(GradientMagnitudeParams::unit_contrast()),
            fast_marching: FastMarchingParams::default(),
            refinement: GacParams::default(),
            spf: SpfParams::default(),
            strategy: RefinementStrategy::default(),
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        self.feature.validate()?;
        if let Some(edges) = &self.edges {
            edges.validate()?;
        }
        self.fast_marching.validate()?;
        self.refinement.validate()?;
        self.spf.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SegmentationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, RefinementStrategy::GeodesicActiveContour);
        assert_eq!(config.fast_marching.stopping_value, 100.0);
        assert_eq!(config.edges, Some(GradientMagnitudeParams::unit_contrast()));
    }

    #[test]
    fn test_invalid_section_is_reported() {
        let mut config = SegmentationConfig::default();
        config.fast_marching.stopping_value = -1.0;
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = SegmentationConfig::default();
        config.feature.scale_range.steps = 0;
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = SegmentationConfig::default();
        config.edges = Some(GradientMagnitudeParams {
            sigma: -1.0,
            ..GradientMagnitudeParams::unit_contrast()
        });
        assert!(config.validate().unwrap_err().is_configuration());
    }
}
