//! Default lesion speed map.
//!
//! Sato vesselness alone is close to zero on a blob, so its speed map lets a
//! front run straight through a lesion boundary. The lesion stage takes the
//! voxel-wise minimum with a gradient-magnitude edge term, which keeps
//! vessels slow and makes the lesion boundary a slow shell.

use burn::tensor::backend::Backend;
use lstk_core::Image;

use super::aggregator::voxelwise_minimum;
use super::{FeatureGenerator, GradientMagnitudeParams, GradientMagnitudeSigmoidFeatureGenerator, VesselnessFeatureGenerator};
use crate::error::{SegmentationError, Result};
use crate::pipeline::{self, Cached, Dependencies, Stamp};

/// Vesselness speed map, optionally limited by an edge-stopping term.
#[derive(Debug, Clone)]
pub struct LesionFeatureGenerator<B: Backend, const D: usize> {
    input: Option<Image<B, D>>,
    vesselness: VesselnessFeatureGenerator<B, D>,
    edges: Option<GradientMagnitudeSigmoidFeatureGenerator<B, D>>,
    cache: Option<Cached<Image<B, D>>>,
}

impl<B: Backend, const D: usize> Default for LesionFeatureGenerator<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> LesionFeatureGenerator<B, D> {
    /// Default vesselness and an edge term for intensities in `[0, 1]`.
    pub fn new() -> Self {
        Self {
            input: None,
            vesselness: VesselnessFeatureGenerator::new(),
            edges: Some(GradientMagnitudeSigmoidFeatureGenerator::unit_contrast()),
            cache: None,
        }
    }

    /// Vesselness only, without the edge term.
    pub fn vesselness_only() -> Self {
        Self {
            edges: None,
            ..Self::new()
        }
    }

    pub fn vesselness(&self) -> &VesselnessFeatureGenerator<B, D> {
        &self.vesselness
    }

    pub fn vesselness_mut(&mut self) -> &mut VesselnessFeatureGenerator<B, D> {
        &mut self.vesselness
    }

    pub fn edges(&self) -> Option<&GradientMagnitudeSigmoidFeatureGenerator<B, D>> {
        self.edges.as_ref()
    }

    pub fn edge_params(&self) -> Option<GradientMagnitudeParams> {
        self.edges.as_ref().map(|g| *g.params())
    }

    /// Enable, retune or (`None`) drop the edge term.
    pub fn set_edge_params(&mut self, params: Option<GradientMagnitudeParams>) -> Result<()> {
        let Some(params) = params else {
            if self.edges.take().is_some() {
                tracing::debug!("lesion-features: edge term disabled");
            }
            return Ok(());
        };
        if let Some(edges) = &mut self.edges {
            return edges.set_params(params);
        }
        let mut generator = GradientMagnitudeSigmoidFeatureGenerator::with_params(params)?;
        if let Some(image) = &self.input {
            generator.set_input(image.clone());
        }
        tracing::debug!("lesion-features: edge term enabled");
        self.edges = Some(generator);
        Ok(())
    }

    fn dependencies(&self) -> Option<Dependencies> {
        let mut stamps = vec![self.vesselness.output_stamp()?];
        if let Some(edges) = &self.edges {
            stamps.push(edges.output_stamp()?);
        }
        Some(Dependencies::new(stamps))
    }
}

impl<B: Backend, const D: usize> FeatureGenerator<B, D> for LesionFeatureGenerator<B, D> {
    fn name(&self) -> &'static str {
        "lesion-features"
    }

    fn set_input(&mut self, image: Image<B, D>) {
        self.vesselness.set_input(image.clone());
        if let Some(edges) = &mut self.edges {
            edges.set_input(image.clone());
        }
        self.input = Some(image);
    }

    fn update(&mut self) -> Result<()> {
        self.vesselness.update()?;
        if let Some(edges) = &mut self.edges {
            edges.update()?;
        }

        let deps = self
            .dependencies()
            .ok_or_else(|| SegmentationError::missing_input("lesion-features: a member produced no output"))?;
        if pipeline::current(&self.cache, &deps).is_some() {
            return Ok(());
        }

        let outputs = std::iter::once(self.vesselness.output())
            .chain(self.edges.iter().map(|g| g.output()))
            .flatten();
        let combined = voxelwise_minimum(outputs)?;
        tracing::info!(
            "lesion-features: combined vesselness{}",
            if self.edges.is_some() { " and edge term" } else { "" }
        );
        self.cache = Some(Cached::new(combined, deps));
        Ok(())
    }

    fn output(&self) -> Option<&Image<B, D>> {
        self.cache.as_ref().map(|c| c.value())
    }

    fn output_stamp(&self) -> Option<Stamp> {
        self.cache.as_ref().map(|c| c.stamp())
    }

    fn is_dirty(&self) -> bool {
        if self.vesselness.is_dirty() || self.edges.as_ref().is_some_and(|g| g.is_dirty()) {
            return true;
        }
        match self.dependencies() {
            Some(deps) => pipeline::current(&self.cache, &deps).is_none(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use lstk_core::ImageGeometry;

    type Backend = NdArray<f32>;

    fn blob() -> Image<Backend, 2> {
        let geometry = ImageGeometry::<2>::from_shape([24, 24]);
        let lattice = geometry.lattice();
        let values: Vec<f64> = (0..lattice.len())
            .map(|o| {
                let i = lattice.index(o);
                let r2 = (i[0] as f64 - 12.0).powi(2) + (i[1] as f64 - 12.0).powi(2);
                if r2 <= 36.0 { 1.0 } else { 0.0 }
            })
            .collect();
        Image::from_voxels(&values, &geometry, &Default::default())
    }

    #[test]
    fn test_blob_boundary_is_slow() {
        let mut lesion = LesionFeatureGenerator::<Backend, 2>::new();
        lesion.set_input(blob());
        lesion.update().unwrap();
        let feature = lesion.output().unwrap().to_voxels();
        let lattice = lstk_core::Lattice::new([24, 24]);

        assert!(feature[lattice.offset([12, 12])] > 0.9);
        assert!(feature[lattice.offset([2, 2])] > 0.9);
        let boundary = feature[lattice.offset([12, 18])].min(feature[lattice.offset([12, 19])]);
        assert!(boundary < 0.1, "boundary speed {}", boundary);

        let mut plain = LesionFeatureGenerator::<Backend, 2>::vesselness_only();
        plain.set_input(blob());
        plain.update().unwrap();
        let plain = plain.output().unwrap().to_voxels();
        assert!(plain[lattice.offset([12, 18])] > 0.9);
    }

    #[test]
    fn test_toggling_edge_term_recomputes() {
        let mut lesion = LesionFeatureGenerator::<Backend, 2>::new();
        lesion.set_input(blob());
        lesion.update().unwrap();
        let stamp = lesion.output_stamp();
        let vesselness_stamp = lesion.vesselness().output_stamp();

        lesion.set_edge_params(None).unwrap();
        assert!(lesion.is_dirty());
        lesion.update().unwrap();
        assert_ne!(lesion.output_stamp(), stamp);
        assert_eq!(lesion.vesselness().output_stamp(), vesselness_stamp);
        assert_eq!(lesion.output().unwrap().to_voxels(), lesion.vesselness().output().unwrap().to_voxels());

        // re-enabled term picks up the stored input
        lesion.set_edge_params(Some(GradientMagnitudeParams::unit_contrast())).unwrap();
        assert!(lesion.is_dirty());
        lesion.update().unwrap();
        assert!(!lesion.is_dirty());
        assert!(lesion.edges().unwrap().output().is_some());
    }

    #[test]
    fn test_invalid_edge_params_keep_state() {
        let mut lesion = LesionFeatureGenerator::<Backend, 2>::new();
        let bad = GradientMagnitudeParams {
            sigmoid_alpha: 0.0,
            ..GradientMagnitudeParams::unit_contrast()
        };
        assert!(lesion.set_edge_params(Some(bad)).unwrap_err().is_configuration());
        assert_eq!(lesion.edge_params(), Some(GradientMagnitudeParams::unit_contrast()));

        let mut plain = LesionFeatureGenerator::<Backend, 2>::vesselness_only();
        assert!(plain.set_edge_params(Some(bad)).is_err());
        assert!(plain.edges().is_none());
    }
}
