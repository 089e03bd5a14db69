//! Voxel-wise minimum of several speed maps.

use burn::tensor::backend::Backend;
use lstk_core::Image;

use super::FeatureGenerator;
use crate::error::{SegmentationError, Result};
use crate::pipeline::{self, Cached, Dependencies, Stamp};
use crate::validation::validate_same_grid;

/// Voxel-wise minimum of `images`, which must share one grid.
pub(crate) fn voxelwise_minimum<'a, B: Backend, const D: usize>(
    mut images: impl Iterator<Item = &'a Image<B, D>>,
) -> Result<Image<B, D>> {
    let first = images
        .next()
        .ok_or_else(|| SegmentationError::missing_input("a feature generator produced no output"))?;
    let geometry = first.geometry();
    let mut minimum = first.to_voxels();
    for image in images {
        validate_same_grid(&geometry, &image.geometry(), "aggregated feature")?;
        for (m, v) in minimum.iter_mut().zip(image.to_voxels()) {
            if v < *m {
                *m = v;
            }
        }
    }
    Ok(first.with_voxels(&minimum))
}

/// Combines several feature generators fed with the same image. A voxel is
/// only as fast as its slowest feature.
pub struct MinimumFeatureAggregator<B: Backend, const D: usize> {
    generators: Vec<Box<dyn FeatureGenerator<B, D>>>,
    cache: Option<Cached<Image<B, D>>>,
}

impl<B: Backend, const D: usize> std::fmt::Debug for MinimumFeatureAggregator<B, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinimumFeatureAggregator")
            .field("generators", &self.generators.iter().map(|g| g.name()).collect::<Vec<_>>())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl<B: Backend, const D: usize> Default for MinimumFeatureAggregator<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> MinimumFeatureAggregator<B, D> {
    pub fn new() -> Self {
        Self {
            generators: Vec::new(),
            cache: None,
        }
    }

    /// Builder-style [`add_generator`](Self::add_generator).
    pub fn with_generator(mut self, generator: Box<dyn FeatureGenerator<B, D>>) -> Self {
        self.add_generator(generator);
        self
    }

    pub fn add_generator(&mut self, generator: Box<dyn FeatureGenerator<B, D>>) {
        self.generators.push(generator);
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    fn dependencies(&self) -> Option<Dependencies> {
        self.generators
            .iter()
            .map(|g| g.output_stamp())
            .collect::<Option<Vec<_>>>()
            .map(Dependencies::new)
    }
}

impl<B: Backend, const D: usize> FeatureGenerator<B, D> for MinimumFeatureAggregator<B, D> {
    fn name(&self) -> &'static str {
        "minimum-aggregator"
    }

    fn set_input(&mut self, image: Image<B, D>) {
        for generator in self.generators.iter_mut() {
            generator.set_input(image.clone());
        }
    }

    fn update(&mut self) -> Result<()> {
        if self.generators.is_empty() {
            return Err(SegmentationError::invalid_configuration(
                "minimum aggregator has no feature generators",
            ));
        }
        for generator in self.generators.iter_mut() {
            generator.update()?;
        }

        let deps = self
            .dependencies()
            .ok_or_else(|| SegmentationError::missing_input("a feature generator produced no output"))?;
        if pipeline::current(&self.cache, &deps).is_some() {
            return Ok(());
        }

        let combined = voxelwise_minimum(self.generators.iter().filter_map(|g| g.output()))?;
        tracing::info!(
            "minimum-aggregator: combined {} feature images",
            self.generators.len()
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
        if self.generators.iter().any(|g| g.is_dirty()) {
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
    use crate::feature::{GradientMagnitudeSigmoidFeatureGenerator, VesselnessFeatureGenerator};
    use burn_ndarray::NdArray;
    use lstk_core::ImageGeometry;

    type Backend = NdArray<f32>;

    fn image() -> Image<Backend, 2> {
        let geometry = ImageGeometry::<2>::from_shape([16, 16]);
        let lattice = geometry.lattice();
        let values: Vec<f64> = (0..lattice.len())
            .map(|o| {
                let i = lattice.index(o);
                let r2 = (i[0] as f64 - 8.0).powi(2) + (i[1] as f64 - 8.0).powi(2);
                if r2 <= 16.0 { 1.0 } else { 0.0 }
            })
            .collect();
        Image::from_voxels(&values, &geometry, &Default::default())
    }

    #[test]
    fn test_empty_aggregator_is_configuration_error() {
        let mut aggregator = MinimumFeatureAggregator::<Backend, 2>::new();
        aggregator.set_input(image());
        assert!(aggregator.update().unwrap_err().is_configuration());
    }

    #[test]
    fn test_minimum_of_members() {
        let mut vesselness = VesselnessFeatureGenerator::<Backend, 2>::new();
        let mut gradient = GradientMagnitudeSigmoidFeatureGenerator::<Backend, 2>::new();
        gradient.set_sigmoid(-0.05, 0.2).unwrap();
        vesselness.set_input(image());
        gradient.set_input(image());
        vesselness.update().unwrap();
        gradient.update().unwrap();
        let a = vesselness.output().unwrap().to_voxels();
        let b = gradient.output().unwrap().to_voxels();

        let mut aggregator = MinimumFeatureAggregator::new()
            .with_generator(Box::new(VesselnessFeatureGenerator::<Backend, 2>::new()))
            .with_generator(Box::new(gradient.clone()));
        assert_eq!(aggregator.len(), 2);
        aggregator.set_input(image());
        assert!(aggregator.is_dirty());
        aggregator.update().unwrap();
        assert!(!aggregator.is_dirty());

        let combined = aggregator.output().unwrap().to_voxels();
        for ((c, x), y) in combined.iter().zip(&a).zip(&b) {
            assert!((c - x.min(*y)).abs() < 1e-6);
        }

        let stamp = aggregator.output_stamp();
        aggregator.update().unwrap();
        assert_eq!(aggregator.output_stamp(), stamp);
    }
}
