//! Multiscale Sato vesselness followed by a sigmoid remap.

use burn::tensor::backend::Backend;
use lstk_core::{GaussianFilter, Image};
use serde::{Serialize, Deserialize};

use super::{FeatureGenerator, FeatureStage, HessianAnalysis, SatoMeasure, Sigmoid};
use crate::error::Result;
use crate::pipeline::Stamp;
use crate::validation::{validate_dimension, validate_positive, validate_scale_range, validate_sigmoid};

/// Range of Gaussian scales (physical units) for multiscale analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    pub minimum: f64,
    pub maximum: f64,
    pub steps: usize,
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self {
            minimum: 1.0,
            maximum: 1.0,
            steps: 1,
        }
    }
}

impl ScaleRange {
    pub fn new(minimum: f64, maximum: f64, steps: usize) -> Result<Self> {
        validate_scale_range(minimum, maximum, steps)?;
        Ok(Self { minimum, maximum, steps })
    }

    pub fn validate(&self) -> Result<()> {
        validate_scale_range(self.minimum, self.maximum, self.steps)
    }

    /// Logarithmically spaced scales from `minimum` to `maximum` inclusive.
    pub fn sigmas(&self) -> Vec<f64> {
        if self.steps <= 1 {
            return vec![self.minimum];
        }
        let ratio = self.maximum / self.minimum;
        let last = (self.steps - 1) as f64;
        (0..self.steps)
            .map(|k| {
                if k + 1 == self.steps {
                    self.maximum
                } else {
                    self.minimum * ratio.powf(k as f64 / last)
                }
            })
            .collect()
    }
}

/// Parameters of [`VesselnessFeatureGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselnessParams {
    pub scale_range: ScaleRange,
    pub sigmoid_alpha: f64,
    pub sigmoid_beta: f64,
    pub alpha1: f64,
    pub alpha2: f64,
    pub bright_object: bool,
}

impl Default for VesselnessParams {
    fn default() -> Self {
        let sato = SatoMeasure::default();
        Self {
            scale_range: ScaleRange::default(),
            sigmoid_alpha: -0.1,
            sigmoid_beta: 0.5,
            alpha1: sato.alpha1,
            alpha2: sato.alpha2,
            bright_object: sato.bright_object,
        }
    }
}

impl VesselnessParams {
    pub fn validate(&self) -> Result<()> {
        self.scale_range.validate()?;
        validate_sigmoid(self.sigmoid_alpha, self.sigmoid_beta)?;
        validate_positive("alpha1", self.alpha1)?;
        validate_positive("alpha2", self.alpha2)?;
        Ok(())
    }

    fn sato(&self) -> SatoMeasure {
        SatoMeasure {
            alpha1: self.alpha1,
            alpha2: self.alpha2,
            bright_object: self.bright_object,
        }
    }
}

/// Speed map from tubular structure: Sato vesselness (max over scales)
/// remapped by a sigmoid.
///
/// A negative `sigmoid_alpha` turns vessels into slow regions so fronts do
/// not leak along them.
#[derive(Debug, Clone)]
pub struct VesselnessFeatureGenerator<B: Backend, const D: usize> {
    params: VesselnessParams,
    stage: FeatureStage<B, D>,
}

impl<B: Backend, const D: usize> Default for VesselnessFeatureGenerator<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> VesselnessFeatureGenerator<B, D> {
    pub fn new() -> Self {
        Self {
            params: VesselnessParams::default(),
            stage: FeatureStage::new(),
        }
    }

    /// Generator with validated parameters.
    pub fn with_params(params: VesselnessParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            stage: FeatureStage::new(),
        })
    }

    pub fn params(&self) -> &VesselnessParams {
        &self.params
    }

    /// Replace all parameters at once.
    pub fn set_params(&mut self, params: VesselnessParams) -> Result<()> {
        params.validate()?;
        if params != self.params {
            self.params = params;
            self.stage.touch();
        }
        Ok(())
    }

    fn modify(&mut self, change: impl FnOnce(&mut VesselnessParams)) -> Result<()> {
        let mut params = self.params;
        change(&mut params);
        self.set_params(params)
    }

    pub fn sigmoid_alpha(&self) -> f64 {
        self.params.sigmoid_alpha
    }

    pub fn set_sigmoid_alpha(&mut self, alpha: f64) -> Result<()> {
        self.modify(|p| p.sigmoid_alpha = alpha)
    }

    pub fn sigmoid_beta(&self) -> f64 {
        self.params.sigmoid_beta
    }

    pub fn set_sigmoid_beta(&mut self, beta: f64) -> Result<()> {
        self.modify(|p| p.sigmoid_beta = beta)
    }

    pub fn scale_range(&self) -> ScaleRange {
        self.params.scale_range
    }

    pub fn set_scale_range(&mut self, minimum: f64, maximum: f64, steps: usize) -> Result<()> {
        let range = ScaleRange::new(minimum, maximum, steps)?;
        self.modify(|p| p.scale_range = range)
    }

    pub fn set_sato_coefficients(&mut self, alpha1: f64, alpha2: f64) -> Result<()> {
        self.modify(|p| {
            p.alpha1 = alpha1;
            p.alpha2 = alpha2;
        })
    }

    pub fn set_bright_object(&mut self, bright: bool) -> Result<()> {
        self.modify(|p| p.bright_object = bright)
    }

    /// Per-voxel maximum Sato response over all scales, before the sigmoid.
    pub fn compute_vesselness(&self, image: &Image<B, D>) -> Result<Vec<f64>> {
        vesselness_response(&self.params, image)
    }
}

fn vesselness_response<B: Backend, const D: usize>(
    params: &VesselnessParams,
    image: &Image<B, D>,
) -> Result<Vec<f64>> {
    validate_dimension(D, 2)?;
    params.validate()?;

    let sato = params.sato();
    let analysis = HessianAnalysis::new(image.geometry().lattice(), image.spacing());
    let mut best: Option<Vec<f64>> = None;

    for sigma in params.scale_range.sigmas() {
        tracing::debug!("vesselness: scale sigma = {:.4}", sigma);
        let smoothed = GaussianFilter::<B>::isotropic(sigma).apply(image).to_voxels();
        let response = analysis.sato_response(&smoothed, &sato, sigma * sigma);
        best = Some(match best {
            None => response,
            Some(mut acc) => {
                for (a, r) in acc.iter_mut().zip(response) {
                    if r > *a {
                        *a = r;
                    }
                }
                acc
            }
        });
    }

    Ok(best.unwrap_or_else(|| vec![0.0; image.geometry().len()]))
}

impl<B: Backend, const D: usize> FeatureGenerator<B, D> for VesselnessFeatureGenerator<B, D> {
    fn name(&self) -> &'static str {
        "vesselness"
    }

    fn set_input(&mut self, image: Image<B, D>) {
        self.stage.set_input(image);
    }

    fn update(&mut self) -> Result<()> {
        validate_dimension(D, 2)?;
        self.params.validate()?;
        let params = self.params;
        self.stage.run("vesselness", move |image| {
            let mut values = vesselness_response(&params, image)?;
            Sigmoid::new(params.sigmoid_alpha, params.sigmoid_beta)?.apply_as_speed(&mut values);
            Ok(image.with_voxels(&values))
        })
    }

    fn output(&self) -> Option<&Image<B, D>> {
        self.stage.output()
    }

    fn output_stamp(&self) -> Option<Stamp> {
        self.stage.output_stamp()
    }

    fn is_dirty(&self) -> bool {
        self.stage.is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use lstk_core::ImageGeometry;

    type Backend = NdArray<f32>;

    fn tube_image() -> Image<Backend, 2> {
        // bright horizontal line of width 3 across a 21x21 image
        let geometry = ImageGeometry::<2>::from_shape([21, 21]);
        let lattice = geometry.lattice();
        let values: Vec<f64> = (0..lattice.len())
            .map(|o| if (lattice.index(o)[0] as i64 - 10).abs() <= 1 { 1.0 } else { 0.0 })
            .collect();
        Image::from_voxels(&values, &geometry, &Default::default())
    }

    #[test]
    fn test_scale_range_sigmas() {
        let single = ScaleRange::new(1.5, 4.0, 1).unwrap();
        assert_eq!(single.sigmas(), vec![1.5]);

        let range = ScaleRange::new(1.0, 4.0, 3).unwrap();
        let sigmas = range.sigmas();
        assert_eq!(sigmas.len(), 3);
        assert!((sigmas[0] - 1.0).abs() < 1e-12);
        assert!((sigmas[1] - 2.0).abs() < 1e-12);
        assert_eq!(sigmas[2], 4.0);
    }

    #[test]
    fn test_vesselness_peaks_on_tube_axis() {
        let generator = VesselnessFeatureGenerator::<Backend, 2>::new();
        let image = tube_image();
        let lattice = image.geometry().lattice();
        let v = generator.compute_vesselness(&image).unwrap();
        let on_axis = v[lattice.offset([10, 10])];
        let off_axis = v[lattice.offset([3, 10])];
        assert!(on_axis > 0.1, "on-axis response {}", on_axis);
        assert!(on_axis > 10.0 * off_axis);
    }

    #[test]
    fn test_negative_alpha_slows_tube() {
        let mut generator = VesselnessFeatureGenerator::<Backend, 2>::new();
        generator.set_sigmoid_alpha(-0.05).unwrap();
        generator.set_sigmoid_beta(0.1).unwrap();
        generator.set_input(tube_image());
        generator.update().unwrap();

        let feature = generator.output().unwrap().to_voxels();
        let lattice = lstk_core::Lattice::new([21, 21]);
        assert!(feature[lattice.offset([10, 10])] < 0.5);
        assert!(feature[lattice.offset([3, 10])] > 0.5);
        assert!(feature.iter().all(|&f| f > 0.0 && f < 1.0));
    }

    #[test]
    fn test_invalid_parameters_rejected_without_touching_state() {
        let mut generator = VesselnessFeatureGenerator::<Backend, 2>::new();
        assert!(generator.set_sigmoid_alpha(0.0).unwrap_err().is_configuration());
        assert!(generator.set_scale_range(3.0, 1.0, 2).unwrap_err().is_configuration());
        assert_eq!(generator.params(), &VesselnessParams::default());
    }

    #[test]
    fn test_update_without_input_is_missing_input() {
        let mut generator = VesselnessFeatureGenerator::<Backend, 2>::new();
        let err = generator.update().unwrap_err();
        assert!(matches!(err, crate::error::SegmentationError::MissingInput(_)));
    }

    #[test]
    fn test_one_dimensional_input_rejected() {
        let mut generator = VesselnessFeatureGenerator::<Backend, 1>::new();
        let geometry = ImageGeometry::<1>::from_shape([8]);
        generator.set_input(Image::from_voxels(&[0.0; 8], &geometry, &Default::default()));
        assert!(generator.update().unwrap_err().is_domain_violation());
    }

    #[test]
    fn test_same_value_setter_keeps_cache() {
        let mut generator = VesselnessFeatureGenerator::<Backend, 2>::new();
        generator.set_input(tube_image());
        generator.update().unwrap();
        let stamp = generator.output_stamp();

        let beta = generator.sigmoid_beta();
        generator.set_sigmoid_beta(beta).unwrap();
        assert!(!generator.is_dirty());

        generator.set_sigmoid_beta(beta + 0.1).unwrap();
        assert!(generator.is_dirty());
        generator.update().unwrap();
        assert_ne!(generator.output_stamp(), stamp);
    }
}
