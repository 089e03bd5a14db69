use burn::tensor::{Tensor, Shape};
use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use crate::image::Image;
use crate::spatial::Spacing;

/// Gaussian smoothing filter.
///
/// Separable 1D convolutions along every axis, with sigma given in physical
/// units so anisotropic spacing is honoured. Borders use normalised
/// convolution: the zero-padded result is divided by the response of a unit
/// image, which keeps constant regions constant right up to the edge.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a new Gaussian filter with a standard deviation per axis
    /// (physical units). Missing axes reuse the first sigma.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 129,
            _b: std::marker::PhantomData,
        }
    }

    /// Same sigma on every axis.
    pub fn isotropic(sigma: f64) -> Self {
        Self::new(vec![sigma])
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let data = self.apply_tensor(image.data().clone(), image.spacing());
        Image::new(data, *image.origin(), *image.spacing(), *image.direction())
    }

    /// Apply the filter to a tensor directly.
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let device = input.device();
        let mut data = input.clone();
        let mut weights = Tensor::<B, D>::ones_like(&input);
        let mut smoothed_any = false;

        for d in 0..D {
            let sigma = self.sigma_for_axis(d);
            if sigma <= 1e-6 || input.dims()[d] < 2 {
                continue;
            }

            let pixel_sigma = sigma / spacing[d];
            let radius = (3.0 * pixel_sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width | 1);
            let actual_radius = (width - 1) / 2;
            if actual_radius == 0 {
                continue;
            }

            let kernel = Self::generate_kernel(pixel_sigma, actual_radius);
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);

            data = Self::convolve_1d::<D>(data, kernel_tensor.clone(), d);
            weights = Self::convolve_1d::<D>(weights, kernel_tensor, d);
            smoothed_any = true;
        }

        if smoothed_any {
            data / weights
        } else {
            data
        }
    }

    fn sigma_for_axis(&self, axis: usize) -> f64 {
        self.sigmas
            .get(axis)
            .or_else(|| self.sigmas.first())
            .copied()
            .unwrap_or(0.0)
    }

    fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
        let two_sigma2 = 2.0 * sigma * sigma;
        let raw: Vec<f64> = (0..=(2 * radius))
            .map(|i| {
                let x = i as f64 - radius as f64;
                (-x * x / two_sigma2).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|v| (v / sum) as f32).collect()
    }

    /// Zero-padded 1D convolution along `dim`.
    fn convolve_1d<const D: usize>(input: Tensor<B, D>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, D> {
        let dims: [usize; D] = input.dims();

        // Move the target axis last and fold the others into the batch.
        let mut permute_indices = [0isize; D];
        let mut idx = 0;
        for i in 0..D {
            if i != dim {
                permute_indices[idx] = i as isize;
                idx += 1;
            }
        }
        permute_indices[D - 1] = dim as isize;

        let length = dims[dim];
        let batch_size: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();

        let input_reshaped = input.permute(permute_indices).reshape([batch_size, 1, length]);

        let kernel_size = kernel.dims()[0];
        let kernel_reshaped = kernel.reshape([1, 1, kernel_size]);

        let options = ConvOptions::new([1], [kernel_size / 2], [1], 1);
        let output = burn::tensor::module::conv1d(input_reshaped, kernel_reshaped, None, options);

        let mut permuted_shape = [0usize; D];
        for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
            permuted_shape[new_pos] = dims[old_pos as usize];
        }
        let output_permuted = output.reshape(Shape::new(permuted_shape));

        let mut inv_permute_indices = [0isize; D];
        for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
            inv_permute_indices[old_pos as usize] = new_pos as isize;
        }
        output_permuted.permute(inv_permute_indices)
    }
}
