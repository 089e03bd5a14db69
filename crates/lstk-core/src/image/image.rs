//! Image type with physical metadata and coordinate transformations.
//!
//! An [`Image`] couples a burn tensor with origin, spacing and direction.
//! Per-voxel algorithms pull the samples into a flat row-major buffer with
//! [`Image::to_voxels`], work on it with a [`Lattice`](super::Lattice), and
//! wrap the result back on the same grid with [`Image::with_voxels`].

use burn::tensor::{Tensor, TensorData};
use burn::tensor::backend::Backend;
use crate::image::geometry::ImageGeometry;
use crate::spatial::{Point, Spacing, Direction, Vector};

/// Medical image with physical metadata.
///
/// # Type Parameters
/// * `B` - The backend (CPU or GPU) for tensor operations
/// * `D` - The dimensionality of the image
///
/// # Coordinate Systems
/// * **Index Space**: discrete sample indices; tensor axis `i` is index component `i`
/// * **Physical Space**: continuous coordinates in mm or other units
///
/// # Examples
/// ```rust
/// use lstk_core::Image;
/// use lstk_core::spatial::{Point3, Spacing3, Direction3};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let image = Image::new(data, Point3::origin(), Spacing3::uniform(1.0), Direction3::identity());
/// assert_eq!(image.shape(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    /// The pixel data, potentially on GPU.
    data: Tensor<B, D>,
    /// Physical coordinate of the first pixel.
    origin: Point<D>,
    /// Physical distance between pixels along each axis.
    spacing: Spacing<D>,
    /// Orientation of the image axes.
    direction: Direction<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and metadata.
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
        }
    }

    /// Build an image from a flat row-major sample buffer.
    ///
    /// `values.len()` must equal `geometry.len()`.
    pub fn from_voxels(values: &[f64], geometry: &ImageGeometry<D>, device: &B::Device) -> Self {
        debug_assert_eq!(values.len(), geometry.len());
        let samples: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        let data = Tensor::<B, D>::from_data(TensorData::new(samples, geometry.shape()), device);
        Self::new(
            data,
            *geometry.origin(),
            *geometry.spacing(),
            *geometry.direction(),
        )
    }

    /// New image on the same grid and device holding `values`.
    pub fn with_voxels(&self, values: &[f64]) -> Self {
        Self::from_voxels(values, &self.geometry(), &self.device())
    }

    /// Copy the samples into a flat row-major buffer.
    pub fn to_voxels(&self) -> Vec<f64> {
        self.data
            .clone()
            .into_data()
            .iter::<f64>()
            .collect()
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Get the origin (physical coordinate of first pixel).
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Get the spacing (physical distance between pixels).
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Get the direction (orientation matrix).
    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Get the image shape as an array.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Grid description of this image.
    pub fn geometry(&self) -> ImageGeometry<D> {
        ImageGeometry::new(self.shape(), self.origin, self.spacing, self.direction)
    }

    /// Convert a continuous physical point to a continuous index.
    ///
    /// `index = (Direction^-1 * (point - origin)) / spacing`. Returns `None`
    /// when the direction matrix is singular.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Option<Point<D>> {
        let inv_dir = self.direction.try_inverse()?;
        let rotated = inv_dir * (*point - self.origin);

        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = rotated[i] / self.spacing[i];
        }
        Some(index)
    }

    /// Convert a continuous index to a physical point.
    ///
    /// `point = origin + Direction * (index * spacing)`
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let mut scaled_index = Vector::<D>::zeros();
        for i in 0..D {
            scaled_index[i] = index[i] * self.spacing[i];
        }
        self.origin + self.direction * scaled_index
    }

    /// Nearest grid index of a physical point, or `None` when it falls outside
    /// the lattice (or the direction is singular).
    pub fn physical_point_to_index(&self, point: &Point<D>) -> Option<[usize; D]> {
        let continuous = self.transform_physical_point_to_continuous_index(point)?;
        let shape = self.shape();
        let mut index = [0usize; D];
        for i in 0..D {
            let rounded = continuous[i].round();
            if !rounded.is_finite() || rounded < 0.0 || rounded >= shape[i] as f64 {
                return None;
            }
            index[i] = rounded as usize;
        }
        Some(index)
    }
}
