//! Image substrate for level-set segmentation: images with physical
//! geometry, spatial primitives, lattice indexing and Gaussian smoothing.

pub mod image;
pub mod spatial;
pub mod filter;

pub use image::{Image, ImageGeometry, Lattice};
pub use spatial::{Point, Vector, Spacing, Direction};
pub use filter::GaussianFilter;
