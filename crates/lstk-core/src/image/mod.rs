//! Image types and operations.
//!
//! This module provides the Image type, its grid geometry, and the lattice
//! indexing used by per-voxel algorithms.

pub mod image;
pub mod geometry;
pub mod lattice;

pub use image::Image;
pub use geometry::{ImageGeometry, GEOMETRY_TOLERANCE};
pub use lattice::Lattice;
