//! Spatial types for representing points, vectors, spacing, and direction matrices.
//!
//! All types are thin wrappers around nalgebra. Component `i` of a point,
//! vector or spacing pairs with tensor axis `i` of an image.

pub mod point;
pub mod vector;
pub mod spacing;
pub mod direction;

pub use point::Point;
pub use vector::Vector;
pub use spacing::Spacing;
pub use direction::Direction;

/// Volumetric aliases.
pub type Point3 = Point<3>;
pub type Spacing3 = Spacing<3>;
pub type Direction3 = Direction<3>;
