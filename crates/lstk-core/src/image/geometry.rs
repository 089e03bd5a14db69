//! Grid geometry of an image: lattice shape plus physical placement.
//!
//! Two images can only be combined voxel-by-voxel when they sample the same
//! physical grid. [`ImageGeometry::mismatch`] reports the first difference.

use crate::image::lattice::Lattice;
use crate::spatial::{Point, Spacing, Direction};

/// Absolute tolerance used when comparing origin, spacing and direction.
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Shape, origin, spacing and direction of a sampled grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry<const D: usize> {
    shape: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<const D: usize> ImageGeometry<D> {
    pub fn new(
        shape: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            shape,
            origin,
            spacing,
            direction,
        }
    }

    /// Zero origin, unit spacing, identity direction.
    pub fn from_shape(shape: [usize; D]) -> Self {
        Self::new(shape, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    pub fn with_origin(mut self, origin: Point<D>) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_spacing(mut self, spacing: Spacing<D>) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_direction(mut self, direction: Direction<D>) -> Self {
        self.direction = direction;
        self
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lattice(&self) -> Lattice<D> {
        Lattice::new(self.shape)
    }

    /// Describe the first difference between two grids, or `None` when they match.
    pub fn mismatch(&self, other: &Self) -> Option<String> {
        if self.shape != other.shape {
            return Some(format!("shape {:?} vs {:?}", self.shape, other.shape));
        }
        if !self.spacing.approx_eq(&other.spacing, GEOMETRY_TOLERANCE) {
            return Some(format!(
                "spacing {:?} vs {:?}",
                self.spacing.to_vec(),
                other.spacing.to_vec()
            ));
        }
        if !self.origin.approx_eq(&other.origin, GEOMETRY_TOLERANCE) {
            return Some(format!(
                "origin {:?} vs {:?}",
                self.origin.to_vec(),
                other.origin.to_vec()
            ));
        }
        if !self.direction.approx_eq(&other.direction, GEOMETRY_TOLERANCE) {
            return Some("direction matrices differ".to_string());
        }
        None
    }

    /// True when both geometries describe the same grid.
    pub fn same_grid(&self, other: &Self) -> bool {
        self.mismatch(other).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape_defaults() {
        let g = ImageGeometry::<3>::from_shape([4, 5, 6]);
        assert_eq!(g.len(), 120);
        assert_eq!(g.origin(), &Point::origin());
        assert_eq!(g.spacing(), &Spacing::uniform(1.0));
        assert_eq!(g.direction(), &Direction::identity());
    }

    #[test]
    fn test_mismatch_reports_each_component() {
        let g = ImageGeometry::<2>::from_shape([8, 8]);
        assert!(g.same_grid(&g.clone()));

        let other_shape = ImageGeometry::<2>::from_shape([8, 9]);
        assert!(g.mismatch(&other_shape).unwrap().contains("shape"));

        let other_spacing = g.clone().with_spacing(Spacing::new([1.0, 2.0]));
        assert!(g.mismatch(&other_spacing).unwrap().contains("spacing"));

        let other_origin = g.clone().with_origin(Point::new([0.5, 0.0]));
        assert!(g.mismatch(&other_origin).unwrap().contains("origin"));

        let tiny_shift = g.clone().with_origin(Point::new([1e-9, 0.0]));
        assert!(g.same_grid(&tiny_shift));
    }
}
