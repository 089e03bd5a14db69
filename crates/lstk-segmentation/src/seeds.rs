//! Seed point sets marking approximate interior locations of a structure.

use lstk_core::{Image, ImageGeometry, Point};
use burn::tensor::backend::Backend;
use serde::{Serialize, Deserialize};
use crate::error::{SegmentationError, Result};

/// Ordered collection of physical seed points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeedSet<const D: usize> {
    points: Vec<Point<D>>,
}

impl<const D: usize> SeedSet<D> {
    pub fn new(points: Vec<Point<D>>) -> Self {
        Self { points }
    }

    /// Seeds given as grid indices of `geometry`, converted to physical points.
    pub fn from_indices(indices: &[[usize; D]], geometry: &ImageGeometry<D>) -> Self {
        let points = indices
            .iter()
            .map(|index| {
                let mut p = lstk_core::Vector::<D>::zeros();
                for i in 0..D {
                    p[i] = index[i] as f64 * geometry.spacing()[i];
                }
                *geometry.origin() + *geometry.direction() * p
            })
            .collect();
        Self { points }
    }

    pub fn push(&mut self, point: Point<D>) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point<D>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Map every seed to its nearest grid index on `image`.
    ///
    /// Fails when the set is empty or any seed falls outside the grid.
    pub fn to_indices<B: Backend>(&self, image: &Image<B, D>) -> Result<Vec<[usize; D]>> {
        if self.points.is_empty() {
            return Err(SegmentationError::domain_violation("seed set is empty"));
        }
        self.points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                if !point.is_finite() {
                    return Err(SegmentationError::domain_violation(format!(
                        "seed {} has non-finite coordinates {:?}",
                        i,
                        point.to_vec()
                    )));
                }
                image.physical_point_to_index(point).ok_or_else(|| {
                    SegmentationError::domain_violation(format!(
                        "seed {} at {:?} lies outside the image grid {:?}",
                        i,
                        point.to_vec(),
                        image.shape()
                    ))
                })
            })
            .collect()
    }
}
