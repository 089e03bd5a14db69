//! Hessian eigen-analysis and the Sato line measure.

use lstk_core::{Lattice, Spacing};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

/// Sato tubular measure on sorted Hessian eigenvalues.
///
/// With eigenvalues sorted ascending, the cross-section strength is
/// `n = -e[D-2]` and the axial curvature is `e[D-1]`. The response is
/// `n * exp(-0.5 * (axial / (a * n))^2)` where `a` is `alpha1` for a
/// non-positive axial curvature and `alpha2` otherwise; it is zero when
/// `n <= 0`. Dark structures are handled by negating the eigenvalues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatoMeasure {
    pub alpha1: f64,
    pub alpha2: f64,
    pub bright_object: bool,
}

impl Default for SatoMeasure {
    fn default() -> Self {
        Self {
            alpha1: 0.5,
            alpha2: 2.0,
            bright_object: true,
        }
    }
}

impl SatoMeasure {
    /// Response for eigenvalues sorted ascending. Needs at least two values.
    pub fn response(&self, eigenvalues: &[f64]) -> f64 {
        let d = eigenvalues.len();
        if d < 2 {
            return 0.0;
        }
        let (cross, axial) = if self.bright_object {
            (eigenvalues[d - 2], eigenvalues[d - 1])
        } else {
            // negation reverses the order
            (-eigenvalues[1], -eigenvalues[0])
        };

        let n = -cross;
        if !(n > 0.0) {
            return 0.0;
        }
        let a = if axial <= 0.0 { self.alpha1 } else { self.alpha2 };
        let ratio = axial / (a * n);
        n * (-0.5 * ratio * ratio).exp()
    }
}

/// Finite-difference Hessian on a flat row-major buffer.
///
/// Central differences in physical units with replicated borders.
#[derive(Debug, Clone, Copy)]
pub struct HessianAnalysis<const D: usize> {
    lattice: Lattice<D>,
    spacing: [f64; D],
}

impl<const D: usize> HessianAnalysis<D> {
    pub fn new(lattice: Lattice<D>, spacing: &Spacing<D>) -> Self {
        let mut h = [1.0; D];
        for (axis, value) in h.iter_mut().enumerate() {
            *value = spacing[axis];
        }
        Self {
            lattice,
            spacing: h,
        }
    }

    /// Hessian matrix at `offset`.
    pub fn hessian_at(&self, values: &[f64], offset: usize) -> DMatrix<f64> {
        let l = &self.lattice;
        let center = values[offset];
        let mut m = DMatrix::<f64>::zeros(D, D);

        for i in 0..D {
            let hi = self.spacing[i];
            let plus = values[l.clamped(offset, i, 1)];
            let minus = values[l.clamped(offset, i, -1)];
            m[(i, i)] = (plus - 2.0 * center + minus) / (hi * hi);

            for j in (i + 1)..D {
                let hj = self.spacing[j];
                let pp = values[l.clamped(l.clamped(offset, i, 1), j, 1)];
                let pm = values[l.clamped(l.clamped(offset, i, 1), j, -1)];
                let mp = values[l.clamped(l.clamped(offset, i, -1), j, 1)];
                let mm = values[l.clamped(l.clamped(offset, i, -1), j, -1)];
                let v = (pp - pm - mp + mm) / (4.0 * hi * hj);
                m[(i, j)] = v;
                m[(j, i)] = v;
            }
        }
        m
    }

    /// Eigenvalues of the Hessian at `offset`, sorted ascending.
    pub fn eigenvalues_at(&self, values: &[f64], offset: usize) -> Vec<f64> {
        let mut eigenvalues: Vec<f64> = self
            .hessian_at(values, offset)
            .symmetric_eigenvalues()
            .iter()
            .copied()
            .collect();
        eigenvalues.sort_by(|a, b| a.total_cmp(b));
        eigenvalues
    }

    /// Sato response for every voxel of `values`, with the Hessian scaled by
    /// `normalization` (σ² for scale-space comparisons).
    pub fn sato_response(&self, values: &[f64], measure: &SatoMeasure, normalization: f64) -> Vec<f64> {
        (0..self.lattice.len())
            .into_par_iter()
            .map(|offset| {
                let mut eigenvalues = self.eigenvalues_at(values, offset);
                for e in eigenvalues.iter_mut() {
                    *e *= normalization;
                }
                measure.response(&eigenvalues)
            })
            .collect()
    }
}
