//! Finite-difference stencils on a flat level-set buffer.
//!
//! All differences are in physical units. Borders replicate the edge sample,
//! so one-sided differences vanish across the image boundary.

use lstk_core::{Lattice, Spacing};

/// Gradient magnitudes below this count as flat.
const FLAT: f64 = 1e-8;

#[derive(Debug, Clone, Copy)]
pub struct Stencil<const D: usize> {
    lattice: Lattice<D>,
    spacing: [f64; D],
}

impl<const D: usize> Stencil<D> {
    pub fn new(lattice: Lattice<D>, spacing: &Spacing<D>) -> Self {
        let mut h = [1.0; D];
        for (axis, value) in h.iter_mut().enumerate() {
            *value = spacing[axis];
        }
        Self { lattice, spacing: h }
    }

    pub fn lattice(&self) -> &Lattice<D> {
        &self.lattice
    }

    pub fn spacing(&self, axis: usize) -> f64 {
        self.spacing[axis]
    }

    pub fn spacings(&self) -> [f64; D] {
        self.spacing
    }

    pub fn min_spacing(&self) -> f64 {
        self.spacing.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_spacing(&self) -> f64 {
        self.spacing.iter().copied().fold(0.0, f64::max)
    }

    /// Backward and forward differences along `axis`.
    #[inline]
    pub fn one_sided(&self, phi: &[f64], offset: usize, axis: usize) -> (f64, f64) {
        let h = self.spacing[axis];
        let center = phi[offset];
        let minus = phi[self.lattice.clamped(offset, axis, -1)];
        let plus = phi[self.lattice.clamped(offset, axis, 1)];
        ((center - minus) / h, (plus - center) / h)
    }

    /// Central-difference gradient.
    pub fn gradient(&self, phi: &[f64], offset: usize) -> [f64; D] {
        let mut g = [0.0; D];
        for (axis, value) in g.iter_mut().enumerate() {
            let minus = phi[self.lattice.clamped(offset, axis, -1)];
            let plus = phi[self.lattice.clamped(offset, axis, 1)];
            *value = (plus - minus) / (2.0 * self.spacing[axis]);
        }
        g
    }

    /// Godunov upwind `|∇φ|` for motion `φ_t = -F |∇φ|` with `F` of sign
    /// `direction` (positive moves the front outward).
    pub fn upwind_norm(&self, phi: &[f64], offset: usize, direction: f64) -> f64 {
        let mut sum = 0.0;
        for axis in 0..D {
            let (dm, dp) = self.one_sided(phi, offset, axis);
            let (a, b) = if direction >= 0.0 {
                (dm.max(0.0), dp.min(0.0))
            } else {
                (dm.min(0.0), dp.max(0.0))
            };
            sum += a * a + b * b;
        }
        sum.sqrt()
    }

    /// Upwind `V · ∇φ` for the transport equation `φ_t + V · ∇φ = 0`.
    pub fn upwind_advection(&self, phi: &[f64], offset: usize, velocity: &[f64]) -> f64 {
        let mut sum = 0.0;
        for axis in 0..D {
            let v = velocity[axis];
            if v == 0.0 {
                continue;
            }
            let (dm, dp) = self.one_sided(phi, offset, axis);
            sum += if v > 0.0 { v * dm } else { v * dp };
        }
        sum
    }

    /// First and second central derivatives: gradient and Hessian entries.
    fn derivatives(&self, phi: &[f64], offset: usize) -> ([f64; D], [[f64; D]; D]) {
        let l = &self.lattice;
        let center = phi[offset];
        let first = self.gradient(phi, offset);
        let mut second = [[0.0; D]; D];
        for i in 0..D {
            let hi = self.spacing[i];
            let plus = phi[l.clamped(offset, i, 1)];
            let minus = phi[l.clamped(offset, i, -1)];
            second[i][i] = (plus - 2.0 * center + minus) / (hi * hi);
            for j in (i + 1)..D {
                let hj = self.spacing[j];
                let pp = phi[l.clamped(l.clamped(offset, i, 1), j, 1)];
                let pm = phi[l.clamped(l.clamped(offset, i, 1), j, -1)];
                let mp = phi[l.clamped(l.clamped(offset, i, -1), j, 1)];
                let mm = phi[l.clamped(l.clamped(offset, i, -1), j, -1)];
                let v = (pp - pm - mp + mm) / (4.0 * hi * hj);
                second[i][j] = v;
                second[j][i] = v;
            }
        }
        (first, second)
    }

    /// Numerator of the mean curvature and `|∇φ|^2`.
    fn curvature_parts(&self, phi: &[f64], offset: usize) -> (f64, f64) {
        let (g, h) = self.derivatives(phi, offset);
        let norm2: f64 = g.iter().map(|v| v * v).sum();
        let mut numerator = 0.0;
        for i in 0..D {
            numerator += h[i][i] * norm2;
            for j in 0..D {
                numerator -= g[i] * g[j] * h[i][j];
            }
        }
        (numerator, norm2)
    }

    /// Mean curvature `div(∇φ / |∇φ|)` (sum of principal curvatures).
    pub fn curvature(&self, phi: &[f64], offset: usize) -> f64 {
        let (numerator, norm2) = self.curvature_parts(phi, offset);
        let norm = norm2.sqrt();
        if norm < FLAT {
            return 0.0;
        }
        numerator / (norm2 * norm)
    }

    /// `κ |∇φ|`, the mean-curvature flow term.
    pub fn curvature_flow(&self, phi: &[f64], offset: usize) -> f64 {
        let (numerator, norm2) = self.curvature_parts(phi, offset);
        if norm2.sqrt() < FLAT {
            return 0.0;
        }
        numerator / norm2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(shape: [usize; 2], center: [f64; 2], radius: f64) -> (Lattice<2>, Vec<f64>) {
        let lattice = Lattice::new(shape);
        let phi = (0..lattice.len())
            .map(|o| {
                let i = lattice.index(o);
                let dx = i[0] as f64 - center[0];
                let dy = i[1] as f64 - center[1];
                (dx * dx + dy * dy).sqrt() - radius
            })
            .collect();
        (lattice, phi)
    }

    #[test]
    fn test_circle_curvature_is_inverse_radius() {
        let (lattice, phi) = circle([41, 41], [20.0, 20.0], 10.0);
        let stencil = Stencil::new(lattice, &Spacing::uniform(1.0));
        let k = stencil.curvature(&phi, lattice.offset([30, 20]));
        assert!((k - 0.1).abs() < 0.01, "curvature {}", k);
        // unit gradient: flow term equals curvature
        let flow = stencil.curvature_flow(&phi, lattice.offset([30, 20]));
        assert!((flow - k).abs() < 1e-3);
    }

    #[test]
    fn test_sphere_mean_curvature() {
        let lattice = Lattice::new([25, 25, 25]);
        let phi: Vec<f64> = (0..lattice.len())
            .map(|o| {
                let i = lattice.index(o);
                let d: f64 = i.iter().map(|&c| (c as f64 - 12.0).powi(2)).sum();
                d.sqrt() - 8.0
            })
            .collect();
        let stencil = Stencil::new(lattice, &Spacing::uniform(1.0));
        let k = stencil.curvature(&phi, lattice.offset([20, 12, 12]));
        assert!((k - 0.25).abs() < 0.02, "curvature {}", k);
    }

    #[test]
    fn test_upwind_norm_of_plane() {
        let lattice = Lattice::new([10, 10]);
        let phi: Vec<f64> = (0..lattice.len()).map(|o| lattice.index(o)[0] as f64 * 2.0 - 9.0).collect();
        let stencil = Stencil::new(lattice, &Spacing::new([2.0, 1.0]));
        let o = lattice.offset([5, 5]);
        assert!((stencil.upwind_norm(&phi, o, 1.0) - 1.0).abs() < 1e-12);
        assert!((stencil.upwind_norm(&phi, o, -1.0) - 1.0).abs() < 1e-12);
        assert!((stencil.gradient(&phi, o)[0] - 1.0).abs() < 1e-12);
        assert_eq!(stencil.curvature(&phi, o), 0.0);
    }

    #[test]
    fn test_upwind_advection_picks_side() {
        let lattice = Lattice::new([5]);
        let phi = vec![0.0, 1.0, 3.0, 6.0, 10.0];
        let stencil = Stencil::new(lattice, &Spacing::uniform(1.0));
        assert_eq!(stencil.upwind_advection(&phi, 2, &[1.0]), 2.0);
        assert_eq!(stencil.upwind_advection(&phi, 2, &[-1.0]), -3.0);
    }
}
