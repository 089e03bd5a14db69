//! Smoothness measure of an implicit surface.

use burn::tensor::backend::Backend;
use lstk_core::{Image, Lattice};

use super::Stencil;

/// Samples with at least one face neighbour on the other side of the zero
/// level (`φ < 0` against `φ >= 0`).
pub fn interface_voxels<const D: usize>(phi: &[f64], lattice: &Lattice<D>) -> Vec<usize> {
    (0..lattice.len())
        .filter(|&o| {
            let inside = phi[o] < 0.0;
            lattice.face_neighbors(o).any(|n| (phi[n] < 0.0) != inside)
        })
        .collect()
}

/// Mean squared mean-curvature over the interface samples of `surface`.
///
/// Zero when the surface has no interface.
pub fn curvature_energy<B: Backend, const D: usize>(surface: &Image<B, D>) -> f64 {
    let phi = surface.to_voxels();
    let lattice = surface.geometry().lattice();
    let stencil = Stencil::new(lattice, surface.spacing());
    let interface = interface_voxels(&phi, &lattice);
    if interface.is_empty() {
        return 0.0;
    }
    let total: f64 = interface
        .iter()
        .map(|&o| {
            let k = stencil.curvature(&phi, o);
            k * k
        })
        .sum();
    total / interface.len() as f64
}
