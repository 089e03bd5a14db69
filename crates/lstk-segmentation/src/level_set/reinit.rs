//! Signed-distance reinitialisation by fast marching from the interface.

use crate::fast_marching::{FastMarcher, Speed};

/// Replace `phi` by the signed distance to its zero crossing, limited to
/// `±band`.
///
/// Samples adjacent to a sign change get a sub-voxel distance from linear
/// interpolation along each crossing axis, combined as
/// `1 / sqrt(Σ 1 / d_i^2)`. The rest is filled by a unit-speed march from
/// those samples. Without any crossing every sample becomes `±band`.
pub fn reinitialize<const D: usize>(phi: &[f64], marcher: &FastMarcher<D>, band: f64) -> Vec<f64> {
    let lattice = marcher.lattice();
    let spacing = marcher.spacing();
    let mut trial = Vec::new();

    for offset in 0..lattice.len() {
        let value = phi[offset];
        if value == 0.0 {
            trial.push((offset, 0.0));
            continue;
        }
        let mut inverse_sq = 0.0;
        for axis in 0..D {
            let mut nearest = f64::INFINITY;
            for step in [-1isize, 1] {
                if let Some(n) = lattice.neighbor(offset, axis, step) {
                    let other = phi[n];
                    if value * other < 0.0 || other == 0.0 {
                        let d = spacing[axis] * value / (value - other);
                        nearest = nearest.min(d.abs());
                    }
                }
            }
            if nearest.is_finite() {
                if nearest == 0.0 {
                    inverse_sq = f64::INFINITY;
                } else {
                    inverse_sq += 1.0 / (nearest * nearest);
                }
            }
        }
        if inverse_sq > 0.0 {
            trial.push((offset, 1.0 / inverse_sq.sqrt()));
        }
    }

    if trial.is_empty() {
        return phi.iter().map(|&v| if v < 0.0 { -band } else { band }).collect();
    }

    let arrival = marcher.march(Speed::Uniform(1.0), &trial, band);
    phi.iter()
        .enumerate()
        .map(|(offset, &v)| {
            let distance = if arrival.is_reached(offset) {
                arrival.time(offset).min(band)
            } else {
                band
            };
            if v < 0.0 {
                -distance
            } else {
                distance
            }
        })
        .collect()
}
