use std::sync::Arc;

use burn_ndarray::NdArray;
use lstk_core::{Image, ImageGeometry, Point};
use lstk_segmentation::level_set::curvature_energy;
use lstk_segmentation::{
    EvolutionParams, GeodesicActiveContourModule, HistoryCallback, LevelSetRefiner, SpfLevelSetModule,
};

type B = NdArray<f32>;

fn star(geometry: &ImageGeometry<2>) -> Image<B, 2> {
    let lattice = geometry.lattice();
    let phi: Vec<f64> = (0..lattice.len())
        .map(|o| {
            let i = lattice.index(o);
            let (x, y) = (i[0] as f64 - 32.0, i[1] as f64 - 32.0);
            let r = (x * x + y * y).sqrt();
            let theta = y.atan2(x);
            r - (15.0 + 2.0 * (8.0 * theta).sin())
        })
        .collect();
    Image::from_voxels(&phi, geometry, &Default::default())
}

fn constant(geometry: &ImageGeometry<2>, value: f64) -> Image<B, 2> {
    Image::from_voxels(&vec![value; geometry.len()], geometry, &Default::default())
}

#[test]
fn test_curvature_flow_reduces_curvature_energy() {
    let geometry = ImageGeometry::<2>::from_shape([64, 64]);
    let surface = star(&geometry);
    let before = curvature_energy(&surface);

    let mut gac = GeodesicActiveContourModule::<B, 2>::new();
    gac.set_propagation_weight(0.0).unwrap();
    gac.set_advection_weight(0.0).unwrap();
    gac.set_evolution(EvolutionParams {
        max_iterations: 50,
        convergence_threshold: 1e-6,
        ..Default::default()
    })
    .unwrap();
    gac.set_initial_surface(surface);
    gac.set_feature_image(constant(&geometry, 1.0));
    gac.update().unwrap();

    let after = curvature_energy(gac.output().unwrap());
    assert!(after < 0.5 * before, "curvature energy {} -> {}", before, after);
    assert_eq!(gac.status().unwrap().iterations(), 50);
}

#[test]
fn test_progress_reported_every_iteration() {
    let geometry = ImageGeometry::<2>::from_shape([32, 32]);
    let lattice = geometry.lattice();
    let phi: Vec<f64> = (0..lattice.len())
        .map(|o| {
            let i = lattice.index(o);
            ((i[0] as f64 - 16.0).powi(2) + (i[1] as f64 - 16.0).powi(2)).sqrt() - 6.0
        })
        .collect();

    let history = Arc::new(HistoryCallback::new());
    let mut spf = SpfLevelSetModule::<B, 2>::new();
    spf.add_progress_callback(history.clone());
    spf.set_evolution(EvolutionParams { max_iterations: 7, ..Default::default() }).unwrap();
    spf.set_initial_surface(Image::from_voxels(&phi, &geometry, &Default::default()));
    spf.set_feature_image(constant(&geometry, 0.5));
    spf.update().unwrap();

    let status = spf.status().unwrap();
    assert_eq!(history.get_history().len(), status.iterations());
}

#[test]
fn test_mismatch_preserves_previous_output() {
    let geometry = ImageGeometry::<2>::from_shape([64, 64]);
    let mut gac = GeodesicActiveContourModule::<B, 2>::new();
    gac.set_evolution(EvolutionParams { max_iterations: 3, ..Default::default() }).unwrap();
    gac.set_initial_surface(star(&geometry));
    gac.set_feature_image(constant(&geometry, 1.0));
    gac.update().unwrap();
    let stamp = gac.output_stamp();
    let before = gac.output().unwrap().to_voxels();

    let shifted = geometry.clone().with_origin(Point::new([1.0, 0.0]));
    gac.set_feature_image(constant(&shifted, 1.0));
    assert!(gac.update().unwrap_err().is_input_mismatch());
    assert_eq!(gac.output_stamp(), stamp);
    assert_eq!(gac.output().unwrap().to_voxels(), before);

    let smaller = ImageGeometry::<2>::from_shape([32, 64]);
    gac.set_feature_image(constant(&smaller, 1.0));
    assert!(gac.update().unwrap_err().is_input_mismatch());
    assert_eq!(gac.output_stamp(), stamp);
}

#[test]
fn test_refinement_is_idempotent() {
    let geometry = ImageGeometry::<2>::from_shape([64, 64]);
    let run = || {
        let mut gac = GeodesicActiveContourModule::<B, 2>::new();
        gac.set_evolution(EvolutionParams { max_iterations: 10, ..Default::default() }).unwrap();
        gac.set_initial_surface(star(&geometry));
        gac.set_feature_image(constant(&geometry, 0.8));
        gac.update().unwrap();
        let first = gac.output().unwrap().to_voxels();
        let stamp = gac.output_stamp();
        gac.update().unwrap();
        assert_eq!(gac.output_stamp(), stamp);
        first
    };
    assert_eq!(run(), run());
}
