//! Sphere Segmentation Example
//!
//! Segments a synthetic bright sphere from a single seed with the default
//! lesion features (vesselness limited by an edge term), fast marching,
//! then geodesic active contour refinement. An optional JSON configuration overrides the defaults.
//!
//! Usage:
//!   cargo run --example sphere_segmentation [config.json]

use std::sync::Arc;

use burn_ndarray::NdArray;
use lstk_core::{Image, ImageGeometry, Point, Spacing};
use lstk_segmentation::{ConsoleProgressCallback, HybridSegmentationModule, SeedSet, SegmentationConfig};

type Backend = NdArray<f32>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        None => {
            let mut config = SegmentationConfig::default();
            config.fast_marching.stopping_value = 20.0;
            // one voxel of smoothing at 0.8 mm spacing
            if let Some(edges) = &mut config.edges {
                edges.sigma = 0.8;
            }
            config
        }
    };

    // 40 x 40 x 40 voxels of 0.8 mm, sphere of radius 10 mm
    let geometry = ImageGeometry::<3>::from_shape([40, 40, 40]).with_spacing(Spacing::uniform(0.8));
    let centre = Point::new([16.0, 16.0, 16.0]);
    let lattice = geometry.lattice();
    let values: Vec<f64> = (0..lattice.len())
        .map(|o| {
            let i = lattice.index(o);
            let p = Point::new([i[0] as f64 * 0.8, i[1] as f64 * 0.8, i[2] as f64 * 0.8]);
            if p.distance(&centre) <= 10.0 { 1.0 } else { 0.0 }
        })
        .collect();
    let image = Image::<Backend, 3>::from_voxels(&values, &geometry, &Default::default());

    let mut module = HybridSegmentationModule::<Backend, 3>::from_config(&config)?;
    module.add_progress_callback(Arc::new(ConsoleProgressCallback::new(10)));
    module.set_input(image);
    module.set_seeds(SeedSet::new(vec![centre]));

    let surface = module.update()?.to_voxels();
    let inside = surface.iter().filter(|&&v| v < 0.0).count();
    let volume = inside as f64 * 0.8f64.powi(3);
    let expected = 4.0 / 3.0 * std::f64::consts::PI * 1000.0;

    println!("State:              {:?}", module.state());
    println!("Refinement:         {:?}", module.refinement_status());
    println!("Segmented volume:   {:.1} mm^3", volume);
    println!("Sphere volume:      {:.1} mm^3", expected);
    println!("Relative error:     {:.2}%", 100.0 * (volume - expected).abs() / expected);

    Ok(())
}
