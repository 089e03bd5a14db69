use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use lstk_core::image::{Image, ImageGeometry};
use lstk_core::spatial::{Point, Spacing, Direction};
use nalgebra::{Vector3, Rotation3};
use std::f64::consts::PI;

type Backend = NdArray<f32>;
type Point3 = Point<3>;
type Spacing3 = Spacing<3>;

#[test]
fn test_rotated_image_transform() {
    let device = Default::default();
    let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);

    // Rotate 90 degrees around Z: index axis 0 points along physical +Y.
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
    let direction = Direction(rotation.into_inner());
    let image = Image::new(data, Point3::origin(), Spacing3::uniform(1.0), direction);

    let index = image
        .transform_physical_point_to_continuous_index(&Point3::new([1.0, 0.0, 0.0]))
        .expect("rotation is invertible");
    assert!((index[0] - 0.0).abs() < 1e-9, "index[0] = {}", index[0]);
    assert!((index[1] - (-1.0)).abs() < 1e-9, "index[1] = {}", index[1]);
    assert!((index[2] - 0.0).abs() < 1e-9, "index[2] = {}", index[2]);

    // (0, -1, 0) lies outside the lattice.
    assert_eq!(image.physical_point_to_index(&Point3::new([1.0, 0.0, 0.0])), None);
    assert_eq!(
        image.physical_point_to_index(&Point3::new([-2.0, 3.0, 4.0])),
        Some([3, 2, 4])
    );
}

#[test]
fn test_singular_direction_has_no_index() {
    let device = Default::default();
    let data = Tensor::<Backend, 3>::zeros([4, 4, 4], &device);
    let mut direction = Direction::<3>::identity();
    direction[(2, 2)] = 0.0;
    let image = Image::new(data, Point3::origin(), Spacing3::uniform(1.0), direction);
    assert!(image
        .transform_physical_point_to_continuous_index(&Point3::new([1.0, 1.0, 1.0]))
        .is_none());
}

#[test]
fn test_voxels_follow_lattice_offsets() {
    let device = Default::default();
    let geometry = ImageGeometry::<3>::from_shape([3, 4, 5])
        .with_spacing(Spacing3::new([0.5, 1.0, 2.0]));
    let lattice = geometry.lattice();
    let values: Vec<f64> = (0..geometry.len())
        .map(|o| {
            let [z, y, x] = lattice.index(o);
            (100 * z + 10 * y + x) as f64
        })
        .collect();
    let image = Image::<Backend, 3>::from_voxels(&values, &geometry, &device);

    let voxels = image.to_voxels();
    assert_eq!(voxels[lattice.offset([2, 3, 4])], 234.0);
    assert_eq!(voxels[lattice.offset([1, 0, 2])], 102.0);
    assert!(image.geometry().same_grid(&geometry));
}
