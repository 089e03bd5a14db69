use lstk_core::image::{Image, ImageGeometry};
use lstk_core::spatial::{Point, Spacing, Direction};
use burn_ndarray::NdArray;
use proptest::prelude::*;

type Backend = NdArray<f32>;
const D: usize = 3;

fn make_rotation(angle_x: f64, angle_y: f64, angle_z: f64) -> Direction<D> {
    let (sx, cx) = angle_x.sin_cos();
    let (sy, cy) = angle_y.sin_cos();
    let (sz, cz) = angle_z.sin_cos();

    let rz = nalgebra::SMatrix::<f64, 3, 3>::new(
        cz, -sz, 0.0,
        sz, cz, 0.0,
        0.0, 0.0, 1.0,
    );
    let ry = nalgebra::SMatrix::<f64, 3, 3>::new(
        cy, 0.0, sy,
        0.0, 1.0, 0.0,
        -sy, 0.0, cy,
    );
    let rx = nalgebra::SMatrix::<f64, 3, 3>::new(
        1.0, 0.0, 0.0,
        0.0, cx, -sx,
        0.0, sx, cx,
    );
    Direction(rx * ry * rz)
}

fn image_with(origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Image<Backend, D> {
    let device = Default::default();
    let geometry = ImageGeometry::new([6, 7, 8], origin, spacing, direction);
    Image::from_voxels(&vec![0.0; geometry.len()], &geometry, &device)
}

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let image = image_with(
            Point::new([ox, oy, oz]),
            Spacing::new([sx, sy, sz]),
            make_rotation(ax, ay, az),
        );
        let point = Point::<D>::new([px, py, pz]);

        let index = image.transform_physical_point_to_continuous_index(&point).unwrap();
        let recovered = image.transform_continuous_index_to_physical_point(&index);

        prop_assert!(point.approx_eq(&recovered, 1e-6), "{:?} vs {:?}", point, recovered);
    }

    #[test]
    fn test_grid_points_map_to_their_index(
        i in 0usize..6, j in 0usize..7, k in 0usize..8,
        sx in 0.2f64..3.0, sy in 0.2f64..3.0, sz in 0.2f64..3.0,
        az in -3.14f64..3.14
    ) {
        let image = image_with(
            Point::new([1.0, -2.0, 3.0]),
            Spacing::new([sx, sy, sz]),
            make_rotation(0.0, 0.0, az),
        );
        let physical = image.transform_continuous_index_to_physical_point(
            &Point::new([i as f64, j as f64, k as f64]),
        );
        prop_assert_eq!(image.physical_point_to_index(&physical), Some([i, j, k]));
    }
}
