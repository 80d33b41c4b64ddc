use nalgebra::{point, vector, Matrix4, Point3, Vector3};

use tiny_rasterizer::{
    model_rotation_z, orthographic, perspective, rgb, view_translation, Buffers, PrimitiveKind, RasterError,
    Rasterizer, BLACK, WHITE,
};

const EPSILON: f32 = 1e-4;

/// Clip-space coordinates of a screen position on a `size` x `size` viewport with identity transforms.
fn clip(size: f32, x: f32, y: f32, depth: f32) -> Point3<f32> {
    return point![2.0 * x / size - 1.0, 1.0 - 2.0 * y / size, depth];
}

fn demo_scene(rasterizer: &mut Rasterizer) {
    rasterizer.set_view(view_translation(point![0.0, 0.0, 5.0]));
    rasterizer.set_projection(perspective(45.0, 1.0, 0.1, 50.0).unwrap());
}

/// Two overlapping triangles at different depths plus a third one off to the side.
fn layered_mesh(rasterizer: &mut Rasterizer) -> (tiny_rasterizer::VertexHandle, tiny_rasterizer::IndexHandle) {
    let positions = rasterizer
        .load_positions(vec![
            point![2.0, 0.0, -2.0],
            point![0.0, 2.0, -2.0],
            point![-2.0, 0.0, -2.0],
            point![3.5, -1.0, -5.0],
            point![2.5, 1.0, -5.0],
            point![-1.0, -0.5, -5.0],
            point![-1.0, -1.0, 0.0],
            point![-2.5, -1.0, 0.0],
            point![-2.0, -2.5, 0.0],
        ])
        .unwrap();
    let indices = rasterizer
        .load_indices(vec![vector![0, 1, 2], vector![3, 4, 5], vector![6, 7, 8]])
        .unwrap();
    return (positions, indices);
}

#[test]
fn small_triangle_on_four_by_four_viewport() {
    let mut r = Rasterizer::new(4, 4).unwrap();
    let positions = r
        .load_positions(vec![clip(4.0, 0.0, 0.0, 0.5), clip(4.0, 3.0, 0.0, 0.5), clip(4.0, 0.0, 3.0, 0.5)])
        .unwrap();
    let indices = r.load_indices(vec![vector![0, 1, 2]]).unwrap();
    r.set_color(rgb(10.0, 20.0, 30.0));
    r.clear(Buffers::COLOR | Buffers::DEPTH);
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();

    // Coverage is sampled at pixel centers, so x + y <= 1 here; the hypotenuse is not a top-left edge.
    for y in 0..4 {
        for x in 0..4 {
            if x + y <= 1 {
                assert_eq!(r.pixel(x, y), Some(rgb(10.0, 20.0, 30.0)), "pixel ({}, {})", x, y);
                assert_eq!(r.depth(x, y), Some(0.5));
            } else {
                assert_eq!(r.pixel(x, y), Some(BLACK), "pixel ({}, {})", x, y);
                assert_eq!(r.depth(x, y), Some(f32::INFINITY));
            }
        }
    }
}

#[test]
fn projected_depth_of_demo_vertex() {
    let mut r = Rasterizer::new(700, 700).unwrap();
    demo_scene(&mut r);
    let screen = r.transform().project(&point![0.0, 0.0, 0.0]);

    // Five units in front of the eye.
    let (near, far, d) = (0.1_f32, 50.0_f32, 5.0_f32);
    let expected = (far + near) / (far - near) - 2.0 * far * near / ((far - near) * d);
    assert!((screen.x - 350.0).abs() < EPSILON);
    assert!((screen.y - 350.0).abs() < EPSILON);
    assert!((screen.z - expected).abs() < EPSILON);
    assert!(screen.z > -1.0 && screen.z < 1.0);
}

#[test]
fn redraw_after_clear_is_identical() {
    let mut r = Rasterizer::new(96, 96).unwrap();
    demo_scene(&mut r);
    let (positions, indices) = layered_mesh(&mut r);

    r.clear(Buffers::BOTH);
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    let first = (r.frame_buffer().to_vec(), r.depth_buffer().to_vec());

    r.clear(Buffers::BOTH);
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    assert_eq!(first.0, r.frame_buffer());
    assert_eq!(first.1, r.depth_buffer());
}

#[test]
fn nearer_surface_wins_in_any_order() {
    let near = [point![-1.0, -1.0, -0.5], point![1.0, -1.0, -0.5], point![0.0, 1.0, -0.5]];
    let far = [point![-1.0, -1.0, 0.5], point![1.0, -1.0, 0.5], point![0.0, 1.0, 0.5]];
    let red = rgb(255.0, 0.0, 0.0);
    let blue = rgb(0.0, 0.0, 255.0);

    for near_first in [true, false] {
        let mut r = Rasterizer::new(16, 16).unwrap();
        let near_handle = r.load_positions(near.to_vec()).unwrap();
        let far_handle = r.load_positions(far.to_vec()).unwrap();
        let indices = r.load_indices(vec![vector![0, 1, 2]]).unwrap();

        let order = if near_first {
            [(near_handle, red), (far_handle, blue)]
        } else {
            [(far_handle, blue), (near_handle, red)]
        };
        for (handle, color) in order {
            r.set_color(color);
            r.draw(handle, indices, PrimitiveKind::Triangle).unwrap();
        }

        assert_eq!(r.pixel(8, 10), Some(red));
        assert!((r.depth(8, 10).unwrap() + 0.5).abs() < EPSILON);
    }
}

#[test]
fn bad_index_leaves_frame_untouched() {
    let mut r = Rasterizer::new(32, 32).unwrap();
    demo_scene(&mut r);
    let (positions, indices) = layered_mesh(&mut r);
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    let before = (r.frame_buffer().to_vec(), r.depth_buffer().to_vec());

    let bad = r.load_indices(vec![vector![0, 1, 2], vector![7, 8, 9]]).unwrap();
    let result = r.draw(positions, bad, PrimitiveKind::Triangle);
    assert!(matches!(result, Err(RasterError::OutOfRange { index: 9, len: 9 })));
    assert_eq!(before.0, r.frame_buffer());
    assert_eq!(before.1, r.depth_buffer());
}

#[test]
fn invalid_arguments() {
    assert!(matches!(Rasterizer::new(0, 0), Err(RasterError::InvalidArgument(_))));
    assert!(matches!(Rasterizer::with_workers(8, 0, 2), Err(RasterError::InvalidArgument(_))));
    assert!(matches!(perspective(45.0, 1.0, 0.0, 50.0), Err(RasterError::InvalidArgument(_))));
    assert!(matches!(perspective(45.0, 1.0, 10.0, 1.0), Err(RasterError::InvalidArgument(_))));
    assert!(matches!(
        orthographic(-1.0, 1.0, -1.0, 1.0, 5.0, 5.0),
        Err(RasterError::InvalidArgument(_))
    ));

    let mut r = Rasterizer::new(8, 8).unwrap();
    assert!(r.load_positions(Vec::new()).is_err());
    assert!(r.load_indices(Vec::new()).is_err());
    assert!(r.set_viewport_rect(0, 0, 0, 8).is_err());
}

#[test]
fn degenerate_triangles_are_skipped() {
    let mut r = Rasterizer::new(16, 16).unwrap();
    let positions = r
        .load_positions(vec![
            point![-1.0, -1.0, 0.0],
            point![0.0, 0.0, 0.0],
            point![1.0, 1.0, 0.0],
            point![f32::NAN, 0.0, 0.0],
        ])
        .unwrap();
    let indices = r.load_indices(vec![vector![0, 1, 2], vector![0, 2, 3], vector![1, 1, 1]]).unwrap();
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    assert!(r.frame_buffer().iter().all(|c| *c == BLACK));
    assert!(r.depth_buffer().iter().all(|z| *z == f32::INFINITY));
}

#[test]
fn parallel_matches_single_threaded() {
    for kind in [PrimitiveKind::Triangle, PrimitiveKind::Line] {
        let mut frames = Vec::new();
        for workers in [1, 3, 8] {
            let mut r = Rasterizer::with_workers(61, 47, workers).unwrap();
            r.set_viewport(61, 47).unwrap();
            demo_scene(&mut r);
            r.set_model(model_rotation_z(20.0));
            let (positions, indices) = layered_mesh(&mut r);
            let colors = r
                .load_colors((0..9).map(|i| rgb(25.0 * i as f32, 255.0 - 25.0 * i as f32, 128.0)).collect())
                .unwrap();
            r.set_clear_color(rgb(0.0, 0.0, 40.0));
            r.clear(Buffers::BOTH);
            r.draw_colored(positions, indices, colors, kind).unwrap();
            frames.push((r.frame_buffer().to_vec(), r.depth_buffer().to_vec()));
        }
        assert!(frames[0].0.iter().any(|c| *c != rgb(0.0, 0.0, 40.0)));
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[0], frames[2]);
    }
}

#[test]
fn clear_mask_and_clear_color() {
    let mut r = Rasterizer::new(8, 8).unwrap();
    let positions = r
        .load_positions(vec![point![-1.0, -1.0, 0.0], point![1.0, -1.0, 0.0], point![-1.0, 1.0, 0.0]])
        .unwrap();
    let indices = r.load_indices(vec![vector![0, 1, 2]]).unwrap();
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    assert_eq!(r.pixel(0, 7), Some(WHITE));

    r.set_clear_color(rgb(1.0, 2.0, 3.0));
    r.clear(Buffers::COLOR);
    assert!(r.frame_buffer().iter().all(|c| *c == rgb(1.0, 2.0, 3.0)));
    assert_eq!(r.depth(0, 7), Some(0.0));

    r.clear(Buffers::DEPTH);
    assert!(r.depth_buffer().iter().all(|z| *z == f32::INFINITY));
}

#[test]
fn viewport_rect_offsets_output() {
    let mut r = Rasterizer::new(8, 8).unwrap();
    r.set_viewport_rect(4, 4, 4, 4).unwrap();
    let positions = r
        .load_positions(vec![point![-1.0, -1.0, 0.0], point![1.0, -1.0, 0.0], point![1.0, 1.0, 0.0], point![-1.0, 1.0, 0.0]])
        .unwrap();
    let indices = r.load_indices(vec![vector![0, 1, 2], vector![0, 2, 3]]).unwrap();
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();

    for y in 0..8 {
        for x in 0..8 {
            let inside = x >= 4 && y >= 4;
            assert_eq!(r.pixel(x, y) == Some(WHITE), inside, "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn transform_changes_between_draws_take_effect() {
    let mut r = Rasterizer::new(8, 8).unwrap();
    let positions = r
        .load_positions(vec![point![-1.0, -1.0, 0.0], point![0.0, -1.0, 0.0], point![-1.0, 0.0, 0.0]])
        .unwrap();
    let indices = r.load_indices(vec![vector![0, 1, 2]]).unwrap();
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    assert_eq!(r.pixel(0, 7), Some(WHITE));
    assert_eq!(r.pixel(7, 0), Some(BLACK));

    r.set_model(Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, -1.0, 1.0)));
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    assert_eq!(r.pixel(7, 0), Some(WHITE));
}

#[test]
fn obj_mesh_through_the_pipeline() {
    let source = "v -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nf 1 2 3\nf 1 3 4\n";
    let mut r = Rasterizer::new(10, 10).unwrap();
    let (positions, indices) = r.load_obj(source.as_bytes()).unwrap();
    r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
    assert!(r.frame_buffer().iter().all(|c| *c == WHITE));
    assert_eq!(r.to_rgb8().len(), 10 * 10 * 3);
}

#[test]
fn wireframe_of_huge_triangle_stays_in_frame() {
    let mut r = Rasterizer::new(8, 8).unwrap();
    let positions = r
        .load_positions(vec![point![-1.0, -1.0, 0.0], point![1.0, -1.0, 0.0], point![0.0, 1.0, 0.0]])
        .unwrap();
    let indices = r.load_indices(vec![vector![0, 1, 2]]).unwrap();
    // Screen x of the base corners ends up near +-3e38.
    r.set_model(Matrix4::new_nonuniform_scaling(&Vector3::new(7.5e37, 1.0, 1.0)));
    r.draw(positions, indices, PrimitiveKind::Line).unwrap();

    // Only the two slanted edges cross the frame, flat along the top row.
    assert_eq!(r.pixel(4, 0), Some(WHITE));
    for y in 1..8 {
        for x in 0..8 {
            assert_eq!(r.pixel(x, y), Some(BLACK), "pixel ({}, {})", x, y);
        }
    }
}
