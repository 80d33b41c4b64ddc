use nalgebra as na;
use na::{matrix, Matrix4, Point3, Unit, Vector3};

use crate::error::RasterError;

/// Pixel rectangle that clip space [-1, 1] x [-1, 1] is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Result<Viewport, RasterError> {
        return Viewport::with_origin(0, 0, width, height);
    }

    pub fn with_origin(x: i32, y: i32, width: u32, height: u32) -> Result<Viewport, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::invalid(format!(
                "viewport extent must be positive, got {}x{}",
                width, height
            )));
        }
        return Ok(Viewport {
            x: x as f32,
            y: y as f32,
            width: width as f32,
            height: height as f32,
        });
    }

    /// Maps a point in normalized device coordinates to screen space.
    /// Clip-space y points up while screen rows grow downwards, hence the flip.
    pub fn to_screen(&self, ndc: Point3<f32>) -> ScreenPoint {
        return ScreenPoint {
            x: self.x + (ndc.x + 1.0) * 0.5 * self.width,
            y: self.y + (1.0 - ndc.y) * 0.5 * self.height,
            z: ndc.z,
        };
    }
}

/// Vertex after the whole transform chain: x, y in pixels, z is the depth the
/// depth test compares (-1 at the near plane, 1 at the far plane).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        return ScreenPoint { x, y, z };
    }

    pub fn is_finite(&self) -> bool {
        return self.x.is_finite() && self.y.is_finite() && self.z.is_finite();
    }
}

/// Everything a draw call needs to take a local-space point to the screen.
/// A plain value: the rasterizer keeps a current one, but any draw can be given its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSet {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub viewport: Viewport,
}

impl TransformSet {
    /// Identity model, view and projection over the given viewport.
    pub fn new(viewport: Viewport) -> Self {
        return TransformSet {
            model: Matrix4::identity(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            viewport,
        };
    }

    /// projection * view * model
    pub fn mvp(&self) -> Matrix4<f32> {
        return self.projection * self.view * self.model;
    }

    /// Runs one local-space point through the chain, keeping its depth.
    pub fn project(&self, point: &Point3<f32>) -> ScreenPoint {
        return project_with(&self.mvp(), &self.viewport, point);
    }
}

/// Same as `TransformSet::project` with an already composed matrix, so a draw call composes once.
pub fn project_with(mvp: &Matrix4<f32>, viewport: &Viewport, point: &Point3<f32>) -> ScreenPoint {
    let clip = mvp * point.to_homogeneous();
    // No clipping: w == 0 yields non-finite coordinates, which the rasterizer drops.
    let ndc = Point3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
    return viewport.to_screen(ndc);
}

/// Rotation about the z axis, angle in degrees.
pub fn model_rotation_z(angle: f32) -> Matrix4<f32> {
    return Matrix4::from_axis_angle(&Vector3::z_axis(), angle.to_radians());
}

/// Rotation about an arbitrary axis through the origin (Rodrigues), angle in degrees.
pub fn rotation_about_axis(axis: Vector3<f32>, angle: f32) -> Result<Matrix4<f32>, RasterError> {
    let axis = Unit::try_new(axis, f32::EPSILON)
        .ok_or_else(|| RasterError::invalid("rotation axis must be non-zero"))?;
    return Ok(Matrix4::from_axis_angle(&axis, angle.to_radians()));
}

/// View matrix of a camera at `eye` looking down -z.
pub fn view_translation(eye: Point3<f32>) -> Matrix4<f32> {
    return Matrix4::new_translation(&-eye.coords);
}

/// View matrix of a camera at `eye` looking at `target`.
pub fn view_look_at(eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    return Matrix4::look_at_rh(&eye, &target, &up);
}

fn check_planes(near: f32, far: f32) -> Result<(), RasterError> {
    if !(near > 0.0 && near < far) {
        return Err(RasterError::invalid(format!(
            "clip planes need 0 < near < far, got near={} far={}",
            near, far
        )));
    }
    return Ok(());
}

/// Squashes the frustum between the planes z = -near and z = -far into the box between them.
/// Points on either plane keep their z after the divide by w; x and y are scaled by the near distance.
pub fn perspective_to_orthographic(near: f32, far: f32) -> Matrix4<f32> {
    // Camera looks down -z, so the planes sit at negative z.
    let n = -near;
    let f = -far;
    return matrix![n,   0.0, 0.0,   0.0;
                   0.0, n,   0.0,   0.0;
                   0.0, 0.0, n + f, -n * f;
                   0.0, 0.0, 1.0,   0.0];
}

/// Moves the center of the box [l, r] x [b, t] x [-far, -near] to the origin and scales
/// every axis to [-1, 1]. The near plane lands on z = -1, so smaller z is nearer.
pub fn orthographic(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Result<Matrix4<f32>, RasterError> {
    check_planes(near, far)?;
    if !(left < right && bottom < top) {
        return Err(RasterError::invalid(format!(
            "orthographic box is empty: [{}, {}] x [{}, {}]",
            left, right, bottom, top
        )));
    }
    let n = -near;
    let f = -far;
    let scale = matrix![2.0 / (right - left), 0.0,                  0.0,           0.0;
                        0.0,                  2.0 / (top - bottom), 0.0,           0.0;
                        0.0,                  0.0,                  2.0 / (f - n), 0.0;
                        0.0,                  0.0,                  0.0,           1.0];
    let translate = matrix![1.0, 0.0, 0.0, -(right + left) / 2.0;
                            0.0, 1.0, 0.0, -(top + bottom) / 2.0;
                            0.0, 0.0, 1.0, -(n + f) / 2.0;
                            0.0, 0.0, 0.0, 1.0];
    return Ok(scale * translate);
}

/// Perspective projection from a vertical field of view in degrees, the near plane's
/// width / height ratio and the two positive plane distances.
pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Result<Matrix4<f32>, RasterError> {
    check_planes(near, far)?;
    if !(fov > 0.0 && fov < 180.0) {
        return Err(RasterError::invalid(format!("field of view must be in (0, 180), got {}", fov)));
    }
    if !(aspect > 0.0) {
        return Err(RasterError::invalid(format!("aspect ratio must be positive, got {}", aspect)));
    }
    let top = near * (fov.to_radians() / 2.0).tan();
    let right = top * aspect;
    let ortho = orthographic(-right, right, -top, top, near, far)?;
    return Ok(ortho * perspective_to_orthographic(near, far));
}
