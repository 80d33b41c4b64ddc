use nalgebra as na;
use na::{vector, Vector3};

use crate::frame::{Color, DepthTarget};
use crate::transform::ScreenPoint;

/// Transformed vertex together with the color it carries into the triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenVertex {
    pub position: ScreenPoint,
    pub color: Color,
}

impl ScreenVertex {
    pub fn new(position: ScreenPoint, color: Color) -> Self {
        return ScreenVertex { position, color };
    }
}

/// Inclusive pixel range a primitive can touch, already clipped to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

/// Edge function of the directed edge a -> b evaluated at p.
/// Positive when p lies on the interior side of an edge of a positively wound triangle.
fn edge(a: &ScreenPoint, b: &ScreenPoint, px: f32, py: f32) -> f32 {
    return (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x);
}

/// Top-left fill rule for a positively wound triangle in y-down screen space.
/// A top edge is horizontal with the interior below it, a left edge goes up the screen.
fn is_top_left(a: &ScreenPoint, b: &ScreenPoint) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    return (dy == 0.0 && dx > 0.0) || dy < 0.0;
}

/// Triangle in screen space, re-wound so that every edge function is positive inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTriangle {
    v: [ScreenVertex; 3],
    area: f32,              // Twice the screen-space area, always positive.
    top_left: [bool; 3],    // Fill rule for edges b->c, c->a, a->b.
}

impl ScreenTriangle {
    /// Returns `None` for triangles that can never cover a pixel: zero area or non-finite coordinates.
    pub fn new(a: ScreenVertex, b: ScreenVertex, c: ScreenVertex) -> Option<ScreenTriangle> {
        if !(a.position.is_finite() && b.position.is_finite() && c.position.is_finite()) {
            return None;
        }
        let mut v = [a, b, c];
        let mut area = edge(&a.position, &b.position, c.position.x, c.position.y);
        if area == 0.0 {
            return None;
        }
        if area < 0.0 {
            // Counter-clockwise in clip space comes out clockwise after the y flip; accept both.
            v.swap(1, 2);
            area = -area;
        }
        let [p0, p1, p2] = [v[0].position, v[1].position, v[2].position];
        let top_left = [is_top_left(&p1, &p2), is_top_left(&p2, &p0), is_top_left(&p0, &p1)];
        return Some(ScreenTriangle { v, area, top_left });
    }

    /// Screen-space area in pixels.
    pub fn area(&self) -> f32 {
        return self.area / 2.0;
    }

    /// Candidate pixels inside `frame_width` x `[y_begin, y_end)`, or `None` when the triangle
    /// misses that region entirely.
    pub fn bounding_box(&self, frame_width: u32, y_begin: u32, y_end: u32) -> Option<BoundingBox> {
        let xs = self.v.map(|vertex| vertex.position.x);
        let ys = self.v.map(|vertex| vertex.position.y);
        let min_x = xs.iter().fold(f32::MAX, |m, x| m.min(*x)).floor().max(0.0);
        let max_x = xs.iter().fold(f32::MIN, |m, x| m.max(*x)).ceil().min(frame_width as f32 - 1.0);
        let min_y = ys.iter().fold(f32::MAX, |m, y| m.min(*y)).floor().max(y_begin as f32);
        let max_y = ys.iter().fold(f32::MIN, |m, y| m.max(*y)).ceil().min(y_end as f32 - 1.0);
        if min_x > max_x || min_y > max_y {
            return None;
        }
        return Some(BoundingBox {
            min_x: min_x as u32,
            min_y: min_y as u32,
            max_x: max_x as u32,
            max_y: max_y as u32,
        });
    }

    /// Barycentric weights of the sample point (px, py) if the triangle covers it.
    /// Samples exactly on an edge belong to the triangle only if that edge is a top or left edge,
    /// so triangles sharing an edge never both claim a sample.
    pub fn coverage(&self, px: f32, py: f32) -> Option<Vector3<f32>> {
        let [a, b, c] = [&self.v[0].position, &self.v[1].position, &self.v[2].position];
        let w = [edge(b, c, px, py), edge(c, a, px, py), edge(a, b, px, py)];
        for i in 0..3 {
            if w[i] < 0.0 || (w[i] == 0.0 && !self.top_left[i]) {
                return None;
            }
        }
        return Some(vector![w[0], w[1], w[2]] / self.area);
    }

    /// Interpolated depth and color at the given barycentric weights.
    /// Written relative to the first vertex so a constant attribute comes out exact.
    pub fn interpolate(&self, bar_coord: &Vector3<f32>) -> (f32, Color) {
        let [a, b, c] = &self.v;
        let depth = a.position.z
            + bar_coord.y * (b.position.z - a.position.z)
            + bar_coord.z * (c.position.z - a.position.z);
        let color = a.color + (b.color - a.color) * bar_coord.y + (c.color - a.color) * bar_coord.z;
        return (depth, color);
    }
}

/// Fills a triangle into the target with depth testing. Returns the number of pixels written.
pub fn rasterize_triangle<T: DepthTarget>(target: &mut T, triangle: &ScreenTriangle) -> usize {
    let (frame_width, _) = target.frame_size();
    let (y_begin, y_end) = target.rows();
    let bbox = match triangle.bounding_box(frame_width, y_begin, y_end) {
        Some(bbox) => bbox,
        None => return 0,
    };

    // @OPTI edge functions are affine, so they could be stepped per pixel instead of re-evaluated.
    let mut written = 0;
    for y in bbox.min_y..=bbox.max_y {
        for x in bbox.min_x..=bbox.max_x {
            // Sampling at the pixel center.
            let bar_coord = match triangle.coverage(x as f32 + 0.5, y as f32 + 0.5) {
                Some(bar_coord) => bar_coord,
                None => continue,
            };
            let (depth, color) = triangle.interpolate(&bar_coord);
            if target.test_and_set(x, y, depth, color) {
                written += 1;
            }
        }
    }
    return written;
}

/// Where a clipped segment ends: the line parameter and, when a frame edge cut it there,
/// the axis (0 for x, 1 for y) and coordinate of that edge.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClipEnd {
    t: f64,
    edge: Option<(usize, f64)>,
}

/// Clips the segment a -> b to the box [0, max_x] x [0, max_y] (Liang-Barsky).
/// Returns both surviving ends, or `None` when nothing survives.
/// Runs in f64 so the direction of two finite f32 endpoints never overflows.
fn clip_segment(a: &ScreenPoint, b: &ScreenPoint, max_x: f64, max_y: f64) -> Option<(ClipEnd, ClipEnd)> {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let dx = b.x as f64 - ax;
    let dy = b.y as f64 - ay;
    let mut start = ClipEnd { t: 0.0, edge: None };
    let mut end = ClipEnd { t: 1.0, edge: None };
    let checks = [
        (-dx, ax, (0, 0.0)),
        (dx, max_x - ax, (0, max_x)),
        (-dy, ay, (1, 0.0)),
        (dy, max_y - ay, (1, max_y)),
    ];
    for (p, q, edge) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 && t > start.t {
            start = ClipEnd { t, edge: Some(edge) };
        } else if p > 0.0 && t < end.t {
            end = ClipEnd { t, edge: Some(edge) };
        }
    }
    if !(start.t <= end.t) {
        return None;
    }
    return Some((start, end));
}

/// Draws a depth-tested line between a and b via Bresenham's algorithm as presented in
/// https://en.wikipedia.org/wiki/Bresenham%27s_line_algorithm
/// Depth and color are interpolated along the line. Returns the number of pixels written.
pub fn rasterize_line<T: DepthTarget>(target: &mut T, a: &ScreenVertex, b: &ScreenVertex) -> usize {
    if !(a.position.is_finite() && b.position.is_finite()) {
        return 0;
    }
    // Clipped against the whole frame, not the target's rows, so every band walks the same pixels.
    let (frame_width, frame_height) = target.frame_size();
    let (max_x, max_y) = (frame_width as f64 - 1.0, frame_height as f64 - 1.0);
    let (start, end) = match clip_segment(&a.position, &b.position, max_x, max_y) {
        Some(ends) => ends,
        None => return 0,
    };

    // Pixel, depth and color at a clipped end. The pixel always lies inside the frame.
    let at = |clip_end: ClipEnd| -> (i64, i64, f32, Color) {
        let t = clip_end.t;
        let lerp = |from: f32, to: f32| -> f64 {
            if t == 0.0 {
                return from as f64;
            }
            if t == 1.0 {
                return to as f64;
            }
            return from as f64 + t * (to as f64 - from as f64);
        };
        let mut point = [lerp(a.position.x, b.position.x), lerp(a.position.y, b.position.y)];
        // Long segments lose precision in t, the cutting edge itself is exact.
        if let Some((axis, value)) = clip_end.edge {
            point[axis] = value;
        }
        let x = point[0].floor().clamp(0.0, max_x) as i64;
        let y = point[1].floor().clamp(0.0, max_y) as i64;
        let depth = lerp(a.position.z, b.position.z) as f32;
        let color = a.color + (b.color - a.color) * t as f32;
        return (x, y, depth, color);
    };
    let (mut x_0, mut y_0, z_0, color_0) = at(start);
    let (x_1, y_1, z_1, color_1) = at(end);

    let dx: i64 = (x_1 - x_0).abs();
    let sx: i64 = if x_0 < x_1 { 1 } else { -1 };
    let dy: i64 = -(y_1 - y_0).abs();
    let sy: i64 = if y_0 < y_1 { 1 } else { -1 };
    let steps = dx.max(-dy).max(1) as f32;
    let mut error: i64 = dx + dy;

    let mut written = 0;
    let mut step = 0;
    loop {
        let t = step as f32 / steps;
        let depth = z_0 + t * (z_1 - z_0);
        let color = color_0 + (color_1 - color_0) * t;
        if target.test_and_set(x_0 as u32, y_0 as u32, depth, color) {
            written += 1;
        }
        if x_0 == x_1 && y_0 == y_1 {
            break;
        }
        let e2 = 2 * error;
        if e2 >= dy {
            error += dy;
            x_0 += sx;
        }
        if e2 <= dx {
            error += dx;
            y_0 += sy;
        }
        step += 1;
    }
    return written;
}
