use std::ops::BitOr;

use nalgebra as na;
use na::{vector, Vector3};

use crate::error::RasterError;

/// RGB float triple, channels on a 0-255 scale.
pub type Color = Vector3<f32>;

pub const BLACK: Color = Vector3::new(0.0, 0.0, 0.0);
pub const WHITE: Color = Vector3::new(255.0, 255.0, 255.0);

/// Which of the frame buffers a `clear` call resets.
/// Combine with `|`: `Buffers::COLOR | Buffers::DEPTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffers(u8);

impl Buffers {
    pub const COLOR: Buffers = Buffers(0b01);
    pub const DEPTH: Buffers = Buffers(0b10);
    pub const BOTH: Buffers = Buffers(0b11);

    pub fn contains(self, other: Buffers) -> bool {
        return self.0 & other.0 == other.0;
    }
}

impl BitOr for Buffers {
    type Output = Buffers;

    fn bitor(self, rhs: Buffers) -> Buffers {
        return Buffers(self.0 | rhs.0);
    }
}

/// Anything the rasterizer can write fragments into.
///
/// Implementors own a horizontal strip of rows `[y_begin, y_end)` of a frame of
/// `frame_size()` pixels, and must perform the depth comparison and the paired
/// color/depth write as one step.
pub trait DepthTarget {
    /// Width and height of the whole frame, not just the rows this target owns.
    fn frame_size(&self) -> (u32, u32);
    fn rows(&self) -> (u32, u32);

    /// Writes `color` and `depth` at (x, y) if `depth` is strictly nearer than the stored value.
    /// Returns whether the fragment was written. Coordinates outside the target are ignored.
    fn test_and_set(&mut self, x: u32, y: u32, depth: f32, color: Color) -> bool;
}

/// Strictly-less depth test over paired slices. Ties keep the first write.
fn depth_test_write(color: &mut [Color], depth: &mut [f32], index: usize, z: f32, c: Color) -> bool {
    if !(z < depth[index]) {
        return false;
    }
    depth[index] = z;
    color[index] = c;
    return true;
}

/// Color and depth buffers of a fixed resolution.
/// (0, 0) is the top left pixel, rows are stored top to bottom.
pub struct FrameBuffers {
    width: u32,
    height: u32,
    clear_color: Color,
    color: Vec<Color>, // Row-major color triples.
    depth: Vec<f32>,   // Row-major depth, f32::INFINITY where nothing was written since the last clear.
}

impl FrameBuffers {
    pub fn new(width: u32, height: u32) -> Result<FrameBuffers, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::invalid(format!(
                "frame size must be positive, got {}x{}",
                width, height
            )));
        }
        let n_pixels = width as usize * height as usize;
        return Ok(FrameBuffers {
            width,
            height,
            clear_color: BLACK,
            color: vec![BLACK; n_pixels],
            depth: vec![f32::INFINITY; n_pixels],
        });
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn clear(&mut self, which: Buffers) {
        if which.contains(Buffers::COLOR) {
            let clear_color = self.clear_color;
            self.color.iter_mut().for_each(|c| *c = clear_color);
        }
        if which.contains(Buffers::DEPTH) {
            self.depth.iter_mut().for_each(|d| *d = f32::INFINITY);
        }
    }

    /// Flat row-major color triples.
    pub fn color_data(&self) -> &[Color] {
        return &self.color[..];
    }

    pub fn depth_data(&self) -> &[f32] {
        return &self.depth[..];
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        return Some(y as usize * self.width as usize + x as usize);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        return self.index(x, y).map(|i| self.color[i]);
    }

    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        return self.index(x, y).map(|i| self.depth[i]);
    }

    /// Color buffer as rgb8 bytes, channels clamped to [0, 255].
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(3 * self.color.len());
        for c in &self.color {
            data.push(c.x.clamp(0.0, 255.0) as u8);
            data.push(c.y.clamp(0.0, 255.0) as u8);
            data.push(c.z.clamp(0.0, 255.0) as u8);
        }
        return data;
    }

    /// Greyscale rgb8 view of the depth buffer: nearest written depth is white, farthest is dark,
    /// untouched pixels are black.
    pub fn depth_to_rgb8(&self) -> Vec<u8> {
        let written = self.depth.iter().copied().filter(|z| z.is_finite());
        let (z_min, z_max) = written.fold((f32::MAX, f32::MIN), |(lo, hi), z| (lo.min(z), hi.max(z)));
        let scale = if z_max > z_min { z_max - z_min } else { 1.0 };

        let mut data = Vec::with_capacity(3 * self.depth.len());
        for z in &self.depth {
            let value = if z.is_finite() {
                // Keep the farthest surface visible against the background.
                (255.0 - 223.0 * (z - z_min) / scale) as u8
            } else {
                0
            };
            data.extend_from_slice(&[value, value, value]);
        }
        return data;
    }

    /// Copies the frame out into `count` horizontal bands of roughly equal height.
    /// Bands are returned top to bottom and never overlap.
    pub fn split_bands(&self, count: usize) -> Vec<FrameBand> {
        let count = count.clamp(1, self.height as usize) as u32;
        let rows_per_band = (self.height + count - 1) / count;
        let mut bands = Vec::with_capacity(count as usize);
        let mut y_begin = 0;
        while y_begin < self.height {
            let y_end = (y_begin + rows_per_band).min(self.height);
            let begin = y_begin as usize * self.width as usize;
            let end = y_end as usize * self.width as usize;
            bands.push(FrameBand {
                width: self.width,
                frame_height: self.height,
                y_begin,
                y_end,
                color: self.color[begin..end].to_vec(),
                depth: self.depth[begin..end].to_vec(),
            });
            y_begin = y_end;
        }
        return bands;
    }

    /// Writes a band produced by `split_bands` back into its rows.
    pub fn merge_band(&mut self, band: FrameBand) {
        let begin = band.y_begin as usize * self.width as usize;
        let end = begin + band.color.len();
        self.color[begin..end].copy_from_slice(&band.color);
        self.depth[begin..end].copy_from_slice(&band.depth);
    }
}

impl DepthTarget for FrameBuffers {
    fn frame_size(&self) -> (u32, u32) {
        return (self.width, self.height);
    }

    fn rows(&self) -> (u32, u32) {
        return (0, self.height);
    }

    fn test_and_set(&mut self, x: u32, y: u32, depth: f32, color: Color) -> bool {
        match self.index(x, y) {
            Some(index) => depth_test_write(&mut self.color, &mut self.depth, index, depth, color),
            None => false,
        }
    }
}

/// Owned copy of rows `[y_begin, y_end)` of a frame, shipped to a rasterization worker.
pub struct FrameBand {
    width: u32,
    frame_height: u32,
    y_begin: u32,
    y_end: u32,
    color: Vec<Color>,
    depth: Vec<f32>,
}

impl DepthTarget for FrameBand {
    fn frame_size(&self) -> (u32, u32) {
        return (self.width, self.frame_height);
    }

    fn rows(&self) -> (u32, u32) {
        return (self.y_begin, self.y_end);
    }

    fn test_and_set(&mut self, x: u32, y: u32, depth: f32, color: Color) -> bool {
        if x >= self.width || y < self.y_begin || y >= self.y_end {
            return false;
        }
        let index = (y - self.y_begin) as usize * self.width as usize + x as usize;
        return depth_test_write(&mut self.color, &mut self.depth, index, depth, color);
    }
}

/// Convenience constructor matching the `vector!` style used across the crate.
pub fn rgb(r: f32, g: f32, b: f32) -> Color {
    return vector![r, g, b];
}
