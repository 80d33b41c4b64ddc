use std::io::BufRead;
use std::sync::{mpsc, Arc};

use nalgebra as na;
use na::{Matrix4, Point3, Vector3};
use threadpool::ThreadPool;

use crate::error::RasterError;
use crate::frame::{Buffers, Color, DepthTarget, FrameBuffers, WHITE};
use crate::geometry::{check_indices, ColorHandle, GeometryStore, IndexHandle, VertexHandle};
use crate::raster::{rasterize_line, rasterize_triangle, ScreenTriangle, ScreenVertex};
use crate::transform::{project_with, TransformSet, Viewport};

/// How the index triples of a draw call are turned into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// Outline of every triangle.
    Line,
    /// Filled triangles.
    Triangle,
}

/// Screen-space primitive ready for rasterization.
#[derive(Debug, Clone, Copy)]
enum Primitive {
    Triangle(ScreenTriangle),
    Line(ScreenVertex, ScreenVertex),
}

fn draw_primitives<T: DepthTarget>(target: &mut T, primitives: &[Primitive]) -> usize {
    let mut written = 0;
    for primitive in primitives {
        written += match primitive {
            Primitive::Triangle(triangle) => rasterize_triangle(target, triangle),
            Primitive::Line(a, b) => rasterize_line(target, a, b),
        };
    }
    return written;
}

/// Software rasterization pipeline: owns uploaded geometry, the current transform and the
/// frame buffers, and draws indexed triangle lists into them.
///
/// Typical frame:
/// ```
/// use tiny_rasterizer::{Buffers, PrimitiveKind, Rasterizer};
/// use nalgebra::{point, vector};
///
/// let mut r = Rasterizer::new(64, 64).unwrap();
/// let positions = r.load_positions(vec![point![-0.5, -0.5, 0.0], point![0.5, -0.5, 0.0], point![0.0, 0.5, 0.0]]).unwrap();
/// let indices = r.load_indices(vec![vector![0, 1, 2]]).unwrap();
/// r.clear(Buffers::COLOR | Buffers::DEPTH);
/// r.draw(positions, indices, PrimitiveKind::Triangle).unwrap();
/// assert_eq!(r.frame_buffer().len(), 64 * 64);
/// ```
pub struct Rasterizer {
    geometry: GeometryStore,
    frame: FrameBuffers,
    transform: TransformSet, // Current transform, used by `draw`.
    color: Color,            // Flat color, used when no color buffer is given.
    pool: Option<ThreadPool>,
}

impl Rasterizer {
    /// Single-threaded rasterizer with frame buffers of the given resolution.
    pub fn new(width: u32, height: u32) -> Result<Rasterizer, RasterError> {
        let frame = FrameBuffers::new(width, height)?;
        let viewport = Viewport::new(width, height)?;
        return Ok(Rasterizer {
            geometry: GeometryStore::new(),
            frame,
            transform: TransformSet::new(viewport),
            color: WHITE,
            pool: None,
        });
    }

    /// Rasterizer that splits every draw across `workers` threads, one band of rows each.
    /// `0` picks the number of logical CPUs, `1` rasterizes on the calling thread.
    pub fn with_workers(width: u32, height: u32, workers: usize) -> Result<Rasterizer, RasterError> {
        let mut rasterizer = Rasterizer::new(width, height)?;
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        if workers > 1 {
            rasterizer.pool = Some(ThreadPool::with_name("rasterizer".to_string(), workers));
        }
        return Ok(rasterizer);
    }

    pub fn workers(&self) -> usize {
        return self.pool.as_ref().map_or(1, |pool| pool.max_count());
    }

    pub fn width(&self) -> u32 {
        return self.frame.width();
    }

    pub fn height(&self) -> u32 {
        return self.frame.height();
    }

    pub fn load_positions(&mut self, positions: Vec<Point3<f32>>) -> Result<VertexHandle, RasterError> {
        return self.geometry.load_positions(positions);
    }

    pub fn load_indices(&mut self, indices: Vec<Vector3<usize>>) -> Result<IndexHandle, RasterError> {
        return self.geometry.load_indices(indices);
    }

    pub fn load_colors(&mut self, colors: Vec<Color>) -> Result<ColorHandle, RasterError> {
        return self.geometry.load_colors(colors);
    }

    pub fn load_obj<R: BufRead>(&mut self, reader: R) -> Result<(VertexHandle, IndexHandle), RasterError> {
        return self.geometry.load_obj(reader);
    }

    pub fn set_model(&mut self, model: Matrix4<f32>) {
        self.transform.model = model;
    }

    pub fn set_view(&mut self, view: Matrix4<f32>) {
        self.transform.view = view;
    }

    pub fn set_projection(&mut self, projection: Matrix4<f32>) {
        self.transform.projection = projection;
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), RasterError> {
        self.transform.viewport = Viewport::new(width, height)?;
        return Ok(());
    }

    pub fn set_viewport_rect(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<(), RasterError> {
        self.transform.viewport = Viewport::with_origin(x, y, width, height)?;
        return Ok(());
    }

    pub fn transform(&self) -> &TransformSet {
        return &self.transform;
    }

    pub fn set_transform(&mut self, transform: TransformSet) {
        self.transform = transform;
    }

    /// Solid color for `draw`.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.frame.set_clear_color(color);
    }

    pub fn clear(&mut self, which: Buffers) {
        self.frame.clear(which);
    }

    /// Draws with the current transform and the flat color.
    pub fn draw(
        &mut self,
        vertex_handle: VertexHandle,
        index_handle: IndexHandle,
        kind: PrimitiveKind,
    ) -> Result<(), RasterError> {
        let transform = self.transform;
        return self.draw_with(&transform, vertex_handle, index_handle, kind);
    }

    /// Draws with an explicit transform, leaving the current one alone.
    pub fn draw_with(
        &mut self,
        transform: &TransformSet,
        vertex_handle: VertexHandle,
        index_handle: IndexHandle,
        kind: PrimitiveKind,
    ) -> Result<(), RasterError> {
        let (positions, indices) = self.geometry.resolve(vertex_handle, index_handle)?;
        let primitives = assemble(transform, positions, indices, &VertexColors::Flat(self.color), kind);
        self.render(primitives);
        return Ok(());
    }

    /// Draws with the current transform, interpolating per-vertex colors.
    /// The color buffer is indexed like the position buffer.
    pub fn draw_colored(
        &mut self,
        vertex_handle: VertexHandle,
        index_handle: IndexHandle,
        color_handle: ColorHandle,
        kind: PrimitiveKind,
    ) -> Result<(), RasterError> {
        let (positions, indices) = self.geometry.resolve(vertex_handle, index_handle)?;
        let colors = self.geometry.colors(color_handle)?;
        check_indices(indices, colors.len())?;
        let primitives = assemble(&self.transform, positions, indices, &VertexColors::PerVertex(colors), kind);
        self.render(primitives);
        return Ok(());
    }

    fn render(&mut self, primitives: Vec<Primitive>) {
        let pool = match &self.pool {
            Some(pool) => pool,
            None => {
                let written = draw_primitives(&mut self.frame, &primitives);
                log::debug!("drew {} primitives, {} fragments written", primitives.len(), written);
                return;
            }
        };

        let primitives = Arc::new(primitives);
        let bands = self.frame.split_bands(pool.max_count());
        let n_bands = bands.len();
        let (sender, receiver) = mpsc::channel();
        for mut band in bands {
            let sender = sender.clone();
            let primitives = Arc::clone(&primitives);
            pool.execute(move || {
                let written = draw_primitives(&mut band, &primitives);
                // The receiver only goes away once every band has been collected.
                let _ = sender.send((band, written));
            });
        }
        drop(sender);

        let mut merged = 0;
        let mut written = 0;
        for (band, band_written) in receiver.iter() {
            self.frame.merge_band(band);
            merged += 1;
            written += band_written;
        }
        if merged != n_bands {
            log::error!("{} of {} rasterization bands were lost, their rows are unchanged", n_bands - merged, n_bands);
        }
        log::debug!(
            "drew {} primitives over {} bands on {} workers, {} fragments written",
            primitives.len(),
            n_bands,
            pool.max_count(),
            written
        );
    }

    /// Color buffer as a flat row-major sequence.
    pub fn frame_buffer(&self) -> &[Color] {
        return self.frame.color_data();
    }

    pub fn depth_buffer(&self) -> &[f32] {
        return self.frame.depth_data();
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        return self.frame.pixel(x, y);
    }

    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        return self.frame.depth(x, y);
    }

    pub fn to_rgb8(&self) -> Vec<u8> {
        return self.frame.to_rgb8();
    }

    pub fn depth_to_rgb8(&self) -> Vec<u8> {
        return self.frame.depth_to_rgb8();
    }

    pub fn frame(&self) -> &FrameBuffers {
        return &self.frame;
    }
}

enum VertexColors<'a> {
    Flat(Color),
    PerVertex(&'a [Color]),
}

impl VertexColors<'_> {
    /// Colors only have to cover the referenced vertices, the rest are never rasterized.
    fn get(&self, index: usize) -> Color {
        return match self {
            VertexColors::Flat(color) => *color,
            VertexColors::PerVertex(colors) => colors.get(index).copied().unwrap_or(WHITE),
        };
    }
}

/// Transforms every vertex once and builds the screen-space primitives.
/// Indices must already be checked against `positions` (and the color buffer).
fn assemble(
    transform: &TransformSet,
    positions: &[Point3<f32>],
    indices: &[Vector3<usize>],
    colors: &VertexColors,
    kind: PrimitiveKind,
) -> Vec<Primitive> {
    let mvp = transform.mvp();
    let screen: Vec<ScreenVertex> = positions
        .iter()
        .enumerate()
        .map(|(i, point)| ScreenVertex::new(project_with(&mvp, &transform.viewport, point), colors.get(i)))
        .collect();

    let mut primitives = Vec::with_capacity(indices.len());
    let mut skipped = 0;
    for triple in indices {
        let [a, b, c] = [screen[triple[0]], screen[triple[1]], screen[triple[2]]];
        match kind {
            PrimitiveKind::Triangle => match ScreenTriangle::new(a, b, c) {
                Some(triangle) => primitives.push(Primitive::Triangle(triangle)),
                None => {
                    if !(a.position.is_finite() && b.position.is_finite() && c.position.is_finite()) {
                        log::trace!("skipped non-finite triangle {:?}", triple);
                    }
                    skipped += 1;
                }
            },
            PrimitiveKind::Line => {
                primitives.push(Primitive::Line(a, b));
                primitives.push(Primitive::Line(b, c));
                primitives.push(Primitive::Line(c, a));
            }
        }
    }
    if skipped > 0 {
        log::debug!("skipped {} degenerate or non-finite triangles of {}", skipped, indices.len());
    }
    return primitives;
}
