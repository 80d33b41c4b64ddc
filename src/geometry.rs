use std::io::BufRead;

use nalgebra as na;
use na::{vector, Point3, Vector3};
use obj::{load_obj, Obj, Position};

use crate::error::RasterError;
use crate::frame::Color;

/// Opaque reference to an uploaded vertex position buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexHandle(usize);

/// Opaque reference to an uploaded index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexHandle(usize);

/// Opaque reference to an uploaded per-vertex color buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorHandle(usize);

/// Arena of uploaded geometry. Nothing is ever removed, so a handle stays valid for as long as
/// the store lives and is never reused.
#[derive(Default)]
pub struct GeometryStore {
    positions: Vec<Vec<Point3<f32>>>,
    indices: Vec<Vec<Vector3<usize>>>,
    colors: Vec<Vec<Color>>,
}

impl GeometryStore {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn load_positions(&mut self, positions: Vec<Point3<f32>>) -> Result<VertexHandle, RasterError> {
        if positions.is_empty() {
            return Err(RasterError::invalid("position buffer is empty"));
        }
        self.positions.push(positions);
        return Ok(VertexHandle(self.positions.len() - 1));
    }

    /// Index triples are not checked here, since the position buffer they refer to is only
    /// known at draw time.
    pub fn load_indices(&mut self, indices: Vec<Vector3<usize>>) -> Result<IndexHandle, RasterError> {
        if indices.is_empty() {
            return Err(RasterError::invalid("index buffer is empty"));
        }
        self.indices.push(indices);
        return Ok(IndexHandle(self.indices.len() - 1));
    }

    pub fn load_colors(&mut self, colors: Vec<Color>) -> Result<ColorHandle, RasterError> {
        if colors.is_empty() {
            return Err(RasterError::invalid("color buffer is empty"));
        }
        self.colors.push(colors);
        return Ok(ColorHandle(self.colors.len() - 1));
    }

    /// Uploads the positions and faces of a triangulated Wavefront OBJ.
    pub fn load_obj<R: BufRead>(&mut self, reader: R) -> Result<(VertexHandle, IndexHandle), RasterError> {
        let model: Obj<Position, u32> = load_obj(reader)?;
        if model.vertices.is_empty() || model.indices.len() < 3 {
            return Err(RasterError::invalid("obj mesh has no faces"));
        }
        let positions = model
            .vertices
            .iter()
            .map(|vertex| Point3::from(vertex.position))
            .collect();
        let indices = model
            .indices
            .chunks_exact(3)
            .map(|face| vector![face[0] as usize, face[1] as usize, face[2] as usize])
            .collect();
        log::debug!(
            "obj mesh: {} vertices, {} faces",
            model.vertices.len(),
            model.indices.len() / 3
        );

        let vertex_handle = self.load_positions(positions)?;
        let index_handle = self.load_indices(indices)?;
        return Ok((vertex_handle, index_handle));
    }

    pub fn positions(&self, handle: VertexHandle) -> Result<&[Point3<f32>], RasterError> {
        return self
            .positions
            .get(handle.0)
            .map(|buffer| &buffer[..])
            .ok_or_else(|| RasterError::UnknownHandle("vertex".to_string()));
    }

    pub fn indices(&self, handle: IndexHandle) -> Result<&[Vector3<usize>], RasterError> {
        return self
            .indices
            .get(handle.0)
            .map(|buffer| &buffer[..])
            .ok_or_else(|| RasterError::UnknownHandle("index".to_string()));
    }

    pub fn colors(&self, handle: ColorHandle) -> Result<&[Color], RasterError> {
        return self
            .colors
            .get(handle.0)
            .map(|buffer| &buffer[..])
            .ok_or_else(|| RasterError::UnknownHandle("color".to_string()));
    }

    /// Resolves a position/index pairing for drawing, checking every triple against the
    /// position buffer's bounds before anything is rasterized.
    pub fn resolve(
        &self,
        vertex_handle: VertexHandle,
        index_handle: IndexHandle,
    ) -> Result<(&[Point3<f32>], &[Vector3<usize>]), RasterError> {
        let positions = self.positions(vertex_handle)?;
        let indices = self.indices(index_handle)?;
        check_indices(indices, positions.len())?;
        return Ok((positions, indices));
    }
}

/// Fails with the first index that does not fit a buffer of length `len`.
pub fn check_indices(indices: &[Vector3<usize>], len: usize) -> Result<(), RasterError> {
    match indices.iter().flat_map(|triple| triple.iter()).find(|index| **index >= len) {
        Some(index) => Err(RasterError::OutOfRange { index: *index, len }),
        None => Ok(()),
    }
}
