//! Software rasterization core: uploaded geometry goes through a model/view/projection
//! chain and a viewport into a color buffer guarded by a depth buffer.

pub mod error;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod raster;
pub mod transform;

pub use error::RasterError;
pub use frame::{rgb, Buffers, Color, DepthTarget, FrameBuffers, BLACK, WHITE};
pub use geometry::{ColorHandle, GeometryStore, IndexHandle, VertexHandle};
pub use pipeline::{PrimitiveKind, Rasterizer};
pub use transform::{
    model_rotation_z, orthographic, perspective, perspective_to_orthographic, rotation_about_axis,
    view_look_at, view_translation, ScreenPoint, TransformSet, Viewport,
};
