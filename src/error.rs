use std::fmt;

/// Errors reported by the rasterizer to the call that triggered them.
///
/// A failing call leaves geometry and frame buffers exactly as they were.
#[derive(Debug)]
pub enum RasterError {
    /// Empty input buffers, zero viewport extent, bad projection parameters.
    InvalidArgument(String),
    /// An index triple references a vertex (or vertex color) past the end of its buffer.
    OutOfRange { index: usize, len: usize },
    /// A handle that was never issued by this geometry store.
    UnknownHandle(String),
    /// Mesh import failed.
    Obj(obj::ObjError),
}

impl RasterError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        return RasterError::InvalidArgument(msg.into());
    }
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            RasterError::OutOfRange { index, len } => {
                write!(f, "index {} out of range for buffer of length {}", index, len)
            }
            RasterError::UnknownHandle(what) => write!(f, "unknown {} handle", what),
            RasterError::Obj(err) => write!(f, "failed to load obj mesh: {}", err),
        }
    }
}

impl std::error::Error for RasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RasterError::Obj(err) => Some(err),
            _ => None,
        }
    }
}

impl From<obj::ObjError> for RasterError {
    fn from(err: obj::ObjError) -> Self {
        return RasterError::Obj(err);
    }
}
