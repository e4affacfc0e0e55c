use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the analysis engine and its collaborators.
///
/// `InvalidArgument` is always raised eagerly, before any frame is
/// processed — the engine never starts partial work it would have to
/// unwind.
#[derive(Debug, Error)]
pub enum CarveError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("stream ended mid-frame: {got} trailing bytes, frame is {frame_bytes} bytes")]
    IncompleteFrameData { got: usize, frame_bytes: usize },

    #[error("cancelled")]
    Cancelled,

    #[error("decoder failed: {0}")]
    Decoder(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CarveResult<T> = std::result::Result<T, CarveError>;

impl CarveError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CarveError::InvalidArgument(msg.into())
    }
}
