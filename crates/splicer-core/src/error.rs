//! Error types for Splicer.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for Splicer operations.
#[derive(Error, Debug)]
pub enum SplicerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid trim range: start={start}, end={end:?}")]
    InvalidRange { start: f64, end: Option<f64> },

    #[error("Clip not found: {0}")]
    NotFound(Uuid),

    #[error("Timeline is empty, add at least one clip")]
    EmptyTimeline,

    #[error("Engine failed to load: {0}")]
    EngineLoad(String),

    #[error("Engine is busy with another export")]
    EngineBusy,

    #[error("Segment {index} failed to encode: {message}")]
    SegmentEncode { index: usize, message: String },

    #[error("Concatenation failed after re-encode fallback: {0}")]
    Concatenation(String),

    #[error("Failed to retrieve output: {0}")]
    Retrieval(String),

    #[error("Invalid engine command: {0}")]
    InvalidCommand(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Splicer operations.
pub type Result<T> = std::result::Result<T, SplicerError>;
