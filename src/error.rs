//! Typed failures for frame decode and perception.

use thiserror::Error;

/// An inbound frame could not be turned into pixels. The only hard stop in
/// the analysis pipeline.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame buffer is empty")]
    Empty,

    #[error("unrecognised image format")]
    UnknownFormat,

    #[error("malformed image data: {0}")]
    Malformed(#[from] image::ImageError),

    #[error("decode exceeded {0}ms")]
    Timeout(u64),

    #[error("decode worker failed: {0}")]
    Worker(String),
}

/// A perception model failed on a frame. Always degraded to a safe default
/// before it reaches the monitor.
#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("model inference failed: {0}")]
    Model(String),

    #[error("inference exceeded {0}ms")]
    Timeout(u64),

    #[error("inference worker failed: {0}")]
    Worker(String),
}
