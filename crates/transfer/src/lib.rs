//! Wire codec for resumable chunked uploads.
//!
//! Builds the per-chunk `PUT` request (byte range header plus body slice)
//! and maps the endpoint's status code onto the next session step.

mod codec;
mod source;

pub use codec::{
    CHUNK_METHOD, ChunkOutcome, ChunkRequest, STATUS_RESUME_INCOMPLETE, build_chunk_request,
    chunk_range, content_range, interpret_response, progress_percent,
};
pub use source::ChunkSource;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a regular file: {0}")]
    InvalidSource(String),

    #[error("range {start}..{end} outside source of {size} bytes")]
    RangeOutOfBounds { start: u64, end: u64, size: u64 },

    #[error("body is {actual} bytes but range covers {expected}")]
    BodyLengthMismatch { expected: u64, actual: u64 },

    #[error("read task failed: {0}")]
    Join(String),
}
