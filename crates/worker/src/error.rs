//! Error types for the upload worker.

use vidlift_transfer::TransferError;

use crate::session::UploadState;

/// Failure of the network call itself (no response received).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),
}

impl TransportError {
    /// Classifies a reqwest error, splitting out timeouts.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Why a chunk produced no status code.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("source error: {0}")]
    Source(#[from] TransferError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors produced by the upload session state machine.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition { from: UploadState, to: UploadState },
}

/// Errors produced by the worker execution context.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("worker terminated")]
    Terminated,
}
