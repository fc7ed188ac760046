use serde::{Deserialize, Serialize};

use crate::types::FileSource;

// ---------------------------------------------------------------------------
// Commands (caller -> worker)
// ---------------------------------------------------------------------------

/// A control message for the upload worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Begins uploading `file` to the resumable endpoint at `url`.
    StartUpload {
        id: String,
        url: String,
        file: FileSource,
    },
    PauseUpload { id: String },
    ResumeUpload { id: String },
    CancelUpload { id: String },
}

impl Command {
    /// Returns the upload identifier this command targets.
    pub fn id(&self) -> &str {
        match self {
            Self::StartUpload { id, .. }
            | Self::PauseUpload { id }
            | Self::ResumeUpload { id }
            | Self::CancelUpload { id } => id,
        }
    }

    /// Returns the wire name of the command.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartUpload { .. } => "START_UPLOAD",
            Self::PauseUpload { .. } => "PAUSE_UPLOAD",
            Self::ResumeUpload { .. } => "RESUME_UPLOAD",
            Self::CancelUpload { .. } => "CANCEL_UPLOAD",
        }
    }
}

// ---------------------------------------------------------------------------
// Events (worker -> caller)
// ---------------------------------------------------------------------------

/// A status message emitted by the upload worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadEvent {
    #[serde(rename_all = "camelCase")]
    UploadStarted { id: String, total_size: u64 },
    /// Percentage of acknowledged bytes, `0..=100`.
    UploadProgress { id: String, progress: u8 },
    UploadPaused { id: String },
    UploadResumed { id: String },
    UploadCancelled { id: String },
    UploadSuccess { id: String },
    /// Terminal failure. `status` is set when the endpoint answered with an
    /// unexpected HTTP status.
    UploadError {
        id: String,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl UploadEvent {
    /// Returns the upload identifier this event belongs to.
    pub fn id(&self) -> &str {
        match self {
            Self::UploadStarted { id, .. }
            | Self::UploadProgress { id, .. }
            | Self::UploadPaused { id }
            | Self::UploadResumed { id }
            | Self::UploadCancelled { id }
            | Self::UploadSuccess { id }
            | Self::UploadError { id, .. } => id,
        }
    }

    /// Returns the wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UploadStarted { .. } => "UPLOAD_STARTED",
            Self::UploadProgress { .. } => "UPLOAD_PROGRESS",
            Self::UploadPaused { .. } => "UPLOAD_PAUSED",
            Self::UploadResumed { .. } => "UPLOAD_RESUMED",
            Self::UploadCancelled { .. } => "UPLOAD_CANCELLED",
            Self::UploadSuccess { .. } => "UPLOAD_SUCCESS",
            Self::UploadError { .. } => "UPLOAD_ERROR",
        }
    }

    /// Returns `true` for events after which nothing more is emitted for
    /// the identifier.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::UploadCancelled { .. } | Self::UploadSuccess { .. } | Self::UploadError { .. }
        )
    }
}
