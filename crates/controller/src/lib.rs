//! Upload controller.
//!
//! The only surface callers touch: it forwards typed commands to the upload
//! worker and hands out event subscriptions. It holds no session state.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info};
use vidlift_protocol::{Command, FileSource, UploadEvent};
use vidlift_worker::{
    ChunkTransport, EventHub, HttpTransport, UploadConfig, UploadWorker, WorkerError,
    WorkerHandle,
};

/// Errors returned by [`UploadController`].
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("controller has been shut down")]
    ShutDown,

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

enum WorkerSlot {
    NotStarted,
    Running(WorkerHandle),
    ShutDown,
}

/// Facade over the upload worker.
///
/// The worker thread is spawned on the first command and lives until
/// [`shutdown`](Self::shutdown) or drop.
pub struct UploadController {
    config: UploadConfig,
    transport: Arc<dyn ChunkTransport>,
    events: EventHub,
    worker: Mutex<WorkerSlot>,
}

impl UploadController {
    /// Creates a controller that sends chunks through `transport`.
    pub fn new(config: UploadConfig, transport: Arc<dyn ChunkTransport>) -> Self {
        Self {
            config,
            transport,
            events: EventHub::new(),
            worker: Mutex::new(WorkerSlot::NotStarted),
        }
    }

    /// Creates a controller backed by the HTTP transport.
    pub fn with_http(config: UploadConfig) -> Result<Self, ControllerError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Subscribes to events from every upload.
    ///
    /// Every event emitted after this call is delivered, however slowly the
    /// receiver is drained.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Starts (or restarts from zero) the upload `id`.
    pub fn start_upload(
        &self,
        id: impl Into<String>,
        url: impl Into<String>,
        file: FileSource,
    ) -> Result<(), ControllerError> {
        self.send(Command::StartUpload {
            id: id.into(),
            url: url.into(),
            file,
        })
    }

    /// Pauses `id` after its current chunk.
    pub fn pause_upload(&self, id: impl Into<String>) -> Result<(), ControllerError> {
        self.send(Command::PauseUpload { id: id.into() })
    }

    /// Resumes `id` from its last acknowledged offset.
    pub fn resume_upload(&self, id: impl Into<String>) -> Result<(), ControllerError> {
        self.send(Command::ResumeUpload { id: id.into() })
    }

    /// Cancels `id`.
    pub fn cancel_upload(&self, id: impl Into<String>) -> Result<(), ControllerError> {
        self.send(Command::CancelUpload { id: id.into() })
    }

    /// Forwards an already-built command.
    pub fn send(&self, command: Command) -> Result<(), ControllerError> {
        let mut slot = self.lock();
        if matches!(*slot, WorkerSlot::NotStarted) {
            let handle = UploadWorker::spawn(
                &self.config,
                Arc::clone(&self.transport),
                self.events.clone(),
            )?;
            *slot = WorkerSlot::Running(handle);
        }
        match &*slot {
            WorkerSlot::Running(handle) => {
                debug!(command = command.kind(), upload = %command.id(), "forwarding command");
                handle.send(command)?;
                Ok(())
            }
            _ => Err(ControllerError::ShutDown),
        }
    }

    /// Returns `true` once the worker thread has been spawned and not shut
    /// down.
    pub fn is_running(&self) -> bool {
        matches!(*self.lock(), WorkerSlot::Running(_))
    }

    /// Tears down the worker. In-flight requests are abandoned and no
    /// further events are emitted. Later commands fail with
    /// [`ControllerError::ShutDown`].
    pub fn shutdown(&self) {
        let mut slot = self.lock();
        if let WorkerSlot::Running(handle) = &mut *slot {
            handle.terminate();
            info!("upload controller shut down");
        }
        *slot = WorkerSlot::ShutDown;
    }

    fn lock(&self) -> MutexGuard<'_, WorkerSlot> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
