//! Isolated execution context for the session registry.
//!
//! The registry runs on its own OS thread with a single-threaded tokio
//! runtime, so chunk I/O never competes with the caller's executor. The
//! only ways in are the command channel and the cancellation token; the
//! only way out is the event hub.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vidlift_protocol::Command;

use crate::config::UploadConfig;
use crate::error::WorkerError;
use crate::events::EventHub;
use crate::registry::SessionRegistry;
use crate::transport::ChunkTransport;

const THREAD_NAME: &str = "vidlift-upload-worker";

/// Entry point for starting the worker thread.
pub struct UploadWorker;

impl UploadWorker {
    /// Spawns the worker thread and returns its handle.
    ///
    /// Events for every upload are published on `events`.
    pub fn spawn(
        config: &UploadConfig,
        transport: Arc<dyn ChunkTransport>,
        events: EventHub,
    ) -> Result<WorkerHandle, WorkerError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let registry = SessionRegistry::new(transport, config.chunk_size, events);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let token = cancel.clone();
        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                runtime.block_on(run(registry, commands_rx, token));
                // Outstanding chunk writes are abandoned, not awaited.
                runtime.shutdown_background();
            })?;

        info!(chunk_size = config.chunk_size, "upload worker started");
        Ok(WorkerHandle {
            commands: commands_tx,
            cancel,
            thread: Some(thread),
        })
    }
}

async fn run(
    mut registry: SessionRegistry,
    mut commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("upload worker cancelled");
                break;
            }

            cmd = commands.recv() => match cmd {
                Some(cmd) => registry.handle(cmd),
                None => {
                    debug!("command channel closed");
                    break;
                }
            },

            Some(settled) = registry.next_settled(), if !registry.is_idle() => {
                registry.on_settled(settled);
            }
        }
    }
    info!(active = registry.len(), "upload worker stopped");
}

/// Owner's handle to a running worker.
///
/// Dropping the handle terminates the worker.
#[derive(Debug)]
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Forwards a command to the worker.
    pub fn send(&self, command: Command) -> Result<(), WorkerError> {
        if self.cancel.is_cancelled() {
            return Err(WorkerError::Terminated);
        }
        self.commands
            .send(command)
            .map_err(|_| WorkerError::Terminated)
    }

    /// Returns `true` once the worker has been told to stop or its thread
    /// has exited.
    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled() || self.commands.is_closed()
    }

    /// Stops the worker. In-flight requests are abandoned and no further
    /// events are published. Idempotent.
    pub fn terminate(&mut self) {
        if self.thread.take().is_some() {
            info!("terminating upload worker");
        }
        self.cancel.cancel();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}
