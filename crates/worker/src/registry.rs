//! Session registry: routes commands to sessions and drives their
//! transfer loops.
//!
//! The registry exclusively owns every [`UploadSession`]. Outstanding chunk
//! writes live in a `FuturesUnordered`; each one resolves to a
//! [`SettledChunk`] tagged with the session's generation so a result for a
//! cancelled or superseded session is discarded instead of being applied
//! to a newer session with the same identifier.
//!
//! A retired session's outstanding chunk still occupies its identifier: a
//! new session under the same id sends nothing until that chunk settles.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, info, warn};
use vidlift_protocol::{Command, FileSource, UploadEvent};
use vidlift_transfer::{ChunkSource, build_chunk_request};

use crate::error::ChunkError;
use crate::events::EventHub;
use crate::session::{Settlement, Step, UploadSession};
use crate::transport::ChunkTransport;

/// A chunk write that has finished, successfully or not.
#[derive(Debug)]
pub struct SettledChunk {
    pub id: String,
    pub generation: u64,
    pub range: Range<u64>,
    pub result: Result<u16, ChunkError>,
}

/// Maps upload identifiers to their sessions.
pub struct SessionRegistry {
    sessions: HashMap<String, UploadSession>,
    in_flight: FuturesUnordered<BoxFuture<'static, SettledChunk>>,
    transport: Arc<dyn ChunkTransport>,
    chunk_size: u64,
    events: EventHub,
    next_generation: u64,
    /// Generation of a cancelled or superseded session whose chunk is
    /// still on the wire, by id.
    retiring: HashMap<String, u64>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(
        transport: Arc<dyn ChunkTransport>,
        chunk_size: u64,
        events: EventHub,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            in_flight: FuturesUnordered::new(),
            transport,
            chunk_size,
            events,
            next_generation: 0,
            retiring: HashMap::new(),
        }
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session is active.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Identifiers of all active sessions.
    pub fn active_ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Returns the active session for `id`.
    pub fn session(&self, id: &str) -> Option<&UploadSession> {
        self.sessions.get(id)
    }

    /// Returns `true` if a retired session under `id` still has a chunk on
    /// the wire.
    pub fn is_retiring(&self, id: &str) -> bool {
        self.retiring.contains_key(id)
    }

    /// Returns `true` if no chunk write is outstanding.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Dispatches a command to its handler.
    pub fn handle(&mut self, command: Command) {
        debug!(command = command.kind(), upload = %command.id(), "command received");
        match command {
            Command::StartUpload { id, url, file } => self.handle_start(id, url, file),
            Command::PauseUpload { id } => self.handle_pause(&id),
            Command::ResumeUpload { id } => self.handle_resume(&id),
            Command::CancelUpload { id } => self.handle_cancel(&id),
        }
    }

    /// Creates a session at offset 0 and starts its transfer loop.
    ///
    /// An existing session under `id` is superseded: it is dropped without
    /// an event and its outstanding chunk result is discarded.
    pub fn handle_start(&mut self, id: String, url: String, file: FileSource) {
        if let Some(old) = self.sessions.remove(&id) {
            info!(
                upload = %id,
                offset = old.offset(),
                "superseding active session"
            );
            self.retire(&old);
        }

        let source = match ChunkSource::open(file) {
            Ok(s) => s,
            Err(e) => {
                warn!(upload = %id, error = %e, "cannot open upload source");
                self.emit(UploadEvent::UploadError {
                    id,
                    error: e.to_string(),
                    status: None,
                });
                return;
            }
        };

        self.next_generation += 1;
        let mut session =
            UploadSession::new(id.clone(), url, source, self.chunk_size, self.next_generation);
        let total_size = session.total_size();
        if let Err(e) = session.begin() {
            warn!(upload = %id, error = %e, "cannot start session");
            return;
        }
        self.sessions.insert(id.clone(), session);

        info!(upload = %id, total_size, "upload started");
        self.emit(UploadEvent::UploadStarted {
            id: id.clone(),
            total_size,
        });
        self.pump(&id);
    }

    /// Raises the pause flag and acknowledges immediately.
    pub fn handle_pause(&mut self, id: &str) {
        let Some(session) = self.sessions.get_mut(id) else {
            debug!(upload = %id, "pause for unknown upload ignored");
            return;
        };
        if let Err(e) = session.pause() {
            warn!(upload = %id, error = %e, "pause refused");
            return;
        }
        info!(upload = %id, offset = session.offset(), "upload paused");
        self.emit(UploadEvent::UploadPaused { id: id.to_string() });
    }

    /// Clears the pause flag and restarts the loop from the current offset.
    pub fn handle_resume(&mut self, id: &str) {
        let Some(session) = self.sessions.get_mut(id) else {
            debug!(upload = %id, "resume for unknown upload ignored");
            return;
        };
        if let Err(e) = session.resume() {
            warn!(upload = %id, error = %e, "resume refused");
            return;
        }
        info!(upload = %id, offset = session.offset(), "upload resumed");
        self.emit(UploadEvent::UploadResumed { id: id.to_string() });
        self.pump(id);
    }

    /// Raises the cancel flag, acknowledges and drops the session.
    ///
    /// A chunk still in flight runs to completion; its result is discarded.
    pub fn handle_cancel(&mut self, id: &str) {
        let Some(mut session) = self.sessions.remove(id) else {
            debug!(upload = %id, "cancel for unknown upload ignored");
            return;
        };
        if let Err(e) = session.cancel() {
            warn!(upload = %id, error = %e, "cancel refused");
            return;
        }
        info!(upload = %id, offset = session.offset(), "upload cancelled");
        self.retire(&session);
        self.emit(UploadEvent::UploadCancelled { id: id.to_string() });
    }

    /// Remembers a dropped session's outstanding chunk so the id stays
    /// blocked until it settles.
    fn retire(&mut self, session: &UploadSession) {
        if session.is_in_flight() {
            // At most one chunk per id is ever outstanding, so an existing
            // entry can only belong to a session that never sent.
            self.retiring
                .entry(session.id().to_string())
                .or_insert(session.generation());
        }
    }

    /// Waits for the next outstanding chunk to settle.
    ///
    /// Resolves to `None` immediately when nothing is in flight.
    pub async fn next_settled(&mut self) -> Option<SettledChunk> {
        self.in_flight.next().await
    }

    /// Applies a settled chunk to its session and continues the loop.
    pub fn on_settled(&mut self, settled: SettledChunk) {
        let SettledChunk {
            id,
            generation,
            range,
            result,
        } = settled;

        if self.retiring.get(&id) == Some(&generation) {
            self.retiring.remove(&id);
            debug!(upload = %id, generation, "retired chunk settled, releasing id");
            self.pump(&id);
            return;
        }

        let Some(session) = self
            .sessions
            .get_mut(&id)
            .filter(|s| s.generation() == generation)
        else {
            debug!(upload = %id, generation, "discarding result for retired session");
            return;
        };

        let paused = session.is_paused();
        let settlement = match session.settle(range.clone(), result) {
            Ok(s) => s,
            Err(e) => {
                warn!(upload = %id, error = %e, "cannot apply chunk result");
                return;
            }
        };

        match settlement {
            Settlement::Progress(progress) => {
                debug!(
                    upload = %id,
                    offset = session.offset(),
                    total = session.total_size(),
                    progress,
                    "chunk acknowledged"
                );
                // No progress is reported between a pause acknowledgement
                // and the matching resume.
                if !paused {
                    self.emit(UploadEvent::UploadProgress {
                        id: id.clone(),
                        progress,
                    });
                }
                self.pump(&id);
            }
            Settlement::Completed => {
                info!(upload = %id, "upload complete");
                self.sessions.remove(&id);
                self.emit(UploadEvent::UploadSuccess { id });
            }
            Settlement::Failed { error, status } => {
                warn!(upload = %id, ?status, start = range.start, error = %error, "upload failed");
                self.sessions.remove(&id);
                self.emit(UploadEvent::UploadError { id, error, status });
            }
        }
    }

    /// Transfer loop step: sends the next chunk unless the session is
    /// paused, cancelled, finished or already waiting on a response.
    fn pump(&mut self, id: &str) {
        if self.retiring.contains_key(id) {
            debug!(upload = %id, "waiting for retired chunk to settle");
            return;
        }
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };

        match session.next_step() {
            Step::Send(range) => {
                session.mark_sent();
                let fut = send_chunk(
                    Arc::clone(&self.transport),
                    session.source().clone(),
                    session.url().to_string(),
                    session.total_size(),
                    id.to_string(),
                    session.generation(),
                    range,
                );
                self.in_flight.push(fut);
            }
            Step::InFlight | Step::Halt => {}
            Step::Exhausted => {
                let settlement = session.fail_exhausted();
                self.sessions.remove(id);
                if let Ok(Settlement::Failed { error, status }) = settlement {
                    warn!(upload = %id, "endpoint never completed the upload");
                    self.emit(UploadEvent::UploadError {
                        id: id.to_string(),
                        error,
                        status,
                    });
                }
            }
        }
    }

    fn emit(&self, event: UploadEvent) {
        self.events.publish(event);
    }
}

/// Reads `range` from the source, writes it, and reports back tagged with
/// the owning session's generation.
fn send_chunk(
    transport: Arc<dyn ChunkTransport>,
    source: ChunkSource,
    url: String,
    total_size: u64,
    id: String,
    generation: u64,
    range: Range<u64>,
) -> BoxFuture<'static, SettledChunk> {
    Box::pin(async move {
        let result = async {
            let body = source.read_range(range.clone()).await?;
            let request = build_chunk_request(&url, total_size, range.clone(), body)?;
            let status = transport.send_chunk(request).await?;
            Ok::<u16, ChunkError>(status)
        }
        .await;
        SettledChunk {
            id,
            generation,
            range,
            result,
        }
    })
}
