//! Per-upload state machine.
//!
//! An [`UploadSession`] never performs I/O itself. The registry asks it for
//! the next step, performs the chunk write, and feeds the result back via
//! [`UploadSession::settle`]. That split keeps every flag check and offset
//! update on the worker thread, between network awaits.

use std::ops::Range;

use tracing::debug;
use vidlift_transfer::{ChunkOutcome, ChunkSource, chunk_range, interpret_response, progress_percent};

use crate::error::{ChunkError, SessionError};

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Paused,
    Cancelled,
    Succeeded,
    Errored,
}

impl UploadState {
    /// Returns `true` for states with no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Errored)
    }

    /// Returns `true` if `self -> to` is a legal transition.
    ///
    /// `Paused -> Succeeded | Errored` covers a chunk that was already in
    /// flight when the pause arrived.
    pub fn can_transition(self, to: UploadState) -> bool {
        use UploadState::*;
        match (self, to) {
            (from, to) if from == to => !from.is_terminal(),
            (Idle, Uploading | Cancelled) => true,
            (Uploading, Paused | Cancelled | Succeeded | Errored) => true,
            (Paused, Uploading | Cancelled | Succeeded | Errored) => true,
            _ => false,
        }
    }
}

/// What the transfer loop should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Write this byte range.
    Send(Range<u64>),
    /// A chunk is outstanding; its settlement drives the next step.
    InFlight,
    /// Paused, cancelled or terminal. No event.
    Halt,
    /// Every byte was acknowledged but the endpoint never answered
    /// Complete.
    Exhausted,
}

/// Result of applying a chunk's response to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Range acknowledged; new progress percentage.
    Progress(u8),
    /// The endpoint assembled the full object.
    Completed,
    /// Fatal. `status` is set for unexpected HTTP statuses.
    Failed { error: String, status: Option<u16> },
}

/// State of one upload, owned by the session registry.
#[derive(Debug)]
pub struct UploadSession {
    id: String,
    url: String,
    source: ChunkSource,
    chunk_size: u64,
    total_size: u64,
    offset: u64,
    paused: bool,
    cancelled: bool,
    state: UploadState,
    in_flight: bool,
    requests_sent: u64,
    generation: u64,
}

impl UploadSession {
    /// Creates an idle session at offset 0.
    pub fn new(
        id: String,
        url: String,
        source: ChunkSource,
        chunk_size: u64,
        generation: u64,
    ) -> Self {
        Self {
            total_size: source.size(),
            id,
            url,
            source,
            chunk_size,
            offset: 0,
            paused: false,
            cancelled: false,
            state: UploadState::Idle,
            in_flight: false,
            requests_sent: 0,
            generation,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &ChunkSource {
        &self.source
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes acknowledged by the endpoint.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Moves the session to `to`, refusing illegal transitions.
    fn transition(&mut self, to: UploadState) -> Result<(), SessionError> {
        if !self.state.can_transition(to) {
            return Err(SessionError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        if self.state != to {
            debug!(upload = %self.id, from = ?self.state, to = ?to, "session transition");
        }
        self.state = to;
        Ok(())
    }

    /// `Idle -> Uploading`.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        self.transition(UploadState::Uploading)
    }

    /// Raises the pause flag. Takes effect before the next chunk is sent.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.transition(UploadState::Paused)?;
        self.paused = true;
        Ok(())
    }

    /// Clears the pause flag.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.transition(UploadState::Uploading)?;
        self.paused = false;
        Ok(())
    }

    /// Raises the cancel flag. Never reset.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.transition(UploadState::Cancelled)?;
        self.cancelled = true;
        Ok(())
    }

    /// Loop-top check: decides whether another chunk goes out.
    pub fn next_step(&self) -> Step {
        if self.in_flight {
            return Step::InFlight;
        }
        if self.cancelled || self.paused || self.state != UploadState::Uploading {
            return Step::Halt;
        }
        if self.offset < self.total_size {
            return Step::Send(chunk_range(self.offset, self.chunk_size, self.total_size));
        }
        // A zero-byte file still needs one request to be completed.
        if self.total_size == 0 && self.requests_sent == 0 {
            return Step::Send(0..0);
        }
        Step::Exhausted
    }

    /// Marks a chunk as outstanding.
    pub fn mark_sent(&mut self) {
        self.in_flight = true;
        self.requests_sent += 1;
    }

    /// Applies the result of the outstanding chunk for `range`.
    ///
    /// The offset only moves forward on an acknowledgement. Completion is
    /// only ever declared from a Complete response.
    pub fn settle(
        &mut self,
        range: Range<u64>,
        result: Result<u16, ChunkError>,
    ) -> Result<Settlement, SessionError> {
        self.in_flight = false;

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.transition(UploadState::Errored)?;
                return Ok(Settlement::Failed {
                    error: e.to_string(),
                    status: None,
                });
            }
        };

        match interpret_response(status) {
            ChunkOutcome::Continue => {
                self.offset = self.offset.max(range.end.min(self.total_size));
                Ok(Settlement::Progress(progress_percent(
                    self.offset,
                    self.total_size,
                )))
            }
            ChunkOutcome::Complete => {
                self.transition(UploadState::Succeeded)?;
                self.offset = self.total_size;
                Ok(Settlement::Completed)
            }
            ChunkOutcome::Unexpected(status) => {
                self.transition(UploadState::Errored)?;
                Ok(Settlement::Failed {
                    error: format!("unexpected response status {status}"),
                    status: Some(status),
                })
            }
        }
    }

    /// Fails a session whose bytes were all acknowledged without a
    /// Complete response.
    pub fn fail_exhausted(&mut self) -> Result<Settlement, SessionError> {
        self.transition(UploadState::Errored)?;
        Ok(Settlement::Failed {
            error: "endpoint acknowledged every byte without completing the upload".into(),
            status: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    fn session(size: usize, chunk: u64) -> UploadSession {
        let source = ChunkSource::from_bytes(vec![7u8; size]);
        let mut s = UploadSession::new("u1".into(), "https://up/1".into(), source, chunk, 1);
        s.begin().unwrap();
        s
    }

    fn send_next(s: &mut UploadSession) -> Range<u64> {
        match s.next_step() {
            Step::Send(r) => {
                s.mark_sent();
                r
            }
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn new_session_is_idle() {
        let source = ChunkSource::from_bytes(vec![0u8; 10]);
        let s = UploadSession::new("u1".into(), "u".into(), source, 4, 3);
        assert_eq!(s.state(), UploadState::Idle);
        assert_eq!(s.offset(), 0);
        assert_eq!(s.total_size(), 10);
        assert_eq!(s.generation(), 3);
        assert_eq!(s.next_step(), Step::Halt);
    }

    #[test]
    fn walks_chunks_in_order() {
        let mut s = session(10, 4);
        let mut last = 0;
        for expected in [0..4, 4..8, 8..10] {
            let r = send_next(&mut s);
            assert_eq!(r, expected);
            assert_eq!(s.next_step(), Step::InFlight);
            let out = s.settle(r, Ok(308)).unwrap();
            assert!(matches!(out, Settlement::Progress(_)));
            assert!(s.offset() >= last);
            last = s.offset();
        }
        assert_eq!(s.offset(), 10);
        // All bytes acknowledged, no Complete yet.
        assert_eq!(s.next_step(), Step::Exhausted);
        assert!(matches!(
            s.fail_exhausted().unwrap(),
            Settlement::Failed { status: None, .. }
        ));
        assert_eq!(s.state(), UploadState::Errored);
    }

    #[test]
    fn complete_response_succeeds() {
        let mut s = session(10, 4);
        let r = send_next(&mut s);
        s.settle(r, Ok(308)).unwrap();
        let r = send_next(&mut s);
        s.settle(r, Ok(308)).unwrap();
        let r = send_next(&mut s);
        assert_eq!(s.settle(r, Ok(201)).unwrap(), Settlement::Completed);
        assert_eq!(s.state(), UploadState::Succeeded);
        assert_eq!(s.offset(), 10);
        assert_eq!(s.next_step(), Step::Halt);
    }

    #[test]
    fn unexpected_status_is_fatal() {
        let mut s = session(10, 4);
        let r = send_next(&mut s);
        let out = s.settle(r, Ok(500)).unwrap();
        assert_eq!(
            out,
            Settlement::Failed {
                error: "unexpected response status 500".into(),
                status: Some(500),
            }
        );
        assert_eq!(s.offset(), 0);
        assert_eq!(s.state(), UploadState::Errored);
    }

    #[test]
    fn transport_failure_is_fatal() {
        let mut s = session(10, 4);
        let r = send_next(&mut s);
        let err = ChunkError::Transport(TransportError::Connection("reset".into()));
        let out = s.settle(r, Err(err)).unwrap();
        assert!(matches!(out, Settlement::Failed { status: None, .. }));
        assert_eq!(s.state(), UploadState::Errored);
    }

    #[test]
    fn pause_halts_after_in_flight_chunk() {
        let mut s = session(10, 4);
        let r = send_next(&mut s);
        s.pause().unwrap();
        assert!(s.is_paused());
        // Still outstanding.
        assert_eq!(s.next_step(), Step::InFlight);
        s.settle(r, Ok(308)).unwrap();
        assert_eq!(s.offset(), 4);
        assert_eq!(s.next_step(), Step::Halt);

        s.resume().unwrap();
        assert_eq!(s.next_step(), Step::Send(4..8));
    }

    #[test]
    fn paused_in_flight_chunk_may_complete() {
        let mut s = session(4, 4);
        let r = send_next(&mut s);
        s.pause().unwrap();
        assert_eq!(s.settle(r, Ok(200)).unwrap(), Settlement::Completed);
        assert_eq!(s.state(), UploadState::Succeeded);
    }

    #[test]
    fn cancel_is_terminal() {
        let mut s = session(10, 4);
        s.cancel().unwrap();
        assert!(s.is_cancelled());
        assert_eq!(s.next_step(), Step::Halt);
        assert!(s.resume().is_err());
        assert!(s.pause().is_err());
        assert!(s.cancel().is_err());
    }

    #[test]
    fn zero_byte_file_sends_one_empty_chunk() {
        let mut s = session(0, 4);
        let r = send_next(&mut s);
        assert_eq!(r, 0..0);
        assert_eq!(s.settle(r, Ok(200)).unwrap(), Settlement::Completed);
    }

    #[test]
    fn zero_byte_file_without_complete_is_exhausted() {
        let mut s = session(0, 4);
        let r = send_next(&mut s);
        assert_eq!(s.settle(r, Ok(308)).unwrap(), Settlement::Progress(100));
        assert_eq!(s.next_step(), Step::Exhausted);
    }

    #[test]
    fn transition_table() {
        use UploadState::*;
        assert!(Idle.can_transition(Uploading));
        assert!(Uploading.can_transition(Paused));
        assert!(Paused.can_transition(Uploading));
        assert!(Paused.can_transition(Paused));
        assert!(!Succeeded.can_transition(Uploading));
        assert!(!Cancelled.can_transition(Cancelled));
        assert!(!Errored.can_transition(Paused));
        assert!(!Idle.can_transition(Succeeded));
    }
}
