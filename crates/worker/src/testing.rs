//! In-process transport with scripted responses, for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use vidlift_transfer::ChunkRequest;

use crate::error::TransportError;
use crate::transport::{ChunkTransport, TransportFuture};

/// One scripted answer to a chunk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Respond with this status code.
    Status(u16),
    /// Fail without a response.
    Fail(String),
}

/// A request as seen by the scripted transport. Bodies are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub content_range: String,
    pub len: u64,
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, VecDeque<Scripted>>,
    requests: Vec<RecordedRequest>,
    active: HashMap<String, usize>,
    peak: HashMap<String, usize>,
}

/// Answers chunk requests from per-URL scripts.
///
/// A URL with no script left answers 500. Concurrency per URL is tracked so
/// tests can assert that a session never has two chunks outstanding.
#[derive(Default)]
pub struct ScriptedTransport {
    state: Mutex<State>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response, keeping requests outstanding long enough for
    /// commands to race them.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            state: Mutex::default(),
            delay: Some(delay),
        }
    }

    /// Appends status responses for `url`.
    pub fn script(&self, url: &str, statuses: impl IntoIterator<Item = u16>) {
        self.script_results(url, statuses.into_iter().map(Scripted::Status));
    }

    /// Appends arbitrary responses for `url`.
    pub fn script_results(&self, url: &str, results: impl IntoIterator<Item = Scripted>) {
        let mut state = self.lock();
        state
            .scripts
            .entry(url.to_string())
            .or_default()
            .extend(results);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Highest number of simultaneously outstanding requests seen for `url`.
    pub fn max_concurrency(&self, url: &str) -> usize {
        self.lock().peak.get(url).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChunkTransport for ScriptedTransport {
    fn send_chunk(&self, request: ChunkRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let url = request.url.clone();
            let answer = {
                let mut state = self.lock();
                state.requests.push(RecordedRequest {
                    url: url.clone(),
                    content_range: request.content_range.clone(),
                    len: request.content_length(),
                });
                let active = state.active.entry(url.clone()).or_default();
                *active += 1;
                let now = *active;
                let peak = state.peak.entry(url.clone()).or_default();
                *peak = (*peak).max(now);
                state
                    .scripts
                    .get_mut(&url)
                    .and_then(VecDeque::pop_front)
                    .unwrap_or(Scripted::Status(500))
            };

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            if let Some(active) = self.lock().active.get_mut(&url) {
                *active -= 1;
            }

            match answer {
                Scripted::Status(status) => Ok(status),
                Scripted::Fail(reason) => Err(TransportError::Connection(reason)),
            }
        })
    }
}
