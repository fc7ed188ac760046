//! Event fan-out to subscribers.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use vidlift_protocol::UploadEvent;

/// Delivers every event to every live subscriber.
///
/// Each subscriber owns an unbounded channel, so a slow reader never loses
/// events. Subscribers whose receiver has been dropped are pruned on the
/// next publish.
#[derive(Debug, Clone, Default)]
pub struct EventHub {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<UploadEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Only events published after this call are
    /// delivered.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<UploadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Sends `event` to all subscribers.
    pub fn publish(&self, event: UploadEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<UploadEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
