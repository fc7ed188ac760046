//! Upload worker for vidlift.
//!
//! Owns every upload session and drives each one through sequential chunk
//! writes on a dedicated thread. Callers talk to it with [`Command`]s via a
//! [`WorkerHandle`] and observe [`UploadEvent`]s through an [`EventHub`].
//!
//! [`Command`]: vidlift_protocol::Command
//! [`UploadEvent`]: vidlift_protocol::UploadEvent

pub mod config;
mod context;
pub mod error;
mod events;
pub mod registry;
pub mod session;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::UploadConfig;
pub use context::{UploadWorker, WorkerHandle};
pub use error::{ChunkError, SessionError, TransportError, WorkerError};
pub use events::EventHub;
pub use registry::{SessionRegistry, SettledChunk};
pub use session::{Settlement, Step, UploadSession, UploadState};
pub use transport::{ChunkTransport, HttpTransport, TransportFuture};
