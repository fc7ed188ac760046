//! Message types exchanged between the upload controller and its worker.
//!
//! Every message is a `{type, payload}` pair on the wire. Commands flow
//! from the caller into the worker, events flow back out.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{DEFAULT_CHUNK_SIZE, MAX_PROGRESS};
pub use messages::{Command, UploadEvent};
pub use types::FileSource;
