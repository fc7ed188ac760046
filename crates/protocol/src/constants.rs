/// Default bytes per chunk request: 20 MiB.
///
/// Large enough to keep the request count low for typical video files,
/// small enough that a pause or cancel lands within one chunk's transfer
/// time.
pub const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;

/// Upper bound of the `progress` field in `UPLOAD_PROGRESS`.
pub const MAX_PROGRESS: u8 = 100;
