use std::ops::Range;

use vidlift_protocol::MAX_PROGRESS;

use crate::TransferError;

/// HTTP method used for every chunk write.
pub const CHUNK_METHOD: &str = "PUT";

/// "Resume Incomplete": the endpoint stored the range and wants more.
pub const STATUS_RESUME_INCOMPLETE: u16 = 308;

/// A single chunk write, ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Resumable session URL.
    pub url: String,
    /// Byte range of the file carried in `body`.
    pub range: Range<u64>,
    /// Total size of the file being uploaded.
    pub total_size: u64,
    /// Value of the `Content-Range` header.
    pub content_range: String,
    /// Raw bytes `[range.start, range.end)`.
    pub body: Vec<u8>,
}

impl ChunkRequest {
    /// HTTP method for this request.
    pub fn method(&self) -> &'static str {
        CHUNK_METHOD
    }

    /// Declared `Content-Length`.
    pub fn content_length(&self) -> u64 {
        self.range.end - self.range.start
    }

    /// Returns `true` if this chunk ends at the last byte of the file.
    pub fn is_final(&self) -> bool {
        self.range.end == self.total_size
    }
}

/// How the endpoint answered a chunk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// 308: range accepted, more data expected.
    Continue,
    /// 200 / 201: the object is fully assembled.
    Complete,
    /// Anything else. Fatal, never retried.
    Unexpected(u16),
}

impl ChunkOutcome {
    /// Returns `true` if the session ends after this outcome.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// Maps a response status onto a session step.
///
/// Only 308, 200 and 201 are accepted; every other code (including other
/// 2xx codes) is [`ChunkOutcome::Unexpected`].
pub fn interpret_response(status: u16) -> ChunkOutcome {
    match status {
        STATUS_RESUME_INCOMPLETE => ChunkOutcome::Continue,
        200 | 201 => ChunkOutcome::Complete,
        other => ChunkOutcome::Unexpected(other),
    }
}

/// Next range to send: `offset..min(offset + chunk_size, total_size)`.
pub fn chunk_range(offset: u64, chunk_size: u64, total_size: u64) -> Range<u64> {
    let end = offset.saturating_add(chunk_size).min(total_size);
    offset.min(end)..end
}

/// Formats a `Content-Range` header value.
///
/// An empty range (zero-byte file) is sent as `bytes */{total}`.
pub fn content_range(range: &Range<u64>, total_size: u64) -> String {
    if range.is_empty() {
        format!("bytes */{total_size}")
    } else {
        format!("bytes {}-{}/{}", range.start, range.end - 1, total_size)
    }
}

/// Builds the write request for `range` of a file of `total_size` bytes.
pub fn build_chunk_request(
    url: &str,
    total_size: u64,
    range: Range<u64>,
    body: Vec<u8>,
) -> Result<ChunkRequest, TransferError> {
    if range.end > total_size || range.start > range.end {
        return Err(TransferError::RangeOutOfBounds {
            start: range.start,
            end: range.end,
            size: total_size,
        });
    }
    let expected = range.end - range.start;
    if body.len() as u64 != expected {
        return Err(TransferError::BodyLengthMismatch {
            expected,
            actual: body.len() as u64,
        });
    }

    Ok(ChunkRequest {
        url: url.to_string(),
        content_range: content_range(&range, total_size),
        range,
        total_size,
        body,
    })
}

/// Acknowledged share of the file as `floor(offset / total * 100)`.
///
/// A zero-byte file reports 100.
pub fn progress_percent(offset: u64, total_size: u64) -> u8 {
    if total_size == 0 {
        return MAX_PROGRESS;
    }
    let pct = u128::from(offset.min(total_size)) * u128::from(MAX_PROGRESS) / u128::from(total_size);
    pct as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn status_mapping_is_exact() {
        assert_eq!(interpret_response(308), ChunkOutcome::Continue);
        assert_eq!(interpret_response(200), ChunkOutcome::Complete);
        assert_eq!(interpret_response(201), ChunkOutcome::Complete);
        for status in [202, 204, 206, 301, 307, 400, 404, 429, 500, 503] {
            assert_eq!(interpret_response(status), ChunkOutcome::Unexpected(status));
        }
    }

    #[test]
    fn outcome_terminality() {
        assert!(!ChunkOutcome::Continue.is_terminal());
        assert!(ChunkOutcome::Complete.is_terminal());
        assert!(ChunkOutcome::Unexpected(500).is_terminal());
    }

    #[test]
    fn content_range_header() {
        assert_eq!(content_range(&(0..20), 45), "bytes 0-19/45");
        assert_eq!(content_range(&(40..45), 45), "bytes 40-44/45");
        assert_eq!(content_range(&(0..0), 0), "bytes */0");
    }

    #[test]
    fn chunk_range_clamps_to_total() {
        let total = 45 * MIB;
        assert_eq!(chunk_range(0, 20 * MIB, total), 0..20 * MIB);
        assert_eq!(chunk_range(40 * MIB, 20 * MIB, total), 40 * MIB..total);
        assert_eq!(chunk_range(total, 20 * MIB, total), total..total);
        assert_eq!(chunk_range(0, u64::MAX, 10), 0..10);
    }

    #[test]
    fn build_request_sets_headers() {
        let req = build_chunk_request("https://up.example/s/1", 10, 4..8, b"4567".to_vec()).unwrap();
        assert_eq!(req.method(), "PUT");
        assert_eq!(req.url, "https://up.example/s/1");
        assert_eq!(req.content_length(), 4);
        assert_eq!(req.content_range, "bytes 4-7/10");
        assert_eq!(req.body, b"4567");
        assert!(!req.is_final());
    }

    #[test]
    fn build_request_final_chunk() {
        let req = build_chunk_request("u", 10, 8..10, b"89".to_vec()).unwrap();
        assert!(req.is_final());
    }

    #[test]
    fn build_request_rejects_short_body() {
        let err = build_chunk_request("u", 10, 0..4, b"abc".to_vec()).unwrap_err();
        assert!(matches!(
            err,
            TransferError::BodyLengthMismatch { expected: 4, actual: 3 }
        ));
    }

    #[test]
    fn build_request_rejects_range_past_end() {
        let err = build_chunk_request("u", 10, 8..12, vec![0; 4]).unwrap_err();
        assert!(matches!(err, TransferError::RangeOutOfBounds { .. }));
    }

    #[test]
    fn progress_is_floored() {
        let total = 45 * MIB;
        assert_eq!(progress_percent(20 * MIB, total), 44);
        assert_eq!(progress_percent(40 * MIB, total), 88);
        assert_eq!(progress_percent(total, total), 100);
        assert_eq!(progress_percent(0, total), 0);
        assert_eq!(progress_percent(0, 0), 100);
    }

    #[test]
    fn progress_never_exceeds_hundred() {
        assert_eq!(progress_percent(200, 100), 100);
        assert_eq!(progress_percent(u64::MAX, u64::MAX), 100);
    }
}
