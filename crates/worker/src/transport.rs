//! Chunk transport trait and its reqwest implementation.
//!
//! `ChunkTransport` keeps the session logic independent of HTTP so it can
//! be driven by scripted transports in tests.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::CONTENT_RANGE;
use tracing::debug;
use vidlift_transfer::ChunkRequest;

use crate::config::UploadConfig;
use crate::error::{TransportError, WorkerError};

/// Boxed future returned by [`ChunkTransport::send_chunk`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<u16, TransportError>> + Send + 'a>>;

/// Sends one chunk write and reports the response status.
///
/// An `Err` means no response was received at all. Any status code,
/// including error codes, is `Ok` and left to the codec to interpret.
pub trait ChunkTransport: Send + Sync {
    fn send_chunk(&self, request: ChunkRequest) -> TransportFuture<'_>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client from the worker config.
    ///
    /// Redirects are disabled: 308 is the resumable protocol's
    /// "resume incomplete" answer and must reach the codec untouched.
    pub fn new(config: &UploadConfig) -> Result<Self, WorkerError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

impl ChunkTransport for HttpTransport {
    fn send_chunk(&self, request: ChunkRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            debug!(
                url = %request.url,
                range = %request.content_range,
                len = request.content_length(),
                last = request.is_final(),
                "sending chunk"
            );
            // Content-Length is derived from the body.
            let resp = self
                .http
                .put(&request.url)
                .header(CONTENT_RANGE, request.content_range)
                .body(request.body)
                .send()
                .await
                .map_err(TransportError::from_reqwest)?;
            Ok(resp.status().as_u16())
        })
    }
}
