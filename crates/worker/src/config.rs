//! Worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vidlift_protocol::DEFAULT_CHUNK_SIZE;

use crate::error::WorkerError;

/// Tunables for the upload worker and its HTTP transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Bytes per chunk request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Per-request timeout in seconds (0 = none).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds (0 = none).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// `User-Agent` header for chunk requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_request_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("vidlift/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl UploadConfig {
    /// Checks values that would stall or break the transfer loop.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.chunk_size == 0 {
            return Err(WorkerError::InvalidConfig("chunk_size must be > 0".into()));
        }
        Ok(())
    }

    /// Per-request timeout, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Connect timeout, `None` when disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.chunk_size, 20 * 1024 * 1024);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(30)));
        assert!(config.user_agent.starts_with("vidlift/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: UploadConfig = serde_json::from_str(r#"{"chunk_size": 262144}"#).unwrap();
        assert_eq!(config.chunk_size, 262_144);
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let config = UploadConfig {
            chunk_size: 0,
            ..UploadConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WorkerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_timeout_disables() {
        let config = UploadConfig {
            request_timeout_secs: 0,
            connect_timeout_secs: 0,
            ..UploadConfig::default()
        };
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.connect_timeout(), None);
    }
}
