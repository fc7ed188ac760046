use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Binary payload carried by `START_UPLOAD`.
///
/// The size is known up front: a path is stat'ed once when the session is
/// created, inline bytes carry their own length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileSource {
    /// A file on the local filesystem.
    Path { path: PathBuf },
    /// Bytes held in memory. Base64 in JSON.
    Inline {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

impl FileSource {
    /// Shorthand for [`FileSource::Path`].
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path { path: path.into() }
    }

    /// Shorthand for [`FileSource::Inline`].
    pub fn inline(data: impl Into<Vec<u8>>) -> Self {
        Self::Inline { data: data.into() }
    }
}

/// Base64 serde module for inline byte payloads.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
