use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;
use vidlift_protocol::FileSource;

use crate::TransferError;

/// Slices a file payload into byte ranges.
///
/// The size is captured once in [`open`](Self::open) and never re-read.
/// Cloning is cheap: a path or a shared buffer.
#[derive(Debug, Clone)]
pub struct ChunkSource {
    data: SourceData,
    size: u64,
}

#[derive(Debug, Clone)]
enum SourceData {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl ChunkSource {
    /// Opens `file` and records its size.
    pub fn open(file: FileSource) -> Result<Self, TransferError> {
        match file {
            FileSource::Path { path } => {
                let meta = std::fs::metadata(&path)?;
                if !meta.is_file() {
                    return Err(TransferError::InvalidSource(path.display().to_string()));
                }
                Ok(Self {
                    size: meta.len(),
                    data: SourceData::File(path),
                })
            }
            FileSource::Inline { data } => Ok(Self::from_bytes(data)),
        }
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        let data: Arc<[u8]> = data.into();
        Self {
            size: data.len() as u64,
            data: SourceData::Memory(data),
        }
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads bytes `[range.start, range.end)`.
    ///
    /// Filesystem reads run on the blocking pool so the calling runtime
    /// thread keeps servicing other sessions.
    pub async fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>, TransferError> {
        if range.start > range.end || range.end > self.size {
            return Err(TransferError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                size: self.size,
            });
        }

        match &self.data {
            SourceData::Memory(buf) => Ok(buf[range.start as usize..range.end as usize].to_vec()),
            SourceData::File(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || read_file_range(&path, range))
                    .await
                    .map_err(|e| TransferError::Join(e.to_string()))?
            }
        }
    }
}

fn read_file_range(path: &Path, range: Range<u64>) -> Result<Vec<u8>, TransferError> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(range.start))?;
    let mut buf = vec![0u8; (range.end - range.start) as usize];
    // A file truncated after open surfaces as UnexpectedEof.
    file.read_exact(&mut buf)?;
    trace!(path = %path.display(), start = range.start, len = buf.len(), "read chunk");
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &std::path::Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[tokio::test]
    async fn file_source_reads_ranges() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "clip.bin", b"AABBCCDDEE");

        let src = ChunkSource::open(FileSource::path(&path)).unwrap();
        assert_eq!(src.size(), 10);
        assert_eq!(src.read_range(0..4).await.unwrap(), b"AABB");
        assert_eq!(src.read_range(4..8).await.unwrap(), b"CCDD");
        assert_eq!(src.read_range(8..10).await.unwrap(), b"EE");
        assert!(src.read_range(10..10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inline_source_reads_ranges() {
        let src = ChunkSource::open(FileSource::inline(b"0123456789".to_vec())).unwrap();
        assert_eq!(src.size(), 10);
        assert_eq!(src.read_range(6..10).await.unwrap(), b"6789");
    }

    #[tokio::test]
    async fn range_past_end_rejected() {
        let src = ChunkSource::from_bytes(vec![0u8; 4]);
        let err = src.read_range(2..6).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::RangeOutOfBounds { start: 2, end: 6, size: 4 }
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ChunkSource::open(FileSource::path(dir.path().join("nope.mp4"))).unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = ChunkSource::open(FileSource::path(dir.path())).unwrap_err();
        assert!(matches!(err, TransferError::InvalidSource(_)));
    }

    #[tokio::test]
    async fn truncated_file_fails_read() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "shrink.bin", b"0123456789");
        let src = ChunkSource::open(FileSource::path(&path)).unwrap();

        std::fs::write(&path, b"0123").unwrap();
        let err = src.read_range(0..10).await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }
}
