//! zstd compression at rest, as a decorator over [`Reader`]/[`Writer`].

use super::{Reader, Writer};
use crate::utils::DeployError;
use crate::Result;
use async_trait::async_trait;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use tracing::warn;

const COMPRESSION_LEVEL: i32 = 3;

pub struct CompressionReader {
    inner: Arc<dyn Reader>,
}

impl CompressionReader {
    pub fn new(inner: Arc<dyn Reader>) -> Self {
        Self { inner }
    }
}

pub struct CompressionWriter {
    inner: Arc<dyn Writer>,
}

impl CompressionWriter {
    pub fn new(inner: Arc<dyn Writer>) -> Self {
        Self { inner }
    }
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, COMPRESSION_LEVEL).map_err(|e| DeployError::Compression(e.to_string()))
}

/// Decode a zstd stream. A stream cut short yields whatever was decoded
/// before the cut.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder =
        zstd::stream::read::Decoder::new(data).map_err(|e| DeployError::Compression(e.to_string()))?;

    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            warn!(decoded = out.len(), "Compressed stream is truncated, keeping partial data");
            Ok(out)
        }
        Err(e) => Err(DeployError::Compression(e.to_string())),
    }
}

#[async_trait]
impl Reader for CompressionReader {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(compressed) = self.inner.read(path).await? else {
            return Ok(None);
        };

        let decoded = tokio::task::spawn_blocking(move || decompress(&compressed))
            .await
            .map_err(|e| DeployError::Worker(e.to_string()))??;
        Ok(Some(decoded))
    }
}

#[async_trait]
impl Writer for CompressionWriter {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let compressed = tokio::task::spawn_blocking(move || compress(&data))
            .await
            .map_err(|e| DeployError::Worker(e.to_string()))??;

        self.inner.write(path, compressed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::local::LocalFs;
    use tempfile::TempDir;

    struct Denied;

    #[async_trait]
    impl Reader for Denied {
        async fn read(&self, _path: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_write_then_read() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("data.zst").to_string_lossy().to_string();
        let payload = b"{\"objects\":[]}".repeat(100);

        CompressionWriter::new(Arc::new(LocalFs::new()))
            .write(&path, payload.clone())
            .await?;

        // Stored bytes are compressed.
        let raw = std::fs::read(&path)?;
        assert!(raw.len() < payload.len());

        let read = CompressionReader::new(Arc::new(LocalFs::new())).read(&path).await?;
        assert_eq!(read, Some(payload));
        Ok(())
    }

    #[tokio::test]
    async fn test_absent_passes_through() -> Result<()> {
        let read = CompressionReader::new(Arc::new(Denied)).read("/any").await?;
        assert_eq!(read, None);
        Ok(())
    }

    #[test]
    fn test_truncated_stream_yields_prefix() -> Result<()> {
        let payload: Vec<u8> = (0..200_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let compressed = compress(&payload)?;

        let truncated = &compressed[..compressed.len() / 2];
        let partial = decompress(truncated)?;

        assert!(partial.len() < payload.len());
        assert_eq!(&payload[..partial.len()], &partial[..]);
        Ok(())
    }

    #[test]
    fn test_garbage_is_an_error() {
        let err = decompress(b"definitely not zstd").unwrap_err();
        assert!(matches!(err, DeployError::Compression(_)));
    }
}
