use super::{BlobProperties, BlobStore, ChunkStream};
use crate::{constants::BLOB_CHUNK_SIZE, errors::BlobError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::{
    io::{ErrorKind, SeekFrom},
    path::PathBuf,
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::io::ReaderStream;
use tracing::warn;

/// Blobs stored as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a blob name to a path inside the root. Names that could escape it
    /// resolve to `None`.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for segment in name.split('/') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('\\')
                || segment.contains(':')
            {
                warn!(blob = %name, "Rejected blob name");
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }

    async fn open(&self, name: &str) -> Result<File, BlobError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| BlobError::NotFound(name.to_string()))?;
        File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound(name.to_string()),
            _ => BlobError::Io(e),
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn properties(&self, name: &str) -> Result<Option<BlobProperties>, BlobError> {
        let Some(path) = self.resolve(name) else {
            return Ok(None);
        };
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(BlobProperties {
                size: meta.len(),
                content_type: None,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    async fn read_range(&self, name: &str, start: u64, len: u64) -> Result<Bytes, BlobError> {
        let mut file = self.open(name).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut buffer = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }

    async fn read_all(&self, name: &str) -> Result<Bytes, BlobError> {
        let mut file = self.open(name).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }

    async fn stream_chunks(&self, name: &str) -> Result<ChunkStream, BlobError> {
        let file = self.open(name).await?;
        let stream = ReaderStream::with_capacity(file, BLOB_CHUNK_SIZE as usize);
        Ok(Box::pin(stream.map_err(BlobError::Io)))
    }
}
