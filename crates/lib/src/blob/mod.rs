//! # Blob Storage
//!
//! Reference documents (PDFs) live in a blob container. The `BlobStore` trait
//! is implemented for a local directory and for Azure Blob Storage accessed
//! with a SAS token.

pub mod azure;
pub mod local;

use crate::errors::BlobError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::{fmt::Debug, pin::Pin};

pub use azure::AzureBlobStore;
pub use local::LocalBlobStore;

/// Properties of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    pub size: u64,
    pub content_type: Option<String>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, BlobError>> + Send>>;

#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Returns `None` when the blob does not exist.
    async fn properties(&self, name: &str) -> Result<Option<BlobProperties>, BlobError>;

    /// Reads `len` bytes starting at `start`.
    async fn read_range(&self, name: &str, start: u64, len: u64) -> Result<Bytes, BlobError>;

    async fn read_all(&self, name: &str) -> Result<Bytes, BlobError>;

    /// Streams the blob in chunks of at most `BLOB_CHUNK_SIZE` bytes.
    async fn stream_chunks(&self, name: &str) -> Result<ChunkStream, BlobError>;
}

/// An inclusive byte span resolved against a blob size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parses a single-range `Range` header (`bytes=<start>-<end>`,
    /// `bytes=<start>-` or `bytes=-<suffix>`) for a blob of `total` bytes.
    ///
    /// The end is clipped to the last byte. Multiple ranges, malformed values
    /// and spans starting past the end are rejected.
    pub fn parse(header: &str, total: u64) -> Result<Self, BlobError> {
        let invalid = || BlobError::InvalidRange {
            header: header.to_string(),
            total,
        };

        let spec = header.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
        if spec.contains(',') || total == 0 {
            return Err(invalid());
        }
        let (start, end) = spec.split_once('-').ok_or_else(invalid)?;
        let (start, end) = (start.trim(), end.trim());
        let last = total - 1;

        if start.is_empty() {
            let suffix: u64 = end.parse().map_err(|_| invalid())?;
            if suffix == 0 {
                return Err(invalid());
            }
            return Ok(Self {
                start: total.saturating_sub(suffix),
                end: last,
            });
        }

        let start: u64 = start.parse().map_err(|_| invalid())?;
        let end = if end.is_empty() {
            last
        } else {
            end.parse::<u64>().map_err(|_| invalid())?.min(last)
        };
        if start > end {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// The `Content-Range` value for a 206 response.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Builds a `Content-Disposition` value with an ASCII fallback filename and
/// the RFC 5987 encoded original.
pub fn content_disposition(disposition: &str, filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{disposition}; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// The last path segment of a blob name.
pub fn file_name(blob_name: &str) -> &str {
    blob_name.rsplit('/').next().unwrap_or(blob_name)
}
