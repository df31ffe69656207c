/// Blob storage data models
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier assigned to a blob when it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(Uuid);

impl BlobId {
    /// Generate a fresh, globally unique id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BlobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Index entry for a completed blob, readable without touching chunk data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobIndexEntry {
    pub id: BlobId,
    pub filename: String,
    pub length: u64,
    pub chunk_size: u64,
    pub upload_date: DateTime<Utc>,
    pub content_type: String,
}

impl BlobIndexEntry {
    /// Number of chunks the blob was split into
    pub fn chunk_count(&self) -> u64 {
        if self.length == 0 {
            0
        } else {
            self.length.div_ceil(self.chunk_size)
        }
    }

    /// Byte length chunk `n` must have; only the last chunk may be short
    pub fn expected_chunk_len(&self, n: u64) -> u64 {
        let last = self.chunk_count().saturating_sub(1);
        if n < last {
            self.chunk_size
        } else if n == last {
            self.length - last * self.chunk_size
        } else {
            0
        }
    }

    /// Strong validator for HTTP caching
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.id)
    }
}

/// One persisted segment of a blob's content
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub files_id: BlobId,
    pub n: u64,
    pub data: Bytes,
}
