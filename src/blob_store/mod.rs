/// Blob Storage System
///
/// Chunked binary storage for uploaded images. A blob's bytes are split
/// into fixed-size chunks keyed by blob id and sequence index; an index
/// entry is written once every chunk is persisted, so only complete blobs
/// are ever visible to readers.
///
/// Supports multiple backend implementations (SQLite, memory)

pub mod memory;
pub mod models;
pub mod sqlite;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use models::*;
pub use store::{BlobStore, BlobStoreConfig};

use crate::error::AppResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Grid storage backend trait
///
/// A backend owns two collections for a single bucket: the chunk
/// collection and the files (index) collection.
#[async_trait]
pub trait GridBackend: Send + Sync {
    /// Persist one chunk
    async fn insert_chunk(&self, chunk: ChunkRecord) -> AppResult<()>;

    /// Fetch chunk `n` of a blob
    async fn get_chunk(&self, files_id: &BlobId, n: u64) -> AppResult<Option<Bytes>>;

    /// Remove every chunk of a blob, returning how many were removed
    async fn delete_chunks(&self, files_id: &BlobId) -> AppResult<u64>;

    /// Persist an index entry, making the blob visible
    async fn insert_file(&self, entry: &BlobIndexEntry) -> AppResult<()>;

    /// All index entries, oldest upload first
    async fn list_files(&self) -> AppResult<Vec<BlobIndexEntry>>;

    /// Index entries with an exact filename, oldest upload first
    async fn find_files_by_name(&self, filename: &str) -> AppResult<Vec<BlobIndexEntry>>;

    /// Index entry by id
    async fn get_file(&self, id: &BlobId) -> AppResult<Option<BlobIndexEntry>>;

    /// Check that the backend is reachable
    async fn ping(&self) -> AppResult<()>;
}
