/// Failure-injecting backend for exercising error paths
use crate::{
    blob_store::{memory::MemoryGridBackend, BlobId, BlobIndexEntry, ChunkRecord, GridBackend},
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Wraps a memory backend and fails selected operations on demand
#[derive(Default)]
pub struct FlakyBackend {
    pub inner: MemoryGridBackend,
    /// Chunk writes succeed this many times, then fail
    pub chunk_writes_before_failure: Option<u64>,
    pub fail_file_insert: AtomicBool,
    pub fail_queries: AtomicBool,
    /// Chunk reads at or beyond this index fail
    pub fail_chunk_reads_from: Option<u64>,
    chunk_writes: AtomicU64,
    chunk_reads: AtomicU64,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_queries() -> Self {
        let backend = Self::default();
        backend.fail_queries.store(true, Ordering::SeqCst);
        backend
    }

    pub fn failing_file_insert() -> Self {
        let backend = Self::default();
        backend.fail_file_insert.store(true, Ordering::SeqCst);
        backend
    }

    pub fn failing_after_chunks(count: u64) -> Self {
        Self {
            chunk_writes_before_failure: Some(count),
            ..Self::default()
        }
    }

    pub fn failing_reads_from(n: u64) -> Self {
        Self {
            fail_chunk_reads_from: Some(n),
            ..Self::default()
        }
    }

    /// Number of chunk fetches issued so far
    pub fn chunk_reads(&self) -> u64 {
        self.chunk_reads.load(Ordering::SeqCst)
    }

    /// Chunks currently held, for orphan checks
    pub async fn chunk_exists(&self, files_id: &BlobId, n: u64) -> bool {
        matches!(self.inner.get_chunk(files_id, n).await, Ok(Some(_)))
    }

    fn check_queries(&self) -> AppResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(AppError::StorageRead("backend unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GridBackend for FlakyBackend {
    async fn insert_chunk(&self, chunk: ChunkRecord) -> AppResult<()> {
        let written = self.chunk_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.chunk_writes_before_failure {
            if written >= limit {
                return Err(AppError::StorageWrite("chunk write rejected".to_string()));
            }
        }
        self.inner.insert_chunk(chunk).await
    }

    async fn get_chunk(&self, files_id: &BlobId, n: u64) -> AppResult<Option<Bytes>> {
        self.chunk_reads.fetch_add(1, Ordering::SeqCst);
        if matches!(self.fail_chunk_reads_from, Some(from) if n >= from) {
            return Err(AppError::StorageRead("connection reset".to_string()));
        }
        self.inner.get_chunk(files_id, n).await
    }

    async fn delete_chunks(&self, files_id: &BlobId) -> AppResult<u64> {
        self.inner.delete_chunks(files_id).await
    }

    async fn insert_file(&self, entry: &BlobIndexEntry) -> AppResult<()> {
        if self.fail_file_insert.load(Ordering::SeqCst) {
            return Err(AppError::StorageWrite("index write rejected".to_string()));
        }
        self.inner.insert_file(entry).await
    }

    async fn list_files(&self) -> AppResult<Vec<BlobIndexEntry>> {
        self.check_queries()?;
        self.inner.list_files().await
    }

    async fn find_files_by_name(&self, filename: &str) -> AppResult<Vec<BlobIndexEntry>> {
        self.check_queries()?;
        self.inner.find_files_by_name(filename).await
    }

    async fn get_file(&self, id: &BlobId) -> AppResult<Option<BlobIndexEntry>> {
        self.check_queries()?;
        self.inner.get_file(id).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.check_queries()
    }
}
