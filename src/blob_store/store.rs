/// Blob Store Manager
///
/// Splits blob content into chunks, records index entries once a blob is
/// complete, and streams content back chunk by chunk.
use crate::{
    blob_store::{
        memory::MemoryGridBackend, sqlite::SqliteGridBackend, BlobId, BlobIndexEntry,
        ChunkRecord, GridBackend,
    },
    config::{StorageBackendConfig, StorageConfig},
    db,
    error::{AppError, AppResult},
};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Leading bytes kept for content type sniffing
const SNIFF_LEN: usize = 32;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Blob store configuration
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    pub bucket_name: String,
    pub chunk_size: usize,
}

impl From<&StorageConfig> for BlobStoreConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            bucket_name: storage.bucket_name.clone(),
            chunk_size: storage.chunk_size,
        }
    }
}

/// Lazily produced blob content, one chunk per item, in chunk order
pub type ChunkStream = BoxStream<'static, AppResult<Bytes>>;

/// An opened blob: its index entry plus a stream over its content
pub struct BlobDownload {
    pub entry: BlobIndexEntry,
    pub body: ChunkStream,
}

/// Main blob store manager
#[derive(Clone)]
pub struct BlobStore {
    config: BlobStoreConfig,
    backend: Arc<dyn GridBackend>,
}

impl BlobStore {
    /// Create a blob store over an existing backend
    pub fn new(config: BlobStoreConfig, backend: Arc<dyn GridBackend>) -> AppResult<Self> {
        if config.chunk_size == 0 {
            return Err(AppError::Validation(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        Ok(Self { config, backend })
    }

    /// Build the configured backend and wait until it is ready for requests
    pub async fn open(storage: &StorageConfig) -> AppResult<Self> {
        let backend: Arc<dyn GridBackend> = match &storage.backend {
            StorageBackendConfig::Sqlite { path } => {
                let pool = db::create_pool(path, db::DatabaseOptions::default()).await?;
                db::run_migrations(&pool).await?;
                db::test_connection(&pool).await?;

                tracing::info!("Grid storage opened at {}", path.display());
                Arc::new(SqliteGridBackend::new(pool, storage.bucket_name.clone()))
            }
            StorageBackendConfig::Memory => {
                tracing::warn!("Using in-memory grid storage; uploads will not survive a restart");
                Arc::new(MemoryGridBackend::new())
            }
        };

        tracing::info!(
            "Blob store ready (bucket '{}', {} byte chunks)",
            storage.bucket_name,
            storage.chunk_size
        );

        Self::new(BlobStoreConfig::from(storage), backend)
    }

    pub fn bucket_name(&self) -> &str {
        &self.config.bucket_name
    }

    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Start an incremental upload
    ///
    /// Nothing becomes visible until [`UploadStream::finish`] succeeds.
    pub fn open_upload_stream(&self, filename: &str, content_type: Option<&str>) -> UploadStream {
        UploadStream {
            backend: Arc::clone(&self.backend),
            id: BlobId::new(),
            filename: filename.to_string(),
            declared_content_type: content_type.map(String::from),
            chunk_size: self.config.chunk_size,
            buffer: BytesMut::new(),
            head: Vec::with_capacity(SNIFF_LEN),
            chunks_written: 0,
            length: 0,
            failed: false,
        }
    }

    /// Write a complete blob and return its id
    #[cfg(test)]
    pub async fn write_blob(&self, filename: &str, data: &[u8]) -> AppResult<BlobId> {
        let mut upload = self.open_upload_stream(filename, None);
        upload.write(data).await?;
        let entry = upload.finish().await?;
        Ok(entry.id)
    }

    /// Snapshot of every index entry in the bucket
    pub async fn list_blobs(&self) -> AppResult<Vec<BlobIndexEntry>> {
        self.backend.list_files().await
    }

    /// Every index entry stored under `filename`, oldest first
    pub async fn find_by_name(&self, filename: &str) -> AppResult<Vec<BlobIndexEntry>> {
        self.backend.find_files_by_name(filename).await
    }

    /// Open the most recent blob stored under `filename`
    pub async fn open_read_stream(&self, filename: &str) -> AppResult<BlobDownload> {
        self.open_read_stream_by_revision(filename, -1).await
    }

    /// Open a specific revision of `filename`
    ///
    /// Revisions count from the oldest upload (`0`, `1`, ...) or back from
    /// the newest (`-1`, `-2`, ...).
    pub async fn open_read_stream_by_revision(
        &self,
        filename: &str,
        revision: i64,
    ) -> AppResult<BlobDownload> {
        let entries = self.backend.find_files_by_name(filename).await?;
        let entry = select_revision(entries, revision).ok_or_else(|| {
            AppError::NotFound(format!("{} (revision {})", filename, revision))
        })?;

        self.open_read_stream_by_id(&entry.id).await
    }

    /// Open a blob by id
    pub async fn open_read_stream_by_id(&self, id: &BlobId) -> AppResult<BlobDownload> {
        let entry = self
            .backend
            .get_file(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blob {}", id)))?;

        Ok(self.download(entry))
    }

    /// Check that the backend is reachable
    pub async fn ping(&self) -> AppResult<()> {
        self.backend.ping().await
    }

    fn download(&self, entry: BlobIndexEntry) -> BlobDownload {
        BlobDownload {
            body: chunk_stream(Arc::clone(&self.backend), entry.clone()),
            entry,
        }
    }
}

fn select_revision(mut entries: Vec<BlobIndexEntry>, revision: i64) -> Option<BlobIndexEntry> {
    let index = if revision >= 0 {
        usize::try_from(revision).ok()?
    } else {
        let back = usize::try_from(revision.unsigned_abs()).ok()?;
        entries.len().checked_sub(back)?
    };

    if index < entries.len() {
        Some(entries.swap_remove(index))
    } else {
        None
    }
}

/// Pull-based stream over a blob's chunks
///
/// Each chunk is fetched only when the consumer polls for it, so dropping
/// the stream stops all further reads.
fn chunk_stream(backend: Arc<dyn GridBackend>, entry: BlobIndexEntry) -> ChunkStream {
    Box::pin(async_stream::stream! {
        for n in 0..entry.chunk_count() {
            let chunk = match backend.get_chunk(&entry.id, n).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    yield Err::<Bytes, AppError>(AppError::Stream(format!(
                        "Missing chunk {} of blob {}",
                        n, entry.id
                    )));
                    return;
                }
                Err(e) => {
                    yield Err(AppError::Stream(format!(
                        "Failed to read chunk {} of blob {}: {}",
                        n, entry.id, e
                    )));
                    return;
                }
            };

            let expected = entry.expected_chunk_len(n);
            if chunk.len() as u64 != expected {
                yield Err(AppError::Stream(format!(
                    "Chunk {} of blob {} has {} bytes, expected {}",
                    n,
                    entry.id,
                    chunk.len(),
                    expected
                )));
                return;
            }

            yield Ok(chunk);
        }
    })
}

/// Whether a client-declared type may be served back from this origin
///
/// Only raster image types qualify. SVG carries script, and anything
/// outside `image/*` could be rendered as a document by the browser.
pub fn is_servable_image_type(declared: &str) -> bool {
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.strip_prefix("image/") {
        Some(subtype) => !subtype.is_empty() && subtype != "svg+xml",
        None => false,
    }
}

/// Guess a content type from the leading bytes of a blob
pub fn sniff_content_type(head: &[u8]) -> Option<&'static str> {
    image::guess_format(head).ok().map(|format| format.to_mime_type())
}

/// Incremental blob writer
///
/// Full chunks are flushed as soon as they fill; the tail chunk and the
/// index entry are written by [`finish`](Self::finish). On any failure the
/// chunks already flushed are removed and no index entry is written.
/// Dropping an unfinished stream leaves its flushed chunks orphaned but
/// never resolvable.
pub struct UploadStream {
    backend: Arc<dyn GridBackend>,
    id: BlobId,
    filename: String,
    declared_content_type: Option<String>,
    chunk_size: usize,
    buffer: BytesMut,
    head: Vec<u8>,
    chunks_written: u64,
    length: u64,
    failed: bool,
}

impl UploadStream {
    pub fn id(&self) -> BlobId {
        self.id
    }

    /// Bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.length
    }

    /// Append bytes, flushing every chunk that fills up
    pub async fn write(&mut self, data: &[u8]) -> AppResult<()> {
        if self.failed {
            return Err(AppError::StorageWrite(format!(
                "Upload {} already failed",
                self.id
            )));
        }

        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(data.len());
            self.head.extend_from_slice(&data[..take]);
        }

        self.length += data.len() as u64;
        self.buffer.extend_from_slice(data);

        while self.buffer.len() >= self.chunk_size {
            let chunk = self.buffer.split_to(self.chunk_size).freeze();
            if let Err(e) = self.flush_chunk(chunk).await {
                self.discard_chunks().await;
                return Err(e);
            }
        }

        Ok(())
    }

    /// Flush the tail chunk and publish the index entry
    pub async fn finish(mut self) -> AppResult<BlobIndexEntry> {
        if self.failed {
            return Err(AppError::StorageWrite(format!(
                "Upload {} already failed",
                self.id
            )));
        }

        if !self.buffer.is_empty() {
            let tail = self.buffer.split().freeze();
            if let Err(e) = self.flush_chunk(tail).await {
                self.discard_chunks().await;
                return Err(e);
            }
        }

        let entry = BlobIndexEntry {
            id: self.id,
            filename: self.filename.clone(),
            length: self.length,
            chunk_size: self.chunk_size as u64,
            upload_date: Utc::now(),
            content_type: self.resolve_content_type(),
        };

        // Index entry goes last: a blob is resolvable only once every chunk exists
        if let Err(e) = self.backend.insert_file(&entry).await {
            self.discard_chunks().await;
            return Err(e);
        }

        tracing::debug!(
            "Stored blob {} '{}' ({} bytes in {} chunks)",
            entry.id,
            entry.filename,
            entry.length,
            self.chunks_written
        );

        Ok(entry)
    }

    /// Abandon the upload and remove any flushed chunks
    pub async fn abort(self) -> AppResult<()> {
        let removed = self.backend.delete_chunks(&self.id).await?;
        tracing::debug!("Aborted upload {} ({} chunks removed)", self.id, removed);
        Ok(())
    }

    async fn flush_chunk(&mut self, data: Bytes) -> AppResult<()> {
        self.backend
            .insert_chunk(ChunkRecord {
                files_id: self.id,
                n: self.chunks_written,
                data,
            })
            .await?;
        self.chunks_written += 1;
        Ok(())
    }

    async fn discard_chunks(&mut self) {
        self.failed = true;
        if let Err(e) = self.backend.delete_chunks(&self.id).await {
            tracing::warn!("Failed to remove orphaned chunks of {}: {}", self.id, e);
        }
    }

    fn resolve_content_type(&self) -> String {
        match self.declared_content_type.as_deref() {
            Some(declared) if is_servable_image_type(declared) => declared.to_string(),
            _ => sniff_content_type(&self.head)
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string(),
        }
    }
}
