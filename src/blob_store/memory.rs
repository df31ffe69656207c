/// In-process grid storage backend
use crate::{
    blob_store::{BlobId, BlobIndexEntry, ChunkRecord, GridBackend},
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct GridState {
    files: Vec<BlobIndexEntry>,
    chunks: HashMap<(BlobId, u64), Bytes>,
}

/// Memory storage backend
///
/// Nothing survives a restart. Locks are held for a single operation only.
#[derive(Default)]
pub struct MemoryGridBackend {
    state: RwLock<GridState>,
}

impl MemoryGridBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut entries: Vec<BlobIndexEntry>) -> Vec<BlobIndexEntry> {
        // Stable sort keeps insertion order between equal timestamps
        entries.sort_by_key(|e| e.upload_date);
        entries
    }
}

#[async_trait]
impl GridBackend for MemoryGridBackend {
    async fn insert_chunk(&self, chunk: ChunkRecord) -> AppResult<()> {
        let mut state = self.state.write();
        let key = (chunk.files_id, chunk.n);
        if state.chunks.contains_key(&key) {
            return Err(AppError::StorageWrite(format!(
                "Chunk {} of {} already exists",
                chunk.n, chunk.files_id
            )));
        }
        state.chunks.insert(key, chunk.data);
        Ok(())
    }

    async fn get_chunk(&self, files_id: &BlobId, n: u64) -> AppResult<Option<Bytes>> {
        Ok(self.state.read().chunks.get(&(*files_id, n)).cloned())
    }

    async fn delete_chunks(&self, files_id: &BlobId) -> AppResult<u64> {
        let mut state = self.state.write();
        let before = state.chunks.len();
        state.chunks.retain(|(id, _), _| id != files_id);
        Ok((before - state.chunks.len()) as u64)
    }

    async fn insert_file(&self, entry: &BlobIndexEntry) -> AppResult<()> {
        let mut state = self.state.write();
        if state.files.iter().any(|e| e.id == entry.id) {
            return Err(AppError::StorageWrite(format!(
                "Index entry {} already exists",
                entry.id
            )));
        }
        state.files.push(entry.clone());
        Ok(())
    }

    async fn list_files(&self) -> AppResult<Vec<BlobIndexEntry>> {
        let files = self.state.read().files.clone();
        Ok(Self::sorted(files))
    }

    async fn find_files_by_name(&self, filename: &str) -> AppResult<Vec<BlobIndexEntry>> {
        let files = self
            .state
            .read()
            .files
            .iter()
            .filter(|e| e.filename == filename)
            .cloned()
            .collect();
        Ok(Self::sorted(files))
    }

    async fn get_file(&self, id: &BlobId) -> AppResult<Option<BlobIndexEntry>> {
        Ok(self.state.read().files.iter().find(|e| &e.id == id).cloned())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_chunks_only_touches_one_blob() {
        let backend = MemoryGridBackend::new();
        let keep = BlobId::new();
        let discard = BlobId::new();

        for (id, n) in [(keep, 0), (discard, 0), (discard, 1)] {
            backend
                .insert_chunk(ChunkRecord {
                    files_id: id,
                    n,
                    data: Bytes::from_static(b"zz"),
                })
                .await
                .unwrap();
        }

        assert_eq!(backend.delete_chunks(&discard).await.unwrap(), 2);
        assert!(backend.get_chunk(&keep, 0).await.unwrap().is_some());
        assert!(backend.get_chunk(&discard, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_chunk_rejected() {
        let backend = MemoryGridBackend::new();
        let chunk = ChunkRecord {
            files_id: BlobId::new(),
            n: 0,
            data: Bytes::from_static(b"a"),
        };

        backend.insert_chunk(chunk.clone()).await.unwrap();
        assert!(matches!(
            backend.insert_chunk(chunk).await,
            Err(AppError::StorageWrite(_))
        ));
    }
}
