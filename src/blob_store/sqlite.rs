/// SQLite-based grid storage backend
use crate::{
    blob_store::{BlobId, BlobIndexEntry, ChunkRecord, GridBackend},
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// SQLite storage backend
///
/// Keeps chunks in `grid_chunks` and index entries in `grid_files`, both
/// scoped by bucket name so several buckets can share one database.
#[derive(Clone)]
pub struct SqliteGridBackend {
    db: SqlitePool,
    bucket: String,
}

impl SqliteGridBackend {
    /// Create a backend for `bucket` on an already migrated pool
    pub fn new(db: SqlitePool, bucket: impl Into<String>) -> Self {
        Self {
            db,
            bucket: bucket.into(),
        }
    }

    fn row_to_entry(row: &SqliteRow) -> AppResult<BlobIndexEntry> {
        let id: String = row.try_get("id")?;
        let id = id
            .parse::<BlobId>()
            .map_err(|e| AppError::StorageRead(format!("Corrupt blob id {}: {}", id, e)))?;
        let length: i64 = row.try_get("length")?;
        let chunk_size: i64 = row.try_get("chunk_size")?;

        Ok(BlobIndexEntry {
            id,
            filename: row.try_get("filename")?,
            length: length as u64,
            chunk_size: chunk_size as u64,
            upload_date: row.try_get("upload_date")?,
            content_type: row.try_get("content_type")?,
        })
    }
}

#[async_trait]
impl GridBackend for SqliteGridBackend {
    async fn insert_chunk(&self, chunk: ChunkRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO grid_chunks (bucket, files_id, n, data)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&self.bucket)
        .bind(chunk.files_id.to_string())
        .bind(chunk.n as i64)
        .bind(chunk.data.as_ref())
        .execute(&self.db)
        .await
        .map_err(|e| {
            AppError::StorageWrite(format!(
                "Failed to write chunk {} of {}: {}",
                chunk.n, chunk.files_id, e
            ))
        })?;

        Ok(())
    }

    async fn get_chunk(&self, files_id: &BlobId, n: u64) -> AppResult<Option<Bytes>> {
        let row = sqlx::query(
            r#"
            SELECT data FROM grid_chunks
            WHERE bucket = ?1 AND files_id = ?2 AND n = ?3
            "#,
        )
        .bind(&self.bucket)
        .bind(files_id.to_string())
        .bind(n as i64)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            AppError::StorageRead(format!("Failed to read chunk {} of {}: {}", n, files_id, e))
        })?;

        match row {
            Some(row) => {
                let data: Vec<u8> = row.try_get("data")?;
                Ok(Some(Bytes::from(data)))
            }
            None => Ok(None),
        }
    }

    async fn delete_chunks(&self, files_id: &BlobId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM grid_chunks WHERE bucket = ?1 AND files_id = ?2")
            .bind(&self.bucket)
            .bind(files_id.to_string())
            .execute(&self.db)
            .await
            .map_err(|e| {
                AppError::StorageWrite(format!("Failed to delete chunks of {}: {}", files_id, e))
            })?;

        Ok(result.rows_affected())
    }

    async fn insert_file(&self, entry: &BlobIndexEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO grid_files (bucket, id, filename, length, chunk_size, upload_date, content_type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&self.bucket)
        .bind(entry.id.to_string())
        .bind(&entry.filename)
        .bind(entry.length as i64)
        .bind(entry.chunk_size as i64)
        .bind(entry.upload_date)
        .bind(&entry.content_type)
        .execute(&self.db)
        .await
        .map_err(|e| {
            AppError::StorageWrite(format!("Failed to write index entry {}: {}", entry.id, e))
        })?;

        Ok(())
    }

    async fn list_files(&self) -> AppResult<Vec<BlobIndexEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, filename, length, chunk_size, upload_date, content_type
            FROM grid_files
            WHERE bucket = ?1
            ORDER BY upload_date ASC, rowid ASC
            "#,
        )
        .bind(&self.bucket)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::StorageRead(format!("Failed to list files: {}", e)))?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn find_files_by_name(&self, filename: &str) -> AppResult<Vec<BlobIndexEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, filename, length, chunk_size, upload_date, content_type
            FROM grid_files
            WHERE bucket = ?1 AND filename = ?2
            ORDER BY upload_date ASC, rowid ASC
            "#,
        )
        .bind(&self.bucket)
        .bind(filename)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::StorageRead(format!("Failed to find {}: {}", filename, e)))?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn get_file(&self, id: &BlobId) -> AppResult<Option<BlobIndexEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, filename, length, chunk_size, upload_date, content_type
            FROM grid_files
            WHERE bucket = ?1 AND id = ?2
            "#,
        )
        .bind(&self.bucket)
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::StorageRead(format!("Failed to read index entry {}: {}", id, e)))?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn ping(&self) -> AppResult<()> {
        crate::db::test_connection(&self.db).await
    }
}
