//! ChunkStore — chunked binary storage backed by SQLite.
//!
//! Objects are split into fixed-size chunks held in the `chunks` table and
//! described by one metadata row in `files`, scoped by bucket. A write
//! commits chunks and record in a single transaction, so a failed upload
//! leaves neither orphaned chunks nor a dangling record. Reads come in two
//! modes: buffered for small internal use, and a lazy single-pass stream
//! that never materializes the whole object.

use crate::models::{
    file::FileRecord,
    page::{ListParams, Page},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::{SqlitePool, types::Json};
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Bytes per stored chunk. Matches the GridFS default of 255 KiB; chunking is
/// a store-level constant, not caller-controlled.
pub const CHUNK_SIZE_BYTES: usize = 255 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file `{id}` not found in bucket `{bucket}`")]
    FileNotFound { bucket: String, id: Uuid },
    #[error("predefine `{0}` not found")]
    PredefineNotFound(Uuid),
    #[error("{0}")]
    Duplicate(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Caller-supplied metadata for a new object write.
#[derive(Debug, Clone, Default)]
pub struct WriteFile {
    pub filename: String,
    pub content_type: String,
    pub aliases: Vec<String>,
    pub metadata: Map<String, Value>,
}

/// The mutable fields of a committed record. Everything else is owned by the
/// storage engine and immutable after commit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileChanges {
    pub aliases: Option<Vec<String>>,
    pub metadata: Option<Map<String, Value>>,
}

/// ChunkStore provides the chunked blob operations:
/// - Write an object (streams chunks and metadata into SQLite atomically)
/// - Read an object (buffered, or as a lazy chunk stream)
/// - Patch/put mutable metadata fields
/// - List records per bucket
/// - Unlink (hard delete of record + chunks)
#[derive(Clone)]
pub struct ChunkStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl ChunkStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Stream-write an object into a bucket.
    ///
    /// Consumes the input to completion, splitting into fixed-size chunks and
    /// computing a running MD5. Chunks and the metadata row are inserted
    /// inside one transaction committed only after the final chunk, so an
    /// error (or a dropped connection) rolls everything back.
    pub async fn write<S>(
        &self,
        bucket: &str,
        file: WriteFile,
        stream: S,
    ) -> StorageResult<FileRecord>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;

        let mut buffer: Vec<u8> = Vec::with_capacity(CHUNK_SIZE_BYTES);
        let mut digest = Context::new();
        let mut length: i64 = 0;
        let mut n: i64 = 0;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            digest.consume(&chunk);
            length += chunk.len() as i64;
            buffer.extend_from_slice(&chunk);

            while buffer.len() >= CHUNK_SIZE_BYTES {
                let rest = buffer.split_off(CHUNK_SIZE_BYTES);
                let full = std::mem::replace(&mut buffer, rest);
                sqlx::query("INSERT INTO chunks (file_id, n, data) VALUES (?, ?, ?)")
                    .bind(id)
                    .bind(n)
                    .bind(full)
                    .execute(&mut *tx)
                    .await?;
                n += 1;
            }
        }

        if !buffer.is_empty() {
            sqlx::query("INSERT INTO chunks (file_id, n, data) VALUES (?, ?, ?)")
                .bind(id)
                .bind(n)
                .bind(std::mem::take(&mut buffer))
                .execute(&mut *tx)
                .await?;
        }

        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (
                id, bucket, filename, content_type, length,
                chunk_size, md5, upload_date, aliases, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, bucket, filename, content_type, length,
                      chunk_size, md5, upload_date, aliases, metadata
            "#,
        )
        .bind(id)
        .bind(bucket)
        .bind(&file.filename)
        .bind(&file.content_type)
        .bind(length)
        .bind(CHUNK_SIZE_BYTES as i64)
        .bind(format!("{:x}", digest.compute()))
        .bind(Utc::now())
        .bind(Json(file.aliases))
        .bind(Json(file.metadata))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("stored {} bytes as `{}` in bucket `{}`", length, id, bucket);

        Ok(record)
    }

    /// Fetch a record by id, scoped to a bucket.
    pub async fn get(&self, bucket: &str, id: Uuid) -> StorageResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT id, bucket, filename, content_type, length,
                    chunk_size, md5, upload_date, aliases, metadata
             FROM files WHERE id = ? AND bucket = ?",
        )
        .bind(id)
        .bind(bucket)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::FileNotFound {
                bucket: bucket.to_string(),
                id,
            },
            other => StorageError::Sqlx(other),
        })
    }

    /// Buffered whole-object read. Bounded by available memory; intended for
    /// small internal reads, not for serving arbitrary objects.
    pub async fn read(&self, bucket: &str, id: Uuid) -> StorageResult<Vec<u8>> {
        let record = self.get(bucket, id).await?;

        let rows: Vec<Vec<u8>> =
            sqlx::query_scalar("SELECT data FROM chunks WHERE file_id = ? ORDER BY n ASC")
                .bind(id)
                .fetch_all(&*self.db)
                .await?;

        let mut content = Vec::with_capacity(record.length as usize);
        for row in rows {
            content.extend_from_slice(&row);
        }
        Ok(content)
    }

    /// Lazy chunk stream for a record.
    ///
    /// Fetches one chunk per poll in sequence order, so objects far larger
    /// than memory can be piped without materializing. Single-pass and not
    /// restartable. Callers resolve the record first (`get`), which also
    /// yields the 404 before any bytes are sent.
    pub fn read_stream(
        &self,
        id: Uuid,
    ) -> impl Stream<Item = StorageResult<Bytes>> + Send + 'static + use<> {
        let db = self.db.clone();
        futures::stream::try_unfold(0_i64, move |n| {
            let db = db.clone();
            async move {
                let data: Option<Vec<u8>> =
                    sqlx::query_scalar("SELECT data FROM chunks WHERE file_id = ? AND n = ?")
                        .bind(id)
                        .bind(n)
                        .fetch_optional(&*db)
                        .await?;
                Ok::<_, StorageError>(data.map(|data| (Bytes::from(data), n + 1)))
            }
        })
    }

    /// Delete a record and all of its chunks in one logical operation.
    ///
    /// Returns the pre-deletion snapshot for caller confirmation. All-or-
    /// nothing: record and chunks go together or not at all.
    pub async fn unlink(&self, bucket: &str, id: Uuid) -> StorageResult<FileRecord> {
        let mut tx = self.db.begin().await?;

        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, bucket, filename, content_type, length,
                    chunk_size, md5, upload_date, aliases, metadata
             FROM files WHERE id = ? AND bucket = ?",
        )
        .bind(id)
        .bind(bucket)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::FileNotFound {
                bucket: bucket.to_string(),
                id,
            },
            other => StorageError::Sqlx(other),
        })?;

        sqlx::query("DELETE FROM chunks WHERE file_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("unlinked `{}` from bucket `{}`", id, bucket);

        Ok(record)
    }

    /// List records in a bucket, newest first.
    pub async fn find(&self, bucket: &str, params: &ListParams) -> StorageResult<Page<FileRecord>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE bucket = ?")
            .bind(bucket)
            .fetch_one(&*self.db)
            .await?;

        let last_modified: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(upload_date) FROM files WHERE bucket = ?")
                .bind(bucket)
                .fetch_one(&*self.db)
                .await?;

        let data = sqlx::query_as::<_, FileRecord>(
            "SELECT id, bucket, filename, content_type, length,
                    chunk_size, md5, upload_date, aliases, metadata
             FROM files WHERE bucket = ?
             ORDER BY upload_date DESC, id ASC
             LIMIT ? OFFSET ?",
        )
        .bind(bucket)
        .bind(params.limit())
        .bind(params.skip())
        .fetch_all(&*self.db)
        .await?;

        Ok(Page::new(data, total, params, last_modified))
    }

    /// Partial update: only the provided mutable fields change.
    pub async fn patch(
        &self,
        bucket: &str,
        id: Uuid,
        changes: FileChanges,
    ) -> StorageResult<FileRecord> {
        let record = self.get(bucket, id).await?;
        let aliases = changes.aliases.map(Json).unwrap_or(record.aliases);
        let metadata = changes.metadata.map(Json).unwrap_or(record.metadata);
        self.update_mutable(id, aliases, metadata).await
    }

    /// Full update: both mutable fields are overwritten, absent values reset
    /// to their defaults.
    pub async fn put(
        &self,
        bucket: &str,
        id: Uuid,
        changes: FileChanges,
    ) -> StorageResult<FileRecord> {
        self.get(bucket, id).await?;
        let aliases = Json(changes.aliases.unwrap_or_default());
        let metadata = Json(changes.metadata.unwrap_or_default());
        self.update_mutable(id, aliases, metadata).await
    }

    async fn update_mutable(
        &self,
        id: Uuid,
        aliases: Json<Vec<String>>,
        metadata: Json<Map<String, Value>>,
    ) -> StorageResult<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(
            "UPDATE files SET aliases = ?, metadata = ?
             WHERE id = ?
             RETURNING id, bucket, filename, content_type, length,
                       chunk_size, md5, upload_date, aliases, metadata",
        )
        .bind(aliases)
        .bind(metadata)
        .bind(id)
        .fetch_one(&*self.db)
        .await?;
        Ok(record)
    }
}
