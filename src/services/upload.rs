//! Multipart ingest into the chunk store.
//!
//! Bridges an HTTP multipart request into `ChunkStore::write` for a resolved
//! bucket. Only parts arriving under the bucket's accepted field name are
//! stored; other file parts are dropped, and plain text parts are collected
//! as posted body fields so handlers can merge them with the created record.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, io};
use thiserror::Error;

use crate::{
    models::{
        bucket::{self, BucketDescriptor},
        file::{FileRecord, FileResponse},
    },
    services::chunk_store::{ChunkStore, StorageError, WriteFile},
};

#[derive(Debug, Error)]
pub enum UploadError {
    /// No part arrived under the bucket's accepted field name.
    #[error("multipart field `{0}` is required")]
    Required(&'static str),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a single-bucket ingest: the committed record plus any plain
/// text fields posted alongside it.
#[derive(Debug)]
pub struct Ingested {
    pub record: FileRecord,
    pub fields: Map<String, Value>,
}

/// Outcome of the any-bucket ingest: one record per accepted file field,
/// merged with the posted text fields into a single response body.
#[derive(Debug, Serialize)]
pub struct UploadedBody {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(flatten)]
    pub files: BTreeMap<&'static str, FileResponse>,
}

/// Stream a multipart upload into the descriptor's bucket.
///
/// The first part whose field name equals `descriptor.field_name` is written
/// to the chunk store; later matching parts and unrelated file parts are
/// dropped. Zero accepted parts fail with [`UploadError::Required`], which
/// shares its wire shape with model required-field validation.
pub async fn ingest(
    store: &ChunkStore,
    descriptor: &'static BucketDescriptor,
    mut multipart: Multipart,
) -> Result<Ingested, UploadError> {
    let mut record: Option<FileRecord> = None;
    let mut fields = Map::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if record.is_none() && name == descriptor.field_name {
            record = Some(write_field(store, descriptor.bucket_name, field).await?);
        } else if field.file_name().is_none() {
            fields.insert(name, Value::String(field.text().await?));
        }
    }

    let record = record.ok_or(UploadError::Required(descriptor.field_name))?;
    Ok(Ingested { record, fields })
}

/// Any-bucket ingest: accept every part whose field name is one of the
/// registered upload field names, writing each to its own bucket.
///
/// Supports posting several typed file fields (image, audio, ...) together
/// with plain form fields in one request. A request carrying no file part at
/// all fails the same way a single-bucket upload does, keyed by the default
/// bucket's field name.
pub async fn ingest_any(
    store: &ChunkStore,
    mut multipart: Multipart,
) -> Result<UploadedBody, UploadError> {
    let mut files: BTreeMap<&'static str, FileResponse> = BTreeMap::new();
    let mut fields = Map::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match bucket::descriptor_for_field(&name) {
            Some(descriptor) if !files.contains_key(descriptor.field_name) => {
                let record = write_field(store, descriptor.bucket_name, field).await?;
                files.insert(descriptor.field_name, FileResponse::from(record));
            }
            Some(_) => {}
            None if field.file_name().is_none() => {
                fields.insert(name, Value::String(field.text().await?));
            }
            None => {}
        }
    }

    if files.is_empty() {
        return Err(UploadError::Required(bucket::default_bucket().field_name));
    }
    Ok(UploadedBody { fields, files })
}

/// Pipe one multipart part into the chunk store without buffering it.
async fn write_field(
    store: &ChunkStore,
    bucket_name: &str,
    field: Field<'_>,
) -> Result<FileRecord, UploadError> {
    let filename = field.file_name().unwrap_or("file").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let stream = futures::stream::try_unfold(field, |mut field| async move {
        match field.chunk().await {
            Ok(Some(bytes)) => Ok(Some((bytes, field))),
            Ok(None) => Ok(None),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
        }
    });

    let record = store
        .write(
            bucket_name,
            WriteFile {
                filename,
                content_type,
                ..Default::default()
            },
            stream,
        )
        .await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, header},
    };
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn test_store() -> ChunkStore {
        let db = Arc::new(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .expect("connect in-memory sqlite"),
        );
        services::apply_migrations(&db)
            .await
            .expect("apply migrations");
        ChunkStore::new(db)
    }

    const BOUNDARY: &str = "ingest-test-boundary";

    fn file_part(field: &str, filename: &str, content_type: &str, content: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{content}\r\n"
        )
    }

    fn text_part(field: &str, value: &str) -> String {
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n")
    }

    async fn multipart_of(parts: &[String]) -> Multipart {
        let body = format!("{}--{BOUNDARY}--\r\n", parts.concat());
        let request = Request::builder()
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("build request");
        Multipart::from_request(request, &())
            .await
            .expect("extract multipart")
    }

    #[tokio::test]
    async fn ingest_stores_the_matching_part_and_collects_fields() {
        let store = test_store().await;
        let multipart = multipart_of(&[
            text_part("caption", "holiday"),
            file_part("image", "photo.png", "image/png", "pixels"),
            file_part("document", "skip.pdf", "application/pdf", "dropped"),
        ])
        .await;

        let ingested = ingest(&store, bucket::resolve("images"), multipart)
            .await
            .expect("ingest");

        assert_eq!(ingested.record.bucket, "images");
        assert_eq!(ingested.record.filename, "photo.png");
        assert_eq!(ingested.record.content_type, "image/png");
        assert_eq!(ingested.record.length, 6);
        assert_eq!(ingested.fields["caption"], "holiday");

        // The non-matching document part was dropped, not stored.
        let content = store.read("images", ingested.record.id).await.expect("read");
        assert_eq!(content, b"pixels");
        let stray: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE bucket = ?")
            .bind("documents")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!(stray, 0);
    }

    #[tokio::test]
    async fn ingest_requires_the_bucket_field() {
        let store = test_store().await;
        let multipart =
            multipart_of(&[file_part("file", "wrong.txt", "text/plain", "data")]).await;

        let err = ingest(&store, bucket::resolve("images"), multipart)
            .await
            .expect_err("no image part");
        assert!(matches!(err, UploadError::Required("image")));

        // Nothing was committed for the rejected request.
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn ingest_keeps_the_first_matching_part() {
        let store = test_store().await;
        let multipart = multipart_of(&[
            file_part("file", "first.txt", "text/plain", "first"),
            file_part("file", "second.txt", "text/plain", "second"),
        ])
        .await;

        let ingested = ingest(&store, bucket::resolve("fs"), multipart)
            .await
            .expect("ingest");
        assert_eq!(ingested.record.filename, "first.txt");

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn ingest_any_routes_each_field_to_its_bucket() {
        let store = test_store().await;
        let multipart = multipart_of(&[
            text_part("title", "mixed"),
            file_part("image", "cover.png", "image/png", "img"),
            file_part("audio", "track.mp3", "audio/mpeg", "beat"),
        ])
        .await;

        let body = ingest_any(&store, multipart).await.expect("ingest_any");
        assert_eq!(body.fields["title"], "mixed");
        assert_eq!(body.files.len(), 2);
        assert_eq!(body.files["image"].filename, "cover.png");
        assert_eq!(body.files["audio"].filename, "track.mp3");

        let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE bucket = ?")
            .bind("images")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        let audios: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE bucket = ?")
            .bind("audios")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!((images, audios), (1, 1));
    }

    #[tokio::test]
    async fn ingest_any_without_files_is_required_error() {
        let store = test_store().await;
        let multipart = multipart_of(&[text_part("only", "text")]).await;

        let err = ingest_any(&store, multipart)
            .await
            .expect_err("no file parts");
        assert!(matches!(err, UploadError::Required("file")));
    }
}
