//! HTTP handlers for bucketed file operations.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! concerns to `ChunkStore`; bucket path segments resolve through the static
//! registry, unknown names falling back to the default `fs` bucket.

use crate::{
    errors::AppError,
    models::{
        bucket,
        file::{self, FileRecord, FileResponse},
        page::{ListParams, Page},
    },
    services::{
        AppState,
        chunk_store::FileChanges,
        upload::{self, UploadedBody},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

/// GET `/files/{bucket}` — list records in the resolved bucket.
pub async fn list_files(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<FileResponse>>, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let page = state.files.find(descriptor.bucket_name, &params).await?;
    Ok(Json(page.map(FileResponse::from)))
}

/// GET `/files/{bucket}/schema` — record shape for the bucket's model.
pub async fn file_schema(Path(bucket): Path<String>) -> Json<serde_json::Value> {
    let descriptor = bucket::resolve(&bucket);
    Json(file::json_schema(descriptor.model_name))
}

/// POST `/files/{bucket}` — multipart upload into the resolved bucket.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let ingested = upload::ingest(&state.files, descriptor, multipart).await?;
    Ok((
        StatusCode::CREATED,
        Json(FileResponse::from(ingested.record)),
    ))
}

/// POST `/files` — any-bucket upload: every registered file field in the
/// request is stored in its own bucket, and the created records are merged
/// with the posted text fields into one response body.
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadedBody>), AppError> {
    let body = upload::ingest_any(&state.files, multipart).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET `/files/{bucket}/{id}` — fetch one record.
pub async fn get_file(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, Uuid)>,
) -> Result<Json<FileResponse>, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let record = state.files.get(descriptor.bucket_name, id).await?;
    Ok(Json(FileResponse::from(record)))
}

/// GET `/files/{bucket}/{id}/chunks` — pipe the stored bytes inline.
pub async fn stream_file(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, Uuid)>,
) -> Result<Response, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let record = state.files.get(descriptor.bucket_name, id).await?;
    Ok(stream_response(&state, &record, false))
}

/// GET `/files/{bucket}/{id}/download` — same bytes, but served as an
/// attachment carrying the stored filename.
pub async fn download_file(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, Uuid)>,
) -> Result<Response, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let record = state.files.get(descriptor.bucket_name, id).await?;
    Ok(stream_response(&state, &record, true))
}

/// PATCH `/files/{bucket}/{id}` — partial update of the mutable fields.
pub async fn patch_file(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, Uuid)>,
    Json(changes): Json<FileChanges>,
) -> Result<Json<FileResponse>, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let record = state.files.patch(descriptor.bucket_name, id, changes).await?;
    Ok(Json(FileResponse::from(record)))
}

/// PUT `/files/{bucket}/{id}` — full update of the mutable fields.
pub async fn put_file(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, Uuid)>,
    Json(changes): Json<FileChanges>,
) -> Result<Json<FileResponse>, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let record = state.files.put(descriptor.bucket_name, id, changes).await?;
    Ok(Json(FileResponse::from(record)))
}

/// DELETE `/files/{bucket}/{id}` — hard delete of record and chunks,
/// answering with the pre-deletion snapshot.
pub async fn delete_file(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, Uuid)>,
) -> Result<Json<FileResponse>, AppError> {
    let descriptor = bucket::resolve(&bucket);
    let record = state.files.unlink(descriptor.bucket_name, id).await?;
    Ok(Json(FileResponse::from(record)))
}

/// Build a streaming response from the record's lazy chunk stream.
///
/// The body pulls one chunk per poll, so backpressure from the client reaches
/// the storage reads, and dropping the response (client disconnect) stops
/// further chunk fetches.
fn stream_response(state: &AppState, record: &FileRecord, attachment: bool) -> Response {
    let body = Body::from_stream(state.files.read_stream(record.id));

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&record.length.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    if attachment {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            record.filename.replace(['"', '\r', '\n'], "_")
        );
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        );
    }
    response
}
