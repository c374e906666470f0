//! Defines routes for the bucketed file surface and the predefine resource.
//!
//! ## Structure
//! - **File endpoints** (the `{bucket}` segment resolves through the static
//!   bucket registry; unknown names fall back to `fs`)
//!   - `POST   /files` — any-bucket multipart upload
//!   - `GET    /files/{bucket}` — list records
//!   - `POST   /files/{bucket}` — multipart upload
//!   - `GET    /files/{bucket}/schema` — record shape
//!   - `GET    /files/{bucket}/{id}` — fetch one record
//!   - `GET    /files/{bucket}/{id}/chunks` — stream bytes inline
//!   - `GET    /files/{bucket}/{id}/download` — stream bytes as attachment
//!   - `PATCH  /files/{bucket}/{id}` — partial update (aliases/metadata)
//!   - `PUT    /files/{bucket}/{id}` — full update
//!   - `DELETE /files/{bucket}/{id}` — hard delete
//!
//! - **Predefine endpoints**
//!   - `GET    /predefines` / `POST /predefines`
//!   - `GET    /predefines/schema`
//!   - `GET/PATCH/PUT/DELETE /predefines/{id}` (delete is soft)
//!
//! All API routes mount under the version prefix derived from the configured
//! API version; the health probes stay at the root.

use crate::{
    handlers::{
        file_handlers::{
            delete_file, download_file, file_schema, get_file, list_files, patch_file, put_file,
            stream_file, upload_file, upload_files,
        },
        health_handlers::{healthz, readyz},
        predefine_handlers::{
            create_predefine, delete_predefine, get_predefine, list_predefines, patch_predefine,
            predefine_schema, put_predefine,
        },
    },
    services::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for the full API surface.
///
/// The router carries shared state (`AppState`) to all handlers; `prefix` is
/// the version mount point, e.g. `/v1`.
pub fn routes(prefix: &str) -> Router<AppState> {
    let api = Router::new()
        // File routes
        .route("/files", post(upload_files))
        .route("/files/{bucket}", get(list_files).post(upload_file))
        .route("/files/{bucket}/schema", get(file_schema))
        .route(
            "/files/{bucket}/{id}",
            get(get_file)
                .patch(patch_file)
                .put(put_file)
                .delete(delete_file),
        )
        .route("/files/{bucket}/{id}/chunks", get(stream_file))
        .route("/files/{bucket}/{id}/download", get(download_file))
        // Predefine routes
        .route("/predefines", get(list_predefines).post(create_predefine))
        .route("/predefines/schema", get(predefine_schema))
        .route(
            "/predefines/{id}",
            get(get_predefine)
                .patch(patch_predefine)
                .put(put_predefine)
                .delete(delete_predefine),
        );

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest(prefix, api)
}
