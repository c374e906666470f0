//! HTTP handlers for the predefine resource.
//!
//! Payload derivation (namespace/bucket pairing, abbreviation and code
//! defaults) happens in the model layer before the service touches storage,
//! so validation failures share the wire shape of upload validation.

use crate::{
    errors::AppError,
    models::{
        page::{ListParams, Page},
        predefine::{self, NewPredefine, PredefineRecord},
    },
    services::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// GET `/predefines` — list, excluding soft-deleted records.
pub async fn list_predefines(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<PredefineRecord>>, AppError> {
    let page = state.predefines.find(&params).await?;
    Ok(Json(page))
}

/// GET `/predefines/schema` — record shape with the configured namespaces.
pub async fn predefine_schema(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(predefine::json_schema(state.predefines.namespaces()))
}

/// POST `/predefines` — create after derivation and validation.
pub async fn create_predefine(
    State(state): State<AppState>,
    Json(payload): Json<NewPredefine>,
) -> Result<(StatusCode, Json<PredefineRecord>), AppError> {
    let input = payload.normalize(state.predefines.namespaces())?;
    let record = state.predefines.create(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET `/predefines/{id}` — fetch one record.
pub async fn get_predefine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PredefineRecord>, AppError> {
    let record = state.predefines.get(id).await?;
    Ok(Json(record))
}

/// PATCH `/predefines/{id}` — merge the provided fields into the record.
pub async fn patch_predefine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewPredefine>,
) -> Result<Json<PredefineRecord>, AppError> {
    update(state, id, payload, false).await
}

/// PUT `/predefines/{id}` — replace the record; unspecified optional fields
/// reset to their defaults.
pub async fn put_predefine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewPredefine>,
) -> Result<Json<PredefineRecord>, AppError> {
    update(state, id, payload, true).await
}

/// DELETE `/predefines/{id}` — soft delete, answering with the record.
pub async fn delete_predefine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PredefineRecord>, AppError> {
    let record = state.predefines.delete(id).await?;
    Ok(Json(record))
}

async fn update(
    state: AppState,
    id: Uuid,
    payload: NewPredefine,
    replace: bool,
) -> Result<Json<PredefineRecord>, AppError> {
    let existing = state.predefines.get(id).await?;
    let input = payload.apply(&existing, state.predefines.namespaces(), replace)?;
    let record = state.predefines.update(id, input).await?;
    Ok(Json(record))
}
