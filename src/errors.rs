//! HTTP error translation.
//!
//! Storage and upload failures carry their own typed errors; this module maps
//! them onto the wire shapes handlers respond with. Upload-validation errors
//! share one body shape with model-validation errors so clients can treat
//! both uniformly.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::{collections::BTreeMap, fmt};

use crate::services::{chunk_store::StorageError, upload::UploadError};

/// Per-path entry inside a `ValidationError` body.
#[derive(Debug, Clone, Serialize)]
pub struct PathError {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub path: String,
    pub reason: String,
    pub message: String,
}

impl PathError {
    /// A required path was not provided.
    pub fn required(path: &str) -> Self {
        Self {
            kind: "required",
            path: path.to_string(),
            reason: "Not provided".to_string(),
            message: format!("Path `{}` is required.", path),
        }
    }

    /// A value fell outside the allowed enum for its path.
    pub fn invalid_enum(path: &str, value: &str) -> Self {
        Self {
            kind: "enum",
            path: path.to_string(),
            reason: format!("`{}` is not an allowed value", value),
            message: format!("`{}` is not a valid enum value for path `{}`.", value, path),
        }
    }
}

/// Errors a handler can answer with.
#[derive(Debug)]
pub enum AppError {
    /// 400 with the shared validation body, keyed by offending path.
    Validation(BTreeMap<String, PathError>),
    /// 404 for records absent in the resolved bucket.
    NotFound,
    /// 409 for unique tuple violations.
    Conflict(String),
    /// 400 for malformed request payloads.
    BadRequest(String),
    /// 500 for storage and I/O failures.
    Internal(String),
}

impl AppError {
    /// ValidationError covering the given required paths.
    pub fn required(paths: &[&str]) -> Self {
        let errors = paths
            .iter()
            .map(|path| ((*path).to_string(), PathError::required(path)))
            .collect();
        Self::Validation(errors)
    }

    /// ValidationError for a value outside its enum.
    pub fn invalid_enum(path: &str, value: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(path.to_string(), PathError::invalid_enum(path, value));
        Self::Validation(errors)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => {
                let paths: Vec<&str> = errors.keys().map(String::as_str).collect();
                write!(f, "validation failed for paths {:?}", paths)
            }
            AppError::NotFound => write!(f, "not found"),
            AppError::Conflict(message)
            | AppError::BadRequest(message)
            | AppError::Internal(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => {
                let body = json!({
                    "name": "ValidationError",
                    "status": 400,
                    "message": "Validation failed",
                    "errors": errors,
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::NotFound => {
                let body = json!({
                    "name": "NotFoundError",
                    "status": 404,
                    "message": "Not Found",
                });
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
            AppError::Conflict(message) => {
                let body = json!({ "error": message, "status": 409 });
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            AppError::BadRequest(message) => {
                let body = json!({ "error": message, "status": 400 });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::Internal(message) => {
                let body = json!({ "error": message, "status": 500 });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileNotFound { .. } | StorageError::PredefineNotFound(_) => {
                AppError::NotFound
            }
            StorageError::Duplicate(message) => AppError::Conflict(message),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Required(field) => AppError::required(&[field]),
            UploadError::Multipart(err) => AppError::BadRequest(err.to_string()),
            UploadError::Storage(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn body_of(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect body");
        serde_json::from_slice(&bytes).expect("parse body")
    }

    #[tokio::test]
    async fn required_error_uses_shared_validation_shape() {
        let response = AppError::required(&["image"]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_of(response).await;
        assert_eq!(body["name"], "ValidationError");
        assert_eq!(body["status"], 400);
        assert_eq!(body["errors"]["image"]["type"], "required");
        assert_eq!(body["errors"]["image"]["path"], "image");
        assert_eq!(
            body["errors"]["image"]["message"],
            "Path `image` is required."
        );
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_of(response).await;
        assert_eq!(body["name"], "NotFoundError");
    }
}
