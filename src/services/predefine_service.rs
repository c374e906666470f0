//! Predefine CRUD over the shared SQLite pool.
//!
//! Predefines are soft-deleted: a delete stamps `deleted_at` and the record
//! leaves the API surface, but the row stays in storage. The unique
//! `(namespace, bucket, name, code)` tuple is enforced by the schema and
//! surfaced as a duplicate error.

use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    models::{
        page::{ListParams, Page},
        predefine::{NamespaceRegistry, PredefineInput, PredefineRecord},
    },
    services::chunk_store::{StorageError, StorageResult},
};

const PREDEFINE_COLUMNS: &str = "id, namespace, bucket, name, code, symbol, abbreviation,
             description, weight, color, icon, geometry, properties,
             created_at, updated_at, deleted_at";

/// PredefineService provides create/read/update/soft-delete over predefine
/// records, plus the namespace registry handlers validate against.
#[derive(Clone)]
pub struct PredefineService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
    namespaces: NamespaceRegistry,
}

impl PredefineService {
    pub fn new(db: Arc<SqlitePool>, namespaces: NamespaceRegistry) -> Self {
        Self { db, namespaces }
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Insert a new predefine.
    pub async fn create(&self, input: PredefineInput) -> StorageResult<PredefineRecord> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, PredefineRecord>(&format!(
            "INSERT INTO predefines (
                id, namespace, bucket, name, code, symbol, abbreviation,
                description, weight, color, icon, geometry, properties,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {PREDEFINE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&input.namespace)
        .bind(&input.bucket)
        .bind(&input.name)
        .bind(&input.code)
        .bind(&input.symbol)
        .bind(&input.abbreviation)
        .bind(&input.description)
        .bind(input.weight)
        .bind(&input.color)
        .bind(&input.icon)
        .bind(input.geometry.clone().map(Json))
        .bind(Json(input.properties.clone()))
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| duplicate_or(err, &input))?;

        debug!(
            "created predefine `{}` in namespace `{}`",
            record.name, record.namespace
        );
        Ok(record)
    }

    /// Fetch a predefine by id. Soft-deleted records are absent.
    pub async fn get(&self, id: Uuid) -> StorageResult<PredefineRecord> {
        sqlx::query_as::<_, PredefineRecord>(&format!(
            "SELECT {PREDEFINE_COLUMNS} FROM predefines
             WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::PredefineNotFound(id),
            other => StorageError::Sqlx(other),
        })
    }

    /// List predefines, lightest weight first, excluding soft-deleted rows.
    pub async fn find(&self, params: &ListParams) -> StorageResult<Page<PredefineRecord>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM predefines WHERE deleted_at IS NULL")
                .fetch_one(&*self.db)
                .await?;

        let last_modified: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(updated_at) FROM predefines WHERE deleted_at IS NULL")
                .fetch_one(&*self.db)
                .await?;

        let data = sqlx::query_as::<_, PredefineRecord>(&format!(
            "SELECT {PREDEFINE_COLUMNS} FROM predefines
             WHERE deleted_at IS NULL
             ORDER BY weight ASC, name ASC
             LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.skip())
        .fetch_all(&*self.db)
        .await?;

        Ok(Page::new(data, total, params, last_modified))
    }

    /// Overwrite a predefine with fully derived fields.
    pub async fn update(&self, id: Uuid, input: PredefineInput) -> StorageResult<PredefineRecord> {
        sqlx::query_as::<_, PredefineRecord>(&format!(
            "UPDATE predefines SET
                namespace = ?, bucket = ?, name = ?, code = ?, symbol = ?,
                abbreviation = ?, description = ?, weight = ?, color = ?,
                icon = ?, geometry = ?, properties = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {PREDEFINE_COLUMNS}"
        ))
        .bind(&input.namespace)
        .bind(&input.bucket)
        .bind(&input.name)
        .bind(&input.code)
        .bind(&input.symbol)
        .bind(&input.abbreviation)
        .bind(&input.description)
        .bind(input.weight)
        .bind(&input.color)
        .bind(&input.icon)
        .bind(input.geometry.clone().map(Json))
        .bind(Json(input.properties.clone()))
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::PredefineNotFound(id),
            other => duplicate_or(other, &input),
        })
    }

    /// Soft-delete a predefine, returning the record as it leaves the API.
    pub async fn delete(&self, id: Uuid) -> StorageResult<PredefineRecord> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, PredefineRecord>(&format!(
            "UPDATE predefines SET deleted_at = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {PREDEFINE_COLUMNS}"
        ))
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::PredefineNotFound(id),
            other => StorageError::Sqlx(other),
        })?;

        debug!(
            "soft-deleted predefine `{}` in namespace `{}`",
            record.name, record.namespace
        );
        Ok(record)
    }
}

fn duplicate_or(err: sqlx::Error, input: &PredefineInput) -> StorageError {
    if is_unique_violation(&err) {
        return StorageError::Duplicate(format!(
            "predefine `{}` (code `{}`) already exists in namespace `{}`",
            input.name, input.code, input.namespace
        ));
    }
    StorageError::Sqlx(err)
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
