//! Service layer: chunked blob storage, multipart ingest, and predefine CRUD
//! over one process-wide SQLite pool.

use sqlx::SqlitePool;

pub mod chunk_store;
pub mod predefine_service;
pub mod upload;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub files: chunk_store::ChunkStore,
    pub predefines: predefine_service::PredefineService,
}

/// Embedded schema, applied by `--migrate` and by tests.
const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Run the schema statements one at a time. Statements are idempotent
/// (`CREATE ... IF NOT EXISTS`), so re-running is safe.
pub async fn apply_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = MIGRATION_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
