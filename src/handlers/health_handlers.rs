//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and chunk I/O

use crate::services::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Performs a best-effort write/read/delete round-trip through the chunks
///    table under a scratch id.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let db = &state.files.db;

    // 1) SQLite check
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&**db).await {
        Ok(v) if v == 1 => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    // 2) Chunk write/read/delete check under a scratch id no upload can use
    let scratch_id = Uuid::new_v4();
    let storage_check = match chunk_round_trip(db, scratch_id).await {
        Ok(()) => (true, None::<String>),
        Err(e) => {
            // best-effort cleanup
            let _ = sqlx::query("DELETE FROM chunks WHERE file_id = ?")
                .bind(scratch_id)
                .execute(&**db)
                .await;
            (false, Some(format!("error: {}", e)))
        }
    };

    let sqlite_ok = sqlite_check.0;
    let storage_ok = storage_check.0;
    let overall_ok = sqlite_ok && storage_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_ok,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "storage",
        CheckStatus {
            ok: storage_ok,
            error: storage_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn chunk_round_trip(db: &sqlx::SqlitePool, scratch_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO chunks (file_id, n, data) VALUES (?, 0, ?)")
        .bind(scratch_id)
        .bind(b"readyz".as_slice())
        .execute(db)
        .await?;

    let data: Vec<u8> = sqlx::query_scalar("SELECT data FROM chunks WHERE file_id = ? AND n = 0")
        .bind(scratch_id)
        .fetch_one(db)
        .await?;
    if data != b"readyz" {
        return Err(sqlx::Error::Protocol("chunk content mismatch".into()));
    }

    sqlx::query("DELETE FROM chunks WHERE file_id = ?")
        .bind(scratch_id)
        .execute(db)
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
