//! End-to-end tests against the composed router, driven through
//! `tower::ServiceExt::oneshot` over an in-memory SQLite pool.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

use file_store::{
    models::predefine::NamespaceRegistry,
    routes::routes::routes,
    services::{AppState, apply_migrations, chunk_store::ChunkStore,
        predefine_service::PredefineService},
};

const BOUNDARY: &str = "http-test-boundary";

async fn app() -> Router {
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect in-memory sqlite"),
    );
    apply_migrations(&db).await.expect("apply migrations");

    let namespaces = NamespaceRegistry::new("Setting", &["Unit".to_string()]);
    let state = AppState {
        files: ChunkStore::new(db.clone()),
        predefines: PredefineService::new(db, namespaces),
    };
    routes("/v1").with_state(state)
}

fn file_part(field: &str, filename: &str, content_type: &str, content: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{content}\r\n"
    )
}

fn text_part(field: &str, value: &str) -> String {
    format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n")
}

fn multipart_request(uri: &str, parts: &[String]) -> Request<Body> {
    let body = format!("{}--{BOUNDARY}--\r\n", parts.concat());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build multipart request")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build json request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build get request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.expect("send request");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    (status, headers, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    let value = serde_json::from_slice(&body).expect("parse json body");
    (status, value)
}

#[tokio::test]
async fn upload_then_stream_and_download() {
    let app = app().await;

    // "files" is not a registered bucket name, so it falls back to fs.
    let request = multipart_request(
        "/v1/files/files",
        &[file_part("file", "file.txt", "text/plain", "hello")],
    );
    let (status, record) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["length"], 5);
    assert!(record["chunkSize"].as_i64().unwrap() > 0);
    assert_eq!(record["filename"], "file.txt");
    assert_eq!(record["contentType"], "text/plain");
    assert_eq!(record["aliases"], json!([]));
    assert_eq!(record["metadata"], json!({}));
    assert!(record["md5"].as_str().unwrap().len() == 32);

    let id = record["_id"].as_str().unwrap();
    assert_eq!(record["stream"], format!("/files/fs/{id}/chunks"));
    assert_eq!(record["download"], format!("/files/fs/{id}/download"));

    // Inline stream carries the stored content type.
    let stream_uri = format!("/v1{}", record["stream"].as_str().unwrap());
    let (status, headers, body) = send(&app, get_request(&stream_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers[header::CONTENT_LENGTH], "5");
    assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(body, b"hello");

    // Download adds the attachment disposition with the stored filename.
    let download_uri = format!("/v1{}", record["download"].as_str().unwrap());
    let (status, headers, body) = send(&app, get_request(&download_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"file.txt\""
    );
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn upload_without_matching_field_is_rejected() {
    let app = app().await;

    let request = multipart_request(
        "/v1/files/images",
        &[file_part("file", "wrong.txt", "text/plain", "data")],
    );
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"], "ValidationError");
    assert_eq!(body["errors"]["image"]["type"], "required");
    assert_eq!(body["errors"]["image"]["path"], "image");
    assert_eq!(
        body["errors"]["image"]["message"],
        "Path `image` is required."
    );
}

#[tokio::test]
async fn any_bucket_upload_merges_records_and_fields() {
    let app = app().await;

    let request = multipart_request(
        "/v1/files",
        &[
            text_part("title", "mixed upload"),
            file_part("image", "cover.png", "image/png", "img"),
            file_part("audio", "track.mp3", "audio/mpeg", "beat"),
        ],
    );
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "mixed upload");
    assert_eq!(body["image"]["filename"], "cover.png");
    assert_eq!(body["audio"]["filename"], "track.mp3");

    // Each record landed in its own bucket.
    let image_id = body["image"]["_id"].as_str().unwrap();
    let (status, fetched) =
        send_json(&app, get_request(&format!("/v1/files/images/{image_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["contentType"], "image/png");
}

#[tokio::test]
async fn fetch_list_and_schema() {
    let app = app().await;

    for name in ["a.txt", "b.txt", "c.txt"] {
        let request = multipart_request(
            "/v1/files/fs",
            &[file_part("file", name, "text/plain", "content")],
        );
        let (status, _) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send_json(&app, get_request("/v1/files/fs?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["size"], 2);
    assert_eq!(page["limit"], 2);
    assert_eq!(page["skip"], 0);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["hasMore"], true);
    assert!(page["lastModified"].is_string());
    assert_eq!(page["data"].as_array().unwrap().len(), 2);

    // Records in other buckets stay out of the listing.
    let (_, empty) = send_json(&app, get_request("/v1/files/videos")).await;
    assert_eq!(empty["total"], 0);

    let (status, schema) = send_json(&app, get_request("/v1/files/images/schema")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schema["title"], "Image");
    assert!(schema["properties"]["chunkSize"].is_object());
}

#[tokio::test]
async fn patch_leaves_engine_owned_fields_unchanged() {
    let app = app().await;

    let request = multipart_request(
        "/v1/files/fs",
        &[file_part("file", "meta.txt", "text/plain", "content")],
    );
    let (_, record) = send_json(&app, request).await;
    let id = record["_id"].as_str().unwrap();

    let (status, patched) = send_json(
        &app,
        json_request(
            "PATCH",
            &format!("/v1/files/fs/{id}"),
            json!({ "metadata": { "owner": "Jane" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["metadata"]["owner"], "Jane");
    assert_eq!(patched["length"], record["length"]);
    assert_eq!(patched["chunkSize"], record["chunkSize"]);
    assert_eq!(patched["md5"], record["md5"]);
    assert_eq!(patched["uploadDate"], record["uploadDate"]);

    // PUT without fields resets both mutable fields.
    let (status, replaced) = send_json(
        &app,
        json_request("PUT", &format!("/v1/files/fs/{id}"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["metadata"], json!({}));
    assert_eq!(replaced["aliases"], json!([]));
    assert_eq!(replaced["md5"], record["md5"]);
}

#[tokio::test]
async fn delete_twice_returns_record_then_not_found() {
    let app = app().await;

    let request = multipart_request(
        "/v1/files/documents",
        &[file_part("document", "spec.pdf", "application/pdf", "pdf")],
    );
    let (_, record) = send_json(&app, request).await;
    let id = record["_id"].as_str().unwrap();
    let uri = format!("/v1/files/documents/{id}");

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .expect("build delete request")
    };

    let (status, deleted) = send_json(&app, delete(uri.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["_id"], record["_id"]);
    assert_eq!(deleted["filename"], "spec.pdf");

    let (status, body) = send_json(&app, delete(uri.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["name"], "NotFoundError");

    let (status, _) = send_json(&app, get_request(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bucket_scoping_applies_to_fetch() {
    let app = app().await;

    let request = multipart_request(
        "/v1/files/images",
        &[file_part("image", "pic.png", "image/png", "img")],
    );
    let (_, record) = send_json(&app, request).await;
    let id = record["_id"].as_str().unwrap();

    // The record only resolves through its own bucket.
    let (status, _) = send_json(&app, get_request(&format!("/v1/files/fs/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&app, get_request(&format!("/v1/files/images/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn predefine_lifecycle() {
    let app = app().await;

    let (status, record) = send_json(
        &app,
        json_request(
            "POST",
            "/v1/predefines",
            json!({ "name": "Kilogram", "namespace": "Unit" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["namespace"], "Unit");
    assert_eq!(record["bucket"], "units");
    assert_eq!(record["abbreviation"], "K");
    assert_eq!(record["code"], "K");
    assert!(record["color"].as_str().unwrap().starts_with('#'));
    let id = record["_id"].as_str().unwrap().to_string();

    // Missing name shares the upload validation shape.
    let (status, body) = send_json(
        &app,
        json_request("POST", "/v1/predefines", json!({ "namespace": "Unit" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"], "ValidationError");
    assert_eq!(body["errors"]["name"]["message"], "Path `name` is required.");

    // Duplicate (namespace, bucket, name, code) tuple conflicts.
    let (status, _) = send_json(
        &app,
        json_request(
            "POST",
            "/v1/predefines",
            json!({ "name": "Kilogram", "namespace": "Unit" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, patched) = send_json(
        &app,
        json_request(
            "PATCH",
            &format!("/v1/predefines/{id}"),
            json!({ "weight": 2.5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["weight"], 2.5);
    assert_eq!(patched["name"], "Kilogram");

    let (status, page) = send_json(&app, get_request("/v1/predefines")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);

    let (status, schema) = send_json(&app, get_request("/v1/predefines/schema")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schema["title"], "Predefine");

    // Soft delete: record answers once, then leaves the API.
    let delete_request = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/predefines/{id}"))
            .body(Body::empty())
            .expect("build delete request")
    };
    let (status, deleted) = send_json(&app, delete_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["name"], "Kilogram");

    let (status, _) = send_json(&app, delete_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, page) = send_json(&app, get_request("/v1/predefines")).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn health_probes_answer() {
    let app = app().await;

    let (status, body) = send_json(&app, get_request("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send_json(&app, get_request("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["storage"]["ok"], true);
}
