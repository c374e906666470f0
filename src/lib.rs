//! file-store — HTTP CRUD over named binary-object buckets backed by chunked
//! SQLite storage, plus predefine lookup records.
//!
//! The public surface is a bucket-parameterized router (`/files/{bucket}/...`)
//! translating bucket path segments into chunk-store operations, and a sibling
//! `/predefines` resource for small shared lookup values.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
