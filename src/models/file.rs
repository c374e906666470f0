//! Metadata record describing a stored binary object.
//!
//! One structurally identical record type serves every bucket; the `bucket`
//! column scopes a record to its chunk storage. The record never holds
//! content bytes, those live in chunk storage under the record id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Metadata for a single stored object.
///
/// `length`, `chunk_size`, `md5` and `upload_date` are owned by the storage
/// engine and immutable once the record is committed; only `aliases` and
/// `metadata` may change afterwards.
#[derive(Clone, FromRow, Debug)]
pub struct FileRecord {
    /// Identifier the chunk sequence is addressed by.
    pub id: Uuid,

    /// Bucket the record (and its chunks) belongs to.
    pub bucket: String,

    /// Original filename of the uploaded file.
    pub filename: String,

    /// Content type (MIME type).
    pub content_type: String,

    /// Total size in bytes.
    pub length: i64,

    /// Bytes per stored chunk.
    pub chunk_size: i64,

    /// Hex MD5 checksum of the full content.
    pub md5: String,

    /// Timestamp the upload was committed at.
    pub upload_date: DateTime<Utc>,

    /// Alternative names for the object.
    pub aliases: Json<Vec<String>>,

    /// Open key-value map attached by callers.
    pub metadata: Json<Map<String, Value>>,
}

impl FileRecord {
    /// Relative URL serving the raw chunk stream for this record.
    ///
    /// Computed from `(bucket, id)` at read time, never persisted.
    pub fn stream_path(&self) -> String {
        format!("/files/{}/{}/chunks", self.bucket, self.id)
    }

    /// Relative URL serving the content as an attachment download.
    pub fn download_path(&self) -> String {
        format!("/files/{}/{}/download", self.bucket, self.id)
    }
}

/// Wire shape of a file record, including the virtual `stream` and
/// `download` URLs.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub length: i64,
    #[serde(rename = "chunkSize")]
    pub chunk_size: i64,
    #[serde(rename = "uploadDate")]
    pub upload_date: DateTime<Utc>,
    pub md5: String,
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub aliases: Vec<String>,
    pub metadata: Map<String, Value>,
    pub stream: String,
    pub download: String,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        let stream = record.stream_path();
        let download = record.download_path();
        Self {
            id: record.id,
            length: record.length,
            chunk_size: record.chunk_size,
            upload_date: record.upload_date,
            md5: record.md5,
            filename: record.filename,
            content_type: record.content_type,
            aliases: record.aliases.0,
            metadata: record.metadata.0,
            stream,
            download,
        }
    }
}

/// JSON-schema-like description of the record shape for a bucket's model.
pub fn json_schema(model_name: &str) -> Value {
    json!({
        "title": model_name,
        "type": "object",
        "properties": {
            "_id": { "type": "string", "format": "uuid" },
            "length": { "type": "number" },
            "chunkSize": { "type": "number" },
            "uploadDate": { "type": "string", "format": "date-time" },
            "md5": { "type": "string" },
            "filename": { "type": "string" },
            "contentType": { "type": "string" },
            "aliases": { "type": "array", "items": { "type": "string" } },
            "metadata": { "type": "object" },
            "stream": { "type": "string" },
            "download": { "type": "string" }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FileRecord {
        FileRecord {
            id: Uuid::nil(),
            bucket: "images".to_string(),
            filename: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            length: 4,
            chunk_size: 261_120,
            md5: "8d777f385d3dfec8815d20f7496026dc".to_string(),
            upload_date: Utc::now(),
            aliases: Json(vec![]),
            metadata: Json(Map::new()),
        }
    }

    #[test]
    fn virtual_urls_derive_from_bucket_and_id() {
        let record = record();
        assert_eq!(
            record.stream_path(),
            "/files/images/00000000-0000-0000-0000-000000000000/chunks"
        );
        assert_eq!(
            record.download_path(),
            "/files/images/00000000-0000-0000-0000-000000000000/download"
        );
    }

    #[test]
    fn response_carries_virtual_urls() {
        let response = FileResponse::from(record());
        assert_eq!(response.stream, response.download.replace("download", "chunks"));

        let value = serde_json::to_value(&response).expect("serialize");
        assert!(value.get("_id").is_some());
        assert!(value.get("chunkSize").is_some());
        assert!(value.get("uploadDate").is_some());
        assert!(value.get("contentType").is_some());
    }

    #[test]
    fn schema_lists_record_properties() {
        let schema = json_schema("Image");
        assert_eq!(schema["title"], "Image");
        assert_eq!(schema["type"], "object");
        for key in [
            "_id", "length", "chunkSize", "uploadDate", "md5", "filename", "contentType",
            "aliases", "metadata", "stream", "download",
        ] {
            assert!(schema["properties"].get(key).is_some(), "missing {}", key);
        }
    }
}
