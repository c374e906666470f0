//! Static registry of the allowed storage buckets.
//!
//! Buckets are fixed at process start; a caller-supplied bucket name from a
//! URL segment resolves to exactly one descriptor, falling back to the
//! default `fs` bucket for unknown names. The fallback is deliberately
//! permissive so the router stays total over arbitrary path segments.

/// Static configuration tying a public bucket name to its model name and
/// the multipart field name its uploads must arrive under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketDescriptor {
    /// Model name used for schema titles, e.g. "Image".
    pub model_name: &'static str,

    /// Public bucket name, the storage collection prefix, e.g. "images".
    pub bucket_name: &'static str,

    /// Accepted multipart field name for uploads, e.g. "image".
    pub field_name: &'static str,
}

/// All known buckets. The first entry is the default.
pub const BUCKETS: [BucketDescriptor; 5] = [
    BucketDescriptor {
        model_name: "File",
        bucket_name: "fs",
        field_name: "file",
    },
    BucketDescriptor {
        model_name: "Image",
        bucket_name: "images",
        field_name: "image",
    },
    BucketDescriptor {
        model_name: "Audio",
        bucket_name: "audios",
        field_name: "audio",
    },
    BucketDescriptor {
        model_name: "Video",
        bucket_name: "videos",
        field_name: "video",
    },
    BucketDescriptor {
        model_name: "Document",
        bucket_name: "documents",
        field_name: "document",
    },
];

/// The default bucket, used whenever a name does not resolve.
pub fn default_bucket() -> &'static BucketDescriptor {
    &BUCKETS[0]
}

/// Resolve a caller-supplied bucket name to its descriptor.
///
/// Total over any input string: unknown or empty names yield the default
/// `fs` descriptor rather than an error.
pub fn resolve(bucket: &str) -> &'static BucketDescriptor {
    BUCKETS
        .iter()
        .find(|descriptor| descriptor.bucket_name == bucket)
        .unwrap_or_else(default_bucket)
}

/// Descriptor whose upload field name matches `field`, if any.
pub fn descriptor_for_field(field: &str) -> Option<&'static BucketDescriptor> {
    BUCKETS
        .iter()
        .find(|descriptor| descriptor.field_name == field)
}

/// The set of accepted multipart field names, one per bucket.
pub fn all_field_names() -> [&'static str; 5] {
    [
        BUCKETS[0].field_name,
        BUCKETS[1].field_name,
        BUCKETS[2].field_name,
        BUCKETS[3].field_name,
        BUCKETS[4].field_name,
    ]
}
