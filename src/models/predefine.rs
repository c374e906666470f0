//! Predefine records: small shared lookup values (units, currencies,
//! settings) that do not justify their own domain model.
//!
//! Namespaces are configured at process start; each namespace maps 1:1 onto a
//! storage bucket derived from its collection name. Records keep the pair
//! consistent: providing one side derives the other, and when neither is
//! derivable both fall back to the configured defaults.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::errors::AppError;

/// A stored predefine.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct PredefineRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,

    /// Human readable namespace, e.g. "Unit".
    pub namespace: String,

    /// Machine readable collection name, derived from the namespace.
    pub bucket: String,

    /// Human readable value, e.g. "Kilogram".
    pub name: String,

    /// Unique identifier within the namespace, e.g. "Kg".
    pub code: String,

    /// Mark or sign representing the value, e.g. "£".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Short form of the name.
    pub abbreviation: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordering weight within a namespace.
    pub weight: f64,

    /// Hex color used to differentiate values visually.
    pub color: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Optional GeoJSON geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Json<Value>>,

    /// Open key-value map for extra details.
    pub properties: Json<Map<String, Value>>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker; deleted records stay in storage but leave the API.
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Configured namespaces and their derived buckets.
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    entries: Vec<(String, String)>,
    default_namespace: String,
    default_bucket: String,
}

impl NamespaceRegistry {
    /// Build the registry from the configured namespace names. The default
    /// namespace is always a member.
    pub fn new(default_namespace: &str, namespaces: &[String]) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(namespaces.len() + 1);
        names.push(default_namespace.to_string());
        names.extend(namespaces.iter().cloned());
        names.sort();
        names.dedup();

        let entries = names
            .into_iter()
            .map(|namespace| {
                let bucket = collection_name_of(&namespace);
                (namespace, bucket)
            })
            .collect();

        Self {
            entries,
            default_namespace: default_namespace.to_string(),
            default_bucket: collection_name_of(default_namespace),
        }
    }

    /// Derive a consistent (namespace, bucket) pair from whichever side the
    /// caller provided. Missing sides come from the mapping table, then from
    /// the configured defaults.
    pub fn resolve(&self, namespace: Option<&str>, bucket: Option<&str>) -> (String, String) {
        let namespace = namespace.map(str::trim).filter(|s| !s.is_empty());
        let bucket = bucket.map(str::trim).filter(|s| !s.is_empty());

        match (namespace, bucket) {
            (Some(namespace), Some(bucket)) => (namespace.to_string(), bucket.to_string()),
            (Some(namespace), None) => {
                let bucket = self
                    .entries
                    .iter()
                    .find(|(ns, _)| ns == namespace)
                    .map(|(_, bucket)| bucket.clone())
                    .unwrap_or_else(|| self.default_bucket.clone());
                (namespace.to_string(), bucket)
            }
            (None, Some(bucket)) => {
                let namespace = self
                    .entries
                    .iter()
                    .find(|(_, b)| b == bucket)
                    .map(|(ns, _)| ns.clone())
                    .unwrap_or_else(|| self.default_namespace.clone());
                (namespace, bucket.to_string())
            }
            (None, None) => (self.default_namespace.clone(), self.default_bucket.clone()),
        }
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.entries.iter().any(|(ns, _)| ns == namespace)
    }

    pub fn contains_bucket(&self, bucket: &str) -> bool {
        self.entries.iter().any(|(_, b)| b == bucket)
    }

    pub fn namespaces(&self) -> Vec<&str> {
        self.entries.iter().map(|(ns, _)| ns.as_str()).collect()
    }

    pub fn buckets(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, b)| b.as_str()).collect()
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }
}

/// Incoming predefine payload, before derivation and validation.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NewPredefine {
    pub namespace: Option<String>,
    pub bucket: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub symbol: Option<String>,
    pub abbreviation: Option<String>,
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub geometry: Option<Value>,
    pub properties: Option<Map<String, Value>>,
}

/// Fully derived predefine fields, ready for storage.
#[derive(Debug, Clone)]
pub struct PredefineInput {
    pub namespace: String,
    pub bucket: String,
    pub name: String,
    pub code: String,
    pub symbol: Option<String>,
    pub abbreviation: String,
    pub description: Option<String>,
    pub weight: f64,
    pub color: String,
    pub icon: Option<String>,
    pub geometry: Option<Value>,
    pub properties: Map<String, Value>,
}

impl NewPredefine {
    /// Derive a complete input for a new record.
    ///
    /// `name` is required; `abbreviation` defaults to the initials of the
    /// name, `code` to the abbreviation, `color` to a random light color.
    pub fn normalize(self, namespaces: &NamespaceRegistry) -> Result<PredefineInput, AppError> {
        let name = trimmed(self.name).ok_or_else(|| AppError::required(&["name"]))?;

        let (namespace, bucket) =
            namespaces.resolve(self.namespace.as_deref(), self.bucket.as_deref());
        if !namespaces.contains_namespace(&namespace) {
            return Err(AppError::invalid_enum("namespace", &namespace));
        }
        if !namespaces.contains_bucket(&bucket) {
            return Err(AppError::invalid_enum("bucket", &bucket));
        }

        let abbreviation = trimmed(self.abbreviation).unwrap_or_else(|| abbreviate(&name));
        let code = trimmed(self.code).unwrap_or_else(|| abbreviation.clone());
        let color = trimmed(self.color)
            .map(|c| c.to_uppercase())
            .unwrap_or_else(random_light_color);

        Ok(PredefineInput {
            namespace,
            bucket,
            name,
            code,
            symbol: trimmed(self.symbol),
            abbreviation,
            description: trimmed(self.description),
            weight: self.weight.unwrap_or(0.0),
            color,
            icon: trimmed(self.icon),
            geometry: self.geometry,
            properties: self.properties.unwrap_or_default(),
        })
    }

    /// Merge this payload into an existing record.
    ///
    /// With `replace` set (PUT), unspecified optional fields reset to their
    /// defaults; otherwise (PATCH) they keep their stored values. The
    /// namespace/bucket pair is re-derived only when either side is provided.
    pub fn apply(
        self,
        existing: &PredefineRecord,
        namespaces: &NamespaceRegistry,
        replace: bool,
    ) -> Result<PredefineInput, AppError> {
        let name = trimmed(self.name).unwrap_or_else(|| existing.name.clone());

        let (namespace, bucket) = if self.namespace.is_some() || self.bucket.is_some() {
            let pair = namespaces.resolve(self.namespace.as_deref(), self.bucket.as_deref());
            if !namespaces.contains_namespace(&pair.0) {
                return Err(AppError::invalid_enum("namespace", &pair.0));
            }
            if !namespaces.contains_bucket(&pair.1) {
                return Err(AppError::invalid_enum("bucket", &pair.1));
            }
            pair
        } else {
            (existing.namespace.clone(), existing.bucket.clone())
        };

        let abbreviation = trimmed(self.abbreviation).unwrap_or_else(|| {
            if replace {
                abbreviate(&name)
            } else {
                existing.abbreviation.clone()
            }
        });
        let code = trimmed(self.code).unwrap_or_else(|| {
            if replace {
                abbreviation.clone()
            } else {
                existing.code.clone()
            }
        });
        let keep = |provided: Option<String>, stored: &Option<String>| match trimmed(provided) {
            Some(value) => Some(value),
            None if replace => None,
            None => stored.clone(),
        };

        Ok(PredefineInput {
            namespace,
            bucket,
            name,
            code,
            symbol: keep(self.symbol, &existing.symbol),
            abbreviation,
            description: keep(self.description, &existing.description),
            weight: self
                .weight
                .unwrap_or(if replace { 0.0 } else { existing.weight }),
            color: trimmed(self.color)
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| existing.color.clone()),
            icon: keep(self.icon, &existing.icon),
            geometry: match self.geometry {
                Some(value) => Some(value),
                None if replace => None,
                None => existing.geometry.clone().map(|g| g.0),
            },
            properties: match self.properties {
                Some(map) => map,
                None if replace => Map::new(),
                None => existing.properties.0.clone(),
            },
        })
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Machine readable collection name for a namespace: lowercased and
/// pluralized, e.g. "Currency" => "currencies".
pub fn collection_name_of(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return lower;
    }
    if let Some(stem) = lower.strip_suffix('y') {
        let penultimate = stem.chars().last();
        if !matches!(penultimate, Some('a' | 'e' | 'i' | 'o' | 'u')) {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return format!("{}es", lower);
    }
    format!("{}s", lower)
}

/// Uppercase initials of each word, e.g. "US Dollar" => "USD".
pub fn abbreviate(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Random light color in uppercase hex, e.g. "#F2AB6D".
pub fn random_light_color() -> String {
    let mut rng = rand::thread_rng();
    let hue: f64 = rng.gen_range(0.0..360.0);
    let saturation: f64 = rng.gen_range(0.4..0.9);
    let lightness: f64 = rng.gen_range(0.72..0.88);

    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = lightness - c / 2.0;
    let (r, g, b) = match hue as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    format!(
        "#{:02X}{:02X}{:02X}",
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8
    )
}

/// JSON-schema-like description of the predefine shape.
pub fn json_schema(namespaces: &NamespaceRegistry) -> Value {
    json!({
        "title": "Predefine",
        "type": "object",
        "properties": {
            "_id": { "type": "string", "format": "uuid" },
            "namespace": { "type": "string", "enum": namespaces.namespaces() },
            "bucket": { "type": "string", "enum": namespaces.buckets() },
            "name": { "type": "string" },
            "code": { "type": "string" },
            "symbol": { "type": "string" },
            "abbreviation": { "type": "string" },
            "description": { "type": "string" },
            "weight": { "type": "number" },
            "color": { "type": "string" },
            "icon": { "type": "string" },
            "geometry": { "type": "object" },
            "properties": { "type": "object" },
            "createdAt": { "type": "string", "format": "date-time" },
            "updatedAt": { "type": "string", "format": "date-time" }
        }
    })
}
