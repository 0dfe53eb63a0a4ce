//! Metadata codec: pure conversions between stored representations and `PhotoRecord`.
//!
//! Nothing in here performs I/O. The repository fetches object listings and
//! key-value documents, then asks the codec to classify and decode them.
//! Decoding never fails for a whole listing: an item that cannot be decoded
//! becomes a placeholder record instead.

pub mod attributes;
pub mod bulk;
pub mod filename;
pub mod sidecar;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::record::{datetime_from_millis, placeholder_title, PhotoRecord, Provenance};
use crate::storage::ObjectEntry;

/// Which representation holds the metadata of a photo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetadataVariant {
    /// One JSON document per photo under `photo:{id}`
    SidecarJson,
    /// Attributes attached to the image object itself
    NativeObject,
    /// Metadata packed into the object key
    FilenameToken,
    /// A single JSON array under `photos`
    #[default]
    BulkCollection,
}

impl MetadataVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataVariant::SidecarJson => "sidecar_json",
            MetadataVariant::NativeObject => "native_object",
            MetadataVariant::FilenameToken => "filename_token",
            MetadataVariant::BulkCollection => "bulk_collection",
        }
    }

    /// Whether metadata lives in the key-value store rather than on the object
    pub fn uses_key_value_store(&self) -> bool {
        matches!(self, MetadataVariant::SidecarJson | MetadataVariant::BulkCollection)
    }
}

impl fmt::Display for MetadataVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetadataVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sidecar" | "sidecar_json" => Ok(MetadataVariant::SidecarJson),
            "native" | "native_object" | "attributes" => Ok(MetadataVariant::NativeObject),
            "filename" | "filename_token" | "token" => Ok(MetadataVariant::FilenameToken),
            "bulk" | "bulk_collection" | "collection" => Ok(MetadataVariant::BulkCollection),
            _ => Err(format!("Unknown metadata variant: {}", s)),
        }
    }
}

/// Why a single stored item could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("collection is not a JSON array")]
    NotAnArray,

    #[error("item is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid upload date: {0}")]
    InvalidDate(String),

    #[error("timestamp segment is not numeric: {0}")]
    NotNumeric(String),

    #[error("invalid percent-encoding in `{0}`")]
    InvalidEncoding(&'static str),
}

/// Shape of an object key stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape {
    /// The stem is exactly one UUID
    IdAddressed(String),
    /// `{timestamp}-{id}-{encodedTitle}`
    FilenameToken,
    Unrecognized,
}

/// File name without directory or extension: `photos/a.b.jpg` -> `a.b`
pub fn key_stem(key: &str) -> &str {
    let file_name = key_file_name(key);
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    }
}

pub fn key_file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Hyphenated UUID with exactly five segments
pub fn is_uuid(candidate: &str) -> bool {
    candidate.len() == 36 && candidate.split('-').count() == 5 && uuid::Uuid::parse_str(candidate).is_ok()
}

pub fn classify_key(key: &str) -> KeyShape {
    let stem = key_stem(key);
    if is_uuid(stem) {
        return KeyShape::IdAddressed(stem.to_string());
    }
    let segments: Vec<&str> = stem.split('-').collect();
    let numeric_head = !segments[0].is_empty() && segments[0].bytes().all(|b| b.is_ascii_digit());
    if segments.len() >= 6 && numeric_head {
        KeyShape::FilenameToken
    } else {
        KeyShape::Unrecognized
    }
}

/// Photo id an object answers to, used to join objects with key-value metadata
pub fn object_id(key: &str) -> String {
    match classify_key(key) {
        KeyShape::IdAddressed(id) => id,
        KeyShape::FilenameToken => match filename::parse_token(key_stem(key)) {
            Ok(token) => token.id,
            Err(_) => key_stem(key).to_string(),
        },
        KeyShape::Unrecognized => key_stem(key).to_string(),
    }
}

/// Decode an object from its key alone, falling back to a placeholder
pub fn decode_from_key(entry: &ObjectEntry) -> PhotoRecord {
    match classify_key(&entry.key) {
        KeyShape::FilenameToken => filename::decode(entry).unwrap_or_else(|e| {
            warn!("Undecodable filename token {}: {}", entry.key, e);
            placeholder_for(entry, key_stem(&entry.key))
        }),
        KeyShape::IdAddressed(id) => placeholder_for(entry, &id),
        KeyShape::Unrecognized => {
            warn!("Unrecognized object key shape: {}", entry.key);
            placeholder_for(entry, key_stem(&entry.key))
        }
    }
}

/// Decode an object from its native attributes; objects without any fall back to key shape
pub fn decode_native(entry: &ObjectEntry) -> PhotoRecord {
    if !attributes::has_photo_attributes(&entry.attributes) {
        return decode_from_key(entry);
    }
    attributes::decode(entry).unwrap_or_else(|e| {
        warn!("Undecodable attributes on {}: {}", entry.key, e);
        let id = entry
            .attributes
            .get(attributes::ATTR_ID)
            .filter(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(|| object_id(&entry.key));
        placeholder_for(entry, &id)
    })
}

pub fn placeholder_for(entry: &ObjectEntry, id: &str) -> PhotoRecord {
    let mut record = PhotoRecord::placeholder(id, &entry.locator, entry.size, entry.stored_at);
    record.original_name = key_file_name(&entry.key).to_string();
    record
}

/// Lenient decoding of one JSON record as stored by the sidecar and bulk variants
pub fn decode_value(value: &Value) -> Result<PhotoRecord, DecodeError> {
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let text = |field: &str| object.get(field).and_then(Value::as_str).map(str::to_string);

    let id = text("id").filter(|id| !id.is_empty()).ok_or(DecodeError::MissingField("id"))?;
    let raw_date = text("uploadDate").ok_or(DecodeError::MissingField("uploadDate"))?;
    let upload_date = DateTime::parse_from_rfc3339(&raw_date)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| DecodeError::InvalidDate(raw_date.clone()))?;

    let mut provenance = object
        .get("provenance")
        .and_then(|p| serde_json::from_value::<Provenance>(p.clone()).ok())
        .unwrap_or_default();
    let title = match text("title").map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        Some(title) => title,
        None => {
            provenance = Provenance::Lossy;
            placeholder_title(&id)
        }
    };

    Ok(PhotoRecord {
        title,
        description: text("description").unwrap_or_default(),
        url: text("url").unwrap_or_default(),
        original_name: text("originalName").unwrap_or_default(),
        size: object.get("size").and_then(Value::as_u64).unwrap_or(0),
        sort_key: object
            .get("sortKey")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| upload_date.timestamp_millis()),
        upload_date,
        provenance,
        id,
    })
}

/// Placeholder for a JSON item that failed `decode_value`; keeps the id when one is present
pub fn placeholder_from_value(value: &Value, index: usize) -> PhotoRecord {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("unknown-{}", index));
    let url = value.get("url").and_then(Value::as_str).unwrap_or_default();
    PhotoRecord::placeholder(&id, url, 0, datetime_from_millis(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    const ID: &str = "11111111-2222-3333-4444-555555555555";

    fn entry(key: &str) -> ObjectEntry {
        ObjectEntry {
            key: key.to_string(),
            locator: format!("memory://{}", key),
            size: 42,
            stored_at: datetime_from_millis(1_600_000_000_000),
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("sidecar".parse::<MetadataVariant>().unwrap(), MetadataVariant::SidecarJson);
        assert_eq!("Native-Object".parse::<MetadataVariant>().unwrap(), MetadataVariant::NativeObject);
        assert_eq!("filename_token".parse::<MetadataVariant>().unwrap(), MetadataVariant::FilenameToken);
        assert_eq!("BULK".parse::<MetadataVariant>().unwrap(), MetadataVariant::BulkCollection);
        assert!("mystery".parse::<MetadataVariant>().is_err());
        assert_eq!(MetadataVariant::SidecarJson.to_string(), "sidecar_json");
    }

    #[test]
    fn test_key_stem() {
        assert_eq!(key_stem("photos/abc.jpg"), "abc");
        assert_eq!(key_stem("photos/a.b.jpg"), "a.b");
        assert_eq!(key_stem("noext"), "noext");
        assert_eq!(key_file_name("photos/nested/x.png"), "x.png");
    }

    #[test]
    fn test_classify_key() {
        assert_eq!(classify_key(&format!("photos/{}.jpg", ID)), KeyShape::IdAddressed(ID.to_string()));
        assert_eq!(
            classify_key(&format!("photos/1700000000-{}-Sunset%20Over%20Bay.jpg", ID)),
            KeyShape::FilenameToken
        );
        assert_eq!(classify_key("photos/1700000000-a-b-c-d-e.jpg"), KeyShape::FilenameToken);
        assert_eq!(classify_key("photos/holiday-a-b-c-d-e.jpg"), KeyShape::Unrecognized);
        assert_eq!(classify_key("photos/1700000000-short.jpg"), KeyShape::Unrecognized);
        assert_eq!(classify_key("photos/IMG_0001.jpg"), KeyShape::Unrecognized);
    }

    #[test]
    fn test_object_id_by_shape() {
        assert_eq!(object_id(&format!("photos/{}.jpg", ID)), ID);
        assert_eq!(object_id(&format!("photos/1700000000-{}-Title.jpg", ID)), ID);
        assert_eq!(object_id("photos/IMG_0001.jpg"), "IMG_0001");
    }

    #[test]
    fn test_decode_from_key_placeholders() {
        let record = decode_from_key(&entry("photos/IMG_0001.jpg"));
        assert!(record.is_placeholder());
        assert_eq!(record.id, "IMG_0001");
        assert_eq!(record.title, "Photo IMG_0001");
        assert_eq!(record.size, 42);
        assert_eq!(record.original_name, "IMG_0001.jpg");

        let record = decode_from_key(&entry(&format!("photos/{}.jpg", ID)));
        assert!(record.is_placeholder());
        assert_eq!(record.id, ID);
        assert_eq!(record.title, "Photo 11111111");
    }

    #[test]
    fn test_decode_value_lenient_defaults() {
        let record = decode_value(&json!({
            "id": "abc",
            "title": "  Harbour  ",
            "uploadDate": "2024-01-02T03:04:05.678Z"
        }))
        .unwrap();
        assert_eq!(record.title, "Harbour");
        assert_eq!(record.description, "");
        assert_eq!(record.original_name, "");
        assert_eq!(record.size, 0);
        assert_eq!(record.sort_key, record.upload_date.timestamp_millis());
        assert_eq!(record.provenance, Provenance::Exact);
    }

    #[test]
    fn test_decode_value_rejects_missing_identity_or_date() {
        assert_eq!(
            decode_value(&json!({"title": "x", "uploadDate": "2024-01-02T03:04:05Z"})),
            Err(DecodeError::MissingField("id"))
        );
        assert!(matches!(
            decode_value(&json!({"id": "a", "uploadDate": "yesterday"})),
            Err(DecodeError::InvalidDate(_))
        ));
        assert_eq!(decode_value(&json!(7)), Err(DecodeError::NotAnObject));
    }

    #[test]
    fn test_placeholder_from_value() {
        let kept = placeholder_from_value(&json!({"id": "abcdef123", "uploadDate": "bad"}), 3);
        assert_eq!(kept.id, "abcdef123");
        assert_eq!(kept.title, "Photo abcdef12");
        assert!(kept.is_placeholder());

        let synthesized = placeholder_from_value(&json!("garbage"), 3);
        assert_eq!(synthesized.id, "unknown-3");
    }
}
