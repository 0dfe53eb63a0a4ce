//! Sidecar JSON: one document per photo stored under `photo:{id}`.

use log::warn;
use serde_json::Value;

use crate::codec::{decode_value, DecodeError};
use crate::error::{Error, Result};
use crate::record::{datetime_from_millis, PhotoRecord};

pub const KEY_PREFIX: &str = "photo:";

pub fn key_for(id: &str) -> String {
    format!("{}{}", KEY_PREFIX, id)
}

/// Id carried by a sidecar key, if it is one
pub fn id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX).filter(|id| !id.is_empty())
}

pub fn encode(record: &PhotoRecord) -> Result<String> {
    serde_json::to_string(record).map_err(|e| Error::Validation(format!("failed to serialize photo {}: {}", record.id, e)))
}

pub fn try_decode(value: &str) -> std::result::Result<PhotoRecord, DecodeError> {
    let value: Value = serde_json::from_str(value).map_err(|e| DecodeError::Json(e.to_string()))?;
    decode_value(&value)
}

/// Decode the document stored under `key`; an undecodable one becomes a placeholder named after the key
pub fn decode(key: &str, value: &str) -> PhotoRecord {
    try_decode(value).unwrap_or_else(|e| {
        warn!("Undecodable sidecar document {}: {}", key, e);
        let id = id_from_key(key).unwrap_or(key);
        PhotoRecord::placeholder(id, "", 0, datetime_from_millis(0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Provenance;

    #[test]
    fn test_sidecar_document_decodes() {
        let record = decode(
            "photo:abc",
            r#"{"id":"abc","title":"Dunes","description":"Namib","url":"/uploads/photos/abc.jpg",
                "uploadDate":"2023-05-06T07:08:09.000Z","originalName":"dunes.jpg","size":77,"sortKey":5}"#,
        );
        assert_eq!(record.title, "Dunes");
        assert_eq!(record.description, "Namib");
        assert_eq!(record.size, 77);
        assert_eq!(record.sort_key, 5);
        assert_eq!(record.provenance, Provenance::Exact);
    }

    #[test]
    fn test_broken_document_becomes_placeholder_named_after_key() {
        let record = decode("photo:0badc0ffee", "{not json");
        assert!(record.is_placeholder());
        assert_eq!(record.id, "0badc0ffee");
        assert_eq!(record.title, "Photo 0badc0ff");
    }

    #[test]
    fn test_key_helpers() {
        assert_eq!(key_for("x"), "photo:x");
        assert_eq!(id_from_key("photo:x"), Some("x"));
        assert_eq!(id_from_key("photo:"), None);
        assert_eq!(id_from_key("photos"), None);
    }
}
