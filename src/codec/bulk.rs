//! Legacy bulk collection: every record in one JSON array under `photos`.
//!
//! Writes operate on the raw JSON items so that an item which fails to decode
//! is carried through a read-modify-write untouched instead of being replaced
//! by its placeholder.

use log::warn;
use serde_json::Value;

use crate::codec::{decode_value, placeholder_from_value, DecodeError};
use crate::error::{Error, Result};
use crate::record::PhotoRecord;

pub const COLLECTION_KEY: &str = "photos";

/// Parse the stored collection; anything but a top-level array is corrupt
pub fn parse_collection(value: &str) -> std::result::Result<Vec<Value>, DecodeError> {
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(DecodeError::NotAnArray),
        Err(e) => Err(DecodeError::Json(e.to_string())),
    }
}

/// Decode every item, substituting placeholders for the ones that fail
pub fn decode_items(items: &[Value]) -> Vec<PhotoRecord> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            decode_value(item).unwrap_or_else(|e| {
                warn!("Undecodable item {} in photo collection: {}", index, e);
                placeholder_from_value(item, index)
            })
        })
        .collect()
}

pub fn to_item(record: &PhotoRecord) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| Error::Validation(format!("failed to serialize photo {}: {}", record.id, e)))
}

/// Remove every item carrying `id`; returns how many were removed
pub fn remove_item(items: &mut Vec<Value>, id: &str) -> usize {
    let before = items.len();
    items.retain(|item| item.get("id").and_then(Value::as_str) != Some(id));
    before - items.len()
}

pub fn encode_collection(items: &[Value]) -> Result<String> {
    serde_json::to_string(items).map_err(|e| Error::Validation(format!("failed to serialize photo collection: {}", e)))
}
