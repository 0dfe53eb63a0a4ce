//! The canonical photo record and its listing order.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How faithfully a record was recovered from its stored representation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Decoded from a lossless representation
    #[default]
    Exact,
    /// Decoded from a representation that drops fields (filename token)
    Lossy,
    /// Synthesized because the stored metadata could not be decoded
    Placeholder,
}

impl Provenance {
    pub fn is_exact(&self) -> bool {
        *self == Provenance::Exact
    }
}

/// One photo in the portfolio
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Locator produced by the object store
    pub url: String,
    pub upload_date: DateTime<Utc>,
    pub original_name: String,
    /// Byte length of the stored (post-transform) payload
    pub size: u64,
    pub sort_key: i64,
    #[serde(default, skip_serializing_if = "Provenance::is_exact")]
    pub provenance: Provenance,
}

impl PhotoRecord {
    /// Best-effort record for an item whose metadata could not be decoded.
    /// The title is derived from the id so the gallery still has something to show.
    pub fn placeholder(id: &str, url: &str, size: u64, stored_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            title: placeholder_title(id),
            description: String::new(),
            url: url.to_string(),
            upload_date: stored_at,
            original_name: String::new(),
            size,
            sort_key: stored_at.timestamp_millis(),
            provenance: Provenance::Placeholder,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.provenance == Provenance::Placeholder
    }
}

/// `Photo 1a2b3c4d` for id `1a2b3c4d-...`
pub fn placeholder_title(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    if prefix.is_empty() {
        "Untitled photo".to_string()
    } else {
        format!("Photo {}", prefix)
    }
}

/// Newest first; equal sort keys fall back to ascending id
pub fn listing_order(a: &PhotoRecord, b: &PhotoRecord) -> Ordering {
    b.sort_key.cmp(&a.sort_key).then_with(|| a.id.cmp(&b.id))
}

pub fn sort_for_listing(records: &mut [PhotoRecord]) {
    records.sort_by(listing_order);
}

/// Interpret a sort key / key timestamp as epoch milliseconds
pub fn datetime_from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}
