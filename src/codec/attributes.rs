//! Native object metadata: percent-encoded attributes attached to the image object.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::codec::DecodeError;
use crate::error::{Error, Result};
use crate::record::{PhotoRecord, Provenance};
use crate::storage::{ObjectAttributes, ObjectEntry};

pub const ATTR_ID: &str = "photo-id";
pub const ATTR_TITLE: &str = "photo-title";
pub const ATTR_DESCRIPTION: &str = "photo-description";
pub const ATTR_ORIGINAL_NAME: &str = "photo-original-name";
pub const ATTR_UPLOAD_DATE: &str = "photo-upload-date";
pub const ATTR_SORT_KEY: &str = "photo-sort-key";

pub fn has_photo_attributes(attributes: &ObjectAttributes) -> bool {
    attributes.keys().any(|key| key.starts_with("photo-"))
}

/// Encode `record` as attributes, each value at most `max_bytes` once encoded (when the backend has a limit)
pub fn encode(record: &PhotoRecord, max_bytes: Option<usize>) -> Result<ObjectAttributes> {
    let mut attributes = ObjectAttributes::new();
    let fields = [
        (ATTR_ID, urlencoding::encode(&record.id).into_owned()),
        (ATTR_TITLE, urlencoding::encode(&record.title).into_owned()),
        (ATTR_DESCRIPTION, urlencoding::encode(&record.description).into_owned()),
        (ATTR_ORIGINAL_NAME, urlencoding::encode(&record.original_name).into_owned()),
        (ATTR_UPLOAD_DATE, record.upload_date.to_rfc3339_opts(SecondsFormat::Millis, true)),
        (ATTR_SORT_KEY, record.sort_key.to_string()),
    ];
    for (name, value) in fields {
        if let Some(limit) = max_bytes.filter(|limit| value.len() > *limit) {
            return Err(Error::Validation(format!(
                "{} is too long for this object store's metadata ({} bytes once encoded, the store accepts {})",
                field_label(name),
                value.len(),
                limit
            )));
        }
        attributes.insert(name.to_string(), value);
    }
    Ok(attributes)
}

fn field_label(name: &str) -> &'static str {
    match name {
        ATTR_TITLE => "Title",
        ATTR_DESCRIPTION => "Description",
        ATTR_ORIGINAL_NAME => "File name",
        _ => "Photo metadata",
    }
}

fn text(attributes: &ObjectAttributes, name: &'static str) -> std::result::Result<Option<String>, DecodeError> {
    match attributes.get(name) {
        None => Ok(None),
        Some(raw) => urlencoding::decode(raw)
            .map(|value| Some(value.into_owned()))
            .map_err(|_| DecodeError::InvalidEncoding(name)),
    }
}

pub fn decode(entry: &ObjectEntry) -> std::result::Result<PhotoRecord, DecodeError> {
    let attributes = &entry.attributes;
    let id = text(attributes, ATTR_ID)?
        .filter(|id| !id.is_empty())
        .ok_or(DecodeError::MissingField(ATTR_ID))?;
    let title = text(attributes, ATTR_TITLE)?
        .filter(|title| !title.trim().is_empty())
        .ok_or(DecodeError::MissingField(ATTR_TITLE))?;

    let upload_date = match attributes.get(ATTR_UPLOAD_DATE) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|_| DecodeError::InvalidDate(raw.clone()))?,
        None => entry.stored_at,
    };
    let sort_key = attributes
        .get(ATTR_SORT_KEY)
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or_else(|| upload_date.timestamp_millis());

    Ok(PhotoRecord {
        id,
        title,
        description: text(attributes, ATTR_DESCRIPTION)?.unwrap_or_default(),
        url: entry.locator.clone(),
        upload_date,
        original_name: text(attributes, ATTR_ORIGINAL_NAME)?.unwrap_or_default(),
        size: entry.size,
        sort_key,
        provenance: Provenance::Exact,
    })
}
