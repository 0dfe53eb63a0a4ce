//! Filename-encoded token: `{timestamp}-{id}-{encodedTitle}`.
//!
//! The token is lossy. Descriptions are not stored at all and the title loses
//! the characters stripped before it is placed in a key.

use crate::codec::{is_uuid, key_file_name, key_stem, DecodeError};
use crate::error::{Error, Result as CrateResult};
use crate::record::{datetime_from_millis, placeholder_title, PhotoRecord, Provenance};
use crate::storage::ObjectEntry;

/// Room left for the encoded title in a 255-byte file name, after the
/// timestamp (at most 20 digits), the id, both separators and `.jpg`
pub const MAX_ENCODED_TITLE_BYTES: usize = 190;

const STRIPPED: [char; 5] = ['.', '\'', '(', ')', '*'];

/// Parsed parts of a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub timestamp: i64,
    pub id: String,
    pub title: String,
}

/// Percent-encode a title for a key, dropping `. ' ( ) *`.
/// Stops at a character boundary once the encoded form would exceed the byte limit.
pub fn encode_title(title: &str) -> String {
    let mut encoded = String::new();
    let mut buf = [0u8; 4];
    for c in title.chars().filter(|c| !STRIPPED.contains(c)) {
        let piece = urlencoding::encode(c.encode_utf8(&mut buf));
        if encoded.len() + piece.len() > MAX_ENCODED_TITLE_BYTES {
            break;
        }
        encoded.push_str(&piece);
    }
    encoded
}

/// The title exactly as it will read back from a key: reserved characters
/// dropped and trimmed. Titles whose encoded form does not fit are refused.
pub fn fit_title(title: &str) -> CrateResult<String> {
    let kept: String = title.chars().filter(|c| !STRIPPED.contains(c)).collect();
    let kept = kept.trim();
    if kept.is_empty() {
        return Err(Error::Validation(
            "Title must contain more than . ' ( ) * characters".to_string(),
        ));
    }
    let encoded_len = urlencoding::encode(kept).len();
    if encoded_len > MAX_ENCODED_TITLE_BYTES {
        return Err(Error::Validation(format!(
            "Title is too long to be stored in the file name ({} bytes once encoded, at most {})",
            encoded_len, MAX_ENCODED_TITLE_BYTES
        )));
    }
    Ok(kept.to_string())
}

pub fn encode_token(timestamp: i64, id: &str, title: &str) -> String {
    format!("{}-{}-{}", timestamp, id, encode_title(title))
}

/// Parse a key stem into its token parts
pub fn parse_token(stem: &str) -> Result<Token, DecodeError> {
    let segments: Vec<&str> = stem.split('-').collect();
    let head = segments[0];
    if head.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::NotNumeric(head.to_string()));
    }
    let timestamp = head
        .parse::<i64>()
        .map_err(|_| DecodeError::NotNumeric(head.to_string()))?;

    let rest = &segments[1..];
    if rest.iter().all(|segment| segment.is_empty()) {
        return Err(DecodeError::MissingField("id"));
    }

    if rest.len() >= 5 && is_uuid(&rest[..5].join("-")) {
        let id = rest[..5].join("-");
        let title = decode_title(&rest[5..].join("-"), &id);
        Ok(Token { timestamp, id, title })
    } else {
        let id = rest.join("-");
        let title = placeholder_title(&id);
        Ok(Token { timestamp, id, title })
    }
}

fn decode_title(raw: &str, id: &str) -> String {
    if raw.is_empty() {
        return placeholder_title(id);
    }
    if !has_well_formed_escapes(raw) {
        return raw.to_string();
    }
    match urlencoding::decode(raw) {
        Ok(title) if !title.trim().is_empty() => title.into_owned(),
        Ok(_) => placeholder_title(id),
        Err(_) => raw.to_string(),
    }
}

/// Every `%` must be followed by two hex digits
fn has_well_formed_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !well_formed {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

pub fn decode(entry: &ObjectEntry) -> Result<PhotoRecord, DecodeError> {
    let token = parse_token(key_stem(&entry.key))?;
    Ok(PhotoRecord {
        id: token.id,
        title: token.title,
        description: String::new(),
        url: entry.locator.clone(),
        upload_date: datetime_from_millis(token.timestamp),
        original_name: key_file_name(&entry.key).to_string(),
        size: entry.size,
        sort_key: token.timestamp,
        provenance: Provenance::Lossy,
    })
}
