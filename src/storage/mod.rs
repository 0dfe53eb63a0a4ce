//! Object Storage Layer Abstraction
//!
//! This module provides an abstraction over the stores that hold image
//! payloads, allowing the repository to run against the local filesystem or
//! process memory without affecting higher-level services.

pub mod config;
pub mod local_store;
pub mod memory_store;

#[cfg(test)]
mod comprehensive_test;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Key of a stored object, `/`-separated (e.g. `photos/<id>.jpg`)
pub type ObjectKey = String;

/// String attributes attached directly to a stored object
pub type ObjectAttributes = HashMap<String, String>;

/// One entry of an object listing
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: ObjectKey,
    /// Locator usable to retrieve the bytes (URL or path)
    pub locator: String,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
    pub attributes: ObjectAttributes,
}

/// Outcome of a delete; deleting an absent key is not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Trait defining the object storage interface
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend label used in logs and errors
    fn name(&self) -> &'static str;

    /// Store bytes under `key` and return their locator.
    /// Re-putting identical content is idempotent; different content is a `Conflict`.
    async fn put(&self, key: &str, data: &[u8], attributes: &ObjectAttributes) -> Result<String>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn delete(&self, key: &str) -> Result<DeleteOutcome>;

    /// List every object whose key starts with `prefix`, sorted by key
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>>;

    /// Cheap readiness probe
    async fn ping(&self) -> Result<()>;

    /// Largest single attribute value the backend accepts; `None` when unbounded
    fn max_attribute_bytes(&self) -> Option<usize> {
        None
    }
}

/// Hex MD5 of a payload, used to tell identical re-puts from conflicting ones
pub fn content_fingerprint(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

/// Reject keys that could escape the store root or address nothing
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(Error::Validation(format!("invalid object key: {:?}", key)));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.starts_with('.') {
            return Err(Error::Validation(format!("invalid object key: {:?}", key)));
        }
        if segment.contains('\\') || segment.contains('\0') {
            return Err(Error::Validation(format!("invalid object key: {:?}", key)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("photos/abc.jpg").is_ok());
        assert!(validate_key("photos/1700000000-id-Sunset%20Bay.jpg").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("photos/../secret").is_err());
        assert!(validate_key("photos//a.jpg").is_err());
        assert!(validate_key("photos/.a.jpg.attrs.json").is_err());
        assert!(validate_key("photos/").is_err());
    }

    #[test]
    fn test_content_fingerprint() {
        assert_eq!(content_fingerprint(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_ne!(content_fingerprint(b"a"), content_fingerprint(b"b"));
    }
}
