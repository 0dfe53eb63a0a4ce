//! In-memory implementation of ObjectStore, used for tests and ephemeral deployments

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::storage::{
    content_fingerprint, validate_key, DeleteOutcome, ObjectAttributes, ObjectEntry, ObjectStore,
};

const BACKEND: &str = "memory";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    attributes: ObjectAttributes,
    stored_at: DateTime<Utc>,
}

/// Process-local object store: key -> object
pub struct MemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    // operations that currently fail with BackendUnavailable ("*" = all)
    failing: Arc<Mutex<HashSet<String>>>,
    attribute_limit: Option<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            attribute_limit: None,
        }
    }

    /// Behave like object stores that cap each attribute value at `limit` bytes
    pub fn with_attribute_limit(mut self, limit: usize) -> Self {
        self.attribute_limit = Some(limit);
        self
    }

    pub fn locator_for(key: &str) -> String {
        format!("memory://{}", key)
    }

    /// Get the number of stored objects
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Clear all data from the store
    pub fn clear(&self) {
        self.objects.lock().unwrap().clear();
    }

    /// Seed an object bypassing validation and conflict checks, as historical data would appear
    pub fn insert_raw(&self, key: &str, data: &[u8], attributes: ObjectAttributes, stored_at: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject { data: data.to_vec(), attributes, stored_at },
        );
    }

    /// Make every operation fail (`false`) or succeed again (`true`)
    pub fn set_available(&self, available: bool) {
        let mut failing = self.failing.lock().unwrap();
        if available {
            failing.clear();
        } else {
            failing.insert("*".to_string());
        }
    }

    /// Make a single operation ("put", "get", "delete", "list", "ping") fail
    pub fn fail_operation(&self, operation: &str) {
        self.failing.lock().unwrap().insert(operation.to_string());
    }

    fn check(&self, operation: &str) -> Result<()> {
        let failing = self.failing.lock().unwrap();
        if failing.contains("*") || failing.contains(operation) {
            return Err(Error::backend(BACKEND, operation, "injected failure"));
        }
        Ok(())
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn put(&self, key: &str, data: &[u8], attributes: &ObjectAttributes) -> Result<String> {
        self.check("put")?;
        validate_key(key)?;
        if let Some(limit) = self.attribute_limit {
            if let Some((name, value)) = attributes.iter().find(|(_, value)| value.len() > limit) {
                return Err(Error::Validation(format!(
                    "attribute {} of {} exceeds {} bytes ({} bytes)",
                    name,
                    key,
                    limit,
                    value.len()
                )));
            }
        }

        let mut objects = self.objects.lock().unwrap();
        if let Some(existing) = objects.get(key) {
            if content_fingerprint(&existing.data) != content_fingerprint(data) {
                return Err(Error::Conflict(format!("object {} already exists with different content", key)));
            }
            debug!("Memory: identical re-put of {}", key);
            return Ok(Self::locator_for(key));
        }

        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                attributes: attributes.clone(),
                stored_at: Utc::now(),
            },
        );
        info!("Memory: stored object {} ({} bytes)", key, data.len());
        Ok(Self::locator_for(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.check("get")?;
        let objects = self.objects.lock().unwrap();
        objects
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object {} not found", key)))
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome> {
        self.check("delete")?;
        let mut objects = self.objects.lock().unwrap();
        match objects.remove(key) {
            Some(_) => {
                info!("Memory: deleted object {}", key);
                Ok(DeleteOutcome::Deleted)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        self.check("list")?;
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                locator: Self::locator_for(key),
                size: object.data.len() as u64,
                stored_at: object.stored_at,
                attributes: object.attributes.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.check("ping")
    }

    fn max_attribute_bytes(&self) -> Option<usize> {
        self.attribute_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_object_store_basic_operations() {
        let store = MemoryObjectStore::new();
        let mut attributes = ObjectAttributes::new();
        attributes.insert("photo-id".to_string(), "abc".to_string());

        assert_eq!(store.object_count(), 0);

        let locator = store.put("photos/abc.jpg", b"jpeg bytes", &attributes).await.unwrap();
        assert_eq!(locator, "memory://photos/abc.jpg");
        assert_eq!(store.object_count(), 1);

        assert_eq!(store.get("photos/abc.jpg").await.unwrap(), b"jpeg bytes");

        let listed = store.list("photos/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 10);
        assert_eq!(listed[0].attributes.get("photo-id"), Some(&"abc".to_string()));
        assert!(store.list("other/").await.unwrap().is_empty());

        assert_eq!(store.delete("photos/abc.jpg").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete("photos/abc.jpg").await.unwrap(), DeleteOutcome::NotFound);
        assert!(store.get("photos/abc.jpg").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_memory_object_store_rejects_conflicting_overwrite() {
        let store = MemoryObjectStore::new();
        let attributes = ObjectAttributes::new();

        store.put("photos/a.jpg", b"one", &attributes).await.unwrap();
        // identical content is idempotent
        store.put("photos/a.jpg", b"one", &attributes).await.unwrap();

        let err = store.put("photos/a.jpg", b"two", &attributes).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.get("photos/a.jpg").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_memory_object_store_failure_injection() {
        let store = MemoryObjectStore::new();
        store.fail_operation("delete");
        store.put("photos/a.jpg", b"one", &ObjectAttributes::new()).await.unwrap();
        assert!(store.delete("photos/a.jpg").await.unwrap_err().is_backend_failure());

        store.set_available(false);
        assert!(store.ping().await.is_err());
        assert!(store.list("").await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
        assert_eq!(store.delete("photos/a.jpg").await.unwrap(), DeleteOutcome::Deleted);
    }

    #[tokio::test]
    async fn test_memory_object_store_attribute_limit() {
        let unbounded = MemoryObjectStore::new();
        assert_eq!(unbounded.max_attribute_bytes(), None);
        let mut attributes = ObjectAttributes::new();
        attributes.insert("photo-description".to_string(), "x".repeat(5000));
        unbounded.put("photos/a.jpg", b"one", &attributes).await.unwrap();

        let capped = MemoryObjectStore::new().with_attribute_limit(2048);
        assert_eq!(capped.max_attribute_bytes(), Some(2048));
        let err = capped.put("photos/a.jpg", b"one", &attributes).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(capped.object_count(), 0);
    }
}
