//! In-memory implementation of KeyValueStore for testing

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::metadata::KeyValueStore;

const BACKEND: &str = "memory";

/// In-memory key-value store with failure injection
pub struct MemoryKeyValueStore {
    data: Arc<Mutex<BTreeMap<String, String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(BTreeMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Clear all data from the store (useful for test cleanup)
    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    pub fn key_count(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    /// Read a value synchronously, bypassing failure injection
    pub fn peek(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).cloned()
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

    /// Make a single operation ("get", "set", "delete", "keys", "ping") fail
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

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check("get")?;
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check("set")?;
        self.data.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check("delete")?;
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.check("keys")?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.check("ping")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_key_value_store_basic_operations() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.key_count(), 0);

        store.set("photo:a", "{}").await.unwrap();
        store.set("photo:b", "{}").await.unwrap();
        store.set("photos", "[]").await.unwrap();
        assert_eq!(store.key_count(), 3);

        assert_eq!(store.get("photo:a").await.unwrap(), Some("{}".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert_eq!(store.keys("photo:").await.unwrap(), vec!["photo:a", "photo:b"]);

        store.set("photo:a", "{\"x\":1}").await.unwrap();
        assert_eq!(store.peek("photo:a"), Some("{\"x\":1}".to_string()));

        assert!(store.delete("photo:a").await.unwrap());
        assert!(!store.delete("photo:a").await.unwrap());

        store.clear();
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_key_value_store_failure_injection() {
        let store = MemoryKeyValueStore::new();
        store.fail_operation("set");
        assert!(store.set("k", "v").await.unwrap_err().is_backend_failure());
        assert!(store.get("k").await.is_ok());

        store.set_available(false);
        assert!(store.get("k").await.is_err());
        store.set_available(true);
        store.set("k", "v").await.unwrap();
    }
}
