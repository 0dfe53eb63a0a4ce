//! JSON-file implementation of KeyValueStore
//!
//! Each key is one file `{data_dir}/{percent-encoded key}.json`, so the bulk
//! collection key `photos` lands at `data/photos.json`.

use async_trait::async_trait;
use log::{debug, info};
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::metadata::KeyValueStore;

const BACKEND: &str = "file";
const EXTENSION: &str = ".json";

pub struct FileKeyValueStore {
    data_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            Error::Config(format!("failed to create metadata directory {}: {}", data_dir.display(), e))
        })?;
        info!("Using metadata directory: {}", data_dir.display());
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}{}", urlencoding::encode(key), EXTENSION))
    }

    fn io_error(operation: &str, key: &str, e: std::io::Error) -> Error {
        Error::backend(BACKEND, operation, format!("{}: {}", key, e))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error("get", key, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&temp_path, value)
            .await
            .map_err(|e| Self::io_error("set", key, e))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Self::io_error("set", key, e))?;
        debug!("File: wrote {} ({} bytes)", path.display(), value.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error("delete", key, e)),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.data_dir.display().to_string();
        let mut read_dir = tokio::fs::read_dir(&self.data_dir)
            .await
            .map_err(|e| Self::io_error("keys", &dir, e))?;

        let mut keys = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::io_error("keys", &dir, e))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(encoded) = file_name.strip_suffix(EXTENSION) else { continue };
            let Ok(key) = urlencoding::decode(encoded) else { continue };
            if key.starts_with(prefix) {
                keys.push(key.into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        tokio::fs::metadata(&self.data_dir)
            .await
            .map(|_| ())
            .map_err(|e| Self::io_error("ping", &self.data_dir.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_key_value_store_basic_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::new(&dir.path().display().to_string()).unwrap();

        store.set("photos", "[]").await.unwrap();
        assert!(dir.path().join("photos.json").exists());

        store.set("photo:b", "{\"id\":\"b\"}").await.unwrap();
        store.set("photo:a", "{\"id\":\"a\"}").await.unwrap();
        assert_eq!(store.get("photo:a").await.unwrap(), Some("{\"id\":\"a\"}".to_string()));
        assert_eq!(store.get("photo:zzz").await.unwrap(), None);

        assert_eq!(store.keys("photo:").await.unwrap(), vec!["photo:a", "photo:b"]);
        assert_eq!(store.keys("").await.unwrap().len(), 3);

        assert!(store.delete("photo:a").await.unwrap());
        assert!(!store.delete("photo:a").await.unwrap());
        assert!(store.ping().await.is_ok());
    }
}
