//! Local filesystem object storage implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::config::StorageConfig;
use crate::storage::{
    content_fingerprint, validate_key, DeleteOutcome, ObjectAttributes, ObjectEntry, ObjectStore,
};

const BACKEND: &str = "local";

/// Stores each object as a file under `base_path`; attributes live in a hidden
/// sibling `.{file}.attrs.json`
pub struct LocalObjectStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = PathBuf::from(&config.base_path);
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path).map_err(|e| {
                Error::Config(format!(
                    "failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;
        }
        info!("Using local storage directory: {}", base_path.display());
        Ok(Self {
            base_path,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn object_path(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.base_path.clone(), |path, segment| path.join(segment))
    }

    fn attributes_path(object_path: &Path) -> Option<PathBuf> {
        let file_name = object_path.file_name()?.to_string_lossy();
        Some(object_path.with_file_name(format!(".{}.attrs.json", file_name)))
    }

    fn locator_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn io_error(operation: &str, key: &str, e: std::io::Error) -> Error {
        Error::backend(BACKEND, operation, format!("{}: {}", key, e))
    }

    /// Write through a temp file so readers never observe a partial object
    async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!(".{}.tmp-{}", file_name, uuid::Uuid::new_v4()));
        tokio::fs::write(&temp_path, data).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn read_attributes(object_path: &Path) -> ObjectAttributes {
        let Some(attributes_path) = Self::attributes_path(object_path) else {
            return ObjectAttributes::new();
        };
        match tokio::fs::read(&attributes_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Ignoring unreadable attributes {}: {}", attributes_path.display(), e);
                ObjectAttributes::new()
            }),
            Err(_) => ObjectAttributes::new(),
        }
    }

    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(segments.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn put(&self, key: &str, data: &[u8], attributes: &ObjectAttributes) -> Result<String> {
        validate_key(key)?;
        let path = self.object_path(key);

        match tokio::fs::read(&path).await {
            Ok(existing) => {
                if content_fingerprint(&existing) != content_fingerprint(data) {
                    return Err(Error::Conflict(format!("object {} already exists with different content", key)));
                }
                debug!("Local: identical re-put of {}", key);
                return Ok(self.locator_for(key));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Self::io_error("put", key, e)),
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error("put", key, e))?;
        }

        // attributes first so a listed object is never missing them
        if !attributes.is_empty() {
            if let Some(attributes_path) = Self::attributes_path(&path) {
                let encoded = serde_json::to_vec(attributes)
                    .map_err(|e| Error::backend(BACKEND, "put", e))?;
                Self::write_atomically(&attributes_path, &encoded)
                    .await
                    .map_err(|e| Self::io_error("put", key, e))?;
            }
        }

        Self::write_atomically(&path, data)
            .await
            .map_err(|e| Self::io_error("put", key, e))?;

        info!("Local: wrote object {} ({} bytes) to {}", key, data.len(), path.display());
        Ok(self.locator_for(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let path = self.object_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object {} not found", key)))
            }
            Err(e) => Err(Self::io_error("get", key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome> {
        validate_key(key)?;
        let path = self.object_path(key);
        let outcome = match tokio::fs::remove_file(&path).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) if e.kind() == ErrorKind::NotFound => DeleteOutcome::NotFound,
            Err(e) => return Err(Self::io_error("delete", key, e)),
        };

        if let Some(attributes_path) = Self::attributes_path(&path) {
            if let Err(e) = tokio::fs::remove_file(&attributes_path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Local: failed to remove attributes for {}: {}", key, e);
                }
            }
        }

        if outcome == DeleteOutcome::Deleted {
            info!("Local: deleted object {}", key);
        }
        Ok(outcome)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_error("list", &dir.display().to_string(), e)),
            };

            while let Some(dir_entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| Self::io_error("list", &dir.display().to_string(), e))?
            {
                if dir_entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = dir_entry.path();
                let metadata = dir_entry
                    .metadata()
                    .await
                    .map_err(|e| Self::io_error("list", &path.display().to_string(), e))?;

                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(key) = self.relative_key(&path) else { continue };
                if !key.starts_with(prefix) {
                    continue;
                }

                let stored_at: DateTime<Utc> = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                entries.push(ObjectEntry {
                    locator: self.locator_for(&key),
                    size: metadata.len(),
                    stored_at,
                    attributes: Self::read_attributes(&path).await,
                    key,
                });
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn ping(&self) -> Result<()> {
        match tokio::fs::metadata(&self.base_path).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(Error::backend(BACKEND, "ping", "storage path is not a directory")),
            Err(e) => Err(Self::io_error("ping", &self.base_path.display().to_string(), e)),
        }
    }
}
