//! Configuration for object storage backends

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

use crate::error::Result;
use crate::storage::{local_store::LocalObjectStore, memory_store::MemoryObjectStore, ObjectStore};

/// Available object storage backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreBackend {
    #[default]
    Local,
    #[serde(alias = "mock")]
    Memory,
}

impl std::str::FromStr for ObjectStoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "file" | "filesystem" => Ok(ObjectStoreBackend::Local),
            "memory" | "mock" => Ok(ObjectStoreBackend::Memory),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub backend: ObjectStoreBackend,
    /// Base path for stored files (local backend)
    pub base_path: String,
    /// URL prefix under which stored objects are served
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: ObjectStoreBackend::default(),
            base_path: "./public/uploads".to_string(),
            public_base_url: "/uploads".to_string(),
        }
    }
}

impl StorageConfig {
    /// Override fields from `STORAGE_BACKEND` and `STORAGE_DIRECTORY`
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("STORAGE_BACKEND") {
            match backend_str.parse::<ObjectStoreBackend>() {
                Ok(backend) => {
                    info!("Using storage backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("Invalid storage backend in environment: {}. Keeping {:?}.", e, self.backend),
            }
        }
        if let Ok(dir) = env::var("STORAGE_DIRECTORY") {
            info!("Using storage directory from environment: {}", dir);
            self.base_path = dir;
        }
    }

    /// Create an object store instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn ObjectStore>> {
        Ok(match self.backend {
            ObjectStoreBackend::Local => {
                info!("Creating local object store at {}", self.base_path);
                Arc::new(LocalObjectStore::new(self)?)
            }
            ObjectStoreBackend::Memory => {
                info!("Creating in-memory object store");
                Arc::new(MemoryObjectStore::new())
            }
        })
    }
}
