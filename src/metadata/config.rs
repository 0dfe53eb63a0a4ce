//! Configuration for metadata storage backends

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

use crate::codec::MetadataVariant;
use crate::error::Result;
use crate::metadata::{
    file_store::FileKeyValueStore, memory_store::MemoryKeyValueStore, redis_store::RedisKeyValueStore,
    sqlite_store::SQLiteKeyValueStore, KeyValueStore,
};

/// Available key-value backends for metadata
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KvBackend {
    #[serde(alias = "mock")]
    Memory,
    #[default]
    File,
    Sqlite,
    Redis,
}

impl std::str::FromStr for KvBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mock" => Ok(KvBackend::Memory),
            "file" | "json" => Ok(KvBackend::File),
            "sqlite" => Ok(KvBackend::Sqlite),
            "redis" => Ok(KvBackend::Redis),
            _ => Err(format!("Unknown metadata backend: {}", s)),
        }
    }
}

/// Metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Which representation the repository writes and reconciles against
    pub variant: MetadataVariant,
    /// Key-value backend for the sidecar and bulk variants
    pub backend: KvBackend,
    /// Directory for the JSON file backend
    pub data_dir: String,
    /// Database file path (SQLite)
    pub db_path: String,
    /// Enable WAL mode (SQLite)
    pub wal_mode: bool,
    /// Connection URL (Redis)
    pub redis_url: String,
    /// Prefix applied to every Redis key
    pub key_prefix: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            variant: MetadataVariant::default(),
            backend: KvBackend::default(),
            data_dir: "./data".to_string(),
            db_path: "./data/metadata.db".to_string(),
            wal_mode: true,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
        }
    }
}

impl MetadataConfig {
    /// Override fields from `METADATA_BACKEND`, `METADATA_VARIANT`, `DB_FILE` and `REDIS_URL`
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("METADATA_BACKEND") {
            match backend_str.parse::<KvBackend>() {
                Ok(backend) => {
                    info!("Using metadata backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("Invalid metadata backend in environment: {}. Keeping {:?}.", e, self.backend),
            }
        }
        if let Ok(variant_str) = env::var("METADATA_VARIANT") {
            match variant_str.parse::<MetadataVariant>() {
                Ok(variant) => {
                    info!("Using metadata variant from environment: {}", variant);
                    self.variant = variant;
                }
                Err(e) => warn!("Invalid metadata variant in environment: {}. Keeping {}.", e, self.variant),
            }
        }
        if let Ok(path) = env::var("DB_FILE") {
            info!("Using database path from environment: {}", path);
            self.db_path = path;
        }
        if let Ok(url) = env::var("REDIS_URL") {
            self.redis_url = url;
        }
    }

    /// Create a key-value store instance based on the configuration
    pub async fn create_store(&self) -> Result<Arc<dyn KeyValueStore>> {
        Ok(match self.backend {
            KvBackend::Memory => {
                info!("Creating in-memory metadata store");
                Arc::new(MemoryKeyValueStore::new())
            }
            KvBackend::File => {
                info!("Creating JSON file metadata store in {}", self.data_dir);
                Arc::new(FileKeyValueStore::new(&self.data_dir)?)
            }
            KvBackend::Sqlite => {
                info!("Creating SQLite metadata store");
                Arc::new(SQLiteKeyValueStore::new(self)?)
            }
            KvBackend::Redis => {
                info!("Creating Redis metadata store");
                Arc::new(RedisKeyValueStore::connect(&self.redis_url, &self.key_prefix).await?)
            }
        })
    }
}
