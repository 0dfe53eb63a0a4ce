//! Metadata Storage Layer Abstraction
//!
//! This module provides an abstraction over the key-value stores that hold
//! photo metadata (sidecar documents or the legacy bulk collection), allowing
//! the system to use different implementations (memory, JSON files, SQLite,
//! Redis) without affecting higher-level services.

pub mod config;
pub mod file_store;
pub mod memory_store;
pub mod redis_store;
pub mod sqlite_store;

#[cfg(test)]
mod comprehensive_test;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the metadata key-value interface
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Backend label used in logs and errors
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value stored under `key`
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, sorted
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Cheap readiness probe
    async fn ping(&self) -> Result<()>;
}
