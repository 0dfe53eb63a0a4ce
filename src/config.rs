//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting a YAML configuration file with sensible defaults and
//! environment variable overrides.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::metadata::config::MetadataConfig;
use crate::repository::RepositoryOptions;
use crate::storage::config::StorageConfig;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "PORTFOLIO_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub repository: RepositoryConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: 4,
        }
    }
}

/// Repository behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Per backend call, in milliseconds
    pub backend_timeout_ms: u64,
    pub serialize_writes: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        let options = RepositoryOptions::default();
        Self {
            backend_timeout_ms: options.backend_timeout.as_millis() as u64,
            serialize_writes: options.serialize_writes,
        }
    }
}

impl RepositoryConfig {
    pub fn options(&self) -> RepositoryOptions {
        RepositoryOptions {
            backend_timeout: Duration::from_millis(self.backend_timeout_ms),
            serialize_writes: self.serialize_writes,
        }
    }
}

/// Shared-secret admin authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub admin_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_password: "602160".to_string(),
        }
    }
}

/// Upload limits and image transform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum accepted image size in bytes
    pub max_file_size: usize,
    /// Wider images are downscaled to this width
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_width: crate::transform::DEFAULT_MAX_WIDTH,
            jpeg_quality: crate::transform::DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to the log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `PORTFOLIO_CONFIG` (or `config.yaml`), use defaults if not found,
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(config_path: &str) -> Result<Self> {
        if Path::new(config_path).exists() {
            let content = fs::read_to_string(config_path)
                .map_err(|e| Error::Config(format!("failed to read {}: {}", config_path, e)))?;
            let config = Self::from_yaml(&content)?;
            info!("Loaded configuration from {}", config_path);
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", config_path);
            Ok(Self::default())
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Config(format!("invalid configuration: {}", e)))
    }

    pub fn apply_env(&mut self) {
        self.storage.apply_env();
        self.metadata.apply_env();
        if let Ok(password) = env::var("ADMIN_PASSWORD") {
            self.auth.admin_password = password;
        }
        if let Ok(port_str) = env::var("PORT") {
            match port_str.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!("Invalid PORT in environment: {}. Keeping {}.", e, self.server.port),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MetadataVariant;
    use crate::metadata::config::KvBackend;
    use crate::storage::config::ObjectStoreBackend;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.auth.admin_password, "602160");
        assert!(config.repository.serialize_writes);
        assert_eq!(config.repository.options().backend_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            r#"
server:
  port: 8081
metadata:
  variant: sidecar_json
  backend: sqlite
  db_path: /tmp/photos.db
repository:
  serialize_writes: false
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.metadata.variant, MetadataVariant::SidecarJson);
        assert_eq!(config.metadata.backend, KvBackend::Sqlite);
        assert_eq!(config.metadata.db_path, "/tmp/photos.db");
        assert!(!config.repository.serialize_writes);
        assert_eq!(config.repository.backend_timeout_ms, 10_000);
        assert_eq!(config.storage.backend, ObjectStoreBackend::Local);
    }

    #[test]
    fn test_invalid_yaml_is_a_config_error() {
        assert!(matches!(AppConfig::from_yaml("server: [1, 2"), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::from_file("/nonexistent/portfolio-config.yaml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        env::set_var("ADMIN_PASSWORD", "hunter2");
        env::set_var("PORT", "8088");
        env::set_var("STORAGE_BACKEND", "memory");
        let mut config = AppConfig::default();
        config.apply_env();
        assert_eq!(config.auth.admin_password, "hunter2");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.storage.backend, ObjectStoreBackend::Memory);

        env::set_var("PORT", "not-a-port");
        let mut config = AppConfig::default();
        config.apply_env();
        assert_eq!(config.server.port, 3000);

        env::remove_var("ADMIN_PASSWORD");
        env::remove_var("PORT");
        env::remove_var("STORAGE_BACKEND");
    }
}
