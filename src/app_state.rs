//! Application State Management
//!
//! This module provides the application state that contains the photo
//! repository and its dependencies, following the dependency injection pattern.

use actix_web::web;
use log::{info, warn};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::metadata::memory_store::MemoryKeyValueStore;
use crate::metadata::KeyValueStore;
use crate::repository::PhotoRepository;
use crate::storage::memory_store::MemoryObjectStore;
use crate::storage::ObjectStore;
use crate::transform::{ImageTransform, JpegTransform, PassthroughTransform};

/// Application state shared by every worker
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<PhotoRepository>,
    pub config: AppConfig,
}

impl AppState {
    /// Load configuration and build the application state from it
    pub async fn new() -> Result<Self> {
        Self::from_config(AppConfig::load()?).await
    }

    /// Create application state from configuration
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        info!("Initializing application state with configuration");

        let objects = config.storage.create_store()?;
        let metadata: Arc<dyn KeyValueStore> = if config.metadata.variant.uses_key_value_store() {
            config.metadata.create_store().await?
        } else {
            info!(
                "Metadata variant {} keeps metadata on the objects, no key-value store needed",
                config.metadata.variant
            );
            Arc::new(MemoryKeyValueStore::new())
        };
        let transform = Arc::new(JpegTransform {
            max_width: config.upload.max_width,
            quality: config.upload.jpeg_quality,
        });

        let state = Self::with_backends(config, objects, metadata, transform);
        if let Err(e) = state.repository.connect().await {
            warn!("Backends not ready at startup, continuing degraded: {}", e);
        }
        info!("Application state initialized successfully");
        Ok(state)
    }

    /// Create application state around already constructed backends
    pub fn with_backends(
        config: AppConfig,
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn KeyValueStore>,
        transform: Arc<dyn ImageTransform>,
    ) -> Self {
        let repository = PhotoRepository::new(objects, metadata, transform, config.metadata.variant)
            .with_options(config.repository.options());
        Self {
            repository: Arc::new(repository),
            config,
        }
    }

    /// Create application state for testing with in-memory backends
    pub fn new_for_testing(config: AppConfig) -> Self {
        Self::with_backends(
            config,
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(PassthroughTransform),
        )
    }
}

/// Helper function to extract app state from Actix-web data
pub fn extract_app_state(data: &web::Data<AppState>) -> &AppState {
    data.as_ref()
}
