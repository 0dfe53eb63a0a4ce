//! Comprehensive test to verify the metadata storage abstraction

#[cfg(test)]
mod integration_tests {
    use crate::metadata::config::{KvBackend, MetadataConfig};
    use crate::metadata::KeyValueStore;
    use std::sync::Arc;

    async fn stores(dir: &tempfile::TempDir) -> Vec<Arc<dyn KeyValueStore>> {
        let mut stores = Vec::new();
        for backend in [KvBackend::Memory, KvBackend::File, KvBackend::Sqlite] {
            let config = MetadataConfig {
                backend,
                data_dir: dir.path().join("json").display().to_string(),
                db_path: dir.path().join("metadata.db").display().to_string(),
                ..MetadataConfig::default()
            };
            stores.push(config.create_store().await.unwrap());
        }
        stores
    }

    #[tokio::test]
    async fn test_metadata_abstraction_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores(&dir).await {
            let name = store.name();
            assert_eq!(store.get("photo:e2e").await.unwrap(), None, "{}: key should not exist initially", name);

            let document = r#"{"id":"e2e","title":"End to end"}"#;
            store.set("photo:e2e", document).await.unwrap();
            assert_eq!(store.get("photo:e2e").await.unwrap().as_deref(), Some(document), "{}", name);

            let collection = r#"[{"id":"e2e"}]"#;
            store.set("photos", collection).await.unwrap();
            assert_eq!(store.keys("photo:").await.unwrap(), vec!["photo:e2e"], "{}", name);
            assert_eq!(store.keys("photos").await.unwrap(), vec!["photos"], "{}", name);

            // values survive non-ASCII text untouched
            let unicode = r#"{"title":"海边日落 ☀"}"#;
            store.set("photo:unicode", unicode).await.unwrap();
            assert_eq!(store.get("photo:unicode").await.unwrap().as_deref(), Some(unicode), "{}", name);

            assert!(store.delete("photo:e2e").await.unwrap(), "{}", name);
            assert_eq!(store.get("photo:e2e").await.unwrap(), None, "{}", name);
            assert!(store.ping().await.is_ok(), "{}", name);
        }
    }
}
