//! Comprehensive tests for the object storage abstraction layer

#[cfg(test)]
mod integration_tests {
    use crate::storage::config::{ObjectStoreBackend, StorageConfig};
    use crate::storage::{DeleteOutcome, ObjectAttributes, ObjectStore};
    use std::sync::Arc;

    fn stores(dir: &tempfile::TempDir) -> Vec<Arc<dyn ObjectStore>> {
        [ObjectStoreBackend::Memory, ObjectStoreBackend::Local]
            .into_iter()
            .map(|backend| {
                StorageConfig {
                    backend,
                    base_path: dir.path().join(format!("{:?}", backend)).display().to_string(),
                    ..StorageConfig::default()
                }
                .create_store()
                .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_object_store_abstraction_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores(&dir) {
            let key = "photos/e2e.jpg";
            let data = format!("End-to-end test data for {}", store.name()).into_bytes();
            let mut attributes = ObjectAttributes::new();
            attributes.insert("photo-id".to_string(), "e2e".to_string());

            let locator = store.put(key, &data, &attributes).await.expect("Put failed");
            assert!(locator.ends_with(key), "{}: locator {} should end with key", store.name(), locator);

            assert_eq!(store.get(key).await.expect("Get failed"), data);

            let listed = store.list("photos/").await.expect("List failed");
            assert_eq!(listed.len(), 1, "{}", store.name());
            assert_eq!(listed[0].locator, locator);
            assert_eq!(listed[0].size, data.len() as u64);
            assert_eq!(listed[0].attributes, attributes);

            assert_eq!(store.delete(key).await.expect("Delete failed"), DeleteOutcome::Deleted);
            assert!(store.get(key).await.is_err());
            assert_eq!(store.delete(key).await.expect("Second delete failed"), DeleteOutcome::NotFound);
        }
    }

    #[tokio::test]
    async fn test_large_data_handling() {
        let dir = tempfile::tempdir().unwrap();
        let large_data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 256) as u8).collect();
        for store in stores(&dir) {
            store.put("photos/large.jpg", &large_data, &ObjectAttributes::new()).await.expect("Large put failed");
            assert_eq!(store.get("photos/large.jpg").await.expect("Large get failed"), large_data);
        }
    }

    #[tokio::test]
    async fn test_concurrent_operations() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores(&dir) {
            let handles: Vec<_> = (0..5)
                .map(|i| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        let key = format!("photos/concurrent_{}.jpg", i);
                        let data = format!("Concurrent test data {}", i).into_bytes();
                        store.put(&key, &data, &ObjectAttributes::new()).await.unwrap();
                        assert_eq!(store.get(&key).await.unwrap(), data);
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(store.list("photos/concurrent_").await.unwrap().len(), 5);
        }
    }

    #[tokio::test]
    async fn test_empty_payload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores(&dir) {
            store.put("photos/empty.jpg", &[], &ObjectAttributes::new()).await.expect("Empty put failed");
            assert!(store.get("photos/empty.jpg").await.expect("Empty get failed").is_empty());
        }
    }
}
