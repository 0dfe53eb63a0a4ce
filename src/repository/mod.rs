//! Photo repository: reconciles object listings with metadata into ordered photo records.
//!
//! The repository owns every write path (image first, metadata second) and
//! reports the partial outcomes of those two steps explicitly. `list` never
//! fails: a backend that cannot be reached yields an empty listing and moves
//! the repository into `Degraded` until a reconnect succeeds. `get` reports
//! that same trouble as `BackendUnavailable`.


use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use crate::codec::{self, attributes, bulk, filename, sidecar, MetadataVariant};
use crate::error::{Error, Result};
use crate::metadata::KeyValueStore;
use crate::record::{listing_order, PhotoRecord, Provenance};
use crate::storage::{DeleteOutcome, ObjectAttributes, ObjectEntry, ObjectStore};
use crate::transform::ImageTransform;

/// Object key prefix under which every photo lives
pub const PHOTO_PREFIX: &str = "photos/";
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Uninitialized,
    Ready,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// Upper bound on every single backend call
    pub backend_timeout: Duration,
    /// Serialize put/delete so read-modify-write variants cannot lose updates
    pub serialize_writes: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            backend_timeout: Duration::from_secs(10),
            serialize_writes: true,
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// An upload as received from a client
#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub title: String,
    pub description: String,
    pub image_bytes: Vec<u8>,
    pub original_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStats {
    pub photos_count: usize,
    pub state: ConnectionState,
    pub variant: MetadataVariant,
}

/// A visible record together with the object key holding its image
#[derive(Debug, Clone)]
struct Located {
    key: String,
    record: PhotoRecord,
}

pub struct PhotoRepository {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn KeyValueStore>,
    transform: Arc<dyn ImageTransform>,
    variant: MetadataVariant,
    options: RepositoryOptions,
    clock: Arc<dyn Clock>,
    state: Mutex<ConnectionState>,
    last_sort_key: AtomicI64,
    write_guard: tokio::sync::Mutex<()>,
}

impl PhotoRepository {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn KeyValueStore>,
        transform: Arc<dyn ImageTransform>,
        variant: MetadataVariant,
    ) -> Self {
        Self {
            objects,
            metadata,
            transform,
            variant,
            options: RepositoryOptions::default(),
            clock: Arc::new(SystemClock),
            state: Mutex::new(ConnectionState::Uninitialized),
            last_sort_key: AtomicI64::new(0),
            write_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn variant(&self) -> MetadataVariant {
        self.variant
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Probe the backends and move to `Ready` (or `Degraded` when a probe fails)
    pub async fn connect(&self) -> Result<()> {
        self.probe("connect").await
    }

    /// The only way out of `Degraded`
    pub async fn reconnect(&self) -> Result<()> {
        self.probe("reconnect").await
    }

    async fn probe(&self, reason: &str) -> Result<()> {
        match self.ping_backends().await {
            Ok(()) => {
                self.set_state(ConnectionState::Ready);
                info!(
                    "Photo repository {}: {} objects / {} metadata ready ({})",
                    reason,
                    self.objects.name(),
                    self.metadata.name(),
                    self.variant
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Degraded);
                warn!("Photo repository {} failed: {}", reason, e);
                Err(e)
            }
        }
    }

    async fn ping_backends(&self) -> Result<()> {
        self.call(self.objects.name(), "ping", self.objects.ping()).await?;
        if self.variant.uses_key_value_store() {
            self.call(self.metadata.name(), "ping", self.metadata.ping()).await?;
        }
        Ok(())
    }

    async fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Uninitialized => self.connect().await,
            ConnectionState::Degraded => self.reconnect().await,
        }
    }

    /// Run one backend call under the configured timeout; backend failures degrade the repository
    async fn call<T>(&self, backend: &str, operation: &str, future: impl Future<Output = Result<T>>) -> Result<T> {
        let result = match tokio::time::timeout(self.options.backend_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(Error::backend(
                backend,
                operation,
                format!("timed out after {:?}", self.options.backend_timeout),
            )),
        };
        if let Err(e) = &result {
            if e.is_backend_failure() && self.state() != ConnectionState::Degraded {
                warn!("Photo repository degraded: {}", e);
                self.set_state(ConnectionState::Degraded);
            }
        }
        result
    }

    async fn acquire_write_guard(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        if self.options.serialize_writes {
            Some(self.write_guard.lock().await)
        } else {
            None
        }
    }

    fn log_context(&self, operation: &str, photo_id: Option<&str>) {
        log_mdc::insert("operation", operation);
        log_mdc::insert("variant", self.variant.as_str());
        match photo_id {
            Some(id) => {
                log_mdc::insert("photo_id", id);
            }
            None => {
                log_mdc::remove("photo_id");
            }
        }
    }

    /// Strictly increasing per instance, never behind the clock
    fn next_sort_key(&self, now: DateTime<Utc>) -> i64 {
        let now_millis = now.timestamp_millis();
        let previous = self
            .last_sort_key
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now_millis.max(last + 1)))
            .unwrap_or_else(|last| last);
        now_millis.max(previous + 1)
    }

    fn object_key_for(&self, record: &PhotoRecord) -> String {
        match self.variant {
            MetadataVariant::FilenameToken => format!(
                "{}{}.jpg",
                PHOTO_PREFIX,
                filename::encode_token(record.sort_key, &record.id, &record.title)
            ),
            _ => format!("{}{}.jpg", PHOTO_PREFIX, record.id),
        }
    }

    /// Every visible photo, newest first. Never fails; backend trouble yields an empty list.
    pub async fn list(&self) -> Vec<PhotoRecord> {
        match self.try_list().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Listing photos while backends are unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Like `list`, but reports why nothing could be read
    pub async fn try_list(&self) -> Result<Vec<PhotoRecord>> {
        self.log_context("list", None);
        self.ensure_ready().await?;
        let located = self.reconcile().await?;
        Ok(located.into_iter().map(|l| l.record).collect())
    }

    /// `NotFound` only when the backends answered and the photo is not among them
    pub async fn get(&self, id: &str) -> Result<PhotoRecord> {
        self.try_list()
            .await?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| Error::NotFound(format!("Photo {} not found", id)))
    }

    pub async fn stats(&self) -> RepositoryStats {
        let photos_count = self.list().await.len();
        RepositoryStats {
            photos_count,
            state: self.state(),
            variant: self.variant,
        }
    }

    pub async fn put(&self, new_photo: NewPhoto) -> Result<PhotoRecord> {
        self.log_context("put", None);
        let title = new_photo.title.trim().to_string();
        let description = new_photo.description.trim().to_string();
        validate_upload(&title, &description, &new_photo.image_bytes)?;
        // the token variant keeps the title in the key, so store it as it will read back
        let title = match self.variant {
            MetadataVariant::FilenameToken => filename::fit_title(&title)?,
            _ => title,
        };

        self.ensure_ready().await?;
        let _guard = self.acquire_write_guard().await;

        let upload_date = self.clock.now();
        let mut record = PhotoRecord {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            url: String::new(),
            upload_date,
            original_name: new_photo.original_name,
            size: 0,
            sort_key: self.next_sort_key(upload_date),
            provenance: Provenance::Exact,
        };
        self.log_context("put", Some(&record.id));

        let object_attributes = match self.variant {
            MetadataVariant::NativeObject => attributes::encode(&record, self.objects.max_attribute_bytes())?,
            _ => ObjectAttributes::new(),
        };
        // a corrupt collection is refused before any image is written
        let collection = match self.variant {
            MetadataVariant::BulkCollection => self.load_collection().await?.unwrap_or_default(),
            _ => Vec::new(),
        };

        let payload = self.run_transform(new_photo.image_bytes).await?;
        record.size = payload.len() as u64;
        let key = self.object_key_for(&record);
        record.url = self
            .call(self.objects.name(), "put", self.objects.put(&key, &payload, &object_attributes))
            .await?;

        if let Err(e) = self.write_metadata(&record, collection).await {
            error!("Stored image {} but failed to index photo {}: {}", key, record.id, e);
            return Err(Error::StoredNotIndexed {
                record: Box::new(record),
                reason: e.to_string(),
            });
        }

        info!("Stored photo {} ({} bytes) at {}", record.id, record.size, key);
        Ok(record)
    }

    async fn run_transform(&self, input: Vec<u8>) -> Result<Vec<u8>> {
        let transform = Arc::clone(&self.transform);
        tokio::task::spawn_blocking(move || transform.apply(&input))
            .await
            .map_err(|e| Error::Internal(format!("image transform did not complete: {}", e)))?
    }

    async fn write_metadata(&self, record: &PhotoRecord, mut collection: Vec<Value>) -> Result<()> {
        match self.variant {
            MetadataVariant::SidecarJson => {
                let document = sidecar::encode(record)?;
                let key = sidecar::key_for(&record.id);
                self.call(self.metadata.name(), "set", self.metadata.set(&key, &document))
                    .await
            }
            MetadataVariant::BulkCollection => {
                collection.push(bulk::to_item(record)?);
                let value = bulk::encode_collection(&collection)?;
                self.call(self.metadata.name(), "set", self.metadata.set(bulk::COLLECTION_KEY, &value))
                    .await
            }
            // the object write already carried the metadata
            MetadataVariant::NativeObject | MetadataVariant::FilenameToken => Ok(()),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.log_context("delete", Some(id));
        self.ensure_ready().await?;
        let _guard = self.acquire_write_guard().await;

        // every object carrying the id goes, including duplicates hidden from the listing
        let targets: Vec<String> = self
            .locate()
            .await?
            .into_iter()
            .filter(|located| located.record.id == id)
            .map(|located| located.key)
            .collect();
        if targets.is_empty() {
            return Err(Error::NotFound(format!("Photo {} not found", id)));
        }
        let collection = match self.variant {
            MetadataVariant::BulkCollection => self.load_collection().await?.unwrap_or_default(),
            _ => Vec::new(),
        };

        let mut objects_removed = false;
        for key in &targets {
            match self.call(self.objects.name(), "delete", self.objects.delete(key)).await {
                Ok(DeleteOutcome::Deleted) => {
                    objects_removed = true;
                    debug!("Deleted image {}", key);
                }
                Ok(DeleteOutcome::NotFound) => {
                    objects_removed = true;
                    warn!("Image {} was already gone", key);
                }
                Err(e) if self.variant.uses_key_value_store() => {
                    warn!("Failed to delete image {}, removing metadata anyway: {}", key, e);
                }
                Err(e) => return Err(e),
            }
        }

        if !self.variant.uses_key_value_store() {
            info!("Deleted photo {} ({} objects)", id, targets.len());
            return Ok(());
        }

        match self.remove_metadata(id, collection).await {
            Ok(()) => {
                info!("Deleted photo {} ({} objects)", id, targets.len());
                Ok(())
            }
            Err(e) if objects_removed => {
                error!("Deleted images {:?} but failed to remove metadata of {}: {}", targets, id, e);
                Err(Error::PartiallyApplied {
                    operation: "delete".to_string(),
                    id: id.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn remove_metadata(&self, id: &str, mut collection: Vec<Value>) -> Result<()> {
        match self.variant {
            MetadataVariant::SidecarJson => {
                let key = sidecar::key_for(id);
                self.call(self.metadata.name(), "delete", self.metadata.delete(&key))
                    .await
                    .map(|_| ())
            }
            MetadataVariant::BulkCollection => {
                bulk::remove_item(&mut collection, id);
                let value = bulk::encode_collection(&collection)?;
                self.call(self.metadata.name(), "set", self.metadata.set(bulk::COLLECTION_KEY, &value))
                    .await
            }
            MetadataVariant::NativeObject | MetadataVariant::FilenameToken => Ok(()),
        }
    }

    /// Raw items of the bulk collection; `None` when nothing has been stored yet
    async fn load_collection(&self) -> Result<Option<Vec<Value>>> {
        let stored = self
            .call(self.metadata.name(), "get", self.metadata.get(bulk::COLLECTION_KEY))
            .await?;
        match stored {
            None => Ok(None),
            Some(value) => bulk::parse_collection(&value)
                .map(Some)
                .map_err(|e| Error::CorruptCollection(e.to_string())),
        }
    }

    async fn load_sidecars(&self) -> Result<Vec<PhotoRecord>> {
        let keys = self
            .call(self.metadata.name(), "keys", self.metadata.keys(sidecar::KEY_PREFIX))
            .await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let stored = self.call(self.metadata.name(), "get", self.metadata.get(&key)).await?;
            match stored {
                Some(value) => records.push(sidecar::decode(&key, &value)),
                None => debug!("Sidecar {} vanished while listing", key),
            }
        }
        Ok(records)
    }

    /// Objects that may hold photos. Key-value variants also see `{id}{ext}`
    /// objects at the store root, where uploads used to be written.
    async fn photo_objects(&self) -> Result<Vec<ObjectEntry>> {
        if !self.variant.uses_key_value_store() {
            return self
                .call(self.objects.name(), "list", self.objects.list(PHOTO_PREFIX))
                .await;
        }
        let entries = self.call(self.objects.name(), "list", self.objects.list("")).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.key.starts_with(PHOTO_PREFIX) || !entry.key.contains('/'))
            .collect())
    }

    /// Visible photos, deduplicated and in listing order
    async fn reconcile(&self) -> Result<Vec<Located>> {
        let mut located = drop_duplicate_ids(self.locate().await?);
        located.sort_by(|a, b| listing_order(&a.record, &b.record));
        Ok(located)
    }

    /// Every object resolved to a record, duplicates included, in key order
    async fn locate(&self) -> Result<Vec<Located>> {
        let entries = self.photo_objects().await?;

        let located = match self.variant {
            MetadataVariant::SidecarJson => join_with_metadata(entries, self.load_sidecars().await?),
            MetadataVariant::BulkCollection => {
                let records = match self.load_collection().await? {
                    Some(items) => bulk::decode_items(&items),
                    None => Vec::new(),
                };
                join_with_metadata(entries, records)
            }
            MetadataVariant::NativeObject => entries
                .into_iter()
                .map(|entry| Located {
                    record: codec::decode_native(&entry),
                    key: entry.key,
                })
                .collect(),
            MetadataVariant::FilenameToken => entries
                .into_iter()
                .map(|entry| Located {
                    record: codec::decode_from_key(&entry),
                    key: entry.key,
                })
                .collect(),
        };

        Ok(located)
    }
}

pub fn validate_upload(title: &str, description: &str, image_bytes: &[u8]) -> Result<()> {
    if title.is_empty() {
        return Err(Error::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::Validation(format!("Title must be at most {} characters", MAX_TITLE_CHARS)));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(Error::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    if image_bytes.is_empty() {
        return Err(Error::Validation("No image uploaded".to_string()));
    }
    Ok(())
}

/// Join objects with key-value metadata by id. Either side without the other is omitted.
fn join_with_metadata(entries: Vec<ObjectEntry>, metadata: Vec<PhotoRecord>) -> Vec<Located> {
    let mut by_id: HashMap<String, PhotoRecord> = HashMap::new();
    for record in metadata {
        if by_id.contains_key(&record.id) {
            warn!("Duplicate metadata for photo {}, keeping the first", record.id);
            continue;
        }
        by_id.insert(record.id.clone(), record);
    }

    let mut joined = HashSet::new();
    let mut located = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = codec::object_id(&entry.key);
        match by_id.get(&id) {
            Some(record) => {
                joined.insert(id);
                located.push(Located {
                    record: attach_object(record.clone(), &entry),
                    key: entry.key,
                });
            }
            None => debug!("Object {} has no metadata, omitting it", entry.key),
        }
    }
    for id in by_id.keys().filter(|id| !joined.contains(*id)) {
        debug!("Metadata for photo {} has no stored image, omitting it", id);
    }
    located
}

/// Fill what the metadata lacks from the object it was joined with
fn attach_object(mut record: PhotoRecord, entry: &ObjectEntry) -> PhotoRecord {
    if record.is_placeholder() {
        record.upload_date = entry.stored_at;
        record.sort_key = entry.stored_at.timestamp_millis();
        if record.original_name.is_empty() {
            record.original_name = codec::key_file_name(&entry.key).to_string();
        }
    }
    if record.url.is_empty() {
        record.url = entry.locator.clone();
    }
    if record.size == 0 {
        record.size = entry.size;
    }
    record
}

/// Keep the first record per id in key order
fn drop_duplicate_ids(located: Vec<Located>) -> Vec<Located> {
    let mut seen = HashSet::new();
    located
        .into_iter()
        .filter(|l| {
            if seen.insert(l.record.id.clone()) {
                true
            } else {
                warn!("Object {} duplicates photo id {}, omitting it", l.key, l.record.id);
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::datetime_from_millis;

    #[test]
    fn test_validate_upload() {
        assert!(validate_upload("Sunset", "", b"x").is_ok());
        assert!(matches!(validate_upload("", "", b"x"), Err(Error::Validation(_))));
        assert!(matches!(validate_upload(&"t".repeat(201), "", b"x"), Err(Error::Validation(_))));
        assert!(validate_upload(&"é".repeat(200), "", b"x").is_ok());
        assert!(matches!(validate_upload("t", &"d".repeat(2001), b"x"), Err(Error::Validation(_))));
        assert!(matches!(validate_upload("t", "", b""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_attach_object_fills_gaps_only() {
        let entry = ObjectEntry {
            key: "photos/abc.jpg".to_string(),
            locator: "memory://photos/abc.jpg".to_string(),
            size: 99,
            stored_at: datetime_from_millis(5_000),
            attributes: ObjectAttributes::new(),
        };
        let mut record = PhotoRecord::placeholder("abc", "", 0, datetime_from_millis(0));
        record.original_name = String::new();
        let attached = attach_object(record, &entry);
        assert_eq!(attached.url, "memory://photos/abc.jpg");
        assert_eq!(attached.size, 99);
        assert_eq!(attached.sort_key, 5_000);
        assert_eq!(attached.original_name, "abc.jpg");

        let mut exact = attached.clone();
        exact.provenance = Provenance::Exact;
        exact.url = "/uploads/photos/abc.jpg".to_string();
        exact.size = 7;
        exact.sort_key = 1;
        let attached = attach_object(exact, &entry);
        assert_eq!(attached.url, "/uploads/photos/abc.jpg");
        assert_eq!(attached.size, 7);
        assert_eq!(attached.sort_key, 1);
    }
}
