//! # Media Catalog Facade
//!
//! The operation surface of the catalog. Composes identity resolution, the
//! storage engine repositories, the metadata overlay and the notification
//! buses behind one handle with an explicit init/shutdown lifecycle.
//!
//! ## States
//!
//! The facade is `Uninitialized` until [`MediaCatalog::init`] opens the
//! database, then `Idle`, and `Working` while a background rescan runs.
//! Every operation degrades instead of panicking before init: listings come
//! back empty, single-item calls answer `None`/`false`. Storage failures
//! are logged and degrade the same way; the facade never retries them.
//!
//! Targeted operations (add, find, delete one item) stay legal while a
//! rescan is working; only a second full rescan is refused.

use crate::discovery::{DiscoveryDriver, ScanSession};
use crate::error::{Result, ServiceError};
use crate::resolver::{validate_transport_input, IdentityResolver, Resolution};
use catalog_library::db::{create_pool, DatabaseConfig};
use catalog_library::grouping::{group_media, MediaGroup};
use catalog_library::models::{
    peer_group_locator, unix_now, DescriptorOrigin, MediaEntity, MediaId, MediaKind, MediaSource,
    TransportDescriptor, TransportFile,
};
use catalog_library::repositories::{
    meta_keys, ListingFilter, MediaRepository, MetadataRepository, Page, PageRequest,
    SqliteMediaRepository, SqliteMetadataRepository,
};
use catalog_runtime::config::CatalogConfig;
use catalog_runtime::events::{
    DiscoveryEvent, EventBus, MediaEvent, Receiver, ADDED_AUDIO, ADDED_TRANSPORT_FILE, ADDED_VIDEO,
    UPDATE_AUDIO, UPDATE_VIDEO,
};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, instrument, warn};

/// Per-item report of a bulk deletion.
///
/// Items are processed independently; one failure never aborts the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    pub deleted: Vec<MediaId>,
    pub failed: Vec<(MediaId, String)>,
}

struct CatalogInner {
    pool: SqlitePool,
    media: Arc<dyn MediaRepository>,
    meta: Arc<dyn MetadataRepository>,
    resolver: IdentityResolver,
    driver: Option<Arc<dyn DiscoveryDriver>>,
}

/// The catalog handle.
///
/// Safe to share across tasks; all operations take `&self`. Mutations of
/// the same durable id are not serialized here; concurrent writers race
/// last-write-wins, as the overlay contract states.
pub struct MediaCatalog {
    config: CatalogConfig,
    inner: RwLock<Option<CatalogInner>>,
    events: EventBus,
    working: Arc<AtomicBool>,
    banned: Mutex<HashSet<String>>,
}

fn added_mask(entity: &MediaEntity) -> u32 {
    let mut mask = match entity.kind {
        MediaKind::Video => ADDED_VIDEO,
        MediaKind::Audio => ADDED_AUDIO,
        _ => 0,
    };
    if entity.is_hash_addressed() {
        mask |= ADDED_TRANSPORT_FILE;
    }
    mask
}

fn updated_mask(entity: &MediaEntity) -> u32 {
    match entity.kind {
        MediaKind::Video => UPDATE_VIDEO,
        MediaKind::Audio => UPDATE_AUDIO,
        _ => 0,
    }
}

/// Validation failures are producer bugs: log them in release, fail loudly
/// in debug builds.
fn reject_producer_input(error: &ServiceError) {
    warn!(error = %error, "rejected producer input");
    debug_assert!(false, "invalid producer input: {error}");
}

impl MediaCatalog {
    /// Creates an uninitialized catalog handle.
    pub fn new(config: CatalogConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        Self {
            config,
            inner: RwLock::new(None),
            events,
            working: Arc::new(AtomicBool::new(false)),
            banned: Mutex::new(HashSet::new()),
        }
    }

    /// Opens the catalog database and brings the facade to `Idle`.
    ///
    /// Initializing an already initialized catalog is a logged no-op.
    pub async fn init(&self) -> Result<()> {
        let mut guard = self.inner.write().await;
        if guard.is_some() {
            warn!("catalog already initialized");
            return Ok(());
        }

        let pool = create_pool(DatabaseConfig::new(&self.config.database_path)).await?;
        let media: Arc<dyn MediaRepository> = Arc::new(SqliteMediaRepository::new(pool.clone()));
        let meta: Arc<dyn MetadataRepository> =
            Arc::new(SqliteMetadataRepository::new(pool.clone()));
        let resolver = IdentityResolver::new(media.clone(), self.config.storage_mounts.clone());

        *guard = Some(CatalogInner {
            pool,
            media,
            meta,
            resolver,
            driver: None,
        });
        info!("media catalog initialized");
        Ok(())
    }

    /// Closes the database and returns the facade to `Uninitialized`.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.write().await;
        if let Some(inner) = guard.take() {
            inner.pool.close().await;
            self.working.store(false, Ordering::SeqCst);
            info!("media catalog shut down");
        }
    }

    /// The configuration this catalog was built with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The notification buses.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to entity change notifications.
    pub fn subscribe_media(&self) -> Receiver<MediaEvent> {
        self.events.subscribe_media()
    }

    /// Subscribes to discovery and entry-point notifications.
    pub fn subscribe_discovery(&self) -> Receiver<DiscoveryEvent> {
        self.events.subscribe_discovery()
    }

    /// True while a background rescan is running.
    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    fn emit_media(&self, event: MediaEvent) {
        self.events.emit_media(event).ok();
    }

    fn emit_discovery(&self, event: DiscoveryEvent) {
        self.events.emit_discovery(event).ok();
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Adds the media behind `locator`, or returns the durable entity it
    /// already resolves to. `None` when uninitialized or the locator is
    /// unusable.
    pub async fn add_media(&self, locator: &str) -> Option<MediaEntity> {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            debug!("add_media on uninitialized catalog");
            return None;
        };

        let candidate = MediaEntity::from_locator(locator);
        match inner.resolver.resolve(&candidate).await {
            Ok(Resolution::Durable(existing)) => Some(existing),
            Ok(Resolution::NoMatch) => {
                let mut entity = candidate;
                entity.mark_seen(unix_now());
                match inner.media.insert(&entity).await {
                    Ok(id) => {
                        entity.id = id;
                        self.emit_media(MediaEvent::Added {
                            ids: vec![id.0],
                            mask: added_mask(&entity),
                        });
                        Some(entity)
                    }
                    Err(e) => {
                        warn!(locator, error = %e, "failed to persist media");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(locator, error = %e, "add_media rejected");
                None
            }
        }
    }

    /// Ensures the catalog holds an entity for a transport descriptor,
    /// addressed by the bundle's display locator.
    pub async fn add_transport_descriptor(
        &self,
        descriptor: &TransportDescriptor,
    ) -> Option<MediaEntity> {
        let guard = self.inner.read().await;
        let inner = guard.as_ref()?;

        if descriptor.content_hash.trim().is_empty() {
            reject_producer_input(&ServiceError::Validation(
                "transport descriptor carries no content hash".to_string(),
            ));
            return None;
        }

        let locator = peer_group_locator(&descriptor.content_hash);
        match inner.media.find_by_uri(&locator).await {
            Ok(Some(existing)) => return Some(existing),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "descriptor lookup failed");
                return None;
            }
        }

        let mut entity = MediaEntity::new(
            MediaSource::Regular { uri: locator },
            MediaKind::TransportDescriptor,
        );
        if let Some(name) = &descriptor.display_name {
            entity.set_title(name);
        }
        entity.mark_seen(unix_now());

        match inner.media.insert(&entity).await {
            Ok(id) => {
                entity.id = id;
                self.emit_media(MediaEvent::Added {
                    ids: vec![id.0],
                    mask: 0,
                });
                Some(entity)
            }
            Err(e) => {
                warn!(error = %e, "failed to persist transport descriptor");
                None
            }
        }
    }

    /// Adds one file selected out of a transport descriptor.
    ///
    /// Validates the producer input, derives the kind from the declared
    /// MIME type, assigns the internal-storage sentinel parent when the
    /// descriptor came from internal storage and no parent was supplied,
    /// then persists and tags the record with its hash/index/live overlay
    /// metadata. Re-adding an already cataloged `(hash, index)` pair
    /// resolves to the existing durable entity instead of duplicating it.
    #[instrument(skip_all, fields(hash = %descriptor.content_hash, index = file.index))]
    pub async fn add_hash_addressed_media(
        &self,
        parent: Option<MediaId>,
        descriptor: &TransportDescriptor,
        file: &TransportFile,
    ) -> Option<MediaEntity> {
        let guard = self.inner.read().await;
        let inner = guard.as_ref()?;

        if let Err(e) = validate_transport_input(descriptor, file) {
            reject_producer_input(&e);
            return None;
        }

        match inner
            .media
            .find_by_hash(&descriptor.content_hash, file.index)
            .await
        {
            Ok(Some(existing)) => return Some(existing),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "hash lookup failed");
                return None;
            }
        }

        let kind = file
            .mime_type
            .as_deref()
            .and_then(MediaKind::from_mime)
            .or_else(|| {
                file.filename
                    .rsplit_once('.')
                    .and_then(|(_, ext)| MediaKind::from_extension(ext))
            })
            .unwrap_or(MediaKind::Video);

        let parent = parent.or_else(|| {
            matches!(descriptor.origin, DescriptorOrigin::InternalStorage)
                .then_some(MediaId::INTERNAL_PARENT)
        });

        let mut entity = MediaEntity::hash_addressed(
            descriptor.content_hash.clone(),
            file.index,
            parent,
            descriptor.live,
            kind,
        );
        entity.set_title(&file.filename);
        entity.mark_seen(unix_now());

        let id = match inner.media.insert(&entity).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to persist hash-addressed media");
                return None;
            }
        };
        entity.id = id;

        // Mirror the addressing data into the overlay for key-based consumers.
        for result in [
            inner
                .meta
                .set_string(id, meta_keys::CONTENT_HASH, &descriptor.content_hash)
                .await,
            inner
                .meta
                .set_long(id, meta_keys::FILE_INDEX, file.index as i64)
                .await,
            inner
                .meta
                .set_long(id, meta_keys::IS_LIVE, descriptor.live.as_raw())
                .await,
        ] {
            if let Err(e) = result {
                warn!(error = %e, "failed to tag overlay metadata");
            }
        }

        self.emit_media(MediaEvent::Added {
            ids: vec![id.0],
            mask: added_mask(&entity),
        });
        Some(entity)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Fetches an entity by id.
    pub async fn media(&self, id: MediaId) -> Option<MediaEntity> {
        let guard = self.inner.read().await;
        let inner = guard.as_ref()?;
        match inner.media.find_by_id(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(%id, error = %e, "lookup failed");
                None
            }
        }
    }

    /// Resolves a candidate to its durable entity, or hands the candidate
    /// back unchanged. Never fabricates an id.
    pub async fn find_media(&self, candidate: &MediaEntity) -> MediaEntity {
        if !candidate.is_transient() {
            return candidate.clone();
        }
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return candidate.clone();
        };
        match inner.resolver.resolve(candidate).await {
            Ok(Resolution::Durable(entity)) => entity,
            Ok(Resolution::NoMatch) => candidate.clone(),
            Err(e) => {
                debug!(error = %e, "find_media fell back to the candidate");
                candidate.clone()
            }
        }
    }

    /// Entities selected out of the bundle with this hash; a file index
    /// narrows the answer to that single entry.
    pub async fn find_by_content_hash(
        &self,
        content_hash: &str,
        file_index: Option<u32>,
    ) -> Vec<MediaEntity> {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return Vec::new();
        };
        let result = match file_index {
            Some(index) => inner
                .media
                .find_by_hash(content_hash, index)
                .await
                .map(|found| found.into_iter().collect()),
            None => inner.media.find_all_by_hash(content_hash).await,
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "hash listing failed");
            Vec::new()
        })
    }

    /// Entities sharing a content hash with at least one sibling.
    pub async fn find_duplicate_content_hashes(&self) -> Vec<MediaEntity> {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return Vec::new();
        };
        inner.media.find_duplicate_hashes().await.unwrap_or_else(|e| {
            warn!(error = %e, "duplicate scan failed");
            Vec::new()
        })
    }

    /// Children of a transport descriptor.
    pub async fn find_by_parent(&self, parent: MediaId) -> Vec<MediaEntity> {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return Vec::new();
        };
        inner.media.find_by_parent(parent).await.unwrap_or_else(|e| {
            warn!(error = %e, "parent listing failed");
            Vec::new()
        })
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Writes a refreshed entity back to the catalog.
    pub async fn update_media(&self, entity: &MediaEntity) -> bool {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return false;
        };
        match inner.media.update(entity).await {
            Ok(()) => {
                self.emit_media(MediaEvent::Updated {
                    ids: vec![entity.id.0],
                    mask: updated_mask(entity),
                });
                true
            }
            Err(e) => {
                warn!(id = %entity.id, error = %e, "update failed");
                false
            }
        }
    }

    /// Deletes an entity. Deleting a transport descriptor cascades to the
    /// files selected out of it.
    pub async fn delete_media(&self, id: MediaId) -> bool {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return false;
        };

        let mut removed = Vec::new();
        if let Ok(Some(entity)) = inner.media.find_by_id(id).await {
            if entity.kind == MediaKind::TransportDescriptor {
                match inner.media.find_by_parent(id).await {
                    Ok(children) => {
                        for child in children {
                            match inner.media.delete(child.id).await {
                                Ok(true) => removed.push(child.id.0),
                                Ok(false) => {}
                                Err(e) => {
                                    warn!(id = %child.id, error = %e, "cascade delete failed")
                                }
                            }
                        }
                    }
                    Err(e) => warn!(%id, error = %e, "child listing failed"),
                }
            }
        }

        let deleted = match inner.media.delete(id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(%id, error = %e, "delete failed");
                false
            }
        };
        if deleted {
            removed.push(id.0);
        }
        if !removed.is_empty() {
            self.emit_media(MediaEvent::Deleted { ids: removed });
        }
        deleted
    }

    /// Deletes a batch, item by item. Failures are collected per item
    /// rather than aborting the batch.
    pub async fn delete_media_batch(&self, ids: &[MediaId]) -> BatchDeleteOutcome {
        let results = futures::future::join_all(
            ids.iter().map(|id| async move { (*id, self.delete_media(*id).await) }),
        )
        .await;

        let mut outcome = BatchDeleteOutcome::default();
        for (id, deleted) in results {
            if deleted {
                outcome.deleted.push(id);
            } else {
                outcome
                    .failed
                    .push((id, "entity not found or not deletable".to_string()));
            }
        }
        outcome
    }

    /// Copies the whole metadata overlay of one entity onto another.
    pub async fn copy_metadata(&self, source: MediaId, dest: MediaId) -> bool {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return false;
        };
        inner.meta.copy_all(source, dest).await.unwrap_or_else(|e| {
            warn!(%source, %dest, error = %e, "metadata copy failed");
            false
        })
    }

    /// Deletes transport descriptors with zero remaining children.
    pub async fn remove_orphan_transport_descriptors(&self) -> bool {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return false;
        };
        match inner.media.remove_orphan_descriptors().await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "removed orphan transport descriptors");
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "orphan cleanup failed");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Overlay metadata
    // ------------------------------------------------------------------

    pub async fn get_meta_long(&self, id: MediaId, key: &str) -> i64 {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return 0;
        };
        inner.meta.get_long(id, key).await.unwrap_or_else(|e| {
            warn!(%id, key, error = %e, "overlay read failed");
            0
        })
    }

    pub async fn get_meta_string(&self, id: MediaId, key: &str) -> Option<String> {
        let guard = self.inner.read().await;
        let inner = guard.as_ref()?;
        inner.meta.get_string(id, key).await.unwrap_or_else(|e| {
            warn!(%id, key, error = %e, "overlay read failed");
            None
        })
    }

    pub async fn set_meta_long(&self, id: MediaId, key: &str, value: i64) -> bool {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return false;
        };
        inner.meta.set_long(id, key, value).await.unwrap_or_else(|e| {
            warn!(%id, key, error = %e, "overlay write failed");
            false
        })
    }

    pub async fn set_meta_string(&self, id: MediaId, key: &str, value: &str) -> bool {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return false;
        };
        inner
            .meta
            .set_string(id, key, value)
            .await
            .unwrap_or_else(|e| {
                warn!(%id, key, error = %e, "overlay write failed");
                false
            })
    }

    // ------------------------------------------------------------------
    // Listings and grouping
    // ------------------------------------------------------------------

    async fn listing(
        &self,
        kind: MediaKind,
        filter: ListingFilter,
        page: PageRequest,
        recent: bool,
    ) -> Page<MediaEntity> {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return Page::empty(page);
        };
        let result = if recent {
            inner.media.list_recent(kind, filter, page).await
        } else {
            inner.media.list(kind, filter, page).await
        };
        result.unwrap_or_else(|e| {
            warn!(%kind, error = %e, "listing failed");
            Page::empty(page)
        })
    }

    pub async fn videos(&self, filter: ListingFilter, page: PageRequest) -> Page<MediaEntity> {
        self.listing(MediaKind::Video, filter, page, false).await
    }

    pub async fn audio(&self, filter: ListingFilter, page: PageRequest) -> Page<MediaEntity> {
        self.listing(MediaKind::Audio, filter, page, false).await
    }

    pub async fn recent_videos(
        &self,
        filter: ListingFilter,
        page: PageRequest,
    ) -> Page<MediaEntity> {
        self.listing(MediaKind::Video, filter, page, true).await
    }

    pub async fn recent_audio(
        &self,
        filter: ListingFilter,
        page: PageRequest,
    ) -> Page<MediaEntity> {
        self.listing(MediaKind::Audio, filter, page, true).await
    }

    /// Clusters entities into display groups with the configured minimum
    /// prefix threshold. Pure; usable in any facade state.
    pub fn group_media(&self, entries: &[MediaEntity]) -> Vec<MediaGroup> {
        group_media(entries, self.config.min_group_prefix_len)
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Registers the bulk discovery driver rescans will run.
    pub async fn register_discovery_driver(&self, driver: Arc<dyn DiscoveryDriver>) -> bool {
        let mut guard = self.inner.write().await;
        let Some(inner) = guard.as_mut() else {
            return false;
        };
        inner.driver = Some(driver);
        true
    }

    /// Starts a full rescan in the background.
    ///
    /// Refused (returning `false`) when the catalog is uninitialized, has
    /// no driver, or is already working; overlapping full scans are a
    /// no-op by design of the state machine.
    #[instrument(skip_all)]
    pub async fn force_rescan(&self) -> bool {
        let guard = self.inner.read().await;
        let Some(inner) = guard.as_ref() else {
            return false;
        };
        let Some(driver) = inner.driver.clone() else {
            warn!("force_rescan without a registered discovery driver");
            return false;
        };
        drop(guard);

        if self.working.swap(true, Ordering::SeqCst) {
            debug!("rescan already in progress, request ignored");
            return false;
        }
        self.emit_discovery(DiscoveryEvent::WorkingChanged { working: true });

        let session = ScanSession::new();
        info!(session = %session.id, "starting full rescan");

        let events = self.events.clone();
        let working = self.working.clone();
        let (tx, mut rx) = mpsc::channel::<String>(16);

        tokio::spawn(async move {
            let forward = {
                let events = events.clone();
                let session = session.clone();
                async move {
                    while let Some(entry_point) = rx.recv().await {
                        events
                            .emit_discovery(DiscoveryEvent::Progress {
                                session: session.id.clone(),
                                entry_point,
                            })
                            .ok();
                    }
                }
            };
            let (_, result) = tokio::join!(forward, driver.discover(session.clone(), tx));
            match result {
                Ok(stats) => info!(
                    session = %session.id,
                    seen = stats.entries_seen,
                    added = stats.entries_added,
                    "rescan completed"
                ),
                Err(e) => warn!(session = %session.id, error = %e, "rescan failed"),
            }
            events
                .emit_discovery(DiscoveryEvent::Completed {
                    session: session.id.clone(),
                })
                .ok();
            working.store(false, Ordering::SeqCst);
            events
                .emit_discovery(DiscoveryEvent::WorkingChanged { working: false })
                .ok();
        });
        true
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Bans an entry point from future discovery.
    pub async fn ban_entry_point(&self, path: &str) -> bool {
        if self.inner.read().await.is_none() {
            return false;
        }
        let inserted = self.banned.lock().unwrap().insert(path.to_string());
        if inserted {
            self.emit_discovery(DiscoveryEvent::EntryPointBanned {
                path: path.to_string(),
            });
        }
        inserted
    }

    /// Lifts a ban.
    pub async fn unban_entry_point(&self, path: &str) -> bool {
        if self.inner.read().await.is_none() {
            return false;
        }
        let removed = self.banned.lock().unwrap().remove(path);
        if removed {
            self.emit_discovery(DiscoveryEvent::EntryPointUnbanned {
                path: path.to_string(),
            });
        }
        removed
    }

    /// Removes an entry point from the catalog's discovery roots.
    pub async fn remove_entry_point(&self, path: &str) -> bool {
        if self.inner.read().await.is_none() {
            return false;
        }
        self.banned.lock().unwrap().remove(path);
        self.emit_discovery(DiscoveryEvent::EntryPointRemoved {
            path: path.to_string(),
        });
        true
    }

    /// True when discovery must skip this entry point.
    pub async fn is_entry_point_banned(&self, path: &str) -> bool {
        self.banned.lock().unwrap().contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryStats;
    use async_trait::async_trait;
    use catalog_library::models::LiveState;
    use catalog_runtime::events::{ADDED_AUDIO, ADDED_TRANSPORT_FILE, ADDED_VIDEO};
    use tokio::sync::Notify;

    fn config() -> CatalogConfig {
        CatalogConfig::builder()
            .database_path(":memory:")
            .build()
            .unwrap()
    }

    async fn catalog() -> MediaCatalog {
        let catalog = MediaCatalog::new(config());
        catalog.init().await.unwrap();
        catalog
    }

    fn descriptor(hash: &str) -> TransportDescriptor {
        TransportDescriptor::new(hash, DescriptorOrigin::UserStorage).with_live(LiveState::No)
    }

    fn video_file(index: u32, name: &str) -> TransportFile {
        TransportFile::new(index, name).with_mime_type("video/mp4")
    }

    #[tokio::test]
    async fn test_uninitialized_catalog_degrades() {
        let catalog = MediaCatalog::new(config());

        assert!(catalog.add_media("file:///a.mp4").await.is_none());
        assert!(catalog.videos(ListingFilter::default(), PageRequest::default()).await.is_empty());
        assert!(!catalog.delete_media(MediaId(1)).await);
        assert_eq!(catalog.get_meta_long(MediaId(1), "x").await, 0);
        assert!(!catalog.set_meta_long(MediaId(1), "x", 1).await);
        assert!(!catalog.force_rescan().await);
        assert!(!catalog.ban_entry_point("/media").await);

        let candidate = MediaEntity::from_locator("file:///a.mp4");
        let found = catalog.find_media(&candidate).await;
        assert!(found.is_transient());
    }

    #[tokio::test]
    async fn test_add_media_resolves_duplicates() {
        let catalog = catalog().await;

        let first = catalog.add_media("file:///movies/a.mp4").await.unwrap();
        assert!(!first.is_transient());
        assert_eq!(first.kind, MediaKind::Video);

        let second = catalog.add_media("file:///movies/a.mp4").await.unwrap();
        assert_eq!(second.id, first.id);

        let page = catalog
            .videos(ListingFilter::default(), PageRequest::default())
            .await;
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_add_media_emits_added_event() {
        let catalog = catalog().await;
        let mut events = catalog.subscribe_media();

        let video = catalog.add_media("file:///movies/a.mp4").await.unwrap();
        let audio = catalog.add_media("file:///music/b.flac").await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            MediaEvent::Added {
                ids: vec![video.id.0],
                mask: ADDED_VIDEO,
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            MediaEvent::Added {
                ids: vec![audio.id.0],
                mask: ADDED_AUDIO,
            }
        );
    }

    #[tokio::test]
    async fn test_add_media_rejects_proxy_placeholder() {
        let catalog = catalog().await;
        assert!(catalog.add_media("proxy://session/1/stream").await.is_none());
    }

    #[tokio::test]
    async fn test_hash_addressed_ingestion_scenario() {
        let catalog = catalog().await;
        let mut events = catalog.subscribe_media();

        let entity = catalog
            .add_hash_addressed_media(None, &descriptor("abc123"), &video_file(0, "ep1.mp4"))
            .await
            .unwrap();

        assert_eq!(entity.kind, MediaKind::Video);
        assert!(entity.is_hash_addressed());
        assert!(!entity.is_transient());
        assert_eq!(entity.title(), Some("ep1.mp4"));

        // The overlay mirrors the addressing data.
        assert_eq!(
            catalog
                .get_meta_string(entity.id, meta_keys::CONTENT_HASH)
                .await,
            Some("abc123".to_string())
        );
        assert_eq!(
            catalog.get_meta_long(entity.id, meta_keys::FILE_INDEX).await,
            0
        );
        assert_eq!(
            catalog.get_meta_long(entity.id, meta_keys::IS_LIVE).await,
            LiveState::No.as_raw()
        );

        // A second add with the same (hash, index) resolves to the same
        // durable id instead of duplicating.
        let again = catalog
            .add_hash_addressed_media(None, &descriptor("abc123"), &video_file(0, "ep1.mp4"))
            .await
            .unwrap();
        assert_eq!(again.id, entity.id);

        match events.recv().await.unwrap() {
            MediaEvent::Added { ids, mask } => {
                assert_eq!(ids, vec![entity.id.0]);
                assert_eq!(mask, ADDED_VIDEO | ADDED_TRANSPORT_FILE);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_internal_origin_gets_sentinel_parent() {
        let catalog = catalog().await;
        let internal = TransportDescriptor::new("int456", DescriptorOrigin::InternalStorage);

        let entity = catalog
            .add_hash_addressed_media(None, &internal, &video_file(0, "a.mp4"))
            .await
            .unwrap();

        match &entity.source {
            MediaSource::HashAddressed { parent, .. } => {
                assert_eq!(*parent, Some(MediaId::INTERNAL_PARENT));
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_explicit_parent_wins_over_sentinel() {
        let catalog = catalog().await;
        let internal = TransportDescriptor::new("int789", DescriptorOrigin::InternalStorage);

        let entity = catalog
            .add_hash_addressed_media(Some(MediaId(7)), &internal, &video_file(0, "a.mp4"))
            .await
            .unwrap();

        match &entity.source {
            MediaSource::HashAddressed { parent, .. } => {
                assert_eq!(*parent, Some(MediaId(7)));
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[tokio::test]
    #[should_panic(expected = "invalid producer input")]
    async fn test_empty_filename_fails_loudly_in_debug() {
        let catalog = catalog().await;
        catalog
            .add_hash_addressed_media(None, &descriptor("abc123"), &TransportFile::new(0, "  "))
            .await;
    }

    #[tokio::test]
    #[should_panic(expected = "invalid producer input")]
    async fn test_proxy_filename_fails_loudly_in_debug() {
        let catalog = catalog().await;
        catalog
            .add_hash_addressed_media(
                None,
                &descriptor("abc123"),
                &TransportFile::new(0, "proxy://session/0/ep1.mp4"),
            )
            .await;
    }

    #[tokio::test]
    async fn test_find_media_never_fabricates_ids() {
        let catalog = catalog().await;
        let known = catalog.add_media("file:///movies/a.mp4").await.unwrap();

        let candidate = MediaEntity::from_locator("file:///movies/a.mp4");
        assert_eq!(catalog.find_media(&candidate).await.id, known.id);

        let unknown = MediaEntity::from_locator("file:///movies/unknown.mp4");
        let found = catalog.find_media(&unknown).await;
        assert!(found.is_transient());
        assert_eq!(found, unknown);
    }

    #[tokio::test]
    async fn test_delete_descriptor_cascades_to_children() {
        let catalog = catalog().await;
        let parent = catalog
            .add_transport_descriptor(&descriptor("casc"))
            .await
            .unwrap();
        let child_a = catalog
            .add_hash_addressed_media(Some(parent.id), &descriptor("casc"), &video_file(0, "a.mp4"))
            .await
            .unwrap();
        let child_b = catalog
            .add_hash_addressed_media(Some(parent.id), &descriptor("casc"), &video_file(1, "b.mp4"))
            .await
            .unwrap();

        let mut events = catalog.subscribe_media();
        assert!(catalog.delete_media(parent.id).await);

        assert!(catalog.media(parent.id).await.is_none());
        assert!(catalog.media(child_a.id).await.is_none());
        assert!(catalog.media(child_b.id).await.is_none());

        match events.recv().await.unwrap() {
            MediaEvent::Deleted { ids } => {
                assert_eq!(ids.len(), 3);
                assert!(ids.contains(&parent.id.0));
                assert!(ids.contains(&child_a.id.0));
                assert!(ids.contains(&child_b.id.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_delete_reports_per_item() {
        let catalog = catalog().await;
        let a = catalog.add_media("file:///movies/a.mp4").await.unwrap();
        let b = catalog.add_media("file:///movies/b.mp4").await.unwrap();

        let outcome = catalog
            .delete_media_batch(&[a.id, MediaId(9999), b.id])
            .await;

        assert_eq!(outcome.deleted.len(), 2);
        assert!(outcome.deleted.contains(&a.id));
        assert!(outcome.deleted.contains(&b.id));
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, MediaId(9999));
    }

    #[tokio::test]
    async fn test_copy_metadata() {
        let catalog = catalog().await;
        let a = catalog.add_media("file:///movies/a.mp4").await.unwrap();
        let b = catalog.add_media("file:///movies/b.mp4").await.unwrap();

        assert!(catalog.set_meta_long(a.id, "watch_count", 3).await);
        assert!(catalog.set_meta_string(a.id, "source", "scan").await);
        assert!(catalog.copy_metadata(a.id, b.id).await);

        assert_eq!(catalog.get_meta_long(b.id, "watch_count").await, 3);
        assert_eq!(
            catalog.get_meta_string(b.id, "source").await,
            Some("scan".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_orphan_descriptors() {
        let catalog = catalog().await;
        let kept = catalog
            .add_transport_descriptor(&descriptor("kept"))
            .await
            .unwrap();
        catalog
            .add_hash_addressed_media(Some(kept.id), &descriptor("kept"), &video_file(0, "a.mp4"))
            .await
            .unwrap();
        let orphan = catalog
            .add_transport_descriptor(&descriptor("orphan"))
            .await
            .unwrap();

        assert!(catalog.remove_orphan_transport_descriptors().await);
        assert!(catalog.media(orphan.id).await.is_none());
        assert!(catalog.media(kept.id).await.is_some());
    }

    #[tokio::test]
    async fn test_listings_filter_dimensions() {
        let catalog = catalog().await;
        catalog.add_media("file:///movies/plain.mp4").await.unwrap();
        catalog.add_media("file:///music/song.flac").await.unwrap();
        catalog
            .add_hash_addressed_media(None, &descriptor("h1"), &video_file(0, "peer.mp4"))
            .await
            .unwrap();

        let videos = catalog
            .videos(ListingFilter::default(), PageRequest::default())
            .await;
        assert_eq!(videos.total, 2);

        let hashed = catalog
            .videos(
                ListingFilter::default().hash_addressed(true),
                PageRequest::default(),
            )
            .await;
        assert_eq!(hashed.total, 1);

        let audio = catalog
            .audio(ListingFilter::default(), PageRequest::default())
            .await;
        assert_eq!(audio.total, 1);

        let recent = catalog
            .recent_videos(ListingFilter::default(), PageRequest::default())
            .await;
        assert_eq!(recent.total, 2);
    }

    #[tokio::test]
    async fn test_group_media_uses_configured_threshold() {
        let catalog = catalog().await;
        let mut a = MediaEntity::from_locator("file:///m/a.mp4");
        a.set_title("Alpha Series One");
        let mut b = MediaEntity::from_locator("file:///m/b.mp4");
        b.set_title("Alpha Series Two");

        let groups = catalog.group_media(&[a, b]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title(), "Alpha Series ");
    }

    struct GatedDriver {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl DiscoveryDriver for GatedDriver {
        async fn discover(
            &self,
            _session: ScanSession,
            progress: mpsc::Sender<String>,
        ) -> Result<DiscoveryStats> {
            progress.send("/media/videos".to_string()).await.ok();
            self.release.notified().await;
            Ok(DiscoveryStats {
                entries_seen: 1,
                entries_added: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_rescan_state_machine() {
        let catalog = catalog().await;
        let release = Arc::new(Notify::new());
        catalog
            .register_discovery_driver(Arc::new(GatedDriver {
                release: release.clone(),
            }))
            .await;

        let mut events = catalog.subscribe_discovery();

        assert!(catalog.force_rescan().await);
        assert!(catalog.is_working());

        // A second full rescan while working is a no-op.
        assert!(!catalog.force_rescan().await);

        assert_eq!(
            events.recv().await.unwrap(),
            DiscoveryEvent::WorkingChanged { working: true }
        );
        let session = match events.recv().await.unwrap() {
            DiscoveryEvent::Progress {
                session,
                entry_point,
            } => {
                assert_eq!(entry_point, "/media/videos");
                session
            }
            other => panic!("unexpected event {other:?}"),
        };

        release.notify_one();

        assert_eq!(
            events.recv().await.unwrap(),
            DiscoveryEvent::Completed {
                session: session.clone()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DiscoveryEvent::WorkingChanged { working: false }
        );
        assert!(!catalog.is_working());

        // Idle again: a new rescan is accepted.
        release.notify_one();
        assert!(catalog.force_rescan().await);
    }

    #[tokio::test]
    async fn test_rescan_without_driver_is_refused() {
        let catalog = catalog().await;
        assert!(!catalog.force_rescan().await);
        assert!(!catalog.is_working());
    }

    #[tokio::test]
    async fn test_entry_point_ban_cycle() {
        let catalog = catalog().await;
        let mut events = catalog.subscribe_discovery();

        assert!(catalog.ban_entry_point("/media/private").await);
        assert!(catalog.is_entry_point_banned("/media/private").await);
        // Banning twice changes nothing.
        assert!(!catalog.ban_entry_point("/media/private").await);

        assert!(catalog.unban_entry_point("/media/private").await);
        assert!(!catalog.is_entry_point_banned("/media/private").await);

        assert!(catalog.remove_entry_point("/media/old").await);

        assert_eq!(
            events.recv().await.unwrap(),
            DiscoveryEvent::EntryPointBanned {
                path: "/media/private".to_string()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DiscoveryEvent::EntryPointUnbanned {
                path: "/media/private".to_string()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DiscoveryEvent::EntryPointRemoved {
                path: "/media/old".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_returns_to_uninitialized() {
        let catalog = catalog().await;
        assert!(catalog.add_media("file:///movies/a.mp4").await.is_some());

        catalog.shutdown().await;
        assert!(catalog.add_media("file:///movies/b.mp4").await.is_none());
        assert!(catalog
            .videos(ListingFilter::default(), PageRequest::default())
            .await
            .is_empty());
    }
}
