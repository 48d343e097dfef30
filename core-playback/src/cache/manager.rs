//! # Track Cache Manager
//!
//! Stores fetched audio per track id with the time it was stored.
//!
//! Storage failures never reach callers. If the store cannot be opened the
//! cache switches to [`CacheState::Disabled`] and behaves as an empty cache:
//! lookups miss and writes are dropped.

use crate::cache::{
    config::CacheConfig,
    stats::{CacheCounters, CacheStats},
};
use crate::error::{PlaybackError, Result};
use bridge_traits::{
    storage::{BlobStore, StoredBlob},
    time::Clock,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_library::models::TrackId;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A cached blob and the time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub track_id: TrackId,
    pub data: Bytes,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the entry at `now`. Entries stamped in the future have age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.cached_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Lifecycle of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    /// `initialize` has not completed yet; behaves as empty.
    Uninitialized,
    /// Storage is open.
    Ready,
    /// Storage is unusable or the cache is switched off; behaves as empty.
    Disabled { reason: String },
}

impl CacheState {
    pub fn is_ready(&self) -> bool {
        matches!(self, CacheState::Ready)
    }
}

/// Age-evicted cache of track audio.
pub struct TrackCache {
    config: CacheConfig,
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState>,
    memory: Option<Mutex<LruCache<TrackId, CacheEntry>>>,
    counters: CacheCounters,
    event_bus: Option<EventBus>,
}

impl TrackCache {
    /// Create a cache over `store`. Call [`initialize`](Self::initialize) before use.
    pub fn new(config: CacheConfig, store: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        let memory = NonZeroUsize::new(config.memory_capacity)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        Self {
            config,
            store,
            clock,
            state: RwLock::new(CacheState::Uninitialized),
            memory,
            counters: CacheCounters::default(),
            event_bus: None,
        }
    }

    /// Set event bus for cache events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> CacheState {
        self.state.read().clone()
    }

    /// Open the backing store.
    ///
    /// On failure the cache is disabled and the error is returned for logging;
    /// the cache stays safe to use.
    #[instrument(skip(self), fields(namespace = %self.config.namespace))]
    pub async fn initialize(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Track cache disabled by configuration");
            self.disable("disabled by configuration");
            return Ok(());
        }

        if let Err(reason) = self.config.validate() {
            let reason = format!("invalid cache configuration: {}", reason);
            self.disable(&reason);
            return Err(PlaybackError::CacheError(reason));
        }

        if let Err(e) = self.store.open().await {
            let reason = format!("storage unavailable: {}", e);
            self.disable(&reason);
            return Err(PlaybackError::CacheError(reason));
        }

        *self.state.write() = CacheState::Ready;

        let entries = match self.store.entries().await {
            Ok(entries) => entries.iter().filter(|e| self.owns(&e.key)).count(),
            Err(e) => {
                warn!(error = %e, "Could not count cached tracks");
                0
            }
        };

        info!(entries, "Track cache ready");
        self.emit(CacheEvent::Initialized { entries });
        Ok(())
    }

    /// Look up a track. Never fails; any problem reads as a miss.
    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn get(&self, track_id: &TrackId) -> Option<CacheEntry> {
        if !self.state.read().is_ready() {
            self.counters.miss();
            return None;
        }

        if let Some(entry) = self.memory_get(track_id) {
            debug!("Served from memory");
            self.record_hit(track_id);
            return Some(entry);
        }

        match self.store.get(&self.key_for(track_id)).await {
            Ok(Some(blob)) => {
                let entry = CacheEntry {
                    track_id: track_id.clone(),
                    data: blob.data,
                    cached_at: blob.stored_at,
                };
                self.memory_put(entry.clone());
                self.record_hit(track_id);
                Some(entry)
            }
            Ok(None) => {
                self.record_miss(track_id);
                None
            }
            Err(e) => {
                warn!(error = %e, "Cache read failed, treating as miss");
                self.record_miss(track_id);
                None
            }
        }
    }

    /// Store `data` for a track, replacing any previous entry.
    ///
    /// Dropped silently when the cache is not ready; storage errors are logged.
    #[instrument(skip(self, data), fields(track_id = %track_id, bytes = data.len()))]
    pub async fn put(&self, track_id: &TrackId, data: Bytes) {
        if !self.state.read().is_ready() {
            debug!("Cache not ready, skipping write");
            return;
        }

        let cached_at = self.clock.now();
        let blob = StoredBlob::new(data.clone(), cached_at);
        let bytes = blob.size();

        match self.store.put(&self.key_for(track_id), blob).await {
            Ok(()) => {
                self.memory_put(CacheEntry {
                    track_id: track_id.clone(),
                    data,
                    cached_at,
                });
                self.counters.write();
                debug!("Track cached");
                self.emit(CacheEvent::Stored {
                    track_id: track_id.to_string(),
                    bytes,
                });
            }
            Err(e) => {
                // A stale copy must not survive a failed overwrite.
                self.memory_remove(track_id);
                warn!(error = %e, "Cache write failed");
            }
        }
    }

    /// Remove every entry with `now - cached_at > max_age`.
    ///
    /// Returns how many entries were removed. Best-effort: failures are
    /// logged and leave the affected entries in place.
    #[instrument(skip(self), fields(max_age_secs = max_age.as_secs()))]
    pub async fn evict_older_than(&self, max_age: Duration) -> usize {
        if !self.state.read().is_ready() {
            return 0;
        }

        let now = self.clock.now();
        let entries = match self.store.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Cannot list cache entries for eviction");
                return 0;
            }
        };

        let mut evicted = 0usize;
        for info in entries {
            let Some(track_id) = self.track_id_from_key(&info.key) else {
                continue;
            };

            if !is_expired(info.stored_at, now, max_age) {
                continue;
            }

            match self.store.delete(&info.key).await {
                Ok(_) => {
                    self.memory_remove(&track_id);
                    evicted += 1;
                    debug!(track_id = %track_id, "Evicted stale track");
                }
                Err(e) => warn!(track_id = %track_id, error = %e, "Failed to evict track"),
            }
        }

        self.counters.evicted(evicted);
        info!(evicted, "Cache eviction complete");
        self.emit(CacheEvent::Evicted { count: evicted });
        evicted
    }

    /// Evict with the configured `max_age`.
    pub async fn evict_expired(&self) -> usize {
        self.evict_older_than(self.config.max_age).await
    }

    /// Delete a single entry. Returns whether something was removed.
    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn remove(&self, track_id: &TrackId) -> bool {
        self.memory_remove(track_id);
        if !self.state.read().is_ready() {
            return false;
        }

        match self.store.delete(&self.key_for(track_id)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Failed to remove cached track");
                false
            }
        }
    }

    /// Delete every entry in this cache's namespace. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> usize {
        if let Some(memory) = &self.memory {
            memory.lock().clear();
        }
        if !self.state.read().is_ready() {
            return 0;
        }

        let entries = match self.store.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Cannot list cache entries");
                return 0;
            }
        };

        let mut cleared = 0;
        for info in entries.into_iter().filter(|e| self.owns(&e.key)) {
            match self.store.delete(&info.key).await {
                Ok(true) => cleared += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to clear cached track"),
            }
        }

        info!(cleared, "Cleared track cache");
        cleared
    }

    /// Current statistics. Store totals are zero when the cache is not ready.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            memory_entries: self.memory.as_ref().map_or(0, |m| m.lock().len()),
            ..Default::default()
        };
        self.counters.fill(&mut stats);

        if self.state.read().is_ready() {
            match self.store.entries().await {
                Ok(entries) => {
                    for info in entries.iter().filter(|e| self.owns(&e.key)) {
                        stats.entries += 1;
                        stats.total_bytes += info.size;
                    }
                }
                Err(e) => warn!(error = %e, "Cannot read cache totals"),
            }
        }

        stats
    }

    // ------------------------------------------------------------------------

    fn disable(&self, reason: &str) {
        warn!(reason, "Track cache degraded to no-op");
        *self.state.write() = CacheState::Disabled {
            reason: reason.to_string(),
        };
        if let Some(memory) = &self.memory {
            memory.lock().clear();
        }
        self.emit(CacheEvent::Degraded {
            reason: reason.to_string(),
        });
    }

    fn key_for(&self, track_id: &TrackId) -> String {
        format!("{}/{}", self.config.namespace, track_id)
    }

    fn owns(&self, key: &str) -> bool {
        self.track_id_from_key(key).is_some()
    }

    fn track_id_from_key(&self, key: &str) -> Option<TrackId> {
        key.strip_prefix(self.config.namespace.as_str())?
            .strip_prefix('/')
            .filter(|id| !id.is_empty())
            .map(TrackId::from)
    }

    fn memory_get(&self, track_id: &TrackId) -> Option<CacheEntry> {
        self.memory.as_ref()?.lock().get(track_id).cloned()
    }

    fn memory_put(&self, entry: CacheEntry) {
        if let Some(memory) = &self.memory {
            memory.lock().put(entry.track_id.clone(), entry);
        }
    }

    fn memory_remove(&self, track_id: &TrackId) {
        if let Some(memory) = &self.memory {
            memory.lock().pop(track_id);
        }
    }

    fn record_hit(&self, track_id: &TrackId) {
        self.counters.hit();
        self.emit(CacheEvent::Hit {
            track_id: track_id.to_string(),
        });
    }

    fn record_miss(&self, track_id: &TrackId) {
        self.counters.miss();
        self.emit(CacheEvent::Miss {
            track_id: track_id.to_string(),
        });
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Cache(event)).ok();
        }
    }
}

/// Strictly older than `max_age`: an entry exactly `max_age` old is kept.
fn is_expired(stored_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match chrono::Duration::from_std(max_age) {
        Ok(max_age) => now - stored_at > max_age,
        Err(_) => false,
    }
}
