//! The service façade and its bootstrap.

use crate::download::DownloadService;
use crate::error::Result;
use crate::ui::keys::{self, KeyInput};
use crate::ui::search::SearchView;
use bridge_traits::playback::{PlaybackAdapter, SessionEvent};
use bridge_traits::time::{Clock, SystemClock};
use core_library::models::{TrackId, TrackSummary};
use core_library::SearchService;
use core_playback::{
    CacheConfig, HttpTrackFetcher, LoadOutcome, PlaybackController, TrackCache,
    TransportSnapshot,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const EVENT_BUS_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the same controller, cache and tasks.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    events: EventBus,
    search: Arc<SearchService>,
    cache: Arc<TrackCache>,
    controller: Arc<PlaybackController>,
    downloads: Arc<DownloadService>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CoreService {
    /// Wire the core from `config` and a host audio output.
    ///
    /// Opens the track cache (degrading to a no-op if storage is
    /// unavailable), schedules eviction of stale entries in the background
    /// and starts forwarding media events to the controller. Must be called
    /// inside a tokio runtime.
    pub async fn bootstrap(config: CoreConfig, adapter: Arc<dyn PlaybackAdapter>) -> Result<Self> {
        Self::bootstrap_with_clock(config, adapter, Arc::new(SystemClock)).await
    }

    /// [`bootstrap`](Self::bootstrap) with an explicit clock for cache timestamps.
    #[instrument(skip_all, fields(base_url = %config.endpoints.base_url))]
    pub async fn bootstrap_with_clock(
        config: CoreConfig,
        adapter: Arc<dyn PlaybackAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let http = config.http_client.clone();

        let search = SearchService::new(http.clone(), config.endpoints.clone())
            .with_timeout(config.request_timeout)
            .with_event_bus(events.clone());

        let cache_config = CacheConfig::default()
            .with_enabled(config.enable_cache)
            .with_max_age(config.cache_max_age)
            .with_memory_capacity(config.cache_memory_entries);
        let cache = Arc::new(
            TrackCache::new(cache_config, config.blob_store.clone(), clock)
                .with_event_bus(events.clone()),
        );
        if let Err(e) = cache.initialize().await {
            warn!(error = %e, "Continuing without a track cache");
        }

        let fetcher = HttpTrackFetcher::new(http.clone(), config.endpoints.clone())
            .with_timeout(config.stream_timeout);
        let controller = Arc::new(
            PlaybackController::new(adapter.clone(), Arc::new(fetcher), cache.clone())
                .with_event_bus(events.clone())
                .with_initial_volume(config.initial_volume),
        );

        let downloads = DownloadService::new(http, config.endpoints.clone())
            .with_timeout(config.download_timeout)
            .with_event_bus(events.clone());

        let tasks = vec![
            spawn_startup_eviction(cache.clone()),
            spawn_media_pump(adapter.as_ref(), Arc::downgrade(&controller)),
        ];

        info!("Core service ready");
        Ok(Self {
            config: Arc::new(config),
            events,
            search: Arc::new(search),
            cache,
            controller,
            downloads: Arc::new(downloads),
            tasks: Arc::new(Mutex::new(tasks)),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Bus carrying search, playback, cache and download events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn cache(&self) -> &Arc<TrackCache> {
        &self.cache
    }

    pub fn downloads(&self) -> &DownloadService {
        &self.downloads
    }

    /// A search view model bound to the configured endpoints.
    pub fn search_view(&self) -> SearchView {
        SearchView::new(self.config.endpoints.clone())
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    pub async fn search(&self, query: &str) -> Result<Vec<TrackSummary>> {
        Ok(self.search.search(query).await?)
    }

    /// Whether the backend answers its health endpoint.
    pub async fn check_health(&self) -> Result<()> {
        Ok(self.search.check_health().await?)
    }

    /// Run a search and feed the outcome into `view`.
    pub async fn search_into(&self, view: &mut SearchView, query: &str) {
        let ticket = view.begin(query);
        let result = self.search.search(query).await;
        view.finish(ticket, result);
    }

    /// Load and start a search result.
    pub async fn play(&self, track: &TrackSummary) -> Result<LoadOutcome> {
        Ok(self.controller.load_track(&track.id, &track.title).await?)
    }

    /// Save a track into the configured download directory.
    pub async fn download(&self, track_id: &TrackId) -> Result<PathBuf> {
        self.downloads
            .download(track_id, &self.config.download_dir)
            .await
    }

    /// Apply a keyboard shortcut. Returns whether the key was handled.
    pub async fn handle_key(&self, input: KeyInput) -> Result<bool> {
        match keys::command_for(input) {
            Some(command) => {
                keys::apply(&self.controller, command).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.controller.snapshot()
    }

    /// Release the audio output and stop background tasks.
    pub fn shutdown(&self) {
        self.controller.close();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        debug!("Core service shut down");
    }
}

/// Bootstrap with the rodio output on the default audio device.
#[cfg(feature = "audio-output")]
pub async fn bootstrap_desktop(config: CoreConfig) -> Result<CoreService> {
    let adapter = bridge_desktop::RodioPlaybackAdapter::new().map_err(|e| {
        crate::error::CoreError::CapabilityMissing {
            capability: "PlaybackAdapter".to_string(),
            message: e.to_string(),
        }
    })?;
    CoreService::bootstrap(config, Arc::new(adapter)).await
}

/// Best-effort removal of expired cache entries.
fn spawn_startup_eviction(cache: Arc<TrackCache>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let evicted = cache.evict_expired().await;
        debug!(evicted, "Startup eviction finished");
    })
}

/// Forward adapter notifications to the controller until either side goes away.
fn spawn_media_pump(
    adapter: &dyn PlaybackAdapter,
    controller: Weak<PlaybackController>,
) -> JoinHandle<()> {
    let mut events = adapter.media_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent { session, event }) => match controller.upgrade() {
                    Some(controller) => controller.on_media_event(session, event),
                    None => break,
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Media event pump fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Media event pump stopped");
    })
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("config", &self.config)
            .field("status", &self.controller.status())
            .finish()
    }
}
