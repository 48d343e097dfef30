//! Test doubles for the playback controller.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    PlaybackAdapter, PlaybackRequest, PlaybackSessionId, PreparedSession, SessionEvent,
};
use bridge_traits::storage::MemoryBlobStore;
use bridge_traits::time::ManualClock;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use core_library::models::TrackId;
use core_playback::{CacheConfig, PlaybackController, PlaybackError, TrackCache, TrackFetcher};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

// ============================================================================
// Playback adapter
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Prepare(PlaybackSessionId),
    Play(PlaybackSessionId),
    Pause(PlaybackSessionId),
    Stop(PlaybackSessionId),
    Seek(PlaybackSessionId, Duration),
    SetVolume(PlaybackSessionId, f32),
    Unload(PlaybackSessionId),
}

#[derive(Default)]
struct AdapterLog {
    calls: Vec<Call>,
    loaded: HashSet<PlaybackSessionId>,
    audible: HashSet<PlaybackSessionId>,
    max_audible: usize,
    prepared: Vec<(PlaybackSessionId, Bytes)>,
}

/// Records every call and tracks which sessions are producing sound.
pub struct RecordingAdapter {
    log: Mutex<AdapterLog>,
    events: broadcast::Sender<SessionEvent>,
    block_play: AtomicBool,
    duration: Mutex<Option<Duration>>,
    fail_prepare: Mutex<Option<BridgeError>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            log: Mutex::new(AdapterLog::default()),
            events,
            block_play: AtomicBool::new(false),
            duration: Mutex::new(Some(Duration::from_secs(180))),
            fail_prepare: Mutex::new(None),
        }
    }

    /// Refuse `play` like an autoplay policy would.
    pub fn block_play(&self, block: bool) {
        self.block_play.store(block, Ordering::SeqCst);
    }

    /// Duration reported by `prepare`; `None` defers it to a media event.
    pub fn report_duration(&self, duration: Option<Duration>) {
        *self.duration.lock() = duration;
    }

    pub fn fail_next_prepare(&self, error: BridgeError) {
        *self.fail_prepare.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().calls.clone()
    }

    pub fn prepared(&self) -> Vec<PlaybackSessionId> {
        self.log.lock().prepared.iter().map(|(id, _)| *id).collect()
    }

    pub fn prepared_data(&self, index: usize) -> Bytes {
        self.log.lock().prepared[index].1.clone()
    }

    pub fn last_session(&self) -> PlaybackSessionId {
        *self.prepared().last().expect("no session prepared")
    }

    pub fn audible(&self) -> Vec<PlaybackSessionId> {
        self.log.lock().audible.iter().copied().collect()
    }

    pub fn max_audible(&self) -> usize {
        self.log.lock().max_audible
    }

    pub fn is_loaded(&self, session: PlaybackSessionId) -> bool {
        self.log.lock().loaded.contains(&session)
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.log.lock().calls.iter().rev().find_map(|call| match call {
            Call::SetVolume(_, volume) => Some(*volume),
            _ => None,
        })
    }

    pub fn position_of(&self, call: &Call) -> Option<usize> {
        self.log.lock().calls.iter().position(|c| c == call)
    }

    fn record(&self, call: Call) {
        self.log.lock().calls.push(call);
    }
}

#[async_trait]
impl PlaybackAdapter for RecordingAdapter {
    async fn prepare(&self, request: PlaybackRequest) -> BridgeResult<PreparedSession> {
        if let Some(error) = self.fail_prepare.lock().take() {
            return Err(error);
        }

        let data = request.data;
        let id = PlaybackSessionId::new();
        {
            let mut log = self.log.lock();
            log.calls.push(Call::Prepare(id));
            log.loaded.insert(id);
            log.prepared.push((id, data));
        }

        let prepared = PreparedSession::new(id);
        Ok(match *self.duration.lock() {
            Some(duration) => prepared.with_duration(duration),
            None => prepared,
        })
    }

    async fn play(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.record(Call::Play(session));
        if self.block_play.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAllowed("user gesture required".into()));
        }

        let mut log = self.log.lock();
        if !log.loaded.contains(&session) {
            return Err(BridgeError::OperationFailed(format!(
                "unknown session {}",
                session
            )));
        }
        log.audible.insert(session);
        log.max_audible = log.max_audible.max(log.audible.len());
        Ok(())
    }

    fn pause(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.record(Call::Pause(session));
        self.log.lock().audible.remove(&session);
        Ok(())
    }

    fn stop(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.record(Call::Stop(session));
        self.log.lock().audible.remove(&session);
        Ok(())
    }

    fn seek(&self, session: PlaybackSessionId, position: Duration) -> BridgeResult<()> {
        self.record(Call::Seek(session, position));
        Ok(())
    }

    fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> BridgeResult<()> {
        self.record(Call::SetVolume(session, volume));
        Ok(())
    }

    fn position(&self, _session: PlaybackSessionId) -> BridgeResult<Duration> {
        Ok(Duration::from_secs(42))
    }

    fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.record(Call::Unload(session));
        let mut log = self.log.lock();
        log.audible.remove(&session);
        log.loaded.remove(&session);
        Ok(())
    }

    fn media_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Track fetcher
// ============================================================================

/// Serves canned audio per id, with optional failures and gates.
#[derive(Default)]
pub struct ScriptedFetcher {
    tracks: Mutex<HashMap<String, Bytes>>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(self, id: &str, data: &'static [u8]) -> Self {
        self.tracks
            .lock()
            .insert(id.to_string(), Bytes::from_static(data));
        self
    }

    pub fn set_failing(&self, id: &str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    /// Hold the next fetch of `id` until the returned sender fires.
    pub fn gate(&self, id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(id.to_string(), rx);
        tx
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TrackFetcher for ScriptedFetcher {
    async fn fetch(&self, track_id: &TrackId) -> core_playback::Result<Bytes> {
        let id = track_id.to_string();
        self.calls.lock().push(id.clone());

        let gate = self.gates.lock().remove(&id);
        if let Some(gate) = gate {
            gate.await.ok();
        }

        if self.failing.lock().contains(&id) {
            return Err(PlaybackError::NetworkFailure("HTTP 503".into()));
        }
        self.tracks
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| PlaybackError::NetworkFailure("HTTP 404".into()))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const FLAC_A: &[u8] = b"fLaC\0\0\0\x22track-a";
pub const MP3_B: &[u8] = b"ID3\x04\0\0track-b";

pub struct Harness {
    pub controller: Arc<PlaybackController>,
    pub adapter: Arc<RecordingAdapter>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub cache: Arc<TrackCache>,
    pub store: Arc<MemoryBlobStore>,
    pub clock: Arc<ManualClock>,
    pub events: EventBus,
}

pub async fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryBlobStore::new())).await
}

pub async fn harness_with_store(store: Arc<MemoryBlobStore>) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));
    let events = EventBus::new(256);
    let cache = Arc::new(
        TrackCache::new(CacheConfig::default(), store.clone(), clock.clone())
            .with_event_bus(events.clone()),
    );
    cache.initialize().await.ok();

    let adapter = Arc::new(RecordingAdapter::new());
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with_track("a", FLAC_A)
            .with_track("b", MP3_B),
    );
    let controller = Arc::new(
        PlaybackController::new(adapter.clone(), fetcher.clone(), cache.clone())
            .with_event_bus(events.clone()),
    );

    Harness {
        controller,
        adapter,
        fetcher,
        cache,
        store,
        clock,
        events,
    }
}

/// Yield until `condition` holds, failing after a generous number of polls.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
