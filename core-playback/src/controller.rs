//! # Playback Controller
//!
//! Owns the single playback session and mediates between the track cache,
//! the stream fetcher and the host audio output.
//!
//! ## States
//!
//! ```text
//! Idle ──load_track──> Loading ──> Ready ──play──> Playing <──> Paused
//!                         │                           │
//!                         └──────> Error <────────────┤
//!                                                     └──> Ended ──play──> Playing
//! ```
//!
//! ## Guarantees
//!
//! - At most one session is audible. `load_track` stops and unloads the
//!   current session before its first suspension point.
//! - Every `load_track` takes a new generation. Work belonging to an older
//!   generation is discarded when it completes and reports
//!   [`PlaybackError::Superseded`].
//! - Media events from sessions other than the current one are ignored.
//! - State lives behind a lock that is never held across `.await`.

use crate::cache::TrackCache;
use crate::error::{PlaybackError, Result};
use crate::fetcher::TrackFetcher;
use bridge_traits::playback::{
    AudioCodec, MediaEvent, PlaybackAdapter, PlaybackRequest, PlaybackSessionId,
};
use core_library::models::TrackId;
use core_runtime::events::{CoreEvent, EventBus, FailureCategory, PlaybackEvent, TrackSource};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Public state types
// ============================================================================

/// Transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// No source attached.
    Idle,
    /// Fetching audio or preparing the output.
    Loading,
    /// Attached and silent, never started.
    Ready,
    Playing,
    Paused,
    /// Reached the end; position is back at zero.
    Ended,
    /// The last load or the output failed; the session is gone.
    Error,
}

impl PlaybackStatus {
    /// Whether a session is attached in this status.
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Ready
                | PlaybackStatus::Playing
                | PlaybackStatus::Paused
                | PlaybackStatus::Ended
        )
    }
}

/// The track currently owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub track_id: TrackId,
    pub title: String,
}

/// Last failure, kept for display until the next load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    pub category: FailureCategory,
    pub message: String,
}

/// Copy of controller state for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    pub status: PlaybackStatus,
    pub track: Option<NowPlaying>,
    pub position: Duration,
    pub duration: Option<Duration>,
    /// Remembered level, also while muted.
    pub volume: f32,
    pub muted: bool,
    pub buffering: bool,
    pub failure: Option<PlaybackFailure>,
}

impl TransportSnapshot {
    /// Level actually sent to the output.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

/// Result of a successful [`PlaybackController::load_track`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Where the audio came from.
    pub source: TrackSource,
    /// `false` when the host blocked autoplay or the load was paused meanwhile.
    pub started: bool,
    pub codec: AudioCodec,
}

// ============================================================================
// Controller
// ============================================================================

struct ControllerState {
    generation: u64,
    status: PlaybackStatus,
    track: Option<NowPlaying>,
    session: Option<PlaybackSessionId>,
    position: Duration,
    duration: Option<Duration>,
    volume: f32,
    muted: bool,
    buffering: bool,
    autoplay: bool,
    failure: Option<PlaybackFailure>,
}

impl ControllerState {
    fn new(volume: f32) -> Self {
        Self {
            generation: 0,
            status: PlaybackStatus::Idle,
            track: None,
            session: None,
            position: Duration::ZERO,
            duration: None,
            volume,
            muted: false,
            buffering: false,
            autoplay: false,
            failure: None,
        }
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    fn track_id(&self) -> String {
        self.track
            .as_ref()
            .map(|t| t.track_id.to_string())
            .unwrap_or_default()
    }

    fn volume_event(&self) -> PlaybackEvent {
        PlaybackEvent::VolumeChanged {
            volume_percent: (self.volume * 100.0).round() as u8,
            muted: self.muted,
        }
    }

    fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            status: self.status,
            track: self.track.clone(),
            position: self.position,
            duration: self.duration,
            volume: self.volume,
            muted: self.muted,
            buffering: self.buffering,
            failure: self.failure.clone(),
        }
    }
}

/// State machine driving the host audio output.
pub struct PlaybackController {
    adapter: Arc<dyn PlaybackAdapter>,
    fetcher: Arc<dyn TrackFetcher>,
    cache: Arc<TrackCache>,
    event_bus: Option<EventBus>,
    state: Mutex<ControllerState>,
}

impl PlaybackController {
    pub fn new(
        adapter: Arc<dyn PlaybackAdapter>,
        fetcher: Arc<dyn TrackFetcher>,
        cache: Arc<TrackCache>,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            cache,
            event_bus: None,
            state: Mutex::new(ControllerState::new(1.0)),
        }
    }

    /// Set event bus for playback events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Volume used for the first session, clamped to `0.0..=1.0`.
    pub fn with_initial_volume(self, volume: f32) -> Self {
        self.state.lock().volume = clamp_unit(volume);
        self
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.state.lock().snapshot()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.lock().status
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load a track and start playing it.
    ///
    /// The current session is silenced before anything is awaited. The audio
    /// comes from the cache when present, otherwise from the stream endpoint,
    /// in which case it is cached for the next play.
    ///
    /// A host refusal to start audio is not an error: the track stays loaded
    /// in [`PlaybackStatus::Paused`] and `started` is `false`.
    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn load_track(&self, track_id: &TrackId, title: &str) -> Result<LoadOutcome> {
        let (generation, previous, volume) = {
            let mut state = self.state.lock();
            state.generation += 1;
            let previous = state.session.take();
            state.status = PlaybackStatus::Loading;
            state.track = Some(NowPlaying {
                track_id: track_id.clone(),
                title: title.to_string(),
            });
            state.position = Duration::ZERO;
            state.duration = None;
            state.buffering = false;
            state.autoplay = true;
            state.failure = None;
            (state.generation, previous, state.effective_volume())
        };

        if let Some(previous) = previous {
            self.teardown(previous);
        }

        info!(title, "Loading track");
        self.emit(PlaybackEvent::Loading {
            track_id: track_id.to_string(),
            title: title.to_string(),
        });

        // Acquire audio
        let (data, source) = match self.cache.get(track_id).await {
            Some(entry) => (entry.data, TrackSource::Cache),
            None => match self.fetcher.fetch(track_id).await {
                Ok(data) => {
                    self.cache.put(track_id, data.clone()).await;
                    (data, TrackSource::Network)
                }
                Err(e) => return Err(self.fail(generation, e)),
            },
        };
        self.ensure_current(generation)?;

        // Prepare the output
        let request = PlaybackRequest::new(track_id.as_str(), data)
            .with_volume(volume)
            .with_title(title);
        let codec = request.codec;
        debug!(?source, codec = codec.mime_type(), bytes = request.data.len(), "Audio acquired");

        let prepared = match self.adapter.prepare(request).await {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.fail(generation, PlaybackError::from_bridge(e))),
        };

        let autoplay = {
            let mut state = self.state.lock();
            if state.generation != generation {
                drop(state);
                debug!(session = %prepared.id, "Discarding session prepared for a stale load");
                self.teardown(prepared.id);
                return Err(PlaybackError::Superseded);
            }
            state.session = Some(prepared.id);
            state.status = PlaybackStatus::Ready;
            state.duration = prepared.duration;
            // A volume change while loading has to reach the new session.
            let current = state.effective_volume();
            if current != volume {
                self.apply_volume(prepared.id, current);
            }
            state.autoplay
        };

        self.emit(PlaybackEvent::Ready {
            track_id: track_id.to_string(),
            source,
        });
        if let Some(duration) = prepared.duration {
            self.emit(PlaybackEvent::DurationKnown {
                track_id: track_id.to_string(),
                duration_ms: duration.as_millis() as u64,
            });
        }

        let started = if autoplay {
            self.start(prepared.id, generation, false).await?
        } else {
            debug!("Paused while loading, not starting");
            false
        };

        Ok(LoadOutcome {
            source,
            started,
            codec,
        })
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Start or resume playback. No-op when already playing or still loading;
    /// after the end, playback restarts from the beginning.
    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let (session, generation, resumed) = {
            let mut state = self.state.lock();
            match state.status {
                PlaybackStatus::Playing => return Ok(()),
                PlaybackStatus::Loading => {
                    state.autoplay = true;
                    return Ok(());
                }
                PlaybackStatus::Idle | PlaybackStatus::Error => {
                    return Err(PlaybackError::NoTrackLoaded)
                }
                PlaybackStatus::Ready | PlaybackStatus::Paused | PlaybackStatus::Ended => {}
            }
            let session = state.session.ok_or(PlaybackError::NoTrackLoaded)?;
            if state.status == PlaybackStatus::Ended {
                if let Err(e) = self.adapter.seek(session, Duration::ZERO) {
                    warn!(error = %e, "Rewind before replay failed");
                }
                state.position = Duration::ZERO;
            }
            (session, state.generation, state.status == PlaybackStatus::Paused)
        };

        self.start(session, generation, resumed).await.map(|_| ())
    }

    /// Pause playback. No-op unless playing; while loading it cancels autoplay.
    #[instrument(skip(self))]
    pub fn pause(&self) -> Result<()> {
        let session = {
            let mut state = self.state.lock();
            match state.status {
                PlaybackStatus::Playing => {}
                PlaybackStatus::Loading => {
                    state.autoplay = false;
                    return Ok(());
                }
                _ => return Ok(()),
            }
            state.session.ok_or(PlaybackError::NoTrackLoaded)?
        };

        self.adapter
            .pause(session)
            .map_err(PlaybackError::from_bridge)?;
        let reported = self.adapter.position(session).ok();

        let event = {
            let mut state = self.state.lock();
            if state.session != Some(session) {
                return Ok(());
            }
            if let Some(position) = reported {
                state.position = position;
            }
            state.status = PlaybackStatus::Paused;
            PlaybackEvent::Paused {
                track_id: state.track_id(),
                position_ms: state.position.as_millis() as u64,
            }
        };
        self.emit(event);
        Ok(())
    }

    /// Pause when playing, play otherwise.
    pub async fn toggle(&self) -> Result<()> {
        match self.status() {
            PlaybackStatus::Playing => self.pause(),
            PlaybackStatus::Loading => {
                let mut state = self.state.lock();
                state.autoplay = !state.autoplay;
                Ok(())
            }
            _ => self.play().await,
        }
    }

    /// Seek to `seconds`, clamped to `[0, duration]`. NaN seeks to the start.
    ///
    /// Returns the position actually applied, in seconds.
    #[instrument(skip(self))]
    pub fn seek(&self, seconds: f64) -> Result<f64> {
        let (session, target, event) = {
            let mut state = self.state.lock();
            let session = state.session.ok_or(PlaybackError::NoTrackLoaded)?;
            let duration = state.duration.ok_or(PlaybackError::DurationUnknown)?;

            let target = clamp_seek(seconds, duration);
            state.position = target;
            if state.status == PlaybackStatus::Ended {
                state.status = PlaybackStatus::Paused;
            }
            let event = PlaybackEvent::PositionChanged {
                track_id: state.track_id(),
                position_ms: target.as_millis() as u64,
                duration_ms: duration.as_millis() as u64,
            };
            (session, target, event)
        };

        self.adapter
            .seek(session, target)
            .map_err(PlaybackError::from_bridge)?;
        self.emit(event);
        Ok(target.as_secs_f64())
    }

    // ------------------------------------------------------------------------
    // Volume
    // ------------------------------------------------------------------------

    /// Set the volume, clamped to `[0, 1]` (NaN is 0). Unmutes.
    ///
    /// Returns the level actually applied.
    pub fn set_volume(&self, level: f32) -> f32 {
        let level = clamp_unit(level);
        let event = {
            let mut state = self.state.lock();
            state.volume = level;
            state.muted = false;
            if let Some(session) = state.session {
                self.apply_volume(session, level);
            }
            state.volume_event()
        };
        self.emit(event);
        level
    }

    /// Silence output, remembering the current level.
    pub fn mute(&self) {
        self.set_muted(true);
    }

    /// Restore the level that was active before [`mute`](Self::mute).
    pub fn unmute(&self) {
        self.set_muted(false);
    }

    /// Flip mute; returns the new muted flag.
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.state.lock().muted;
        self.set_muted(muted);
        muted
    }

    fn set_muted(&self, muted: bool) {
        let event = {
            let mut state = self.state.lock();
            if state.muted == muted {
                return;
            }
            state.muted = muted;
            if let Some(session) = state.session {
                self.apply_volume(session, state.effective_volume());
            }
            state.volume_event()
        };
        self.emit(event);
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Release the session and return to `Idle`. In-flight loads become stale.
    #[instrument(skip(self))]
    pub fn close(&self) {
        let (session, track_id) = {
            let mut state = self.state.lock();
            state.generation += 1;
            let track_id = state.track.take().map(|t| t.track_id.to_string());
            let session = state.session.take();
            state.status = PlaybackStatus::Idle;
            state.position = Duration::ZERO;
            state.duration = None;
            state.buffering = false;
            state.autoplay = false;
            state.failure = None;
            (session, track_id)
        };

        if let Some(session) = session {
            self.teardown(session);
        }
        if let Some(track_id) = track_id {
            info!(%track_id, "Playback closed");
            self.emit(PlaybackEvent::Stopped { track_id });
        }
    }

    // ------------------------------------------------------------------------
    // Media events
    // ------------------------------------------------------------------------

    /// Apply a notification from the audio output.
    ///
    /// Events for sessions other than the current one are dropped.
    pub fn on_media_event(&self, session: PlaybackSessionId, event: MediaEvent) {
        let mut teardown = None;
        let mut events = Vec::new();

        {
            let mut state = self.state.lock();
            if state.session != Some(session) {
                debug!(%session, ?event, "Ignoring event from inactive session");
                return;
            }
            let track_id = state.track_id();

            match event {
                MediaEvent::MetadataLoaded { duration } => {
                    state.duration = Some(duration);
                    events.push(PlaybackEvent::DurationKnown {
                        track_id,
                        duration_ms: duration.as_millis() as u64,
                    });
                }
                MediaEvent::TimeUpdate { position } => {
                    if state.status != PlaybackStatus::Playing {
                        return;
                    }
                    state.position = match state.duration {
                        Some(duration) => position.min(duration),
                        None => position,
                    };
                    events.push(PlaybackEvent::PositionChanged {
                        track_id,
                        position_ms: state.position.as_millis() as u64,
                        duration_ms: state.duration.map_or(0, |d| d.as_millis() as u64),
                    });
                }
                MediaEvent::Buffering => {
                    if !state.buffering {
                        state.buffering = true;
                        events.push(PlaybackEvent::Buffering {
                            track_id,
                            buffering: true,
                        });
                    }
                }
                MediaEvent::CanPlay => {
                    if state.buffering {
                        state.buffering = false;
                        events.push(PlaybackEvent::Buffering {
                            track_id,
                            buffering: false,
                        });
                    }
                }
                MediaEvent::Ended => {
                    if state.status == PlaybackStatus::Ended {
                        return;
                    }
                    state.status = PlaybackStatus::Ended;
                    state.position = Duration::ZERO;
                    state.buffering = false;
                    info!(%track_id, "Track completed");
                    events.push(PlaybackEvent::Completed { track_id });
                }
                MediaEvent::Error { kind, message } => {
                    let error = PlaybackError::from_media(kind, message);
                    error!(%track_id, error = %error, "Audio output failed");
                    teardown = state.session.take();
                    state.status = PlaybackStatus::Error;
                    state.buffering = false;
                    state.failure = Some(PlaybackFailure {
                        category: error.category(),
                        message: error.user_message().to_string(),
                    });
                    events.push(PlaybackEvent::Error {
                        track_id: Some(track_id),
                        category: error.category(),
                        message: error.user_message().to_string(),
                        recoverable: true,
                    });
                }
            }
        }

        if let Some(session) = teardown {
            self.teardown(session);
        }
        for event in events {
            self.emit(event);
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Ask the output to play `session`. Returns whether audio started.
    async fn start(
        &self,
        session: PlaybackSessionId,
        generation: u64,
        resumed: bool,
    ) -> Result<bool> {
        let result = self.adapter.play(session).await;

        let mut state = self.state.lock();
        if state.generation != generation || state.session != Some(session) {
            drop(state);
            debug!(%session, "Play completed for a superseded session");
            if result.is_ok() {
                // The newer load may have released it already; stop is idempotent.
                self.adapter.stop(session).ok();
            }
            return Err(PlaybackError::Superseded);
        }

        let track_id = state.track_id();
        match result {
            Ok(()) => {
                state.status = PlaybackStatus::Playing;
                let event = if resumed {
                    PlaybackEvent::Resumed {
                        track_id,
                        position_ms: state.position.as_millis() as u64,
                    }
                } else {
                    PlaybackEvent::Started {
                        track_id,
                        title: state
                            .track
                            .as_ref()
                            .map(|t| t.title.clone())
                            .unwrap_or_default(),
                    }
                };
                drop(state);
                self.emit(event);
                Ok(true)
            }
            Err(e) if e.is_not_allowed() => {
                state.status = PlaybackStatus::Paused;
                drop(state);
                info!(%track_id, "Host blocked playback; waiting for user action");
                self.emit(PlaybackEvent::Blocked { track_id });
                Ok(false)
            }
            Err(e) => {
                drop(state);
                Err(self.fail(generation, PlaybackError::from_bridge(e)))
            }
        }
    }

    /// Record a failure for `generation` and release its session.
    ///
    /// Returns the error to hand back, or `Superseded` if a newer load owns
    /// the controller.
    fn fail(&self, generation: u64, error: PlaybackError) -> PlaybackError {
        let (session, track_id) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(error = %error, "Dropping failure from a stale load");
                return PlaybackError::Superseded;
            }
            state.status = PlaybackStatus::Error;
            state.buffering = false;
            state.failure = Some(PlaybackFailure {
                category: error.category(),
                message: error.user_message().to_string(),
            });
            (state.session.take(), state.track_id())
        };

        if let Some(session) = session {
            self.teardown(session);
        }

        error!(%track_id, category = %error.category(), error = %error, "Playback failed");
        self.emit(PlaybackEvent::Error {
            track_id: Some(track_id),
            category: error.category(),
            message: error.user_message().to_string(),
            recoverable: true,
        });
        error
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if self.state.lock().generation == generation {
            Ok(())
        } else {
            Err(PlaybackError::Superseded)
        }
    }

    /// Stop then unload. Synchronous so callers can silence before yielding.
    fn teardown(&self, session: PlaybackSessionId) {
        if let Err(e) = self.adapter.stop(session) {
            warn!(%session, error = %e, "Failed to stop session");
        }
        if let Err(e) = self.adapter.unload(session) {
            warn!(%session, error = %e, "Failed to unload session");
        }
        debug!(%session, "Session released");
    }

    fn apply_volume(&self, session: PlaybackSessionId, volume: f32) {
        if let Err(e) = self.adapter.set_volume(session, volume) {
            warn!(%session, error = %e, "Failed to apply volume");
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn clamp_seek(seconds: f64, duration: Duration) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    let max = duration.as_secs_f64();
    if seconds >= max {
        duration
    } else {
        Duration::from_secs_f64(seconds)
    }
}
