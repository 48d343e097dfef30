//! # Events
//!
//! Everything observable about the core (searches, playback, the track cache
//! and downloads) is published as a [`CoreEvent`] on an [`EventBus`]. A UI
//! subscribes once and renders from the stream; nothing in the core waits on
//! a subscriber.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Completed {
//!     track_id: "f1".to_string(),
//! }))
//! .ok();
//!
//! assert_eq!(rx.recv().await.unwrap().description(), "Track completed");
//! # }
//! ```
//!
//! Publishers discard the `emit` result: with no subscriber the event is
//! simply dropped. A subscriber that falls more than the bus capacity behind
//! gets `RecvError::Lagged` once and then continues with the newest events.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use tokio::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Search requests and their outcome
    Search(SearchEvent),
    /// Playback controller state changes
    Playback(PlaybackEvent),
    /// Local track cache activity
    Cache(CacheEvent),
    /// File downloads
    Download(DownloadEvent),
}

impl CoreEvent {
    /// Short fixed label, e.g. "Track completed".
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Search(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Search(SearchEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::Degraded { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Blocked { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// How loudly a UI should surface an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Coarse failure taxonomy shared by every user-facing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    /// Request could not reach the service or got a non-success status.
    Network,
    /// Local persistence failed.
    Storage,
    /// The audio output could not decode or play the source.
    Playback,
    /// The host refused an action (autoplay policy).
    Permission,
    /// The service answered with something that is not the expected shape.
    MalformedResponse,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::Network => "network",
            FailureCategory::Storage => "storage",
            FailureCategory::Playback => "playback",
            FailureCategory::Permission => "permission",
            FailureCategory::MalformedResponse => "malformed-response",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Search Events
// ============================================================================

/// Events emitted by the search client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SearchEvent {
    /// A request was sent.
    Started { query: String },
    /// Results arrived (possibly zero).
    Completed { query: String, result_count: usize },
    /// The request failed.
    Failed { query: String, message: String },
}

impl SearchEvent {
    fn description(&self) -> &str {
        match self {
            SearchEvent::Started { .. } => "Search started",
            SearchEvent::Completed { .. } => "Search completed",
            SearchEvent::Failed { .. } => "Search failed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Where the audio for a loaded track came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrackSource {
    Cache,
    Network,
}

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A track is being fetched or prepared.
    Loading { track_id: String, title: String },
    /// The track is attached to the output and can play.
    Ready {
        track_id: String,
        source: TrackSource,
    },
    /// Playback started.
    Started { track_id: String, title: String },
    /// Playback paused.
    Paused { track_id: String, position_ms: u64 },
    /// Playback resumed after pause.
    Resumed { track_id: String, position_ms: u64 },
    /// The host refused to start audio; the track stays loaded and paused.
    Blocked { track_id: String },
    /// Playback stopped and the session was released.
    Stopped { track_id: String },
    /// Track finished playing naturally.
    Completed { track_id: String },
    /// The output stalled or recovered.
    Buffering { track_id: String, buffering: bool },
    /// Duration of the loaded track became known.
    DurationKnown { track_id: String, duration_ms: u64 },
    /// Playback position changed (seek or natural progression).
    PositionChanged {
        track_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
    /// Volume or mute state changed. Volume is in percent.
    VolumeChanged { volume_percent: u8, muted: bool },
    /// Playback error occurred.
    Error {
        track_id: Option<String>,
        category: FailureCategory,
        /// Human-readable error message.
        message: String,
        /// Whether loading another track can succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Track loading",
            PlaybackEvent::Ready { .. } => "Track ready",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Blocked { .. } => "Playback blocked by host",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::Buffering { .. } => "Buffering state changed",
            PlaybackEvent::DurationKnown { .. } => "Duration known",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the local track cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// Storage opened.
    Initialized { entries: usize },
    /// Storage is unavailable; the cache now behaves as empty.
    Degraded { reason: String },
    /// A lookup was served from the cache.
    Hit { track_id: String },
    /// A lookup found nothing.
    Miss { track_id: String },
    /// A blob was written.
    Stored { track_id: String, bytes: u64 },
    /// Age-based eviction finished.
    Evicted { count: usize },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Initialized { .. } => "Cache initialized",
            CacheEvent::Degraded { .. } => "Cache degraded",
            CacheEvent::Hit { .. } => "Cache hit",
            CacheEvent::Miss { .. } => "Cache miss",
            CacheEvent::Stored { .. } => "Track cached",
            CacheEvent::Evicted { .. } => "Stale tracks evicted",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events emitted while saving tracks to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    Started { track_id: String },
    Completed {
        track_id: String,
        file_name: String,
        bytes: u64,
    },
    Failed { track_id: String, message: String },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Cloneable handle to a broadcast channel of [`CoreEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is how many events a slow subscriber may fall behind.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber. Fails only when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Receive events published from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// A filtered subscription, see [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Filtered subscription
// ============================================================================

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Subscription that skips events failing its predicates.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventSeverity};
///
/// let bus = EventBus::default();
/// let problems = bus
///     .stream()
///     .only(|event| matches!(event, CoreEvent::Playback(_)))
///     .min_severity(EventSeverity::Warning);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    predicates: Vec<Predicate>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            predicates: Vec::new(),
        }
    }

    /// Add a predicate. All predicates must hold for an event to be delivered.
    pub fn only<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    pub fn min_severity(self, min: EventSeverity) -> Self {
        self.only(move |event| event.severity() >= min)
    }

    fn wants(&self, event: &CoreEvent) -> bool {
        self.predicates.iter().all(|predicate| predicate(event))
    }

    /// Wait for the next matching event.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event that is already queued, if any.
    pub fn try_next(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.wants(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(track: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Completed {
            track_id: track.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(completed("a")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Search(SearchEvent::Completed {
            query: "moonlight".to_string(),
            result_count: 2,
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = bus.stream().only(|e| matches!(e, CoreEvent::Cache(_)));

        bus.emit(completed("a")).ok();
        bus.emit(CoreEvent::Cache(CacheEvent::Evicted { count: 3 })).ok();

        let received = stream.recv().await.unwrap();
        assert_eq!(received, CoreEvent::Cache(CacheEvent::Evicted { count: 3 }));
        assert!(stream.try_next().is_none());
    }

    #[tokio::test]
    async fn test_event_stream_min_severity() {
        let bus = EventBus::new(10);
        let mut stream = bus
            .stream()
            .only(|e| matches!(e, CoreEvent::Playback(_)))
            .min_severity(EventSeverity::Warning);

        bus.emit(CoreEvent::Cache(CacheEvent::Degraded {
            reason: "read-only".to_string(),
        }))
        .ok();

        bus.emit(completed("a")).ok();
        bus.emit(CoreEvent::Playback(PlaybackEvent::Blocked {
            track_id: "a".to_string(),
        }))
        .ok();

        match stream.try_next() {
            Some(Ok(CoreEvent::Playback(PlaybackEvent::Blocked { .. }))) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(completed(&i.to_string())).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
        assert!(sub.recv().await.is_ok());
    }

    #[test]
    fn test_event_severity() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: None,
            category: FailureCategory::Network,
            message: "Network error".to_string(),
            recoverable: true,
        });
        assert_eq!(error.severity(), EventSeverity::Error);

        let degraded = CoreEvent::Cache(CacheEvent::Degraded {
            reason: "read-only".to_string(),
        });
        assert_eq!(degraded.severity(), EventSeverity::Warning);
        assert_eq!(completed("a").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Playback(PlaybackEvent::Ready {
            track_id: "abc".to_string(),
            source: TrackSource::Cache,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Playback\""));
        assert!(json.contains("\"event\":\"Ready\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_failure_category_display() {
        assert_eq!(FailureCategory::MalformedResponse.to_string(), "malformed-response");
        assert_eq!(FailureCategory::Network.to_string(), "network");
    }
}
