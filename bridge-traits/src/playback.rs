//! The audio output.
//!
//! The player owns exactly one output. The host exposes it as a
//! [`PlaybackAdapter`]: the core hands over a whole audio file, gets a
//! session id back, drives that session and listens for [`MediaEvent`]s
//! tagged with it.

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Supported audio codec identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCodec {
    Mp3,
    Aac,
    Flac,
    Vorbis,
    Wav,
    /// Codec could not be determined from the payload.
    Unknown,
}

impl AudioCodec {
    /// Common file extension for the codec.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac => "m4a",
            AudioCodec::Flac => "flac",
            AudioCodec::Vorbis => "ogg",
            AudioCodec::Wav => "wav",
            AudioCodec::Unknown => "bin",
        }
    }

    /// MIME type for the codec.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "audio/mpeg",
            AudioCodec::Aac => "audio/mp4",
            AudioCodec::Flac => "audio/flac",
            AudioCodec::Vorbis => "audio/ogg",
            AudioCodec::Wav => "audio/wav",
            AudioCodec::Unknown => "application/octet-stream",
        }
    }

    /// Identify the container from its leading bytes.
    pub fn sniff(data: &[u8]) -> Self {
        match data {
            [b'f', b'L', b'a', b'C', ..] => AudioCodec::Flac,
            [b'I', b'D', b'3', ..] => AudioCodec::Mp3,
            // MPEG audio frame sync: 11 set bits
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => AudioCodec::Mp3,
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => AudioCodec::Aac,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => AudioCodec::Wav,
            [b'O', b'g', b'g', b'S', ..] => AudioCodec::Vorbis,
            _ => AudioCodec::Unknown,
        }
    }

    /// Map a file extension (without the dot, any case) to a codec.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "flac" => AudioCodec::Flac,
            "mp3" => AudioCodec::Mp3,
            "m4a" | "mp4" | "aac" => AudioCodec::Aac,
            "wav" => AudioCodec::Wav,
            "ogg" | "oga" => AudioCodec::Vorbis,
            _ => AudioCodec::Unknown,
        }
    }
}

/// Identifies one prepared audio source on the output.
///
/// Every [`PlaybackAdapter::prepare`] call yields a fresh id, so events from
/// an abandoned source can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What [`PlaybackAdapter::prepare`] learned about the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedSession {
    pub id: PlaybackSessionId,
    /// Known up front for some decoders. Otherwise it arrives later as
    /// [`MediaEvent::MetadataLoaded`].
    pub duration: Option<Duration>,
}

impl PreparedSession {
    pub fn new(id: PlaybackSessionId) -> Self {
        Self { id, duration: None }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A complete audio file to attach to the output.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub data: Bytes,
    /// Sniffed from `data`, may be [`AudioCodec::Unknown`].
    pub codec: AudioCodec,
    /// Effective output level, already zero when muted.
    pub volume: f32,
    pub track_id: String,
    /// For host media sessions (lock screen, notification center).
    pub title: Option<String>,
}

impl PlaybackRequest {
    pub fn new(track_id: impl Into<String>, data: Bytes) -> Self {
        Self {
            codec: AudioCodec::sniff(&data),
            data,
            volume: 1.0,
            track_id: track_id.into(),
            title: None,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Kind of fault reported by the audio output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaErrorKind {
    /// Loading was aborted by the host.
    Aborted,
    /// The source stopped delivering data.
    Network,
    /// The payload could not be decoded.
    Decode,
    /// The container or codec is not supported.
    SourceNotSupported,
}

/// Progress and fault notifications from the audio output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// The source's duration became known.
    MetadataLoaded { duration: Duration },
    /// Playback position advanced.
    TimeUpdate { position: Duration },
    /// Playback stalled waiting for data.
    Buffering,
    /// Enough data is available to continue.
    CanPlay,
    /// Playback reached the end of the source.
    Ended,
    /// The output failed.
    Error { kind: MediaErrorKind, message: String },
}

/// A [`MediaEvent`] tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: PlaybackSessionId,
    pub event: MediaEvent,
}

impl SessionEvent {
    pub fn new(session: PlaybackSessionId, event: MediaEvent) -> Self {
        Self { session, event }
    }
}

/// Trait for platform-specific playback adapters that drive the audio output.
///
/// `prepare` and `play` may suspend. The remaining controls are synchronous
/// so a caller can silence a session before yielding to the runtime.
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Prepare a playback session from the provided request. The session must
    /// stay silent until [`play`](Self::play) is called.
    async fn prepare(&self, request: PlaybackRequest) -> Result<PreparedSession>;

    /// Begin or resume playback for the provided session.
    ///
    /// Returns [`BridgeError::NotAllowed`](crate::BridgeError::NotAllowed) when
    /// the host refuses to start audio without a user gesture.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Stop playback immediately and reset position to the start.
    fn stop(&self, session: PlaybackSessionId) -> Result<()>;

    /// Seek to an absolute position within the stream.
    fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Adjust playback volume. Volume is normalized to `0.0..=1.0`.
    fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()>;

    /// Query the current playback position.
    fn position(&self, session: PlaybackSessionId) -> Result<Duration>;

    /// Release resources associated with a playback session.
    fn unload(&self, session: PlaybackSessionId) -> Result<()>;

    /// Subscribe to media events for all sessions created by this adapter.
    fn media_events(&self) -> broadcast::Receiver<SessionEvent>;
}
