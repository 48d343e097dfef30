//! Failures of loading and controlling a track.
//!
//! Every variant maps onto a [`FailureCategory`] and a fixed user-facing
//! sentence via [`PlaybackError::user_message`]; the detail string is for
//! logs only.

use bridge_traits::error::BridgeError;
use bridge_traits::playback::MediaErrorKind;
use core_runtime::events::FailureCategory;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The stream endpoint was unreachable, answered non-2xx or sent nothing.
    #[error("stream request failed: {0}")]
    NetworkFailure(String),

    /// The output stopped receiving data after playback began.
    #[error("playback interrupted: {0}")]
    Interrupted(String),

    #[error("load aborted by host: {0}")]
    Aborted(String),

    #[error("cannot decode audio: {0}")]
    DecodingError(String),

    #[error("unsupported audio format: {0}")]
    FormatUnsupported(String),

    #[error("no track loaded")]
    NoTrackLoaded,

    /// Seeking needs the duration, which the output has not reported yet.
    #[error("track duration not known yet")]
    DurationUnknown,

    /// A newer `load_track` started before this one finished. Not shown to
    /// the user.
    #[error("superseded by a newer load")]
    Superseded,

    /// The host refused to start audio, e.g. autoplay without a user gesture.
    #[error("playback refused: {0}")]
    PermissionDenied(String),

    #[error("track cache unavailable: {0}")]
    CacheError(String),

    #[error("no audio output: {0}")]
    AudioDeviceUnavailable(String),

    /// The output failed to accept the source.
    #[error("audio output failed: {0}")]
    AudioDeviceError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    pub fn from_bridge(error: BridgeError) -> Self {
        match error {
            BridgeError::NotAllowed(message) => PlaybackError::PermissionDenied(message),
            BridgeError::NotAvailable(message) => PlaybackError::AudioDeviceUnavailable(message),
            BridgeError::OperationFailed(message) => PlaybackError::AudioDeviceError(message),
            BridgeError::Network(message) => PlaybackError::NetworkFailure(message),
            BridgeError::TimedOut(after) => {
                PlaybackError::NetworkFailure(format!("no response within {:?}", after))
            }
            BridgeError::Storage(message) => PlaybackError::CacheError(message),
            BridgeError::Media { kind, message } => PlaybackError::from_media(kind, message),
            BridgeError::Io(e) => PlaybackError::Io(e),
        }
    }

    /// Error for a fault reported through [`MediaEvent::Error`](bridge_traits::MediaEvent::Error).
    pub fn from_media(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            MediaErrorKind::Aborted => PlaybackError::Aborted(message),
            MediaErrorKind::Network => PlaybackError::Interrupted(message),
            MediaErrorKind::Decode => PlaybackError::DecodingError(message),
            MediaErrorKind::SourceNotSupported => PlaybackError::FormatUnsupported(message),
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            PlaybackError::NetworkFailure(_) => FailureCategory::Network,
            PlaybackError::PermissionDenied(_) => FailureCategory::Permission,
            PlaybackError::CacheError(_) | PlaybackError::Io(_) => FailureCategory::Storage,
            _ => FailureCategory::Playback,
        }
    }

    /// Trying the same track again may work.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::NetworkFailure(_)
                | PlaybackError::Interrupted(_)
                | PlaybackError::AudioDeviceUnavailable(_)
        )
    }

    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NetworkFailure(_) | PlaybackError::Interrupted(_)
        )
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            PlaybackError::NetworkFailure(_) => {
                "Couldn't load this track. Check your connection and try again."
            }
            PlaybackError::Interrupted(_) => "Playback was interrupted. Please try again.",
            PlaybackError::DecodingError(_) => "This track couldn't be decoded.",
            PlaybackError::FormatUnsupported(_) => "This audio format isn't supported.",
            PlaybackError::AudioDeviceUnavailable(_) => "No audio output device is available.",
            PlaybackError::NoTrackLoaded => "Select a track to play.",
            _ => "Error playing track. Please try again.",
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
