//! # Host bridge
//!
//! Everything the FlacStore core needs from the machine it runs on, expressed
//! as traits. The core crates only ever see these traits; `bridge-desktop`
//! supplies the native implementations and tests supply fakes.
//!
//! | Capability | Trait | Desktop implementation |
//! |------------|-------|------------------------|
//! | Search, stream and download requests | [`HttpClient`](http::HttpClient) | `ReqwestHttpClient` |
//! | Persistent audio blobs for the track cache | [`BlobStore`](storage::BlobStore) | `FsBlobStore` |
//! | The single audio output | [`PlaybackAdapter`](playback::PlaybackAdapter) | `RodioPlaybackAdapter` |
//! | Time | [`Clock`](time::Clock) | [`SystemClock`](time::SystemClock) |
//! | Host log pipeline | [`LoggerSink`](log::LoggerSink) | optional |
//!
//! Every trait is `Send + Sync` and reports failures as
//! [`BridgeError`](error::BridgeError). A `play` request the host refuses,
//! for example because of an autoplay policy, comes back as
//! `BridgeError::NotAllowed`, which the player treats as benign.

pub mod error;
pub mod http;
pub mod log;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
pub use log::{LogLevel, LogRecord, LoggerSink, MemoryLogSink};
pub use playback::{
    AudioCodec, MediaErrorKind, MediaEvent, PlaybackAdapter, PlaybackRequest, PlaybackSessionId,
    PreparedSession, SessionEvent,
};
pub use storage::{BlobInfo, BlobStore, MemoryBlobStore, StoredBlob};
pub use time::{Clock, ManualClock, SystemClock};
