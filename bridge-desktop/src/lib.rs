//! Native host bridges for desktop builds.
//!
//! | Bridge | Type | Backed by |
//! |--------|------|-----------|
//! | `HttpClient` | [`ReqwestHttpClient`] | reqwest + rustls, retry with backoff |
//! | `BlobStore` | [`FileBlobStore`] | one data/metadata file pair per blob under the cache dir |
//! | `PlaybackAdapter` | `RodioPlaybackAdapter` | rodio on a dedicated audio thread |
//!
//! The audio adapter sits behind the `audio-output` feature so headless
//! builds and CI need no system audio libraries.

#[cfg(feature = "audio-output")]
mod audio;
mod blob_store;
mod http;

#[cfg(feature = "audio-output")]
pub use audio::RodioPlaybackAdapter;
pub use blob_store::{default_cache_dir, default_download_dir, FileBlobStore};
pub use http::ReqwestHttpClient;
