//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all dependencies and settings for the core. It enforces
//! fail-fast validation so a misconfigured host learns about it at startup.
//!
//! ## Dependencies
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `BlobStore` - Track cache persistence (desktop default: files under the cache dir)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected automatically if not provided. Without it, both must be supplied.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://music.example.com")
//!     .cache_dir("/path/to/cache")
//!     .build()?;
//! ```
//!
//! ## Environment overrides
//!
//! [`CoreConfigBuilder::from_env`] reads:
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `FLACSTORE_API_URL` | API base URL |
//! | `FLACSTORE_CACHE_DIR` | Track cache directory |
//! | `FLACSTORE_DOWNLOAD_DIR` | Download directory |
//! | `FLACSTORE_CACHE_MAX_AGE_DAYS` | Cache entry lifetime in days |

use crate::error::{Error, Result};
use bridge_traits::{BlobStore, HttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default remote service.
pub const DEFAULT_API_BASE_URL: &str = "https://flacmusicstore-production.up.railway.app";

/// Cache entries older than this are evicted at startup.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CACHE_MEMORY_ENTRIES: usize = 4;
const DEFAULT_INITIAL_VOLUME: f32 = 1.0;

/// Remote endpoint layout.
///
/// Paths are appended to the base URL. The search path receives `?q=<query>`,
/// stream and download paths receive `/<track id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub search_path: String,
    pub stream_path: String,
    pub download_path: String,
    pub health_path: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            search_path: "/api/search".to_string(),
            stream_path: "/stream".to_string(),
            download_path: "/api/download".to_string(),
            health_path: "/api/test".to_string(),
        }
    }

    /// `GET <base>/api/search?q=<url-encoded query>`
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}{}?q={}",
            self.base_url,
            self.search_path,
            urlencoding::encode(query)
        )
    }

    /// `GET <base>/stream/<id>`
    pub fn stream_url(&self, track_id: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            self.stream_path,
            urlencoding::encode(track_id)
        )
    }

    /// `GET <base>/api/download/<id>`
    pub fn download_url(&self, track_id: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            self.download_path,
            urlencoding::encode(track_id)
        )
    }

    /// `GET <base>/api/test`
    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url, self.health_path)
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https:// (got '{}')",
                self.base_url
            )));
        }
        for (name, path) in [
            ("search", &self.search_path),
            ("stream", &self.stream_path),
            ("download", &self.download_path),
            ("health", &self.health_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "{} path must start with '/' (got '{}')",
                    name, path
                )));
            }
        }
        Ok(())
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Remote service endpoints
    pub endpoints: Endpoints,

    /// Directory for the local track cache
    pub cache_dir: PathBuf,

    /// Directory downloads are written to
    pub download_dir: PathBuf,

    /// Entries older than this are evicted at startup
    pub cache_max_age: Duration,

    /// Number of recently played blobs kept in memory
    pub cache_memory_entries: usize,

    /// Disable to run without any local cache
    pub enable_cache: bool,

    /// Timeout for search and health requests
    pub request_timeout: Duration,

    /// Timeout for fetching a whole track to play
    pub stream_timeout: Duration,

    /// Timeout for a download to disk
    pub download_timeout: Duration,

    /// Volume applied to the first loaded track (0.0..=1.0)
    pub initial_volume: f32,

    /// HTTP client for the remote service
    pub http_client: Arc<dyn HttpClient>,

    /// Persistence for the track cache
    pub blob_store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("endpoints", &self.endpoints)
            .field("cache_dir", &self.cache_dir)
            .field("download_dir", &self.download_dir)
            .field("cache_max_age", &self.cache_max_age)
            .field("cache_memory_entries", &self.cache_memory_entries)
            .field("enable_cache", &self.enable_cache)
            .field("request_timeout", &self.request_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("initial_volume", &self.initial_volume)
            .field("http_client", &"HttpClient { ... }")
            .field("blob_store", &"BlobStore { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.endpoints.validate()?;

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.download_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Download directory cannot be empty".to_string(),
            ));
        }

        if self.cache_max_age.is_zero() {
            return Err(Error::Config(
                "Cache max age must be greater than zero".to_string(),
            ));
        }

        for (name, timeout) in [
            ("Request", self.request_timeout),
            ("Stream", self.stream_timeout),
            ("Download", self.download_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::Config(format!(
                    "{} timeout must be greater than zero",
                    name
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "Initial volume must be within 0.0..=1.0 (got {})",
                self.initial_volume
            )));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|source| Error::Bridge {
        capability: "HttpClient",
        source,
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use ReqwestHttpClient. \
                 Embedded hosts: inject the host's HTTP adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_blob_store(cache_dir: &std::path::Path) -> Result<Arc<dyn BlobStore>> {
    use bridge_desktop::FileBlobStore;

    Ok(Arc::new(FileBlobStore::with_root(cache_dir)))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_blob_store(_cache_dir: &std::path::Path) -> Result<Arc<dyn BlobStore>> {
    Err(Error::CapabilityMissing {
        capability: "BlobStore".to_string(),
        message: "No BlobStore implementation provided for the track cache. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use FileBlobStore. \
                 Other hosts: inject a BlobStore, or MemoryBlobStore for a session-only cache."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn default_cache_dir() -> PathBuf {
    bridge_desktop::default_cache_dir()
}

#[cfg(not(feature = "desktop-shims"))]
fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("flacstore").join("tracks")
}

#[cfg(feature = "desktop-shims")]
fn default_download_dir() -> PathBuf {
    bridge_desktop::default_download_dir()
}

#[cfg(not(feature = "desktop-shims"))]
fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    endpoints: Option<Endpoints>,
    cache_dir: Option<PathBuf>,
    download_dir: Option<PathBuf>,
    cache_max_age: Option<Duration>,
    cache_memory_entries: Option<usize>,
    enable_cache: Option<bool>,
    request_timeout: Option<Duration>,
    stream_timeout: Option<Duration>,
    download_timeout: Option<Duration>,
    initial_volume: Option<f32>,
    http_client: Option<Arc<dyn HttpClient>>,
    blob_store: Option<Arc<dyn BlobStore>>,
}

impl std::fmt::Debug for CoreConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfigBuilder")
            .field("api_base_url", &self.api_base_url)
            .field("endpoints", &self.endpoints)
            .field("cache_dir", &self.cache_dir)
            .field("download_dir", &self.download_dir)
            .field("cache_max_age", &self.cache_max_age)
            .field("cache_memory_entries", &self.cache_memory_entries)
            .field("enable_cache", &self.enable_cache)
            .field("request_timeout", &self.request_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("initial_volume", &self.initial_volume)
            .field("http_client", &self.http_client.is_some())
            .field("blob_store", &self.blob_store.is_some())
            .finish()
    }
}

impl CoreConfigBuilder {
    /// Start from environment overrides (see module docs).
    ///
    /// Fails if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::default();

        if let Some(url) = lookup("FLACSTORE_API_URL") {
            builder = builder.api_base_url(url);
        }
        if let Some(dir) = lookup("FLACSTORE_CACHE_DIR") {
            builder = builder.cache_dir(dir);
        }
        if let Some(dir) = lookup("FLACSTORE_DOWNLOAD_DIR") {
            builder = builder.download_dir(dir);
        }
        if let Some(raw) = lookup("FLACSTORE_CACHE_MAX_AGE_DAYS") {
            let invalid = |message| Error::InvalidEnv {
                variable: "FLACSTORE_CACHE_MAX_AGE_DAYS",
                value: raw.clone(),
                message,
            };
            let days: u64 = raw
                .trim()
                .parse()
                .map_err(|_| invalid("expected a whole number of days"))?;
            let secs = days
                .checked_mul(SECS_PER_DAY)
                .ok_or_else(|| invalid("too many days"))?;
            builder = builder.cache_max_age(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    /// Sets the API base URL, keeping the default endpoint paths.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the full endpoint layout. Overrides [`api_base_url`](Self::api_base_url).
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Sets the track cache directory.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the download directory.
    pub fn download_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.download_dir = Some(path.into());
        self
    }

    /// Sets the cache entry lifetime.
    ///
    /// Default: 7 days
    pub fn cache_max_age(mut self, age: Duration) -> Self {
        self.cache_max_age = Some(age);
        self
    }

    /// Sets how many blobs stay in memory. Zero disables the memory layer.
    ///
    /// Default: 4
    pub fn cache_memory_entries(mut self, entries: usize) -> Self {
        self.cache_memory_entries = Some(entries);
        self
    }

    /// Enables or disables the local track cache.
    ///
    /// Default: true
    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = Some(enabled);
        self
    }

    /// Sets the timeout for search and health requests.
    ///
    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the timeout for fetching a track to play.
    ///
    /// Default: 120 seconds
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = Some(timeout);
        self
    }

    /// Sets the timeout for downloads.
    ///
    /// Default: 300 seconds
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    /// Sets the initial output volume.
    ///
    /// Default: 1.0
    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = Some(volume);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the blob store backing the track cache.
    ///
    /// If not provided, a file store under the cache directory is used when
    /// the `desktop-shims` feature is enabled.
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - A required bridge is missing and no desktop default is available
    /// - A value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let endpoints = match (self.endpoints, self.api_base_url) {
            (Some(endpoints), _) => endpoints,
            (None, Some(url)) => Endpoints::new(url),
            (None, None) => Endpoints::default(),
        };

        let cache_dir = self.cache_dir.unwrap_or_else(default_cache_dir);
        let download_dir = self.download_dir.unwrap_or_else(default_download_dir);
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let blob_store = match self.blob_store {
            Some(store) => store,
            None => provide_default_blob_store(&cache_dir)?,
        };

        let config = CoreConfig {
            endpoints,
            cache_dir,
            download_dir,
            cache_max_age: self.cache_max_age.unwrap_or(DEFAULT_CACHE_MAX_AGE),
            cache_memory_entries: self
                .cache_memory_entries
                .unwrap_or(DEFAULT_CACHE_MEMORY_ENTRIES),
            enable_cache: self.enable_cache.unwrap_or(true),
            request_timeout,
            stream_timeout: self.stream_timeout.unwrap_or(DEFAULT_STREAM_TIMEOUT),
            download_timeout: self.download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
            initial_volume: self.initial_volume.unwrap_or(DEFAULT_INITIAL_VOLUME),
            http_client,
            blob_store,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse, MemoryBlobStore};
    use std::collections::HashMap;

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(200, "[]"))
        }
    }

    fn injected() -> CoreConfigBuilder {
        CoreConfig::builder()
            .cache_dir("/tmp/flacstore-test")
            .download_dir("/tmp/flacstore-downloads")
            .http_client(Arc::new(NoopHttpClient))
            .blob_store(Arc::new(MemoryBlobStore::new()))
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = Endpoints::new("http://localhost:5000/");

        assert_eq!(
            endpoints.search_url("moon light&co"),
            "http://localhost:5000/api/search?q=moon%20light%26co"
        );
        assert_eq!(
            endpoints.stream_url("1AbC"),
            "http://localhost:5000/stream/1AbC"
        );
        assert_eq!(
            endpoints.download_url("a/b"),
            "http://localhost:5000/api/download/a%2Fb"
        );
        assert_eq!(endpoints.health_url(), "http://localhost:5000/api/test");
    }

    #[test]
    fn test_defaults_with_injected_bridges() {
        let config = injected().build().unwrap();

        assert_eq!(config.endpoints.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.cache_max_age, DEFAULT_CACHE_MAX_AGE);
        assert_eq!(config.cache_memory_entries, 4);
        assert!(config.enable_cache);
        assert_eq!(config.initial_volume, 1.0);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.stream_timeout, Duration::from_secs(120));
        assert_eq!(config.download_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_timeouts_are_separate() {
        let config = injected()
            .request_timeout(Duration::from_secs(5))
            .stream_timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.stream_timeout, Duration::from_secs(60));
        assert_eq!(config.download_timeout, DEFAULT_DOWNLOAD_TIMEOUT);

        let err = injected()
            .download_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.starts_with("Download timeout")));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = injected().api_base_url("ftp://nope").build().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("http")));
    }

    #[test]
    fn test_invalid_volume() {
        assert!(injected().initial_volume(1.5).build().is_err());
        assert!(injected().initial_volume(f32::NAN).build().is_err());
    }

    #[test]
    fn test_zero_max_age_rejected() {
        assert!(injected().cache_max_age(Duration::ZERO).build().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("FLACSTORE_API_URL", "http://127.0.0.1:8080"),
            ("FLACSTORE_CACHE_MAX_AGE_DAYS", "2"),
        ]
        .into_iter()
        .collect();

        let config = CoreConfigBuilder::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap()
            .http_client(Arc::new(NoopHttpClient))
            .blob_store(Arc::new(MemoryBlobStore::new()))
            .build()
            .unwrap();

        assert_eq!(config.endpoints.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.cache_max_age, Duration::from_secs(2 * 24 * 60 * 60));
    }

    #[test]
    fn test_from_lookup_rejects_bad_days() {
        let result = CoreConfigBuilder::from_lookup(|k| {
            (k == "FLACSTORE_CACHE_MAX_AGE_DAYS").then(|| "a week".to_string())
        });
        let err = result.unwrap_err();
        assert!(
            matches!(err, Error::InvalidEnv { variable, ref value, .. } if variable == "FLACSTORE_CACHE_MAX_AGE_DAYS" && value == "a week")
        );
        assert_eq!(
            err.to_string(),
            "FLACSTORE_CACHE_MAX_AGE_DAYS: expected a whole number of days (got 'a week')"
        );
    }

    #[test]
    fn test_from_lookup_rejects_overflowing_days() {
        let result = CoreConfigBuilder::from_lookup(|k| {
            (k == "FLACSTORE_CACHE_MAX_AGE_DAYS").then(|| "300000000000000".to_string())
        });
        match result {
            Err(Error::InvalidEnv { value, message, .. }) => {
                assert_eq!(value, "300000000000000");
                assert_eq!(message, "too many days");
            }
            other => panic!("expected InvalidEnv, got {other:?}"),
        }

        let largest = (u64::MAX / SECS_PER_DAY).to_string();
        let builder = CoreConfigBuilder::from_lookup(|k| {
            (k == "FLACSTORE_CACHE_MAX_AGE_DAYS").then(|| largest.clone())
        })
        .unwrap();
        assert!(builder.cache_max_age.is_some());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_is_capability_error() {
        let err = CoreConfig::builder()
            .blob_store(Arc::new(MemoryBlobStore::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityMissing { capability, .. } if capability == "HttpClient"));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_defaults_fill_bridges() {
        let dir = std::env::temp_dir().join("flacstore-config-test");
        let config = CoreConfig::builder().cache_dir(&dir).build().unwrap();
        assert_eq!(config.cache_dir, dir);
    }
}
