//! # Track cache
//!
//! Fetched audio is kept on the device keyed by track id, so a replay skips
//! the network. Blobs persist through a [`BlobStore`](bridge_traits::storage::BlobStore)
//! under one namespace and the most recent few also sit in an in-memory LRU.
//! Each blob carries the time it was stored; anything older than
//! [`CacheConfig::max_age`] is removed by the startup sweep.
//!
//! The cache never fails a read. If storage cannot be opened the cache
//! degrades to a permanent miss, writes become no-ops and playback continues
//! from the network.
//!
//! ```rust,ignore
//! let cache = TrackCache::new(CacheConfig::default(), blob_store, clock);
//! cache.initialize().await.ok();
//!
//! match cache.get(&track_id).await {
//!     Some(entry) => play(entry.data),
//!     None => cache.put(&track_id, fetch(&track_id).await?).await,
//! }
//! ```

pub mod config;
pub mod manager;
pub mod stats;

pub use config::CacheConfig;
pub use manager::{CacheEntry, CacheState, TrackCache};
pub use stats::CacheStats;
