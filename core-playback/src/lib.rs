//! # Playback & Track Cache Module
//!
//! Loads tracks into the host audio output and keeps their audio on the device.
//!
//! ## Overview
//!
//! This module handles:
//! - The local track cache with age-based eviction
//! - Fetching raw audio from the stream endpoint
//! - The playback controller state machine (load, play/pause, seek, volume, mute)
//! - Mapping output faults to user-facing failures

pub mod cache;
pub mod controller;
pub mod error;
pub mod fetcher;

pub use cache::{CacheConfig, CacheEntry, CacheState, CacheStats, TrackCache};
pub use controller::{
    LoadOutcome, NowPlaying, PlaybackController, PlaybackFailure, PlaybackStatus,
    TransportSnapshot,
};
pub use error::{PlaybackError, Result};
pub use fetcher::{HttpTrackFetcher, TrackFetcher};
