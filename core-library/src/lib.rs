//! # Track Library Module
//!
//! Owns the track data model and the client for the remote search service.
//!
//! ## Overview
//!
//! This module manages:
//! - Track identifiers and the summaries returned by a search
//! - Query normalization (trimming, the empty-query short circuit)
//! - Decoding of the search response, tolerating missing optional fields
//! - Search lifecycle events on the core event bus

pub mod error;
pub mod models;
pub mod search;

pub use error::{LibraryError, Result};
pub use models::{TrackId, TrackSummary};
pub use search::SearchService;
