//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, blob
//! storage, audio output) into the search client, track cache and playback
//! controller, and adds downloads plus view models for a front end. Desktop
//! apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`); `audio-output` additionally provides
//! [`bootstrap_desktop`] on top of the rodio adapter.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder().build()?;
//! let core = CoreService::bootstrap(config, adapter).await?;
//!
//! let results = core.search("moonlight").await?;
//! if let Some(first) = results.first() {
//!     core.play(first).await?;
//! }
//! ```

pub mod download;
pub mod error;
pub mod service;
pub mod ui;

pub use download::DownloadService;
pub use error::{CoreError, Result};
pub use service::CoreService;

#[cfg(feature = "audio-output")]
pub use service::bootstrap_desktop;
