//! Workspace umbrella crate.
//!
//! Exposes shared feature flags that map to the individual workspace crates
//! (`core-service`, `core-playback`, `core-library`). Host applications can
//! depend on `flacstore-workspace` and enable `desktop-shims` or
//! `audio-output` without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_library as library;
#[cfg(feature = "desktop-shims")]
pub use core_playback as playback;
#[cfg(feature = "desktop-shims")]
pub use core_service as service;
