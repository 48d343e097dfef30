//! Shared plumbing for the FlacStore core crates: configuration and endpoint
//! layout ([`config`]), the event bus ([`events`]), subscriber setup
//! ([`logging`]) and the configuration error type.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, Endpoints};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, FailureCategory};
