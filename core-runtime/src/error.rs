use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors raised while configuring the core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An environment variable was set but could not be parsed.
    #[error("{variable}: {message} (got '{value}')")]
    InvalidEnv {
        variable: &'static str,
        value: String,
        message: &'static str,
    },

    /// No host implementation was injected for a required bridge and the
    /// build has no default for it.
    #[error("missing {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A default host implementation failed to start.
    #[error("default {capability} failed to start: {source}")]
    Bridge {
        capability: &'static str,
        #[source]
        source: BridgeError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
