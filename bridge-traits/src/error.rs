use crate::playback::MediaErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a host capability.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide the capability at all (no audio device, no
    /// writable data directory).
    #[error("{0} is unavailable on this host")]
    NotAvailable(String),

    #[error("{0}")]
    OperationFailed(String),

    /// The host declined, e.g. an autoplay policy refused `play`.
    #[error("refused by host: {0}")]
    NotAllowed(String),

    /// The request never produced a response.
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("no response within {0:?}")]
    TimedOut(Duration),

    #[error("blob storage: {0}")]
    Storage(String),

    /// The output rejected the source itself, not the device.
    #[error("cannot play source: {message}")]
    Media {
        kind: MediaErrorKind,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn is_not_allowed(&self) -> bool {
        matches!(self, BridgeError::NotAllowed(_))
    }

    /// Transport-level failures that a retry may cure.
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Network(_) | BridgeError::TimedOut(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(BridgeError::NotAllowed("autoplay".into()).is_not_allowed());
        assert!(BridgeError::TimedOut(Duration::from_secs(5)).is_transport());
        assert!(!BridgeError::Storage("full".into()).is_transport());
        assert!(!BridgeError::Media {
            kind: MediaErrorKind::Decode,
            message: "bad frame".into()
        }
        .is_transport());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            BridgeError::NotAvailable("audio output".into()).to_string(),
            "audio output is unavailable on this host"
        );
        assert_eq!(
            BridgeError::TimedOut(Duration::from_secs(2)).to_string(),
            "no response within 2s"
        );
    }
}
