use bridge_traits::error::BridgeError;
use core_runtime::events::FailureCategory;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Search service returned HTTP {status}")]
    Network { status: u16 },

    #[error("Search service error: {0}")]
    Server(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl LibraryError {
    /// Failure bucket used for user-facing reporting.
    pub fn category(&self) -> FailureCategory {
        match self {
            LibraryError::Bridge(_) | LibraryError::Network { .. } => FailureCategory::Network,
            LibraryError::Server(_) => FailureCategory::Network,
            LibraryError::InvalidInput { .. } => FailureCategory::MalformedResponse,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LibraryError::Bridge(BridgeError::NotAllowed(_)) => false,
            LibraryError::Bridge(_) => true,
            LibraryError::Network { status } => *status >= 500 || *status == 429,
            LibraryError::Server(_) | LibraryError::InvalidInput { .. } => false,
        }
    }

    /// Short message suitable for the results area.
    pub fn user_message(&self) -> String {
        match self {
            LibraryError::Server(message) => message.clone(),
            LibraryError::Network { status } => format!("Search failed (HTTP {})", status),
            _ => "Error searching tracks. Please try again.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
