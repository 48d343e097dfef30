use thiserror::Error;

/// Errors surfaced by [`CoreService`](crate::CoreService).
#[derive(Error, Debug)]
pub enum CoreError {
    /// Bootstrapping could not obtain a required host bridge.
    #[error("cannot start without {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error(transparent)]
    Library(#[from] core_library::LibraryError),

    #[error(transparent)]
    Playback(#[from] core_playback::PlaybackError),

    /// The download endpoint failed or returned nothing.
    #[error("download failed: {0}")]
    NetworkFailure(String),

    /// Writing a download to disk failed.
    #[error("cannot write download: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Library(e) => e.user_message(),
            CoreError::Playback(e) => e.user_message().to_string(),
            CoreError::NetworkFailure(_) => {
                "Download failed. Check your connection and try again.".to_string()
            }
            CoreError::Io(_) => "Couldn't save the file.".to_string(),
            CoreError::CapabilityMissing { .. } | CoreError::Runtime(_) => {
                "The player could not start. Check the configuration.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
