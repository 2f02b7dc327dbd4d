//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store configuration was rejected at open time.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The backing table could not be read or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Session values could not be serialized.
    #[error("Failed to encode session values: {0}")]
    EncodingFailed(#[from] serde_json::Error),

    /// A payload or cookie signature did not verify.
    #[error("Session authentication failed")]
    AuthenticationFailed,

    /// A payload verified but could not be interpreted.
    #[error("Malformed session payload: {0}")]
    MalformedPayload(String),

    /// No session exists with the given ID.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The background reclaimer task failed to shut down cleanly.
    #[error("Reclaimer error: {0}")]
    Reclaimer(String),
}

impl Error {
    /// Whether this error describes an invalid session reference rather than
    /// an infrastructure problem. The store turns these into a fresh session.
    pub fn is_invalid_session(&self) -> bool {
        matches!(
            self,
            Error::AuthenticationFailed | Error::MalformedPayload(_) | Error::NotFound(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::StorageUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StorageUnavailable(format!("IO error: {}", e))
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
