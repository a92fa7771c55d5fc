//! Common error types for IBSync

use thiserror::Error;

/// Common result type for IBSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the engine and the remote store
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Remote tier could not be reached or rejected the request
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Local cache entry failed to parse
    #[error("Corrupt local state for '{key}': {reason}")]
    CorruptLocalState { key: String, reason: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures that the persistence layer recovers from on its own
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::RemoteUnavailable(_) | Error::CorruptLocalState { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::RemoteUnavailable("timeout".into()).is_recoverable());
        assert!(Error::CorruptLocalState {
            key: "grid".into(),
            reason: "eof".into()
        }
        .is_recoverable());
        assert!(!Error::InvalidInput("x".into()).is_recoverable());
    }

    #[test]
    fn test_corrupt_state_message_names_key() {
        let err = Error::CorruptLocalState {
            key: "registry".into(),
            reason: "expected value".into(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt local state for 'registry': expected value"
        );
    }
}
