//! Error types for vitrine.

use thiserror::Error;

/// Result type alias using vitrine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vitrine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Remote backend call failed (transient, item left retryable)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid input (rejected before entering the pipeline)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Extraction worker context fault
    #[error("Worker error: {0}")]
    Worker(String),

    /// Durable store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the operation may succeed if retried as-is.
    ///
    /// Only transient backend failures are retryable; validation and
    /// internal errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Backend(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_backend() {
        let err = Error::Backend("connection reset".to_string());
        assert_eq!(err.to_string(), "Backend error: connection reset");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("empty note text".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty note text");
    }

    #[test]
    fn test_error_display_worker() {
        let err = Error::Worker("context terminated".to_string());
        assert_eq!(err.to_string(), "Worker error: context terminated");
    }

    #[test]
    fn test_error_display_store() {
        let err = Error::Store("disk full".to_string());
        assert_eq!(err.to_string(), "Store error: disk full");
    }

    #[test]
    fn test_error_display_internal() {
        let err = Error::Internal("unexpected state".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_backend_is_retryable() {
        assert!(Error::Backend("timeout".into()).is_retryable());
        assert!(!Error::InvalidInput("bad url".into()).is_retryable());
        assert!(!Error::Worker("dead".into()).is_retryable());
        assert!(!Error::Internal("oops".into()).is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
