//! Unified error types for offcache.
//!
//! Storage errors are best-effort on the request path: callers log and swallow
//! them. Network and precache errors propagate unless a fallback applies.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the caching agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty URL from the host).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unresolvable URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A static manifest entry could not be fetched while priming.
    #[error("PRECACHE_FAILED: {url}: {reason}")]
    Precache { url: String, reason: String },

    /// Network fetch failed.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Lifecycle transition requested from the wrong state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded.
    #[error("STORAGE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),
}

impl Error {
    /// Whether this error came from the cache store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Precache { .. } => (-32020, err.to_string()),
            Error::Network(msg) => (-32008, msg.clone()),
            Error::InvalidState(msg) => (-32021, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Network("connection refused".to_string());
        assert!(err.to_string().contains("NETWORK_ERROR"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_precache_display_names_url() {
        let err = Error::Precache { url: "https://example.com/styles.css".into(), reason: "status 404".into() };
        assert_eq!(err.to_string(), "PRECACHE_FAILED: https://example.com/styles.css: status 404");
    }

    #[test]
    fn test_is_storage() {
        assert!(Error::MigrationFailed("x".into()).is_storage());
        assert!(Error::CorruptEntry("x".into()).is_storage());
        assert!(!Error::Network("x".into()).is_storage());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::Network("offline".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32008);
    }
}
