//! Unified error types for swcache.
//!
//! Display strings carry a stable upper-case code prefix so log lines and
//! host responses can be grepped by kind.

use tokio_rusqlite::rusqlite;

/// Unified error types for the cache engine and its host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a malformed route pattern).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Transport failure: offline, DNS or TLS error, connection reset.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Non-success HTTP status where success was required.
    #[error("HTTP_ERROR: status {0}")]
    HttpStatus(u16),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Install-time manifest population failed; nothing was stored.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Lifecycle transition not allowed from the current state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored row could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),
}

impl Error {
    /// Whether this error came from the network leg of a fetch.
    ///
    /// Network-first falls back to the cache only for these.
    ///
    /// An oversized body is not a failure: the origin answered, the response
    /// just cannot be buffered.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_))
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InstallFailed("/index.html".to_string());
        assert!(err.to_string().contains("INSTALL_FAILED"));
        assert!(err.to_string().contains("/index.html"));

        let err = Error::HttpStatus(404);
        assert_eq!(err.to_string(), "HTTP_ERROR: status 404");
    }

    #[test]
    fn test_fetch_failure_kinds() {
        assert!(Error::Network("offline".into()).is_fetch_failure());
        assert!(Error::FetchTimeout("20s".into()).is_fetch_failure());
        assert!(!Error::HttpStatus(500).is_fetch_failure());
        assert!(!Error::FetchTooLarge("6MB".into()).is_fetch_failure());
        assert!(!Error::InvalidState("active -> installing".into()).is_fetch_failure());
    }
}
