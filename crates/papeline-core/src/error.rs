//! Common error type for page fetching

use crate::http::StreamError;

/// Classification hook used by [`crate::retry::retry_with_backoff`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StreamError {
    fn is_retryable(&self) -> bool {
        StreamError::is_retryable(self)
    }
}

/// Error from fetching a single result page (request + body decode).
///
/// Wraps either a network/HTTP error ([`StreamError`]) or a response body
/// that could not be understood. Only the former can be transient.
#[derive(Debug)]
pub enum FetchError {
    Stream(StreamError),
    Malformed(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "{e}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Transient errors get retried; everything else drops the page at once.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Stream(e) => e.is_retryable(),
            Self::Malformed(_) => false,
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl From<StreamError> for FetchError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    fn http_err(status: u16) -> StreamError {
        StreamError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn fetch_error_stream_403_permanent() {
        let err = FetchError::Stream(http_err(403));
        assert!(!err.is_transient());
    }

    #[test]
    fn fetch_error_stream_500_transient() {
        let err = FetchError::Stream(http_err(500));
        assert!(err.is_transient());
    }

    #[test]
    fn fetch_error_rate_limited_transient() {
        let err = FetchError::Stream(http_err(429));
        assert!(err.is_transient());
    }

    #[test]
    fn fetch_error_malformed_permanent() {
        let err = FetchError::Malformed("bad xml".to_string());
        assert!(!err.is_transient());
        assert!(!Retryable::is_retryable(&err));
    }

    #[test]
    fn fetch_error_io_other_transient() {
        let err = FetchError::Stream(StreamError::Io(std::io::Error::new(
            ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(err.is_transient());
    }

    #[test]
    fn fetch_error_display_malformed() {
        let err = FetchError::Malformed("no feed".to_string());
        assert_eq!(format!("{err}"), "malformed response: no feed");
    }
}
