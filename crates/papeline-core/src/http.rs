//! Blocking HTTP transport over a shared tokio runtime.
//!
//! Uses async reqwest internally, but presents a sync interface: the pipeline
//! is strictly sequential and only ever has one request in flight.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for transport operations
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code (`None` = no response at all)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so query strings and endpoints stay out of logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    /// Error for a response that arrived with a non-success status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let mut message: String = body.trim().chars().take(200).collect();
        if message.is_empty() {
            message = "empty response body".to_string();
        }
        Self::Http {
            status: Some(status),
            message,
        }
    }

    /// Transient failures: no response, 429, 5xx, or an interrupted read.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                matches!(status, None | Some(429) | Some(500..=599))
            }
            Self::Io(e) => {
                // Disk full is not retryable, timeout IS retryable
                e.kind() != std::io::ErrorKind::StorageFull
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Io(_) => None,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sequential request/response transport.
///
/// Any received response is `Ok`, whatever its status; `Err` means no usable
/// response arrived (connect failure, timeout, broken body).
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, StreamError>;

    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpResponse, StreamError>;
}

/// Timeouts and retry settings shared by every HTTP caller.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Whole-request timeout for GETs
    pub read_timeout: Duration,
    /// Whole-request timeout for POSTs
    pub post_timeout: Duration,
    /// Total attempts per request, including the first
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt
    pub backoff: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            post_timeout: Duration::from_secs(90),
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Shared tokio runtime for HTTP operations.
///
/// Current-thread: requests are issued one at a time from the calling thread.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    read_timeout: Duration,
    post_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("papeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StreamError::from_reqwest)?;
        Ok(Self {
            client,
            read_timeout: config.read_timeout,
            post_timeout: config.post_timeout,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, StreamError> {
        SHARED_RUNTIME.block_on(async {
            let resp = self
                .client
                .get(url)
                .query(query)
                .timeout(self.read_timeout)
                .send()
                .await
                .map_err(StreamError::from_reqwest)?;
            let status = resp.status().as_u16();
            let body = resp.text().await.map_err(StreamError::from_reqwest)?;
            Ok(HttpResponse { status, body })
        })
    }

    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpResponse, StreamError> {
        SHARED_RUNTIME.block_on(async {
            let mut req = self
                .client
                .post(url)
                .timeout(self.post_timeout)
                .body(body.to_vec());
            for (name, value) in headers {
                req = req.header(name.as_str(), value.as_str());
            }
            let resp = req.send().await.map_err(StreamError::from_reqwest)?;
            let status = resp.status().as_u16();
            let body = resp.text().await.map_err(StreamError::from_reqwest)?;
            Ok(HttpResponse { status, body })
        })
    }
}
