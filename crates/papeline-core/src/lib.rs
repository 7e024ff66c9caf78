//! Papeline Core - Common infrastructure for paper data pipelines
//!
//! This crate provides reusable components for fetching academic paper
//! metadata from rate-limited HTTP APIs: a blocking transport over a shared
//! runtime, error classification, retry with backoff, request spacing,
//! logging, progress, and shutdown handling.

pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod rate;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use error::{FetchError, Retryable};
pub use http::{HttpConfig, HttpResponse, HttpTransport, SHARED_RUNTIME, StreamError, Transport};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use rate::RateLimiter;
pub use retry::{RetryPolicy, retry_with_backoff};
pub use shutdown::{
    install_signal_handlers, is_shutdown_requested, request_shutdown, shutdown_flag,
};
