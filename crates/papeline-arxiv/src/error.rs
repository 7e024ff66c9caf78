//! Run-level error taxonomy
//!
//! Per-page fetch failures ([`papeline_core::FetchError`]) and per-record
//! failures ([`MalformedRecord`]) are absorbed by the runner and counted.
//! Everything in [`PipelineError`] aborts the run before the dedup state is
//! committed.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use papeline_core::StreamError;

/// A raw entry that could not be turned into a paper record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Whatever identifier text was present, for the log line
    pub id: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "malformed record {id}: {}", self.reason),
            None => write!(f, "malformed record: {}", self.reason),
        }
    }
}

impl std::error::Error for MalformedRecord {}

/// Fatal run error.
#[derive(Debug)]
pub enum PipelineError {
    /// Window start is not before its end
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Missing or inconsistent configuration for the selected mode
    Config(String),
    /// Signing enabled but no usable private key
    SigningUnavailable(String),
    /// Local output could not be written
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Remote service rejected a batch with 4xx (credential or signature)
    DeliveryAuth { status: u16, message: String },
    /// Remote delivery still failing after all retries
    Delivery(StreamError),
    /// Dedup state could not be loaded or committed
    Store(anyhow::Error),
    /// Shutdown requested before the run completed
    Interrupted,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWindow { start, end } => {
                write!(f, "invalid fetch window: start {start} is not before end {end}")
            }
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::SigningUnavailable(msg) => write!(f, "signing unavailable: {msg}"),
            Self::Io { path, source } => write!(f, "IO failure on {}: {source}", path.display()),
            Self::DeliveryAuth { status, message } => {
                write!(f, "remote service rejected delivery (HTTP {status}): {message}")
            }
            Self::Delivery(e) => write!(f, "remote delivery failed: {e}"),
            Self::Store(e) => write!(f, "dedup store: {e:#}"),
            Self::Interrupted => write!(f, "interrupted by shutdown request"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Delivery(e) => Some(e),
            _ => None,
        }
    }
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Interrupted => 130,
            Self::InvalidWindow { .. } | Self::Config(_) | Self::SigningUnavailable(_) => 2,
            _ => 1,
        }
    }
}
