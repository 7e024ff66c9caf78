//! Resolved run configuration

use std::path::PathBuf;
use std::time::Duration;

use papeline_core::RetryPolicy;

use crate::category::CategoryFilter;
use crate::error::PipelineError;
use crate::query::MAX_PAGE_SIZE;
use crate::signer::Signer;

pub const DEFAULT_BASE_URL: &str = "https://export.arxiv.org/api/query";
pub const DEFAULT_FETCH_HOURS: u32 = 96;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(3);

/// Which stored versions count as already delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Re-deliver when the upstream version is higher than the stored one
    #[default]
    NewerVersion,
    /// Any stored identifier suppresses the record
    Presence,
}

impl DedupPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newer-version" | "newer_version" | "version" => Some(Self::NewerVersion),
            "presence" | "id" => Some(Self::Presence),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewerVersion => "newer-version",
            Self::Presence => "presence",
        }
    }
}

/// Append records to `{output_dir}/{YYYY-MM-DD}.jsonl`.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub output_dir: PathBuf,
}

/// POST record batches to a collection service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub batch_size: usize,
    /// Sent as `X-API-Key` when set
    pub api_key: Option<String>,
    pub signer: Option<Signer>,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub enum Delivery {
    Local(LocalConfig),
    Remote(RemoteConfig),
}

impl Delivery {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub categories: Vec<String>,
    pub fetch_hours: u32,
    pub page_size: usize,
    pub max_pages: Option<usize>,
    pub min_request_interval: Duration,
    pub fetch_retry: RetryPolicy,
    pub dedup_policy: DedupPolicy,
    pub delivery: Delivery,
}

impl Config {
    /// Defaults with local delivery into `output_dir`.
    pub fn local(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            categories: vec!["cs.*".to_string()],
            fetch_hours: DEFAULT_FETCH_HOURS,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
            min_request_interval: DEFAULT_MIN_REQUEST_INTERVAL,
            fetch_retry: RetryPolicy::default(),
            dedup_policy: DedupPolicy::default(),
            delivery: Delivery::Local(LocalConfig {
                output_dir: output_dir.into(),
            }),
        }
    }

    /// Check cross-field consistency and build the category filter.
    pub fn validate(&self) -> Result<CategoryFilter, PipelineError> {
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::Config("arxiv base_url is empty".into()));
        }
        if self.fetch_hours == 0 {
            return Err(PipelineError::Config("fetch_hours must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(PipelineError::Config(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.max_pages == Some(0) {
            return Err(PipelineError::Config("max_pages must be at least 1".into()));
        }
        let filter = CategoryFilter::new(&self.categories).ok_or_else(|| {
            PipelineError::Config("category allow-list has no usable pattern".into())
        })?;

        match &self.delivery {
            Delivery::Local(local) => {
                if local.output_dir.as_os_str().is_empty() {
                    return Err(PipelineError::Config("output_dir is empty".into()));
                }
            }
            Delivery::Remote(remote) => {
                if remote.url.trim().is_empty() {
                    return Err(PipelineError::Config(
                        "remote mode requires a service URL".into(),
                    ));
                }
                if remote.batch_size == 0 {
                    return Err(PipelineError::Config("batch_size must be at least 1".into()));
                }
                if remote.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                    return Err(PipelineError::Config(
                        "authentication enabled but API key is empty".into(),
                    ));
                }
            }
        }
        Ok(filter)
    }
}
