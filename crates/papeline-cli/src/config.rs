//! Configuration loading from TOML files and the environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use papeline_arxiv::config::{DEFAULT_BASE_URL, DEFAULT_BATCH_SIZE, DEFAULT_FETCH_HOURS};
use papeline_arxiv::{DedupPolicy, Delivery, LocalConfig, PipelineError, RemoteConfig, Signer};
use papeline_core::{HttpConfig, RetryPolicy};
use serde::Deserialize;

/// Global configuration for papeline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub arxiv: ArxivConfig,
    pub http: HttpSettings,
    pub output: OutputConfig,
    pub remote: RemoteSettings,
    pub signing: SigningConfig,
    pub state: StateConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    pub base_url: String,
    pub categories: Vec<String>,
    pub fetch_hours: u32,
    pub page_size: usize,
    pub max_pages: Option<usize>,
    pub request_interval_secs: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            categories: vec!["cs.*".to_string()],
            fetch_hours: DEFAULT_FETCH_HOURS,
            page_size: 100,
            max_pages: None,
            request_interval_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub read_timeout: u64,
    pub max_retries: u32,
    pub backoff_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            read_timeout: 60,
            max_retries: 3,
            backoff_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Local,
    #[serde(alias = "remote")]
    Api,
}

impl OutputMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "api" | "remote" => Some(Self::Api),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Local,
            dir: PathBuf::from("./output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub url: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub enable_auth: bool,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            url: None,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: 90,
            enable_auth: false,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub enabled: bool,
    pub private_key_path: Option<PathBuf>,
    /// Inline PEM; prefer `private_key_path` or `${VAR}`
    #[serde(deserialize_with = "deserialize_env_var")]
    pub private_key: Option<String>,
    pub key_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
    pub policy: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./state/seen.json"),
            policy: DedupPolicy::default().as_str().to_string(),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Treat empty environment values as unset
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./papeline.toml (current directory)
    /// 2. ~/.config/papeline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("papeline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "papeline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (collector variable names).
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| non_empty(lookup(name));

        if let Some(mode) = get("ARXIV_OUTPUT_MODE") {
            self.output.mode = OutputMode::parse(&mode)
                .with_context(|| format!("ARXIV_OUTPUT_MODE: unknown mode {mode:?}"))?;
        }
        if let Some(dir) = get("OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(hours) = get("FETCH_HOURS") {
            self.arxiv.fetch_hours = hours
                .trim()
                .parse()
                .with_context(|| format!("FETCH_HOURS: not a number: {hours:?}"))?;
        }
        if let Some(url) = get("ARXIV_API_SERVICE_URL") {
            self.remote.url = Some(url);
        }
        if let Some(flag) = get("ARXIV_ENABLE_AUTH") {
            self.remote.enable_auth = parse_flag(&flag);
        }
        if let Some(key) = get("ARXIV_API_KEY") {
            self.remote.api_key = Some(key);
        }
        if let Some(flag) = get("ARXIV_ENABLE_SIGNING") {
            self.signing.enabled = parse_flag(&flag);
        }
        if let Some(pem) = get("ARXIV_PRIVATE_KEY") {
            self.signing.private_key = Some(pem);
        }
        if let Some(path) = get("ARXIV_PRIVATE_KEY_PATH") {
            self.signing.private_key_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            read_timeout: Duration::from_secs(self.http.read_timeout),
            post_timeout: Duration::from_secs(self.remote.timeout_secs),
            max_retries: self.http.max_retries,
            backoff: Duration::from_secs(self.http.backoff_secs),
        }
    }

    /// Build the pipeline configuration, loading credentials and keys.
    pub fn resolve(&self) -> Result<papeline_arxiv::Config, PipelineError> {
        let dedup_policy = DedupPolicy::parse(&self.state.policy).ok_or_else(|| {
            PipelineError::Config(format!(
                "unknown dedup policy {:?} (expected newer-version or presence)",
                self.state.policy
            ))
        })?;
        let retry = RetryPolicy::from(&self.http_config());

        let delivery = match self.output.mode {
            OutputMode::Local => {
                if self.signing.enabled {
                    log::warn!("Signing is enabled but output mode is local; ignoring");
                }
                Delivery::Local(LocalConfig {
                    output_dir: self.output.dir.clone(),
                })
            }
            OutputMode::Api => Delivery::Remote(RemoteConfig {
                url: self.remote.url.clone().ok_or_else(|| {
                    PipelineError::Config(
                        "api mode requires a service URL ([remote].url or ARXIV_API_SERVICE_URL)"
                            .into(),
                    )
                })?,
                batch_size: self.remote.batch_size,
                api_key: self.api_key()?,
                signer: self.load_signer()?,
                retry,
            }),
        };

        Ok(papeline_arxiv::Config {
            base_url: self.arxiv.base_url.clone(),
            categories: self.arxiv.categories.clone(),
            fetch_hours: self.arxiv.fetch_hours,
            page_size: self.arxiv.page_size,
            max_pages: self.arxiv.max_pages,
            min_request_interval: Duration::from_secs(self.arxiv.request_interval_secs),
            fetch_retry: retry,
            dedup_policy,
            delivery,
        })
    }

    fn api_key(&self) -> Result<Option<String>, PipelineError> {
        if !self.remote.enable_auth {
            return Ok(None);
        }
        match &self.remote.api_key {
            Some(key) => Ok(Some(key.clone())),
            None => Err(PipelineError::Config(
                "authentication enabled but no API key ([remote].api_key or ARXIV_API_KEY)".into(),
            )),
        }
    }

    fn load_signer(&self) -> Result<Option<Signer>, PipelineError> {
        if !self.signing.enabled {
            return Ok(None);
        }
        let signer = match (&self.signing.private_key, &self.signing.private_key_path) {
            (Some(pem), _) => Signer::from_pkcs8_pem(pem)?,
            (None, Some(path)) => Signer::from_pem_file(path)?,
            (None, None) => {
                return Err(PipelineError::SigningUnavailable(
                    "signing enabled but no private key configured".into(),
                ));
            }
        };
        let signer = match &self.signing.key_id {
            Some(id) => signer.with_key_id(id.clone()),
            None => signer,
        };
        log::info!("Signing deliveries with key {}", signer.key_id());
        Ok(Some(signer))
    }
}
