use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Ordered source registry. Declaration order is merge order.
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default)]
    pub allowlist: Vec<String>,

    #[serde(default = "default_skip_local_names")]
    pub skip_local_names: bool,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub updates: UpdateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One remote list and the format it is expected to be in.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub format: SourceFormat,
}

impl SourceDescriptor {
    pub fn new(url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            name: None,
            url: url.into(),
            format,
        }
    }

    /// Name used in logs and reports; falls back to the URL.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    #[serde(rename = "raw")]
    RawDomainList,
    #[serde(rename = "hosts-zero")]
    HostsFileIPv4Zero,
    #[serde(rename = "hosts-loopback")]
    HostsFileLoopback,
    #[serde(rename = "tabular")]
    GenericTabular,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceFormat::RawDomainList => "raw",
            SourceFormat::HostsFileIPv4Zero => "hosts-zero",
            SourceFormat::HostsFileLoopback => "hosts-loopback",
            SourceFormat::GenericTabular => "tabular",
            SourceFormat::Auto => "auto",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Longest accepted rebuild interval: one year.
const MAX_INTERVAL_HOURS: u64 = 24 * 365;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UpdateConfig {
    /// Rebuild interval for long-running mode. Zero builds once and exits.
    #[serde(default)]
    pub interval_hours: u64,
}

impl UpdateConfig {
    /// `None` means build once.
    pub fn interval(&self) -> Option<Duration> {
        match self.interval_hours {
            0 => None,
            hours => Some(Duration::from_secs(hours * 3600)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Defaults
fn default_output() -> PathBuf {
    PathBuf::from("blocklist.txt")
}
fn default_skip_local_names() -> bool {
    true
}
fn default_concurrent_downloads() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_bytes() -> u64 {
    64 * 1024 * 1024
}
fn default_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    concat!("hostlist-builder/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: vec![],
            output: default_output(),
            allowlist: vec![],
            skip_local_names: default_skip_local_names(),
            fetch: FetchConfig::default(),
            updates: UpdateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrent_downloads: default_concurrent_downloads(),
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Reads and validates the configuration file. A missing file is an error:
    /// running without sources would replace a good blocklist with nothing.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        for source in &self.sources {
            let invalid = |reason: String| ConfigError::InvalidUrl {
                name: source.label().to_string(),
                url: source.url.clone(),
                reason,
            };
            let parsed = Url::parse(&source.url).map_err(|e| invalid(e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
            }
        }

        if self.fetch.concurrent_downloads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.concurrent_downloads",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch.max_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.max_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.updates.interval_hours > MAX_INTERVAL_HOURS {
            return Err(ConfigError::InvalidValue {
                field: "updates.interval_hours",
                reason: format!("must be at most {}", MAX_INTERVAL_HOURS),
            });
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
