//! Error types for the blocklist pipeline.
//!
//! Only [`ConfigError`], [`WriteError`] and the run-level [`PipelineError`]
//! are fatal. [`FetchError`] is scoped to one source and [`FormatError`] to
//! one line; both are logged and skipped.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no sources configured")]
    NoSources,

    #[error("source '{name}' has an invalid URL '{url}': {reason}")]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// Why a single source could not be retrieved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("response exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

impl FetchCause {
    /// Server errors and network hiccups are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchCause::Transport(_) | FetchCause::Timeout(_) => true,
            FetchCause::Status(code) => *code >= 500,
            FetchCause::TooLarge { .. } => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to fetch {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            url: url.into(),
            cause,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct FormatError {
    pub line: usize,
    pub reason: FormatReason,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatReason {
    #[error("no domain field")]
    MissingField,

    #[error("'{0}' is an IP address, not a domain")]
    IpLiteral(String),

    #[error("'{0}' is longer than 253 bytes")]
    TooLong(String),

    #[error("'{0}' is not a valid domain name")]
    InvalidName(String),
}

#[derive(Error, Debug)]
#[error("failed to write blocklist to {path}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Outcome of a whole run that prevented the artifact from being replaced.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("all {} sources failed: {}", .0.len(), summarize(.0))]
    AllSourcesFailed(Vec<FetchError>),

    #[error("sources produced no domains; keeping the previous blocklist")]
    EmptyBlocklist,

    #[error(transparent)]
    Write(#[from] WriteError),
}

fn summarize(errors: &[FetchError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_causes() {
        assert!(FetchCause::Transport("reset".into()).is_retryable());
        assert!(FetchCause::Timeout(5).is_retryable());
        assert!(FetchCause::Status(503).is_retryable());
        assert!(!FetchCause::Status(404).is_retryable());
        assert!(!FetchCause::TooLarge { limit: 10 }.is_retryable());
    }

    #[test]
    fn test_all_failed_lists_every_url() {
        let err = PipelineError::AllSourcesFailed(vec![
            FetchError::new("https://a.test/list", FetchCause::Status(404)),
            FetchError::new("https://b.test/list", FetchCause::Timeout(30)),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("all 2 sources failed"));
        assert!(msg.contains("https://a.test/list"));
        assert!(msg.contains("https://b.test/list"));
    }
}
