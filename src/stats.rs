use crate::config::SourceFormat;
use crate::error::FetchError;
use std::path::PathBuf;
use tracing::{info, warn};

/// What happened to one source during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Fetched {
        format: SourceFormat,
        lines: usize,
        tokens: usize,
        rejected: usize,
    },
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub label: String,
    pub url: String,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Fetched { .. })
    }
}

/// Summary of a successful refresh, in source declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub sources: Vec<SourceReport>,
    pub raw_tokens: usize,
    pub distinct: usize,
    pub duplicates: usize,
    pub allowlisted: usize,
    pub output: PathBuf,
}

impl RefreshReport {
    pub fn succeeded(&self) -> usize {
        self.sources.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failures(&self) -> Vec<&FetchError> {
        self.sources
            .iter()
            .filter_map(|s| match &s.outcome {
                SourceOutcome::Failed(e) => Some(e),
                SourceOutcome::Fetched { .. } => None,
            })
            .collect()
    }

    pub fn log_summary(&self) {
        let mut source_stats = String::new();
        for source in &self.sources {
            if let SourceOutcome::Fetched {
                format,
                tokens,
                rejected,
                ..
            } = &source.outcome
            {
                source_stats.push_str(&format!(
                    "[{} ({}): {} tokens, {} rejected] ",
                    source.label, format, tokens, rejected
                ));
            }
        }

        info!(
            "REFRESH SUMMARY: Sources: {}/{} ok, Raw: {}, Distinct: {}, Duplicates: {} ({:.1}%), Allowlisted: {}, Output: {} {}",
            self.succeeded(),
            self.sources.len(),
            self.raw_tokens,
            self.distinct,
            self.duplicates,
            if self.raw_tokens > 0 {
                (self.duplicates as f64 / self.raw_tokens as f64) * 100.0
            } else {
                0.0
            },
            self.allowlisted,
            self.output.display(),
            source_stats.trim_end()
        );

        for source in &self.sources {
            if let SourceOutcome::Failed(e) = &source.outcome {
                warn!("Source '{}' contributed nothing: {}", source.label, e);
            }
        }
    }
}
