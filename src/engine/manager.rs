use super::aggregate::Aggregator;
use super::fetcher::HttpFetcher;
use super::normalize::Normalizer;
use super::traits::{BlocklistManager, SourceFetcher};
use super::types::DomainToken;
use crate::config::{Config, SourceDescriptor};
use crate::error::{ConfigError, PipelineError};
use crate::stats::{RefreshReport, SourceOutcome, SourceReport};
use futures::{stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct StandardManager {
    config: Config,
    fetcher: Arc<dyn SourceFetcher>,
}

/// Tokens from one source plus what to report about it.
struct SourceResult {
    report: SourceReport,
    tokens: Vec<DomainToken>,
}

impl StandardManager {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: Config, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { config, fetcher }
    }

    async fn fetch_and_normalize(
        fetcher: &dyn SourceFetcher,
        source: SourceDescriptor,
        skip_local_names: bool,
    ) -> SourceResult {
        let label = source.label().to_string();
        let url = source.url.clone();

        let doc = match fetcher.fetch(&source).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to fetch '{}': {}", label, e);
                return SourceResult {
                    report: SourceReport {
                        label,
                        url,
                        outcome: SourceOutcome::Failed(e),
                    },
                    tokens: vec![],
                };
            }
        };

        let normalizer = Normalizer::for_document(source.format, &doc.body, skip_local_names);
        if source.format != normalizer.format() {
            info!("Detected format '{}' for '{}'", normalizer.format(), label);
        }

        let mut tokens = Vec::new();
        let mut rejected = 0;
        for result in normalizer.lines(&doc.body) {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    rejected += 1;
                    debug!("Skipping malformed line in '{}': {}", label, e);
                }
            }
        }

        info!(
            "Parsed {} entries from '{}' ({} lines rejected)",
            tokens.len(),
            label,
            rejected
        );

        SourceResult {
            report: SourceReport {
                label,
                url,
                outcome: SourceOutcome::Fetched {
                    format: normalizer.format(),
                    lines: doc.body.lines().count(),
                    tokens: tokens.len(),
                    rejected,
                },
            },
            tokens,
        }
    }
}

#[async_trait::async_trait]
impl BlocklistManager for StandardManager {
    async fn refresh(&self) -> Result<RefreshReport, PipelineError> {
        info!("Refreshing blocklists...");

        let skip_local_names = self.config.skip_local_names;
        let tasks = self.config.sources.iter().cloned().map(|source| {
            let fetcher = self.fetcher.clone();
            async move { Self::fetch_and_normalize(fetcher.as_ref(), source, skip_local_names).await }
        });

        // `buffered` keeps declaration order while running up to N sources at once.
        let results: Vec<SourceResult> = stream::iter(tasks)
            .buffered(self.config.fetch.concurrent_downloads)
            .collect()
            .await;

        let mut aggregator = Aggregator::new(&self.config.allowlist);
        let mut sources = Vec::with_capacity(results.len());
        for result in results {
            aggregator.extend(result.tokens);
            sources.push(result.report);
        }

        if !sources.iter().any(SourceReport::is_ok) {
            let failures = sources
                .into_iter()
                .filter_map(|s| match s.outcome {
                    SourceOutcome::Failed(e) => Some(e),
                    SourceOutcome::Fetched { .. } => None,
                })
                .collect();
            return Err(PipelineError::AllSourcesFailed(failures));
        }

        let blocklist = aggregator.finish();
        if blocklist.is_empty() {
            warn!("No domains collected from any source");
            return Err(PipelineError::EmptyBlocklist);
        }

        blocklist.write_atomic(&self.config.output).await?;

        let report = RefreshReport {
            sources,
            raw_tokens: blocklist.raw_count(),
            distinct: blocklist.len(),
            duplicates: blocklist.duplicates(),
            allowlisted: blocklist.allowlisted(),
            output: self.config.output.clone(),
        };

        info!(
            "Blocklist refresh complete. Total distinct domains: {} (from {} raw entries)",
            report.distinct, report.raw_tokens
        );
        Ok(report)
    }
}
