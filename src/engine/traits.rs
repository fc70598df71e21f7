use super::types::RawDocument;
use crate::config::SourceDescriptor;
use crate::error::{FetchError, PipelineError};
use crate::stats::RefreshReport;

/// Retrieves the raw body of one source. Swappable for tests.
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<RawDocument, FetchError>;
}

/// The "Control Plane" for rebuilds.
#[async_trait::async_trait]
pub trait BlocklistManager: Send + Sync {
    /// Fetches all configured lists and replaces the output artifact.
    /// On error the previous artifact is left untouched.
    async fn refresh(&self) -> Result<RefreshReport, PipelineError>;
}
