mod aggregate;
mod fetcher;
mod manager;
mod normalize;
mod traits;
mod types;

pub use aggregate::{Aggregator, Blocklist};
pub use fetcher::HttpFetcher;
pub use manager::StandardManager;
pub use normalize::{sniff_format, Normalizer};
pub use traits::{BlocklistManager, SourceFetcher};
pub use types::{DomainToken, RawDocument};
