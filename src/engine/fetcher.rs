use super::traits::SourceFetcher;
use super::types::RawDocument;
use crate::config::{FetchConfig, SourceDescriptor};
use crate::error::{ConfigError, FetchCause, FetchError};
use futures::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

/// Fetches sources over HTTP(S) with a per-attempt timeout and a body size cap.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: u64,
    retries: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            max_bytes: config.max_bytes,
            retries: config.retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchCause> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchCause::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status.as_u16()));
        }

        if let Some(len) = resp.content_length() {
            if len > self.max_bytes {
                return Err(FetchCause::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        // Read at most one byte past the limit so oversized bodies are
        // detected without buffering them whole.
        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        let mut reader = StreamReader::new(stream).take(self.max_bytes + 1);
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|e| FetchCause::Transport(e.to_string()))?;

        if body.len() as u64 > self.max_bytes {
            return Err(FetchCause::TooLarge {
                limit: self.max_bytes,
            });
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait::async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<RawDocument, FetchError> {
        let url = source.url.as_str();
        info!("Fetching blocklist '{}' from {}", source.label(), url);

        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.fetch_once(url)).await {
                Ok(result) => result,
                Err(_) => Err(FetchCause::Timeout(self.timeout.as_secs())),
            };

            match result {
                Ok(body) => {
                    debug!("Fetched {} bytes from {}", body.len(), url);
                    return Ok(RawDocument {
                        source: source.clone(),
                        body,
                    });
                }
                Err(cause) if cause.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "Fetch of {} failed ({}), retry {}/{}",
                        url, cause, attempt, self.retries
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(cause) => return Err(FetchError::new(url, cause)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceFormat;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetch_config() -> FetchConfig {
        FetchConfig {
            retries: 0,
            retry_backoff_ms: 10,
            timeout_secs: 5,
            ..FetchConfig::default()
        }
    }

    fn source(server: &MockServer, route: &str) -> SourceDescriptor {
        SourceDescriptor::new(format!("{}{}", server.uri(), route), SourceFormat::Auto)
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hosts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0.0.0.0 ads.com\n"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&fetch_config()).unwrap();
        let doc = fetcher.fetch(&source(&server, "/hosts")).await.unwrap();
        assert_eq!(doc.body, "0.0.0.0 ads.com\n");
        assert!(doc.source.url.ends_with("/hosts"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&fetch_config()).unwrap();
        let err = fetcher.fetch(&source(&server, "/missing")).await.unwrap_err();
        assert_eq!(err.cause, FetchCause::Status(404));
        assert!(err.url.ends_with("/missing"));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a.com\n".repeat(100)))
            .mount(&server)
            .await;

        let config = FetchConfig {
            max_bytes: 64,
            ..fetch_config()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher.fetch(&source(&server, "/big")).await.unwrap_err();
        assert_eq!(err.cause, FetchCause::TooLarge { limit: 64 });
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("a.com\n")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = FetchConfig {
            timeout_secs: 1,
            ..fetch_config()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher.fetch(&source(&server, "/slow")).await.unwrap_err();
        assert_eq!(err.cause, FetchCause::Timeout(1));
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("b.com\n"))
            .mount(&server)
            .await;

        let config = FetchConfig {
            retries: 1,
            ..fetch_config()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let doc = fetcher.fetch(&source(&server, "/flaky")).await.unwrap();
        assert_eq!(doc.body, "b.com\n");
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let config = FetchConfig {
            retries: 3,
            ..fetch_config()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher.fetch(&source(&server, "/denied")).await.unwrap_err();
        assert_eq!(err.cause, FetchCause::Status(403));
    }
}
