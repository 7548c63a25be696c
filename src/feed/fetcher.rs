use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::xml::{Document, XmlError};
use crate::config::Config;
use crate::util::{validate_feed_url, UrlValidationError};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving a feed document.
///
/// Everything up to and including "the body is well-formed XML" lives here;
/// RSS structure problems are [`super::FeedError`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Source rejected before any network activity
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("Connection failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: {code} {reason}")]
    HttpStatus { code: u16, reason: String },
    /// Server kept answering 429 Too Many Requests
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Body is not a well-formed XML document
    #[error("Response is not a valid XML document: {0}")]
    NotXml(#[source] XmlError),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large (limit 10MB)")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// HTTP client for feed documents.
///
/// Built once from [`Config`]; carries the User-Agent, the per-request timeout
/// and the retry policy.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
        })
    }

    /// Validates `source`, downloads it and parses the body as XML.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - bad scheme/host, no request is made
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] - transport failures
    /// - [`FetchError::HttpStatus`] - non-2xx after retries (4xx fail at once)
    /// - [`FetchError::RateLimited`] - 429 after `max_retries` retries
    /// - [`FetchError::ResponseTooLarge`] / [`FetchError::IncompleteResponse`]
    /// - [`FetchError::NotXml`] - body is not well-formed XML
    pub async fn fetch(&self, source: &str) -> Result<Document, FetchError> {
        let url = validate_feed_url(source)?;
        if !source.is_ascii() {
            tracing::info!(source, converted = %url, "Non-ASCII URL converted");
        }

        tracing::info!(url = %url, "Fetching feed");
        let bytes = self.download(url).await?;
        tracing::debug!(bytes = bytes.len(), "Feed downloaded");

        Document::parse(&bytes).map_err(FetchError::NotXml)
    }

    async fn download(&self, url: url::Url) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let response = tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
                .await
                .map_err(|_| FetchError::Timeout(self.timeout))?
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();

            // EDGE-004: Handle rate limiting with exponential backoff
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= self.max_retries {
                    return Err(FetchError::RateLimited(self.max_retries));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(url = %url, retry = retry_count, ?delay, "Rate limited, backing off");
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // Handle server errors (5xx) with exponential backoff
            if status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(status_error(status));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    ?delay,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // EDGE-002: 4xx errors fail immediately
            if !status.is_success() {
                return Err(status_error(status));
            }

            match self.read_limited_bytes(response, MAX_FEED_SIZE).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    // EDGE-005: Handle incomplete downloads with retry and exponential backoff
                    if retry_count >= self.max_retries {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected,
                        received,
                        attempt = retry_count + 1,
                        ?delay,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn read_limited_bytes(
        &self,
        response: reqwest::Response,
        limit: usize,
    ) -> Result<Vec<u8>, FetchError> {
        let expected_length = response.content_length();

        // Fast path: check Content-Length header
        if let Some(len) = expected_length {
            if len > limit as u64 {
                return Err(FetchError::ResponseTooLarge);
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(e))?;
            if bytes.len().saturating_add(chunk.len()) > limit {
                return Err(FetchError::ResponseTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        if let Some(expected) = expected_length {
            if (bytes.len() as u64) < expected {
                return Err(FetchError::IncompleteResponse {
                    expected,
                    received: bytes.len(),
                });
            }
        }

        Ok(bytes)
    }

    /// `retry_base_delay * 2^retry`
    fn backoff(&self, retry: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(e)
        }
    }
}

fn status_error(status: reqwest::StatusCode) -> FetchError {
    FetchError::HttpStatus {
        code: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Test</title>
    <item><title>Test item</title></item>
</channel></rss>"#;

    fn fetcher() -> Fetcher {
        Fetcher::new(&Config {
            retry_base_delay_ms: 1,
            ..Config::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header("User-Agent", crate::config::DEFAULT_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let doc = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(doc.root.name, "rss");
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_request() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = fetcher().fetch("example.com/rss").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::InvalidUrl(UrlValidationError::MissingScheme(_))
        ));

        let err = fetcher().fetch("ftp://example.com/rss").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_404_fails_immediately() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus { code: 404, reason } => assert_eq!(reason, "Not Found"),
            e => panic!("Expected HttpStatus 404, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3) // Initial request + 2 retries
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { code: 500, .. }));
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        let mock_server = MockServer::start().await;

        // First two requests return 503, third succeeds
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let doc = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert!(doc.root.child("channel").is_some());
    }

    #[tokio::test]
    async fn test_429_exhausts_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited(2)));
    }

    #[tokio::test]
    async fn test_no_retries_when_disabled() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(&Config {
            max_retries: 0,
            ..Config::default()
        })
        .unwrap();
        let err = fetcher
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { code: 502, .. }));
    }

    #[tokio::test]
    async fn test_html_body_is_not_xml() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotXml(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(&Config {
            timeout_secs: 1,
            ..Config::default()
        })
        .unwrap();
        let err = fetcher
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) on localhost is essentially never listening.
        let err = fetcher().fetch("http://127.0.0.1:9/feed").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_backoff_doubles() {
        let fetcher = Fetcher::new(&Config {
            retry_base_delay_ms: 100,
            ..Config::default()
        })
        .unwrap();
        assert_eq!(fetcher.backoff(0), Duration::from_millis(100));
        assert_eq!(fetcher.backoff(1), Duration::from_millis(200));
        assert_eq!(fetcher.backoff(2), Duration::from_millis(400));
    }
}
