use futures::StreamExt;
use std::fmt;
use thiserror::Error;

use super::cache::FeedCache;
use super::json_api::fetch_via_json;
use super::model::FeedPayload;
use super::parser::ParseError;
use super::race::{first_success, RaceError};
use super::relay::fetch_via_relays;
use crate::config::{Config, ConfigError};
use crate::util::normalize_url;

/// Errors that can occur during feed fetching operations.
///
/// Everything except [`FetchError::Unavailable`] describes a single endpoint
/// or strategy attempt. Those are logged and absorbed by the race; callers
/// of [`FeedFetcher::fetch_feed`] only ever see `Unavailable`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded its time bound and was aborted
    #[error("Request timed out")]
    Timeout,
    /// Relay answered 2xx with a blank body
    #[error("Empty response")]
    EmptyResponse,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Endpoint URL could not be built
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    /// Conversion service body was not the expected JSON shape
    #[error("Malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),
    /// Conversion service reported a status other than "ok"
    #[error("Conversion service status: {0}")]
    ApiStatus(String),
    /// Relay body was not a usable RSS/Atom document
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// No relay produced a usable body
    #[error("All {0} relays failed")]
    RelaysExhausted(usize),
    /// Every strategy failed for this (normalized) URL
    #[error("Could not fetch RSS feed: {0}")]
    Unavailable(String),
}

/// Independent ways of turning a feed URL into a [`FeedPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Feed-to-JSON conversion service, no XML parsing on our side
    Json,
    /// Raw feed body through CORS relays, parsed locally
    Xml,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Json, Strategy::Xml];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Json => f.write_str("json"),
            Strategy::Xml => f.write_str("xml"),
        }
    }
}

/// Fetches feeds by racing every [`Strategy`] and caching the winner.
///
/// Concurrent fetches of the same URL are not coalesced; each runs its own race.
pub struct FeedFetcher {
    client: reqwest::Client,
    config: Config,
    cache: FeedCache,
}

impl FeedFetcher {
    /// Creates a fetcher, rejecting configurations the strategies cannot run with.
    pub fn new(client: reqwest::Client, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = FeedCache::new(config.cache_ttl(), config.cache_capacity());
        Ok(Self {
            client,
            config,
            cache,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    /// Fetches a feed, serving a fresh cached result when allowed.
    ///
    /// The URL is normalized first; the normalized form is the cache key and
    /// the `url`/`feed_url` of every returned record. With `force_refresh`
    /// the cache is bypassed and the new result overwrites any entry.
    ///
    /// # Errors
    ///
    /// [`FetchError::Unavailable`] when every strategy failed. Individual
    /// strategy errors are only logged.
    pub async fn fetch_feed(
        &self,
        url: &str,
        force_refresh: bool,
    ) -> Result<FeedPayload, FetchError> {
        let url = normalize_url(url);

        if !force_refresh {
            if let Some(payload) = self.cache.get(&url) {
                tracing::debug!(url = %url, "Serving feed from cache");
                return Ok(payload);
            }
        }

        match self.race_strategies(&url).await {
            Ok(payload) => {
                tracing::debug!(
                    url = %url,
                    articles = payload.articles.len(),
                    "Feed fetched"
                );
                self.cache.insert(&url, payload.clone());
                Ok(payload)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Every fetch strategy failed");
                Err(FetchError::Unavailable(url))
            }
        }
    }

    /// Runs all strategies concurrently and returns the first success.
    ///
    /// The losing strategy is dropped once a winner is known, which aborts
    /// its in-flight requests.
    pub async fn race_strategies(
        &self,
        url: &str,
    ) -> Result<FeedPayload, RaceError<FetchError>> {
        first_success(Strategy::ALL.map(|strategy| self.run_strategy(strategy, url))).await
    }

    async fn run_strategy(&self, strategy: Strategy, url: &str) -> Result<FeedPayload, FetchError> {
        let result = match strategy {
            Strategy::Json => fetch_via_json(&self.client, &self.config, url).await,
            Strategy::Xml => fetch_via_relays(&self.client, &self.config, url).await,
        };

        match &result {
            Ok(_) => tracing::debug!(url = %url, strategy = %strategy, "Strategy succeeded"),
            Err(e) => {
                tracing::debug!(url = %url, strategy = %strategy, error = %e, "Strategy failed")
            }
        }

        result
    }
}

/// GETs `url` and returns the body, failing on non-2xx or oversize bodies.
pub(crate) async fn get_body(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, limit).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: Received fewer bytes than Content-Length promised
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_body_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let body = get_body(&client, &mock_server.uri(), 1024).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn test_get_body_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        match get_body(&client, &mock_server.uri(), 1024).await {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_body_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        assert!(matches!(
            get_body(&client, &mock_server.uri(), 1024).await,
            Err(FetchError::ResponseTooLarge)
        ));
    }

    #[test]
    fn test_new_rejects_config_without_relays() {
        let config = Config {
            relays: Vec::new(),
            ..Config::default()
        };
        assert!(FeedFetcher::new(reqwest::Client::new(), config).is_err());
    }

    #[test]
    fn test_unavailable_message_names_url() {
        let err = FetchError::Unavailable("https://example.com/feed".to_owned());
        assert_eq!(
            err.to_string(),
            "Could not fetch RSS feed: https://example.com/feed"
        );
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::Json.to_string(), "json");
        assert_eq!(Strategy::Xml.to_string(), "xml");
    }
}
