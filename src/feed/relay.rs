//! Fallback lane: fetch the raw feed through public CORS relays and parse it here.

use super::fetcher::{get_body, FetchError};
use super::model::FeedPayload;
use super::parser::parse_feed;
use super::race::first_success;
use crate::config::Config;
use crate::util::encode_component;

/// Relay request URL for `feed_url`: the prefix followed by the encoded URL.
pub fn relay_url(prefix: &str, feed_url: &str) -> String {
    format!("{prefix}{}", encode_component(feed_url))
}

/// XML strategy: race every relay, then parse the winning body.
///
/// The first relay to return a non-empty 2xx body wins and the rest are
/// aborted. A winner that turns out to be HTML or malformed XML fails the
/// whole strategy; other relays are not consulted again.
pub(crate) async fn fetch_via_relays(
    client: &reqwest::Client,
    config: &Config,
    url: &str,
) -> Result<FeedPayload, FetchError> {
    let attempts = config
        .relays
        .iter()
        .map(|relay| fetch_from_relay(client, config, relay, url));

    let body = first_success(attempts)
        .await
        .map_err(|_| FetchError::RelaysExhausted(config.relays.len()))?;

    Ok(parse_feed(&body, url)?)
}

/// One relay call, bounded by the relay timeout. On expiry the request
/// future is dropped, which aborts the connection.
async fn fetch_from_relay(
    client: &reqwest::Client,
    config: &Config,
    relay: &str,
    url: &str,
) -> Result<String, FetchError> {
    let target = relay_url(relay, url);

    let result = match tokio::time::timeout(
        config.relay_timeout(),
        get_body(client, &target, config.max_response_bytes),
    )
    .await
    {
        Ok(Ok(bytes)) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if text.trim().is_empty() {
                Err(FetchError::EmptyResponse)
            } else {
                Ok(text)
            }
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(FetchError::Timeout),
    };

    if let Err(e) = &result {
        tracing::debug!(relay = %relay, url = %url, error = %e, "Relay failed");
    }

    result
}
