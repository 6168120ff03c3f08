//! Fast lane: a feed-to-JSON conversion service does the parsing for us.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::fetcher::{get_body, FetchError};
use super::markup::extract_image;
use super::model::{non_empty, Article, Feed, FeedPayload};
use crate::config::Config;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    feed: ApiFeed,
    #[serde(default)]
    items: Vec<ApiItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiFeed {
    title: Option<String>,
    link: Option<String>,
    author: Option<String>,
    description: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiItem {
    guid: Option<String>,
    title: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    link: Option<String>,
    author: Option<String>,
    thumbnail: Option<String>,
    /// Object with a `link` when present; the service sends `{}` or `[]` otherwise
    enclosure: Value,
    description: Option<String>,
    content: Option<String>,
}

/// Fetches `url` (already normalized) through the conversion endpoint.
///
/// No retries: a failed call or a status other than `"ok"` fails the
/// strategy and leaves the race to the relays.
pub(crate) async fn fetch_via_json(
    client: &reqwest::Client,
    config: &Config,
    url: &str,
) -> Result<FeedPayload, FetchError> {
    let endpoint = Url::parse_with_params(&config.json_api_url, &[("rss_url", url)])
        .map_err(|e| FetchError::InvalidEndpoint(e.to_string()))?;

    let body = tokio::time::timeout(
        config.json_timeout(),
        get_body(client, endpoint.as_str(), config.max_response_bytes),
    )
    .await
    .map_err(|_| FetchError::Timeout)??;

    let response: ApiResponse = serde_json::from_slice(&body)?;
    map_response(response, url)
}

fn map_response(response: ApiResponse, url: &str) -> Result<FeedPayload, FetchError> {
    if response.status.as_deref() != Some("ok") {
        let status = response.status.unwrap_or_else(|| "missing".to_owned());
        let detail = match response.message {
            Some(message) => format!("{status} ({message})"),
            None => status,
        };
        return Err(FetchError::ApiStatus(detail));
    }

    let api_feed = response.feed;
    let feed = Feed {
        url: url.to_owned(),
        title: api_feed.title.unwrap_or_default(),
        link: api_feed.link.unwrap_or_default(),
        author: api_feed.author.and_then(non_empty),
        description: api_feed.description.unwrap_or_default(),
        image: api_feed.image.and_then(non_empty),
        user_id: None,
    };

    let articles = response
        .items
        .into_iter()
        .map(|item| map_item(item, &feed))
        .collect();

    Ok(FeedPayload { feed, articles })
}

fn map_item(item: ApiItem, feed: &Feed) -> Article {
    let description = item.description.unwrap_or_default();
    let content = item
        .content
        .and_then(non_empty)
        .unwrap_or_else(|| description.clone());
    let link = item.link.unwrap_or_default();

    let thumbnail = item
        .thumbnail
        .and_then(non_empty)
        .or_else(|| {
            item.enclosure
                .get("link")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .and_then(non_empty)
        })
        .or_else(|| extract_image(&content));

    Article {
        guid: item
            .guid
            .and_then(non_empty)
            .unwrap_or_else(|| link.clone()),
        title: item.title.unwrap_or_default(),
        pub_date: item.pub_date.unwrap_or_default(),
        link,
        author: item
            .author
            .and_then(non_empty)
            .or_else(|| feed.author.clone())
            .unwrap_or_default(),
        thumbnail,
        description,
        content,
        feed_title: feed.title.clone(),
        feed_url: feed.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_URL: &str = "https://example.com/feed";

    fn parse(value: Value) -> Result<FeedPayload, FetchError> {
        map_response(serde_json::from_value(value).unwrap(), FEED_URL)
    }

    #[test]
    fn test_maps_feed_and_items() {
        let payload = parse(json!({
            "status": "ok",
            "feed": {
                "title": "Example",
                "link": "https://example.com",
                "author": "Editor",
                "description": "News",
                "image": "https://example.com/logo.png"
            },
            "items": [{
                "guid": "g-1",
                "title": "One",
                "pubDate": "2024-01-01 10:00:00",
                "link": "https://example.com/1",
                "author": "",
                "thumbnail": "https://cdn/t.jpg",
                "enclosure": {"link": "https://cdn/e.jpg"},
                "description": "Short",
                "content": "<p>Long</p>"
            }]
        }))
        .unwrap();

        assert_eq!(payload.feed.url, FEED_URL);
        assert_eq!(payload.feed.author.as_deref(), Some("Editor"));
        assert_eq!(
            payload.articles,
            vec![Article {
                guid: "g-1".to_owned(),
                title: "One".to_owned(),
                pub_date: "2024-01-01 10:00:00".to_owned(),
                link: "https://example.com/1".to_owned(),
                author: "Editor".to_owned(),
                thumbnail: Some("https://cdn/t.jpg".to_owned()),
                description: "Short".to_owned(),
                content: "<p>Long</p>".to_owned(),
                feed_title: "Example".to_owned(),
                feed_url: FEED_URL.to_owned(),
            }]
        );
    }

    #[test]
    fn test_item_fallbacks() {
        let payload = parse(json!({
            "status": "ok",
            "feed": {"title": "Example"},
            "items": [
                {"link": "https://example.com/a", "enclosure": {"link": "https://cdn/e.jpg"}, "description": "d"},
                {"link": "https://example.com/b", "enclosure": [], "description": "<img src=\"inline.png\">"},
                {"link": "https://example.com/c", "enclosure": {}, "content": null}
            ]
        }))
        .unwrap();

        let [a, b, c] = &payload.articles[..] else {
            panic!("expected three articles");
        };
        assert_eq!(a.guid, "https://example.com/a");
        assert_eq!(a.thumbnail.as_deref(), Some("https://cdn/e.jpg"));
        assert_eq!(a.content, "d");
        assert_eq!(a.author, "");
        assert_eq!(b.thumbnail.as_deref(), Some("inline.png"));
        assert_eq!(c.thumbnail, None);
        assert_eq!(c.content, "");
    }

    #[test]
    fn test_non_ok_status_fails() {
        let err = parse(json!({"status": "error", "message": "Feed not found"})).unwrap_err();
        match err {
            FetchError::ApiStatus(detail) => assert!(detail.contains("Feed not found")),
            other => panic!("Expected ApiStatus, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_status_fails() {
        assert!(matches!(
            parse(json!({"items": []})),
            Err(FetchError::ApiStatus(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_passes_feed_url_as_query_param() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/api.json"))
            .and(query_param("rss_url", FEED_URL))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "feed": {"title": "Mocked"},
                "items": []
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = Config {
            json_api_url: format!("{}/v1/api.json", mock_server.uri()),
            ..Config::default()
        };
        let payload = fetch_via_json(&reqwest::Client::new(), &config, FEED_URL)
            .await
            .unwrap();
        assert_eq!(payload.feed.title, "Mocked");
    }

    #[tokio::test]
    async fn test_fetch_http_error_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1) // no retries
            .mount(&mock_server)
            .await;

        let config = Config {
            json_api_url: format!("{}/v1/api.json", mock_server.uri()),
            ..Config::default()
        };
        let result = fetch_via_json(&reqwest::Client::new(), &config, FEED_URL).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&mock_server)
            .await;

        let config = Config {
            json_api_url: format!("{}/v1/api.json", mock_server.uri()),
            ..Config::default()
        };
        let result = fetch_via_json(&reqwest::Client::new(), &config, FEED_URL).await;
        assert!(matches!(result, Err(FetchError::Json(_))));
    }
}
