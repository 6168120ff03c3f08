use serde::{Deserialize, Serialize};

/// Feed-level metadata produced by a successful fetch.
///
/// `url` is always the normalized form of the requested URL; it is the
/// identity the sync layer stores feeds under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub url: String,
    pub title: String,
    /// Canonical site link (not the feed document itself)
    pub link: String,
    pub author: Option<String>,
    pub description: String,
    pub image: Option<String>,
    /// Owner identifier, only populated by the external sync layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// One entry/item of a feed.
///
/// `guid` is best-effort unique: the feed-provided identifier when present,
/// otherwise the article link. `pub_date` stays in the feed's own format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub guid: String,
    pub title: String,
    pub pub_date: String,
    pub link: String,
    pub author: String,
    pub thumbnail: Option<String>,
    pub description: String,
    pub content: String,
    pub feed_title: String,
    pub feed_url: String,
}

/// Result of one fetch: the feed and its articles, copied by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPayload {
    pub feed: Feed,
    pub articles: Vec<Article>,
}

/// Returns `value` unless it is empty.
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
