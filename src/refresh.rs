//! Batch refresh of many feeds on top of [`FeedFetcher`].
//!
//! Feeds with the highest interaction score are fetched first, in fixed-size
//! chunks; each chunk runs concurrently and must finish before the next one
//! starts. Failures are logged and skipped so one dead feed never blocks the
//! rest.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

use crate::feed::{Article, Feed, FeedFetcher, FetchError};
use crate::util::normalize_url;

/// Result of refreshing a single feed.
#[derive(Debug)]
pub struct FeedRefresh {
    /// Normalized URL of the feed
    pub feed_url: String,
    /// Number of articles fetched, or why the feed could not be fetched
    pub result: Result<usize, FetchError>,
}

/// Everything a batch refresh produced.
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    /// Fresh metadata for every feed that succeeded
    pub feeds: Vec<Feed>,
    /// Articles of every feed that succeeded, in fetch order
    pub articles: Vec<Article>,
    /// One entry per requested feed, in the order they were processed
    pub reports: Vec<FeedRefresh>,
}

impl RefreshOutcome {
    /// Normalized URLs of the feeds that were fetched successfully.
    pub fn refreshed_urls(&self) -> HashSet<String> {
        self.reports
            .iter()
            .filter(|r| r.result.is_ok())
            .map(|r| r.feed_url.clone())
            .collect()
    }
}

/// Orders feeds by descending interaction score; unscored feeds count as 0.
///
/// Scores are keyed by normalized URL, so `example.com/feed/` picks up the
/// score of `https://example.com/feed`. The sort is stable, so feeds with
/// equal scores keep their input order.
pub fn sort_by_score<'a>(feed_urls: &'a [String], scores: &HashMap<String, u64>) -> Vec<&'a str> {
    let mut sorted: Vec<&str> = feed_urls.iter().map(String::as_str).collect();
    sorted.sort_by_cached_key(|url| {
        std::cmp::Reverse(scores.get(&normalize_url(url)).copied().unwrap_or(0))
    });
    sorted
}

/// Refreshes every feed in score order, `refresh_chunk_size` at a time.
///
/// # Arguments
///
/// * `fetcher` - Engine used for every fetch (its cache is shared)
/// * `feed_urls` - Feeds to refresh, in any form the normalizer accepts
/// * `scores` - Interaction scores keyed by normalized feed URL
/// * `force_refresh` - Bypass the cache for every feed
/// * `progress_tx` - Optional channel for `(completed, total)` updates
pub async fn refresh_all(
    fetcher: &FeedFetcher,
    feed_urls: &[String],
    scores: &HashMap<String, u64>,
    force_refresh: bool,
    progress_tx: Option<mpsc::Sender<(usize, usize)>>,
) -> RefreshOutcome {
    let mut outcome = RefreshOutcome::default();
    if feed_urls.is_empty() {
        return outcome;
    }

    let sorted = sort_by_score(feed_urls, scores);
    let total = sorted.len();
    let chunk_size = fetcher.config().refresh_chunk_size.max(1);
    let mut done = 0usize;

    for chunk in sorted.chunks(chunk_size) {
        let results = join_all(chunk.iter().map(|url| async move {
            let result = fetcher.fetch_feed(url, force_refresh).await;
            (normalize_url(url), result)
        }))
        .await;

        for (feed_url, result) in results {
            let result = match result {
                Ok(payload) => {
                    let count = payload.articles.len();
                    outcome.feeds.push(payload.feed);
                    outcome.articles.extend(payload.articles);
                    Ok(count)
                }
                Err(e) => {
                    tracing::warn!(feed = %feed_url, error = %e, "Failed to refresh feed");
                    Err(e)
                }
            };
            outcome.reports.push(FeedRefresh { feed_url, result });
        }

        done += chunk.len();
        if let Some(tx) = &progress_tx {
            if let Err(e) = tx.send((done, total)).await {
                tracing::warn!(
                    error = %e,
                    done = done,
                    total = total,
                    "Progress channel send failed (receiver dropped)"
                );
            }
        }
    }

    outcome
}

/// Merges freshly fetched articles into an existing list.
///
/// Articles of feeds in `refreshed` are replaced wholesale by the fetched
/// set. The result is de-duplicated by GUID (later articles win) and sorted
/// newest first by comparing the raw `pub_date` strings.
pub fn merge_articles(
    existing: Vec<Article>,
    fetched: Vec<Article>,
    refreshed: &HashSet<String>,
) -> Vec<Article> {
    let mut by_guid: HashMap<String, Article> = HashMap::new();

    let kept = existing
        .into_iter()
        .filter(|a| !refreshed.contains(&a.feed_url));
    for article in kept.chain(fetched) {
        by_guid.insert(article.guid.clone(), article);
    }

    let mut merged: Vec<Article> = by_guid.into_values().collect();
    merged.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then_with(|| a.guid.cmp(&b.guid)));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(guid: &str, feed_url: &str, pub_date: &str, title: &str) -> Article {
        Article {
            guid: guid.to_owned(),
            title: title.to_owned(),
            pub_date: pub_date.to_owned(),
            feed_url: feed_url.to_owned(),
            ..Article::default()
        }
    }

    #[test]
    fn test_sort_by_score_descending_and_stable() {
        let urls = vec![
            "https://a.example.com".to_string(),
            "https://b.example.com".to_string(),
            "https://c.example.com".to_string(),
            "https://d.example.com".to_string(),
        ];
        let scores = HashMap::from([
            ("https://c.example.com".to_string(), 5),
            ("https://b.example.com".to_string(), 2),
            ("https://d.example.com".to_string(), 2),
        ]);

        assert_eq!(
            sort_by_score(&urls, &scores),
            vec![
                "https://c.example.com",
                "https://b.example.com",
                "https://d.example.com",
                "https://a.example.com",
            ]
        );
    }

    #[test]
    fn test_sort_by_score_matches_normalized_urls() {
        let urls = vec!["a.example.com/feed".to_string(), "b.example.com/feed/".to_string()];
        let scores = HashMap::from([("https://b.example.com/feed".to_string(), 4)]);

        assert_eq!(
            sort_by_score(&urls, &scores),
            vec!["b.example.com/feed/", "a.example.com/feed"]
        );
    }

    #[test]
    fn test_merge_replaces_refreshed_feed_articles() {
        let existing = vec![
            article("old-1", "https://a.example.com", "2024-01-01", "stale"),
            article("keep-1", "https://b.example.com", "2024-01-02", "kept"),
        ];
        let fetched = vec![article("new-1", "https://a.example.com", "2024-01-03", "fresh")];
        let refreshed = HashSet::from(["https://a.example.com".to_string()]);

        let merged = merge_articles(existing, fetched, &refreshed);
        let guids: Vec<_> = merged.iter().map(|a| a.guid.as_str()).collect();
        assert_eq!(guids, vec!["new-1", "keep-1"]);
    }

    #[test]
    fn test_merge_last_write_wins_by_guid() {
        let existing = vec![article("g", "https://a.example.com", "2024-01-01", "before")];
        let fetched = vec![article("g", "https://a.example.com", "2024-01-01", "after")];

        let merged = merge_articles(existing, fetched, &HashSet::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "after");
    }

    #[test]
    fn test_merge_sorts_newest_first_by_raw_string() {
        let fetched = vec![
            article("a", "f", "2023-12-31", ""),
            article("b", "f", "", ""),
            article("c", "f", "2024-05-01", ""),
        ];
        let merged = merge_articles(Vec::new(), fetched, &HashSet::new());
        let guids: Vec<_> = merged.iter().map(|a| a.guid.as_str()).collect();
        assert_eq!(guids, vec!["c", "a", "b"]);
    }
}
