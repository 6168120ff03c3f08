use thiserror::Error;

use super::markup::{element_text, extract_image, namespaced_element_text};
use super::model::{non_empty, Article, Feed, FeedPayload};
use super::xml::{parse_document, XmlElement, XmlError};

/// Reasons a relay body is rejected. No partial data is ever salvaged.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The relay answered with an HTML page (error or redirect page)
    #[error("received HTML instead of XML")]
    HtmlDocument,
    #[error("XML parse error: {0}")]
    Xml(#[from] XmlError),
    /// RSS document without a `<channel>` element
    #[error("invalid RSS feed structure")]
    MissingChannel,
}

/// Feed dialect, chosen from the root element alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Rss,
    Atom,
}

impl Dialect {
    /// Atom only for an unprefixed `<feed>` root; a prefixed `atom:feed`
    /// falls through to RSS and fails there for lack of a channel.
    pub fn detect(root: &XmlElement) -> Self {
        if root.name().eq_ignore_ascii_case("feed") {
            Dialect::Atom
        } else {
            Dialect::Rss
        }
    }
}

/// Parses a raw RSS or Atom body into the uniform model.
///
/// `feed_url` must already be normalized; it becomes `Feed::url` and the
/// `feed_url` of every article.
pub fn parse_feed(text: &str, feed_url: &str) -> Result<FeedPayload, ParseError> {
    if looks_like_html(text) {
        return Err(ParseError::HtmlDocument);
    }

    let root = parse_document(text)?;

    match Dialect::detect(&root) {
        Dialect::Atom => Ok(map_atom(&root, feed_url)),
        Dialect::Rss => map_rss(&root, feed_url),
    }
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text
        .trim_start()
        .chars()
        .take(14)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

// ============================================================================
// Atom
// ============================================================================

fn map_atom(root: &XmlElement, feed_url: &str) -> FeedPayload {
    let author = root
        .child("author")
        .map(|a| element_text(a, "name"))
        .and_then(non_empty);
    let image = non_empty(element_text(root, "icon"))
        .or_else(|| non_empty(element_text(root, "logo")));

    let feed = Feed {
        url: feed_url.to_owned(),
        title: element_text(root, "title"),
        link: alternate_link(root),
        author,
        description: element_text(root, "subtitle"),
        image,
        user_id: None,
    };

    let articles = root
        .children_named("entry")
        .map(|entry| map_atom_entry(entry, &feed))
        .collect();

    FeedPayload { feed, articles }
}

fn map_atom_entry(entry: &XmlElement, feed: &Feed) -> Article {
    let link = alternate_link(entry);
    let summary = element_text(entry, "summary");
    let content = element_text(entry, "content");

    let pub_date = non_empty(element_text(entry, "published"))
        .unwrap_or_else(|| element_text(entry, "updated"));
    let author = entry
        .child("author")
        .map(|a| element_text(a, "name"))
        .and_then(non_empty)
        .or_else(|| feed.author.clone())
        .unwrap_or_default();

    let thumbnail = media_image(entry)
        .or_else(|| extract_image(&content))
        .or_else(|| extract_image(&summary));

    let description = if summary.is_empty() {
        content.clone()
    } else {
        summary.clone()
    };
    let content = if content.is_empty() { summary } else { content };

    Article {
        guid: non_empty(element_text(entry, "id")).unwrap_or_else(|| link.clone()),
        title: element_text(entry, "title"),
        pub_date,
        link,
        author,
        thumbnail,
        description,
        content,
        feed_title: feed.title.clone(),
        feed_url: feed.url.clone(),
    }
}

/// `href` of the first `<link>` child with `rel="alternate"` or no `rel`.
fn alternate_link(parent: &XmlElement) -> String {
    parent
        .children_named("link")
        .find(|l| matches!(l.attr("rel"), None | Some("alternate")))
        .and_then(|l| l.attr("href"))
        .unwrap_or_default()
        .to_owned()
}

// ============================================================================
// RSS
// ============================================================================

fn map_rss(root: &XmlElement, feed_url: &str) -> Result<FeedPayload, ParseError> {
    let channel = root
        .child("channel")
        .or_else(|| root.elements().find(|el| el.local_name() == "channel"))
        .ok_or(ParseError::MissingChannel)?;

    let image = channel
        .child("image")
        .map(|img| element_text(img, "url"))
        .and_then(non_empty);

    let feed = Feed {
        url: feed_url.to_owned(),
        title: element_text(channel, "title"),
        link: element_text(channel, "link"),
        author: None,
        description: element_text(channel, "description"),
        image,
        user_id: None,
    };

    // RSS 1.0 (RDF) keeps items next to the channel instead of inside it
    let mut items: Vec<&XmlElement> = channel.children_named("item").collect();
    if items.is_empty() {
        items = root.children_named("item").collect();
    }

    let articles = items
        .into_iter()
        .map(|item| map_rss_item(item, &feed))
        .collect();

    Ok(FeedPayload { feed, articles })
}

fn map_rss_item(item: &XmlElement, feed: &Feed) -> Article {
    let link = element_text(item, "link");
    let description = element_text(item, "description");
    let content = non_empty(namespaced_element_text(item, "content:encoded"))
        .unwrap_or_else(|| description.clone());
    let pub_date = non_empty(element_text(item, "pubDate"))
        .unwrap_or_else(|| namespaced_element_text(item, "dc:date"));

    let thumbnail = media_image(item)
        .or_else(|| media_thumbnail(item))
        .or_else(|| image_enclosure(item))
        .or_else(|| extract_image(&content))
        .or_else(|| extract_image(&description));

    Article {
        guid: non_empty(element_text(item, "guid")).unwrap_or_else(|| link.clone()),
        title: element_text(item, "title"),
        pub_date,
        link,
        author: namespaced_element_text(item, "dc:creator"),
        thumbnail,
        description,
        content,
        feed_title: feed.title.clone(),
        feed_url: feed.url.clone(),
    }
}

fn media_thumbnail(item: &XmlElement) -> Option<String> {
    item.find_all_local("thumbnail")
        .next()
        .and_then(|thumb| thumb.attr("url"))
        .map(str::to_owned)
        .and_then(non_empty)
}

fn image_enclosure(item: &XmlElement) -> Option<String> {
    item.find("enclosure")
        .filter(|enc| enc.attr("type").is_some_and(|t| t.starts_with("image")))
        .and_then(|enc| enc.attr("url"))
        .map(str::to_owned)
        .and_then(non_empty)
}

// ============================================================================
// Shared
// ============================================================================

/// First `*:content` element flagged as an image by `type` or `medium`.
fn media_image(parent: &XmlElement) -> Option<String> {
    parent
        .find_all_local("content")
        .filter(|el| {
            el.attr("type").is_some_and(|t| t.starts_with("image"))
                || el.attr("medium") == Some("image")
        })
        .find_map(|el| el.attr("url").map(str::to_owned).and_then(non_empty))
}
