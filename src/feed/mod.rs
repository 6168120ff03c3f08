//! Feed fetching and normalization engine.
//!
//! Turns an arbitrary feed URL into a uniform [`FeedPayload`] by racing two
//! independent strategies:
//!
//! - **JSON**: a feed-to-JSON conversion service does the parsing
//! - **XML**: the raw document is fetched through several CORS relays (raced
//!   against each other, each bounded by a timeout) and parsed locally as RSS
//!   or Atom
//!
//! The first strategy to succeed wins; the result is cached per normalized
//! URL for a freshness window.
//!
//! # Architecture
//!
//! - `fetcher` - `FeedFetcher`: cache lookup, strategy race, error taxonomy
//! - `json_api` - JSON strategy
//! - `relay` - XML strategy network half (relay race)
//! - `parser` - RSS/Atom dialect detection and mapping
//! - `markup` - image and element-text extractors
//! - `xml` - owned element tree over `quick-xml`
//! - `race` - first-success combinator
//! - `cache` - time-boxed result cache
//!
//! # Example
//!
//! ```ignore
//! use feedrace::config::Config;
//! use feedrace::feed::FeedFetcher;
//!
//! let fetcher = FeedFetcher::new(reqwest::Client::new(), Config::default())?;
//! let payload = fetcher.fetch_feed("example.com/feed/", false).await?;
//! assert_eq!(payload.feed.url, "https://example.com/feed");
//! ```

mod cache;
mod fetcher;
mod json_api;
mod markup;
mod model;
mod parser;
mod race;
mod relay;
mod xml;

pub use cache::FeedCache;
pub use fetcher::{FeedFetcher, FetchError, Strategy};
pub use markup::{element_text, extract_image, namespaced_element_text};
pub use model::{Article, Feed, FeedPayload};
pub use parser::{parse_feed, Dialect, ParseError};
pub use race::{first_success, RaceError};
pub use relay::relay_url;
pub use xml::{parse_document, XmlElement, XmlError};
