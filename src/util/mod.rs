//! Utility functions shared by the fetch strategies.
//!
//! - **URL normalization**: one canonical form per logical feed, used as the
//!   cache key and as the `url`/`feed_url` of every produced record
//! - **Component encoding**: embedding a feed URL into a relay query string

mod url_normalizer;

pub use url_normalizer::{encode_component, normalize_url};
