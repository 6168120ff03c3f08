use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left untouched when a feed URL is embedded as a query component.
///
/// Matches the unreserved set of an ECMAScript `encodeURIComponent`, which is
/// what the public relays expect to receive.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Canonicalizes a user-supplied feed URL.
///
/// Surrounding whitespace is dropped, `https://` is prepended when the input
/// carries neither an `http://` nor an `https://` prefix, and a single trailing
/// slash is removed. Nothing else is touched: query strings, case and hosts
/// are kept verbatim, so the result is usable as a cache key.
///
/// # Examples
///
/// ```
/// use feedrace::util::normalize_url;
///
/// assert_eq!(normalize_url("example.com/feed/"), "https://example.com/feed");
/// assert_eq!(normalize_url("http://example.com/rss"), "http://example.com/rss");
/// ```
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();

    let mut normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };

    if normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}

/// Percent-encodes `value` for use as a single query component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}
