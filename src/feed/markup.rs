//! Extractors shared by the JSON and XML strategies.

use scraper::{Html, Selector};

use super::xml::XmlElement;

/// Returns the `src` of the first `<img>` in an HTML fragment.
///
/// Empty input, fragments without images and images with a blank `src`
/// all yield `None`. Used only as the last thumbnail fallback.
pub fn extract_image(html: &str) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }

    let selector = Selector::parse("img").ok()?;
    let document = Html::parse_fragment(html);

    document
        .select(&selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_owned)
}

/// Trimmed text of the first direct child named `tag`, or `""`.
pub fn element_text(parent: &XmlElement, tag: &str) -> String {
    parent
        .child(tag)
        .map(|el| el.text().trim().to_owned())
        .unwrap_or_default()
}

/// Trimmed text of the first element named `tag` anywhere below `parent`.
///
/// Prefixed tags such as `content:encoded` fall back to a local-name match
/// in any namespace, since feeds do not agree on prefixes.
pub fn namespaced_element_text(parent: &XmlElement, tag: &str) -> String {
    let direct = parent.find(tag);
    let el = match (direct, tag.split_once(':')) {
        (Some(el), _) => Some(el),
        (None, Some((_, local))) => parent.find_all_local(local).next(),
        (None, None) => None,
    };

    el.map(|el| el.text().trim().to_owned()).unwrap_or_default()
}
