//! Minimal owned XML element tree.
//!
//! Feeds are small and every mapping rule needs random access (first child
//! named X, any descendant whose local name is Y), so the `quick-xml` event
//! stream is folded into a tree once and queried afterwards.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Nesting limit, protects the builder stack from hostile documents
const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Syntax(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("unclosed element <{0}>")]
    Unclosed(String),
    #[error("content after the root element")]
    TrailingRoot,
    #[error("elements nested deeper than {0} levels")]
    TooDeep(usize),
}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError::Syntax(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Qualified name as written in the document, e.g. `media:content`
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with any `prefix:` removed.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// Direct children whose qualified name is `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    /// All element descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&XmlElement> = self.elements().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// First descendant whose qualified name is `name`.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.descendants().find(|el| el.name == name)
    }

    /// Descendants matching `local` in any namespace (or none).
    pub fn find_all_local<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.descendants().filter(move |el| el.local_name() == local)
    }

    /// Concatenated text and CDATA of the whole subtree.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(el) => el.collect_text(out),
            }
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let el = self.stack.pop()?;
        let before = self.stack.len();
        self.stack.extend(el.elements());
        self.stack[before..].reverse();
        Some(el)
    }
}

/// Parses a complete document and returns its root element.
///
/// Any well-formedness problem is an error; there is no partial recovery.
/// Entities beyond the five XML builtins are rejected by `quick-xml` (SEC-002).
pub fn parse_document(text: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::TooDeep(MAX_DEPTH));
                }
                stack.push(open_element(&reader, &e)?);
            }
            Event::Empty(e) => {
                let el = open_element(&reader, &e)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| XmlError::Syntax("unexpected closing tag".to_owned()))?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| XmlError::Syntax(err.to_string()))?;
                    parent.children.push(XmlNode::Text(text.into_owned()));
                } else if !e.iter().all(u8::is_ascii_whitespace) {
                    return Err(XmlError::Syntax("text outside the root element".to_owned()));
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }

    root.ok_or(XmlError::NoRoot)
}

fn open_element(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let decoder = reader.decoder();
    let name = decoder
        .decode(e.name().as_ref())
        .map_err(|err| XmlError::Syntax(err.to_string()))?
        .into_owned();

    let mut attributes = Vec::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| XmlError::Syntax(err.to_string()))?;
        let key = decoder
            .decode(attr.key.as_ref())
            .map_err(|err| XmlError::Syntax(err.to_string()))?
            .into_owned();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| XmlError::Syntax(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(el)),
        None if root.is_none() => *root = Some(el),
        None => return Err(XmlError::TrailingRoot),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_tree_with_attributes_and_text() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Demo &amp; Co</title><link href="x"/></channel></rss>"#,
        )
        .unwrap();

        assert_eq!(root.name(), "rss");
        assert_eq!(root.attr("version"), Some("2.0"));
        let channel = root.child("channel").unwrap();
        assert_eq!(channel.child("title").unwrap().text(), "Demo & Co");
        assert_eq!(channel.child("link").unwrap().attr("href"), Some("x"));
    }

    #[test]
    fn test_cdata_is_text() {
        let root = parse_document("<a><b><![CDATA[<p>hi</p>]]></b></a>").unwrap();
        assert_eq!(root.child("b").unwrap().text(), "<p>hi</p>");
    }

    #[test]
    fn test_local_name_strips_prefix() {
        let root = parse_document(r#"<a xmlns:media="m"><media:content url="u"/></a>"#).unwrap();
        let content = root.elements().next().unwrap();
        assert_eq!(content.name(), "media:content");
        assert_eq!(content.local_name(), "content");
    }

    #[test]
    fn test_descendants_in_document_order() {
        let root = parse_document("<r><a><b/><c/></a><d><e/></d></r>").unwrap();
        let names: Vec<_> = root.descendants().map(XmlElement::name).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_find_all_local_ignores_prefix() {
        let root =
            parse_document("<r><media:group><media:content/></media:group><content/></r>").unwrap();
        assert_eq!(root.find_all_local("content").count(), 2);
        assert!(root.find("media:content").is_some());
    }

    #[test]
    fn test_child_outlives_name_argument() {
        let root = parse_document("<r><title>kept</title></r>").unwrap();
        let title = {
            let name = String::from("title");
            root.child(&name)
        };
        assert_eq!(title.map(XmlElement::text).as_deref(), Some("kept"));
    }

    #[test]
    fn test_text_spans_nested_elements() {
        let root = parse_document("<r>one <b>two</b> three</r>").unwrap();
        assert_eq!(root.text(), "one two three");
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        assert!(parse_document("<a><b></a>").is_err());
    }

    #[test]
    fn test_unclosed_root_rejected() {
        assert!(parse_document("<a><b></b>").is_err());
    }

    #[test]
    fn test_plain_text_has_no_root() {
        assert!(parse_document("").is_err());
        assert!(parse_document("Service unavailable").is_err());
    }

    #[test]
    fn test_second_root_rejected() {
        assert!(matches!(
            parse_document("<a/><b/>"),
            Err(XmlError::TrailingRoot)
        ));
    }

    #[test]
    fn test_unknown_entity_rejected() {
        assert!(parse_document("<a>&nbsp;</a>").is_err());
    }
}
