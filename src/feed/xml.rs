//! Strict, minimal XML element tree built on `quick-xml`.
//!
//! Feed normalization needs random access to the document (the channel's
//! `image/url`, the root's `image/url`, every descendant of an item whose
//! local name is `thumbnail`), which an event stream does not give us.
//! The tree keeps qualified tag names (`media:thumbnail`) so that exact-name
//! lookups never confuse `atom:link` with `link`.
//!
//! Input may be in any encoding named by a BOM or the XML declaration
//! (`ISO-8859-1`, `windows-1251`, ...). The tree itself is always UTF-8.

use std::borrow::Cow;

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted from remote documents.
const MAX_DEPTH: usize = 256;

/// Reasons a byte stream is not a well-formed XML document.
#[derive(Debug, Error)]
pub enum XmlError {
    /// Lexical or structural error reported by the reader.
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Text, CDATA or names that do not decode in the document's encoding.
    #[error("XML content is not valid in the declared encoding")]
    Encoding,

    /// The document ended while elements were still open.
    #[error("Unclosed element <{0}> at end of document")]
    Unclosed(String),

    /// No root element at all (empty body, only a prolog, etc.).
    #[error("Document has no root element")]
    NoRoot,

    /// A second top-level element, or text outside the root.
    #[error("Content found outside the root element")]
    TrailingContent,

    #[error("Element nesting exceeds maximum of {0} levels")]
    TooDeep(usize),
}

/// One element: qualified name, attributes in document order, concatenated
/// direct character data (text and CDATA), and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Tag name with any namespace prefix removed (`media:content` → `content`).
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

    /// First direct child with exactly this (qualified) name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with exactly this (qualified) name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first direct child named `name`, if that child exists.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Pre-order iterator over every element below this one (self excluded).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// A parsed, well-formed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Parses `bytes` strictly: mismatched or unclosed tags, undefined
    /// entities, undecodable bytes and content outside the root are all errors.
    ///
    /// SEC-002: quick-xml (0.37) never expands `<!ENTITY>` declarations, so
    /// XXE payloads fail with an unrecognized-entity error instead.
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| XmlError::Syntax {
                position: reader.buffer_position(),
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmlError::TooDeep(MAX_DEPTH));
                    }
                    if stack.is_empty() && root.is_some() {
                        return Err(XmlError::TrailingContent);
                    }
                    stack.push(start_element(&e, &reader)?);
                }
                Event::Empty(e) => {
                    let element = start_element(&e, &reader)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // check_end_names (on by default) already rejected mismatches
                    let element = stack.pop().ok_or(XmlError::TrailingContent)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| XmlError::Syntax {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(c) => {
                    let text = decode(reader.decoder(), c.as_ref())?;
                    push_text(&mut stack, &text)?;
                }
                Event::Eof => break,
                // Declaration, comments, processing instructions, DOCTYPE
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }
        root.map(|root| Document { root }).ok_or(XmlError::NoRoot)
    }
}

fn start_element(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, XmlError> {
    let decoder = reader.decoder();
    let mut element = Element::new(decode(decoder, e.name().as_ref())?);

    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;
        let key = decode(decoder, attr.key.as_ref())?.into_owned();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| XmlError::Syntax {
                position: reader.buffer_position(),
                message: e.to_string(),
            })?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn decode<'b>(decoder: Decoder, bytes: &'b [u8]) -> Result<Cow<'b, str>, XmlError> {
    decoder.decode(bytes).map_err(|_| XmlError::Encoding)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::TrailingContent),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(current) => current.text.push_str(text),
        // Whitespace between the prolog and the root (or after it) is fine
        None if text.trim().is_empty() => {}
        None => return Err(XmlError::TrailingContent),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_document() {
        let doc = Document::parse(
            br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News</title><item><title>A</title></item></channel></rss>"#,
        )
        .unwrap();

        assert_eq!(doc.root.name, "rss");
        assert_eq!(doc.root.attr("version"), Some("2.0"));
        let channel = doc.root.child("channel").unwrap();
        assert_eq!(channel.child_text("title"), Some("News"));
        assert_eq!(channel.children_named("item").count(), 1);
    }

    #[test]
    fn test_cdata_and_entities_become_text() {
        let doc = Document::parse(
            b"<d><a><![CDATA[<p>raw</p>]]></a><b>&lt;img src=&quot;x&quot;&gt;</b></d>",
        )
        .unwrap();
        assert_eq!(doc.root.child_text("a"), Some("<p>raw</p>"));
        assert_eq!(doc.root.child_text("b"), Some("<img src=\"x\">"));
    }

    #[test]
    fn test_local_name_strips_prefix() {
        let doc = Document::parse(br#"<item xmlns:media="m"><media:thumbnail url="t.png"/></item>"#)
            .unwrap();
        let thumb = &doc.root.children[0];
        assert_eq!(thumb.name, "media:thumbnail");
        assert_eq!(thumb.local_name(), "thumbnail");
        assert_eq!(thumb.attr("url"), Some("t.png"));
    }

    #[test]
    fn test_prefixed_name_is_not_an_exact_match() {
        let doc = Document::parse(
            br#"<channel xmlns:atom="a"><atom:link href="x"/><link>http://site/</link></channel>"#,
        )
        .unwrap();
        assert_eq!(doc.root.child_text("link"), Some("http://site/"));
    }

    #[test]
    fn test_descendants_pre_order() {
        let doc = Document::parse(b"<a><b><c/></b><d/></a>").unwrap();
        let names: Vec<&str> = doc.root.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_rejects_unclosed_tag() {
        assert!(Document::parse(b"<not valid xml").is_err());
        assert!(matches!(
            Document::parse(b"<rss><channel></rss>"),
            Err(XmlError::Syntax { .. })
        ));
        assert!(Document::parse(b"<rss><channel>").is_err());
    }

    #[test]
    fn test_rejects_non_xml_bodies() {
        assert!(matches!(Document::parse(b""), Err(XmlError::NoRoot)));
        assert!(Document::parse(b"{\"json\": true}").is_err());
        assert!(matches!(
            Document::parse(b"<a/><b/>"),
            Err(XmlError::TrailingContent)
        ));
    }

    #[test]
    fn test_latin1_declaration_is_decoded() {
        let doc = Document::parse(
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
              <rss><channel><title>Caf\xE9</title>\
              <description><![CDATA[<p>cr\xE8me br\xFBl\xE9e</p>]]></description>\
              <image alt=\"na\xEFve\"/></channel></rss>",
        )
        .unwrap();
        let channel = doc.root.child("channel").unwrap();
        assert_eq!(channel.child_text("title"), Some("Café"));
        assert_eq!(channel.child_text("description"), Some("<p>crème brûlée</p>"));
        assert_eq!(channel.child("image").unwrap().attr("alt"), Some("naïve"));
    }

    #[test]
    fn test_windows_1251_declaration_is_decoded() {
        let doc = Document::parse(
            b"<?xml version=\"1.0\" encoding=\"windows-1251\"?>\
              <rss><channel><title>\xCF\xF0\xE8\xE2\xE5\xF2</title></channel></rss>",
        )
        .unwrap();
        let channel = doc.root.child("channel").unwrap();
        assert_eq!(channel.child_text("title"), Some("Привет"));
    }

    #[test]
    fn test_invalid_utf8_without_declaration_rejected() {
        assert!(Document::parse(b"<rss><title>Caf\xE9</title></rss>").is_err());
    }

    #[test]
    fn test_rejects_undefined_entity() {
        assert!(Document::parse(b"<a>&nbsp;</a>").is_err());
    }
}
