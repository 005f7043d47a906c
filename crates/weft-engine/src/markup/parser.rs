//! XML reader for template fragments and definitions documents.

use std::borrow::Cow;
use std::io::BufRead;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::entities::{decode_reference, normalize_entities};
use super::{Attribute, Element, Node, Text, escape_text};
use crate::error::LoadError;

/// Synthetic wrapper so fragments with several top-level nodes parse as XML.
const FRAGMENT_ROOT: &str = "weft-fragment";

/// Deepest element nesting accepted in a fragment or document.
pub const MAX_ELEMENT_DEPTH: usize = 128;

/// Parse a markup fragment into its top-level nodes.
///
/// The fragment may contain any number of sibling nodes, including bare text.
///
/// # Errors
///
/// Returns an error if the markup is not well-formed.
pub fn parse_fragment(src: &str) -> Result<Vec<Node>, LoadError> {
    let wrapped = format!("<{FRAGMENT_ROOT}>{src}</{FRAGMENT_ROOT}>");
    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => return read_children(&mut reader, FRAGMENT_ROOT, 0),
            Event::Eof => return Ok(Vec::new()),
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a whole document and return its root element.
///
/// Declarations, doctypes, comments and whitespace around the root are skipped.
///
/// # Errors
///
/// Returns an error if the document is not well-formed or has no root element.
pub fn parse_document(src: &str) -> Result<Element, LoadError> {
    let mut reader = Reader::from_str(src);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let mut root = start_element(&reader, &e);
                root.children = read_children(&mut reader, &root.tag, 1)?;
                return Ok(root);
            }
            Event::Empty(e) => return Ok(start_element(&reader, &e)),
            Event::Eof => {
                return Err(LoadError::InvalidDefinition(
                    "document has no root element".to_owned(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Read nodes until the end tag of the current element, which sits `depth`
/// elements below the top level.
fn read_children<R: BufRead>(
    reader: &mut Reader<R>,
    tag: &str,
    depth: usize,
) -> Result<Vec<Node>, LoadError> {
    let mut buf = Vec::new();
    let mut nodes = Vec::new();
    let mut text = TextRun::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                flush_text(&mut text, &mut nodes);
                let mut element = start_element(reader, &e);
                if depth >= MAX_ELEMENT_DEPTH {
                    return Err(LoadError::InvalidDefinition(format!(
                        "<{}> is nested deeper than {MAX_ELEMENT_DEPTH} elements",
                        element.tag
                    )));
                }
                element.children = read_children(reader, &element.tag, depth + 1)?;
                nodes.push(Node::Element(element));
            }
            Event::Empty(e) => {
                flush_text(&mut text, &mut nodes);
                nodes.push(Node::Element(start_element(reader, &e)));
            }
            Event::Text(e) => text.push_plain(&reader.decoder().decode(&e)?),
            Event::GeneralRef(e) => text.push_reference(&reader.decoder().decode(&e)?),
            Event::CData(e) => text.push_cdata(&String::from_utf8_lossy(&e)),
            Event::Comment(e) => {
                flush_text(&mut text, &mut nodes);
                let comment = reader.decoder().decode(&e)?.into_owned();
                nodes.push(Node::Comment(comment));
            }
            Event::End(_) => {
                flush_text(&mut text, &mut nodes);
                return Ok(nodes);
            }
            Event::Eof => return Err(LoadError::UnclosedElement(tag.to_owned())),
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }
}

/// Text collected between two non-text events, kept both decoded and as
/// written.
#[derive(Default)]
struct TextRun {
    decoded: String,
    markup: String,
}

impl TextRun {
    fn push_plain(&mut self, text: &str) {
        self.decoded.push_str(text);
        self.markup.push_str(text);
    }

    fn push_reference(&mut self, entity: &str) {
        self.decoded.push_str(&decode_reference(entity));
        self.markup.push('&');
        self.markup.push_str(entity);
        self.markup.push(';');
    }

    fn push_cdata(&mut self, text: &str) {
        self.decoded.push_str(text);
        escape_text(text, &mut self.markup);
    }
}

fn flush_text(text: &mut TextRun, nodes: &mut Vec<Node>) {
    if !text.decoded.is_empty() {
        let run = std::mem::take(text);
        nodes.push(Node::Text(Text::from_markup(run.decoded, run.markup)));
    }
}

fn start_element<R: BufRead>(reader: &Reader<R>, e: &BytesStart) -> Element {
    Element {
        tag: decode_lossy(reader, e.name().as_ref()),
        attrs: decode_attrs(reader, e),
        children: Vec::new(),
    }
}

fn decode_attrs<R: BufRead>(reader: &Reader<R>, e: &BytesStart) -> Vec<Attribute> {
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let name = decode_lossy(reader, attr.key.as_ref());
        if name.starts_with("xmlns") {
            continue;
        }
        let markup = decode_lossy(reader, &attr.value);
        let value = unescape(&normalize_entities(&markup))
            .map_or_else(|_| markup.clone(), Cow::into_owned);
        attrs.push(Attribute::from_markup(name, value, markup));
    }
    attrs
}

fn decode_lossy<R: BufRead>(reader: &Reader<R>, bytes: &[u8]) -> String {
    reader.decoder().decode(bytes).map_or_else(
        |_| String::from_utf8_lossy(bytes).into_owned(),
        Cow::into_owned,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(node: &Node) -> &Element {
        node.as_element().expect("expected element")
    }

    #[test]
    fn test_fragment_with_siblings() {
        let nodes = parse_fragment("<if test=\"${a}\">yes</if> <else>no</else>").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(element(&nodes[0]).tag, "if");
        assert_eq!(element(&nodes[0]).attr_value("test"), Some("${a}"));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == " "));
        assert_eq!(element(&nodes[2]).text_content(), "no");
    }

    #[test]
    fn test_bare_text_fragment() {
        let nodes = parse_fragment("hello ${name}").unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Node::Text(t) if t.content == "hello ${name}"));
    }

    #[test]
    fn test_empty_fragment() {
        assert!(parse_fragment("").unwrap().is_empty());
    }

    #[test]
    fn test_entities_are_decoded() {
        let nodes = parse_fragment("a &amp;&amp; b&nbsp;&#33;").unwrap();
        assert!(matches!(&nodes[0], Node::Text(t) if t.content == "a && b\u{00a0}!"));
    }

    #[test]
    fn test_source_markup_is_kept() {
        let nodes = parse_fragment(r#"<a href="?x=1&amp;y=&nbsp;">a &gt; b<![CDATA[<]]></a>"#).unwrap();
        let link = element(&nodes[0]);
        let href = link.attr("href").unwrap();
        assert_eq!(href.value, "?x=1&y=\u{a0}");
        assert_eq!(href.literal_markup(), Some("?x=1&amp;y=&nbsp;"));
        let Node::Text(text) = &link.children[0] else {
            panic!("expected text");
        };
        assert_eq!(text.content, "a > b<");
        assert_eq!(text.literal_markup(), Some("a &gt; b&lt;"));
    }

    #[test]
    fn test_interpolated_text_has_no_literal_markup() {
        let nodes = parse_fragment("a &gt; ${b}").unwrap();
        let Node::Text(text) = &nodes[0] else {
            panic!("expected text");
        };
        assert!(text.literal_markup().is_none());
    }

    #[test]
    fn test_attribute_entities_are_decoded() {
        let nodes = parse_fragment(r#"<if test="${a &lt; 5 &amp;&amp; b}"/>"#).unwrap();
        assert_eq!(element(&nodes[0]).attr_value("test"), Some("${a < 5 && b}"));
    }

    #[test]
    fn test_self_closing_element() {
        let nodes = parse_fragment("a<br/>b").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(element(&nodes[1]).tag, "br");
        assert!(element(&nodes[1]).children.is_empty());
    }

    #[test]
    fn test_attribute_order_preserved() {
        let nodes = parse_fragment(r#"<a z="1" a="2" m="3"/>"#).unwrap();
        let names: Vec<&str> = element(&nodes[0])
            .attrs
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_comments_kept_as_nodes() {
        let nodes = parse_fragment("<!-- note -->x").unwrap();
        assert!(matches!(&nodes[0], Node::Comment(c) if c == " note "));
        assert!(matches!(&nodes[1], Node::Text(_)));
    }

    #[test]
    fn test_cdata_is_text() {
        let nodes = parse_fragment("<exe-script><![CDATA[_a < 1]]></exe-script>").unwrap();
        assert_eq!(element(&nodes[0]).text_content(), "_a < 1");
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(parse_fragment("<a><b></a>").is_err());
    }

    #[test]
    fn test_unclosed_element_fails() {
        assert!(matches!(
            parse_document("<defs><template name=\"t\">"),
            Err(LoadError::UnclosedElement(_) | LoadError::Xml(_))
        ));
    }

    #[test]
    fn test_parse_document_root() {
        let doc = parse_document(
            "<?xml version=\"1.0\"?>\n<!-- defs -->\n<definitions><template name=\"t\">x</template></definitions>",
        )
        .unwrap();
        assert_eq!(doc.tag, "definitions");
        let template = doc.child("template").unwrap();
        assert_eq!(template.attr_value("name"), Some("t"));
        assert_eq!(template.text_content(), "x");
    }

    #[test]
    fn test_parse_document_without_root() {
        assert!(matches!(
            parse_document("<!-- nothing -->"),
            Err(LoadError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let src = format!("{}x{}", "<b>".repeat(5000), "</b>".repeat(5000));
        assert!(matches!(
            parse_fragment(&src),
            Err(LoadError::InvalidDefinition(ref message)) if message.contains("nested deeper")
        ));
        let doc = format!("<definitions>{src}</definitions>");
        assert!(matches!(
            parse_document(&doc),
            Err(LoadError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_nesting_at_limit_accepted() {
        let depth = MAX_ELEMENT_DEPTH;
        let src = format!("{}x{}", "<b>".repeat(depth), "</b>".repeat(depth));
        let nodes = parse_fragment(&src).unwrap();
        assert_eq!(element(&nodes[0]).tag, "b");
        let src = format!("{}x{}", "<b>".repeat(depth + 1), "</b>".repeat(depth + 1));
        assert!(parse_fragment(&src).is_err());
    }
}
