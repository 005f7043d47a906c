//! Markup tree for templates and definitions documents.
//!
//! Templates are parsed once into a tree of [`Node`]s. Text content and
//! attribute values are entity-decoded and compiled into
//! [`Interpolation`]s at parse time, so rendering never re-parses
//! placeholders.

mod entities;
mod parser;

pub use parser::{MAX_ELEMENT_DEPTH, parse_document, parse_fragment};

use crate::expr::Interpolation;

/// HTML elements that never have content and are emitted self-closed.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Node in a parsed markup tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// Element with attributes and children.
    Element(Element),
    /// Text run (entity-decoded).
    Text(Text),
    /// Comment; never rendered.
    Comment(String),
}

impl Node {
    /// Create a text node.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(Text::new(content))
    }

    /// The element, if this node is one.
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// Element node.
#[derive(Debug, Clone)]
pub struct Element {
    /// Tag name as written.
    pub tag: String,
    /// Attributes in document order.
    pub attrs: Vec<Attribute>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Create an element with no attributes or children.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(Attribute::new(name, value));
        self
    }

    /// Set children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|attr| attr.name == name)
    }

    /// Raw (decoded, uninterpolated) attribute value.
    #[must_use]
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attr(name).map(|attr| attr.value.as_str())
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Iterate over child elements, skipping text and comments.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given tag.
    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.child_elements().find(|child| child.tag == tag)
    }

    /// True for HTML void elements such as `<br>`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.to_ascii_lowercase().as_str())
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&text.content),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) => {}
        }
    }
}

/// Attribute with its compiled interpolation.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Decoded value as written.
    pub value: String,
    /// Undecoded value from the source markup.
    markup: Option<String>,
    interpolation: Interpolation,
}

impl Attribute {
    /// Create an attribute, compiling its placeholders.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            interpolation: Interpolation::parse(&value),
            value,
            markup: None,
        }
    }

    pub(crate) fn from_markup(name: String, value: String, markup: String) -> Self {
        Self {
            markup: Some(markup),
            ..Self::new(name, value)
        }
    }

    /// Source markup of a placeholder-free value parsed from a template.
    pub(crate) fn literal_markup(&self) -> Option<&str> {
        self.markup
            .as_deref()
            .filter(|_| self.interpolation.is_literal())
    }

    /// Compiled value.
    #[must_use]
    pub fn interpolation(&self) -> &Interpolation {
        &self.interpolation
    }
}

/// Text node with its compiled interpolation.
#[derive(Debug, Clone)]
pub struct Text {
    /// Decoded text as written.
    pub content: String,
    /// Undecoded text from the source markup.
    markup: Option<String>,
    interpolation: Interpolation,
}

impl Text {
    /// Create a text node, compiling its placeholders.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            interpolation: Interpolation::parse(&content),
            content,
            markup: None,
        }
    }

    pub(crate) fn from_markup(content: String, markup: String) -> Self {
        Self {
            markup: Some(markup),
            ..Self::new(content)
        }
    }

    /// Source markup of placeholder-free text parsed from a template.
    pub(crate) fn literal_markup(&self) -> Option<&str> {
        self.markup
            .as_deref()
            .filter(|_| self.interpolation.is_literal())
    }

    /// Compiled content.
    #[must_use]
    pub fn interpolation(&self) -> &Interpolation {
        &self.interpolation
    }

    /// True for whitespace-only text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.interpolation.is_blank()
    }
}

/// Escape text content for output (`&` and `<`).
pub(crate) fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}

/// Escape a double-quoted attribute value for output (`&` and `"`).
pub(crate) fn escape_attr(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_is_recursive() {
        let element = Element::new("p").with_children(vec![
            Node::text("a"),
            Node::Element(Element::new("b").with_children(vec![Node::text("b")])),
            Node::Comment("skip".to_owned()),
            Node::text("c"),
        ]);
        assert_eq!(element.text_content(), "abc");
    }

    #[test]
    fn test_attr_lookup() {
        let element = Element::new("if").with_attr("test", "${ok}");
        assert_eq!(element.attr_value("test"), Some("${ok}"));
        assert!(element.attr("other").is_none());
        assert!(!element.attr("test").unwrap().interpolation().is_literal());
    }

    #[test]
    fn test_void_elements() {
        assert!(Element::new("br").is_void());
        assert!(Element::new("BR").is_void());
        assert!(!Element::new("div").is_void());
    }

    #[test]
    fn test_child_lookup() {
        let element = Element::new("directive").with_children(vec![
            Node::text("\n"),
            Node::Element(Element::new("content")),
            Node::Element(Element::new("post-script")),
        ]);
        assert_eq!(element.child("post-script").unwrap().tag, "post-script");
        assert_eq!(element.child_elements().count(), 2);
    }

    #[test]
    fn test_escape_helpers() {
        let mut text = String::new();
        escape_text("a<b>&\"", &mut text);
        assert_eq!(text, "a&lt;b>&amp;\"");

        let mut attr = String::new();
        escape_attr("a<b>&\"", &mut attr);
        assert_eq!(attr, "a<b>&amp;&quot;");
    }
}
