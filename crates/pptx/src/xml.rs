//! Minimal owned XML tree for rewriting package parts.
//!
//! Keeps element names with their namespace prefixes, attribute order,
//! whitespace text, comments and processing instructions, so a part that
//! is parsed and written back differs from the original only in entity
//! spelling.

use mathslides_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as FmtWrite;

/// A node in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Character data, unescaped.
    Text(String),
    /// Raw CDATA contents.
    CData(String),
    /// Raw comment contents.
    Comment(String),
    /// Processing instruction contents, without `<?` and `?>`.
    Instruction(String),
}

/// An element with its qualified name, attributes (unescaped) and children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder method: add an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder method: add a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder method: add a text child.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// The element name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// The namespace prefix of the element name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Value of an attribute by its qualified name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.local_name() == local)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }

    /// Serialize this element (without an XML declaration).
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        write_element(self, &mut out);
        out
    }
}

fn collect_text(el: &XmlElement, out: &mut String) {
    for node in &el.children {
        match node {
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Element(child) => collect_text(child, out),
            _ => {}
        }
    }
}

/// A parsed part: everything before the root element, then the root.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub prolog: Vec<XmlNode>,
    pub root: XmlElement,
}

impl XmlDocument {
    /// Serialize the document, prolog included.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(4096);
        for node in &self.prolog {
            write_node(node, &mut out);
        }
        write_element(&self.root, &mut out);
        out
    }
}

/// Extract the local name from a potentially namespaced XML name.
pub fn local_name(name: &str) -> &str {
    match name.split_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

/// Same as [`local_name`] for raw event names.
pub fn local_name_bytes(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

fn element_from_start(start: &BytesStart) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = XmlElement::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::XmlError(format!("bad attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::XmlError(format!("bad attribute value for '{}': {}", key, e)))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(node: XmlNode, stack: &mut [XmlElement], prolog: &mut Vec<XmlNode>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => prolog.push(node),
    }
}

/// Parse a whole XML part into a tree.
pub fn parse_document(xml: &str) -> Result<XmlDocument> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut prolog = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Decl(ref e)) => {
                let content = String::from_utf8_lossy(e).into_owned();
                prolog.push(XmlNode::Instruction(content));
            }
            Ok(Event::PI(ref e)) => {
                let content = String::from_utf8_lossy(e).into_owned();
                attach(XmlNode::Instruction(content), &mut stack, &mut prolog);
            }
            Ok(Event::Comment(ref e)) => {
                let content = String::from_utf8_lossy(e).into_owned();
                attach(XmlNode::Comment(content), &mut stack, &mut prolog);
            }
            Ok(Event::DocType(_)) => {}
            Ok(Event::Start(ref e)) => {
                stack.push(element_from_start(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from_start(e)?;
                if stack.is_empty() {
                    root = Some(element);
                } else {
                    attach(XmlNode::Element(element), &mut stack, &mut prolog);
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::XmlError("unbalanced end tag".to_string()))?;
                if stack.is_empty() {
                    root = Some(element);
                } else {
                    attach(XmlNode::Element(element), &mut stack, &mut prolog);
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::XmlError(format!("bad text: {}", e)))?
                    .into_owned();
                // Whitespace outside the root carries no meaning.
                if !stack.is_empty() {
                    attach(XmlNode::Text(text), &mut stack, &mut prolog);
                }
            }
            Ok(Event::CData(ref e)) => {
                let content = String::from_utf8_lossy(e).into_owned();
                attach(XmlNode::CData(content), &mut stack, &mut prolog);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
    }

    if !stack.is_empty() {
        return Err(Error::XmlError(format!(
            "unclosed element '{}'",
            stack.last().map(|el| el.name.as_str()).unwrap_or_default()
        )));
    }

    let root = root.ok_or_else(|| Error::XmlError("document has no root element".to_string()))?;
    Ok(XmlDocument { prolog, root })
}

/// Control characters XML 1.0 cannot carry in any form.
fn is_forbidden_control(c: char) -> bool {
    c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')
}

/// Escape character data. Forbidden control characters are dropped.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            c if is_forbidden_control(c) => {}
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value (double-quoted).
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            c if is_forbidden_control(c) => {}
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Element(el) => write_element(el, out),
        XmlNode::Text(text) => out.push_str(&escape_text(text)),
        XmlNode::CData(data) => {
            let _ = write!(out, "<![CDATA[{}]]>", data);
        }
        XmlNode::Comment(comment) => {
            let _ = write!(out, "<!--{}-->", comment);
        }
        XmlNode::Instruction(content) => {
            let _ = write!(out, "<?{}?>", content);
        }
    }
}

fn write_element(el: &XmlElement, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attributes {
        let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
    }

    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &el.children {
        write_node(child, out);
    }
    let _ = write!(out, "</{}>", el.name);
}
