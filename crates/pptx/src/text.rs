//! DrawingML paragraph and run model (`a:p`, `a:r`, `a:br`).
//!
//! Paragraphs are lifted out of the XML tree, edited as a flat list of
//! items and lowered back. Anything the model does not understand rides
//! along untouched as [`ParagraphItem::Other`].

use crate::xml::{XmlElement, XmlNode};
use mathslides_core::Alignment;

/// Character formatting of a run (`a:rPr`) or a break.
///
/// `lang`, `sz` and `dirty` are typed; every other attribute and child
/// (fills, fonts, extension lists) is kept verbatim. Attributes are written
/// back in the order they were read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunProperties {
    pub lang: Option<String>,
    /// Font size in hundredths of a point.
    pub size: Option<u32>,
    pub dirty: Option<bool>,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl RunProperties {
    /// Properties written on every generated run.
    pub fn new(lang: &str, point_size: u32) -> Self {
        Self {
            lang: Some(lang.to_string()),
            size: Some(point_size.saturating_mul(100)),
            dirty: Some(false),
            ..Default::default()
        }
    }

    pub fn from_element(el: &XmlElement) -> Self {
        let mut props = Self {
            attributes: el.attributes.clone(),
            children: el.children.clone(),
            ..Default::default()
        };
        for (key, value) in &el.attributes {
            match key.as_str() {
                "lang" => props.lang = Some(value.clone()),
                "sz" => props.size = value.parse().ok(),
                "dirty" => props.dirty = Some(parse_bool(value)),
                _ => {}
            }
        }
        props
    }

    /// Lower to an element named `name` (`a:rPr` in practice).
    pub fn to_element(&self, name: &str) -> XmlElement {
        let mut el = XmlElement::new(name);
        let mut written = (false, false, false);

        for (key, value) in &self.attributes {
            let value = match key.as_str() {
                "lang" => {
                    written.0 = true;
                    self.lang.clone()
                }
                "sz" => {
                    written.1 = true;
                    match self.size {
                        Some(size) if value.parse::<u32>().ok() == Some(size) => Some(value.clone()),
                        Some(size) => Some(size.to_string()),
                        // Unparsable sizes are carried as read.
                        None if value.parse::<u32>().is_err() => Some(value.clone()),
                        None => None,
                    }
                }
                "dirty" => {
                    written.2 = true;
                    match self.dirty {
                        Some(dirty) if parse_bool(value) == dirty => Some(value.clone()),
                        Some(dirty) => Some(format_bool(dirty)),
                        None => None,
                    }
                }
                _ => Some(value.clone()),
            };
            if let Some(value) = value {
                el.attributes.push((key.clone(), value));
            }
        }

        if let (false, Some(lang)) = (written.0, &self.lang) {
            el.attributes.push(("lang".to_string(), lang.clone()));
        }
        if let (false, Some(size)) = (written.1, self.size) {
            el.attributes.push(("sz".to_string(), size.to_string()));
        }
        if let (false, Some(dirty)) = (written.2, self.dirty) {
            el.attributes.push(("dirty".to_string(), format_bool(dirty)));
        }
        el.children = self.children.clone();
        el
    }
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value == "true"
}

fn format_bool(value: bool) -> String {
    let text = if value { "1" } else { "0" };
    text.to_string()
}

/// A text run (`a:r`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    prefix: String,
    pub properties: Option<RunProperties>,
    /// Text of the `a:t` child. `None` when the run has no text element.
    pub text: Option<String>,
    /// Children other than `a:rPr` and `a:t`.
    extra: Vec<XmlNode>,
    /// The element this run was read from, written back while unchanged.
    source: Option<XmlElement>,
}

impl TextRun {
    pub fn new(properties: RunProperties, text: impl Into<String>) -> Self {
        Self {
            prefix: "a".to_string(),
            properties: Some(properties),
            text: Some(text.into()),
            extra: Vec::new(),
            source: None,
        }
    }

    fn from_element(el: &XmlElement) -> Self {
        let mut run = Self {
            prefix: el.prefix().unwrap_or_default().to_string(),
            properties: None,
            text: None,
            extra: Vec::new(),
            source: Some(el.clone()),
        };

        for node in &el.children {
            match node {
                XmlNode::Element(child) if child.local_name() == "rPr" => {
                    run.properties = Some(RunProperties::from_element(child));
                }
                XmlNode::Element(child) if child.local_name() == "t" => {
                    run.text = Some(child.text_content());
                }
                // Formatting whitespace between children is not content.
                XmlNode::Text(t) if t.trim().is_empty() => {}
                other => run.extra.push(other.clone()),
            }
        }

        run
    }

    fn to_element(&self) -> XmlElement {
        if let Some(source) = &self.source {
            let read = Self::from_element(source);
            if read.prefix == self.prefix
                && read.properties == self.properties
                && read.text == self.text
                && read.extra == self.extra
            {
                return source.clone();
            }
        }

        let mut el = XmlElement::new(qualify(&self.prefix, "r"));
        if let Some(props) = &self.properties {
            el = el.with_child(props.to_element(&qualify(&self.prefix, "rPr")));
        }
        if let Some(text) = &self.text {
            let mut t = XmlElement::new(qualify(&self.prefix, "t"));
            if !text.is_empty() {
                t = t.with_text(text.clone());
            }
            el = el.with_child(t);
        }
        el.children.extend(self.extra.iter().cloned());
        el
    }

    /// A run with the same formatting and different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            source: None,
            ..self.clone()
        }
    }

    /// Replace this run by one run per line joined with line breaks.
    ///
    /// Every inserted break and run copies this run's formatting, and each
    /// insertion lands after the previously inserted item, so the lines keep
    /// their order.
    pub fn split_lines(&self, lines: &[String]) -> Vec<ParagraphItem> {
        let mut items = Vec::with_capacity(lines.len() * 2);
        let mut lines = lines.iter();

        let first = lines.next().map(String::as_str).unwrap_or_default();
        items.push(ParagraphItem::Run(self.with_text(first)));

        for line in lines {
            items.push(ParagraphItem::Break(LineBreak {
                prefix: self.prefix.clone(),
                properties: self.properties.clone(),
                source: None,
            }));
            items.push(ParagraphItem::Run(self.with_text(line.as_str())));
        }

        items
    }
}

/// A line break (`a:br`) with its own optional formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBreak {
    prefix: String,
    pub properties: Option<RunProperties>,
    source: Option<XmlElement>,
}

impl LineBreak {
    fn from_element(el: &XmlElement) -> Self {
        Self {
            prefix: el.prefix().unwrap_or_default().to_string(),
            properties: el.child("rPr").map(RunProperties::from_element),
            source: Some(el.clone()),
        }
    }

    fn to_element(&self) -> XmlElement {
        if let Some(source) = &self.source {
            if source.child("rPr").map(RunProperties::from_element) == self.properties {
                return source.clone();
            }
        }

        let mut el = XmlElement::new(qualify(&self.prefix, "br"));
        if let Some(props) = &self.properties {
            el = el.with_child(props.to_element(&qualify(&self.prefix, "rPr")));
        }
        el
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParagraphItem {
    Run(TextRun),
    Break(LineBreak),
    /// Paragraph properties, fields, end-of-paragraph formatting, whitespace.
    Other(XmlNode),
}

/// What to do with one run during [`Paragraph::rewrite_runs`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunEdit {
    Keep,
    Replace(Vec<ParagraphItem>),
}

/// A paragraph (`a:p`).
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    name: String,
    attributes: Vec<(String, String)>,
    pub items: Vec<ParagraphItem>,
}

impl Paragraph {
    /// An empty paragraph with the given horizontal alignment.
    pub fn new(alignment: Alignment) -> Self {
        let properties = XmlElement::new("a:pPr").with_attr("algn", alignment.as_ooxml());
        Self {
            name: "a:p".to_string(),
            attributes: Vec::new(),
            items: vec![ParagraphItem::Other(XmlNode::Element(properties))],
        }
    }

    /// A paragraph holding exactly one run.
    pub fn single_run(alignment: Alignment, properties: RunProperties, text: &str) -> Self {
        let mut paragraph = Self::new(alignment);
        paragraph
            .items
            .push(ParagraphItem::Run(TextRun::new(properties, text)));
        paragraph
    }

    pub fn from_element(el: &XmlElement) -> Self {
        let items = el
            .children
            .iter()
            .map(|node| match node {
                XmlNode::Element(child) if child.local_name() == "r" => {
                    ParagraphItem::Run(TextRun::from_element(child))
                }
                XmlNode::Element(child) if child.local_name() == "br" => {
                    ParagraphItem::Break(LineBreak::from_element(child))
                }
                other => ParagraphItem::Other(other.clone()),
            })
            .collect();

        Self {
            name: el.name.clone(),
            attributes: el.attributes.clone(),
            items,
        }
    }

    pub fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new(self.name.clone());
        el.attributes = self.attributes.clone();
        el.children = self
            .items
            .iter()
            .map(|item| match item {
                ParagraphItem::Run(run) => XmlNode::Element(run.to_element()),
                ParagraphItem::Break(br) => XmlNode::Element(br.to_element()),
                ParagraphItem::Other(node) => node.clone(),
            })
            .collect();
        el
    }

    /// Horizontal alignment from `a:pPr algn`, if set.
    pub fn alignment(&self) -> Option<Alignment> {
        self.items.iter().find_map(|item| match item {
            ParagraphItem::Other(XmlNode::Element(el)) if el.local_name() == "pPr" => {
                el.attr("algn").and_then(Alignment::from_ooxml)
            }
            _ => None,
        })
    }

    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.items.iter().filter_map(|item| match item {
            ParagraphItem::Run(run) => Some(run),
            _ => None,
        })
    }

    /// Visible text, with breaks as `\n`.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for item in &self.items {
            match item {
                ParagraphItem::Run(run) => text.push_str(run.text.as_deref().unwrap_or_default()),
                ParagraphItem::Break(_) => text.push('\n'),
                ParagraphItem::Other(_) => {}
            }
        }
        text
    }

    /// Visit every run once, in order. Items produced by an edit are not
    /// visited again. Returns whether anything was replaced.
    pub fn rewrite_runs<F>(&mut self, mut edit: F) -> bool
    where
        F: FnMut(&TextRun) -> RunEdit,
    {
        let mut changed = false;
        let items = std::mem::take(&mut self.items);
        self.items.reserve(items.len());

        for item in items {
            match item {
                ParagraphItem::Run(run) => match edit(&run) {
                    RunEdit::Keep => self.items.push(ParagraphItem::Run(run)),
                    RunEdit::Replace(replacement) => {
                        changed = true;
                        self.items.extend(replacement);
                    }
                },
                other => self.items.push(other),
            }
        }

        changed
    }
}

fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn paragraph(xml: &str) -> Paragraph {
        Paragraph::from_element(&parse_document(xml).unwrap().root)
    }

    #[test]
    fn test_single_run_paragraph_xml() {
        let p = Paragraph::single_run(Alignment::Center, RunProperties::new("en-US", 24), "x ≤ 1");
        assert_eq!(
            p.to_element().to_xml(),
            r#"<a:p><a:pPr algn="ctr"/><a:r><a:rPr lang="en-US" sz="2400" dirty="0"/><a:t>x ≤ 1</a:t></a:r></a:p>"#
        );
        assert_eq!(p.alignment(), Some(Alignment::Center));
        assert_eq!(p.runs().count(), 1);
    }

    #[test]
    fn test_lift_and_lower_keeps_unknown_parts() {
        let xml = r#"<a:p><a:pPr algn="r"/><a:r><a:rPr lang="vi-VN" sz="1800" b="1"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:rPr><a:t>Hi</a:t></a:r><a:fld id="{1}" type="slidenum"><a:t>3</a:t></a:fld><a:endParaRPr lang="en-US"/></a:p>"#;
        let p = paragraph(xml);

        assert_eq!(p.alignment(), Some(Alignment::Right));
        assert_eq!(p.text(), "Hi");
        assert_eq!(p.to_element().to_xml(), xml);
    }

    #[test]
    fn test_split_lines_clones_formatting() {
        let p = paragraph(r#"<a:p><a:r><a:rPr lang="en-US" sz="2000" i="1"/><a:t>{{T}}</a:t></a:r></a:p>"#);
        let run = p.runs().next().unwrap().clone();

        let lines = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let items = run.split_lines(&lines);
        assert_eq!(items.len(), 5);

        let mut rebuilt = p.clone();
        rebuilt.items = items;
        assert_eq!(rebuilt.text(), "one\ntwo\nthree");
        assert_eq!(
            rebuilt.to_element().to_xml(),
            concat!(
                r#"<a:p><a:r><a:rPr lang="en-US" sz="2000" i="1"/><a:t>one</a:t></a:r>"#,
                r#"<a:br><a:rPr lang="en-US" sz="2000" i="1"/></a:br>"#,
                r#"<a:r><a:rPr lang="en-US" sz="2000" i="1"/><a:t>two</a:t></a:r>"#,
                r#"<a:br><a:rPr lang="en-US" sz="2000" i="1"/></a:br>"#,
                r#"<a:r><a:rPr lang="en-US" sz="2000" i="1"/><a:t>three</a:t></a:r></a:p>"#
            )
        );
    }

    #[test]
    fn test_rewrite_runs_visits_each_original_run_once() {
        let mut p = paragraph(r#"<a:p><a:r><a:t>a</a:t></a:r><a:br/><a:r><a:t>b</a:t></a:r></a:p>"#);

        let mut visited = Vec::new();
        let changed = p.rewrite_runs(|run| {
            let text = run.text.clone().unwrap_or_default();
            visited.push(text.clone());
            if text == "a" {
                RunEdit::Replace(run.split_lines(&["a1".to_string(), "a2".to_string()]))
            } else {
                RunEdit::Keep
            }
        });

        assert!(changed);
        assert_eq!(visited, vec!["a", "b"]);
        assert_eq!(p.text(), "a1\na2\nb");
    }

    #[test]
    fn test_rewrite_runs_without_edits() {
        let xml = r#"<a:p><a:r><a:t>same</a:t></a:r></a:p>"#;
        let mut p = paragraph(xml);
        assert!(!p.rewrite_runs(|_| RunEdit::Keep));
        assert_eq!(p.to_element().to_xml(), xml);
    }

    #[test]
    fn test_run_properties_typed_fields() {
        let doc = parse_document(r#"<a:rPr lang="en-US" sz="3200" dirty="0" b="1"/>"#).unwrap();
        let props = RunProperties::from_element(&doc.root);
        assert_eq!(props.lang.as_deref(), Some("en-US"));
        assert_eq!(props.size, Some(3200));
        assert_eq!(props.dirty, Some(false));
        assert_eq!(
            props.to_element("a:rPr").to_xml(),
            r#"<a:rPr lang="en-US" sz="3200" dirty="0" b="1"/>"#
        );
    }

    #[test]
    fn test_run_properties_keep_attribute_order() {
        let doc = parse_document(r#"<a:rPr b="1" dirty="true" sz="1800" lang="vi-VN"/>"#).unwrap();
        let mut props = RunProperties::from_element(&doc.root);
        assert_eq!(
            props.to_element("a:rPr").to_xml(),
            r#"<a:rPr b="1" dirty="true" sz="1800" lang="vi-VN"/>"#
        );

        props.size = Some(2000);
        assert_eq!(
            props.to_element("a:rPr").to_xml(),
            r#"<a:rPr b="1" dirty="true" sz="2000" lang="vi-VN"/>"#
        );
    }

    #[test]
    fn test_untouched_runs_keep_their_markup() {
        let xml = "<a:p><a:r>\n  <a:rPr sz=\"1800\" lang=\"en-US\"/>\n  <a:t>keep</a:t>\n</a:r><a:r><a:rPr lang=\"en-US\"/><a:t>{{T}}</a:t></a:r></a:p>";
        let mut p = paragraph(xml);

        let changed = p.rewrite_runs(|run| match run.text.as_deref() {
            Some("{{T}}") => RunEdit::Replace(vec![ParagraphItem::Run(run.with_text("new"))]),
            _ => RunEdit::Keep,
        });

        assert!(changed);
        assert_eq!(
            p.to_element().to_xml(),
            "<a:p><a:r>\n  <a:rPr sz=\"1800\" lang=\"en-US\"/>\n  <a:t>keep</a:t>\n</a:r><a:r><a:rPr lang=\"en-US\"/><a:t>new</a:t></a:r></a:p>"
        );
    }
}
