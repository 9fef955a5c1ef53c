//! Package inspection: slide count, shapes and texts of every slide.
//!
//! Used to preview templates before they are registered.

use crate::package::{PackageReader, SlidePart};
use crate::xml::local_name_bytes;
use mathslides_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

/// Summary of a whole package.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub slide_count: usize,
    pub slides: Vec<SlideSummary>,
}

impl PackageSummary {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidPackageError(format!("cannot serialize summary: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideSummary {
    pub relationship_id: String,
    pub shapes: Vec<ShapeSummary>,
    /// Non-blank text of every text body on the slide, in document order.
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShapeSummary {
    pub id: u32,
    pub name: String,
    pub text: String,
    /// Offset of the shape in EMU, when it has a transform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
}

/// Reads slides in presentation order and extracts their shapes and text.
pub struct PackageInspector;

impl PackageInspector {
    pub fn new() -> Self {
        Self
    }

    /// Inspect package bytes.
    pub fn inspect(&self, package: &[u8]) -> Result<PackageSummary> {
        let mut reader = PackageReader::open(package)?;
        let slide_parts = reader.slide_parts()?;

        let mut slides = Vec::with_capacity(slide_parts.len());
        for slide in &slide_parts {
            slides.push(self.inspect_slide(&mut reader, slide)?);
        }

        log::info!("Inspected package with {} slide(s)", slides.len());
        Ok(PackageSummary {
            slide_count: slides.len(),
            slides,
        })
    }

    fn inspect_slide(&self, reader: &mut PackageReader, slide: &SlidePart) -> Result<SlideSummary> {
        let content = reader.read_string(&slide.path).map_err(|e| {
            Error::InvalidPackageError(format!("cannot read slide '{}': {}", slide.path, e))
        })?;

        let (shapes, texts) = extract_shapes_from_xml(&content).map_err(|e| {
            log::warn!("Slide '{}' is not readable: {}", slide.path, e);
            Error::InvalidPackageError(format!("unreadable slide '{}': {}", slide.path, e))
        })?;

        Ok(SlideSummary {
            relationship_id: slide.relationship_id.clone(),
            shapes,
            texts,
        })
    }
}

impl Default for PackageInspector {
    fn default() -> Self {
        Self::new()
    }
}

fn read_identity(e: &BytesStart, shape: &mut ShapeSummary) {
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"id" => {
                if let Ok(id) = String::from_utf8_lossy(&attr.value).parse::<u32>() {
                    shape.id = id;
                }
            }
            b"name" => {
                shape.name = attr
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            }
            _ => {}
        }
    }
}

fn read_offset(e: &BytesStart, shape: &mut ShapeSummary) {
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).parse::<i64>().ok();
        match attr.key.as_ref() {
            b"x" => shape.x = value,
            b"y" => shape.y = value,
            _ => {}
        }
    }
}

/// Text body being collected: finished paragraphs plus the current one.
#[derive(Default)]
struct TextBodyState {
    paragraphs: Vec<String>,
}

impl TextBodyState {
    fn text(&self) -> String {
        self.paragraphs.join("\n").trim().to_string()
    }
}

/// A break counts whether written `<a:br/>` or `<a:br><a:rPr/></a:br>`.
fn push_break(text_body: &mut Option<TextBodyState>) {
    if let Some(current) = text_body.as_mut().and_then(|b| b.paragraphs.last_mut()) {
        current.push('\n');
    }
}

/// Extract shapes (`p:sp`) and text bodies from slide XML.
fn extract_shapes_from_xml(xml_content: &str) -> Result<(Vec<ShapeSummary>, Vec<String>)> {
    let mut shapes = Vec::new();
    let mut texts = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(false);

    let mut current_shape: Option<ShapeSummary> = None;
    let mut shape_has_identity = false;
    let mut shape_has_offset = false;
    let mut text_body: Option<TextBodyState> = None;
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name_bytes(e.name().as_ref()) {
                b"sp" => {
                    current_shape = Some(ShapeSummary::default());
                    shape_has_identity = false;
                    shape_has_offset = false;
                }
                b"cNvPr" => {
                    if let Some(ref mut shape) = current_shape {
                        if !shape_has_identity {
                            read_identity(e, shape);
                            shape_has_identity = true;
                        }
                    }
                }
                b"txBody" => text_body = Some(TextBodyState::default()),
                b"p" => {
                    if let Some(ref mut body) = text_body {
                        body.paragraphs.push(String::new());
                    }
                }
                b"r" => in_run = true,
                b"t" => in_text = in_run,
                b"br" => push_break(&mut text_body),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name_bytes(e.name().as_ref()) {
                b"cNvPr" => {
                    if let Some(ref mut shape) = current_shape {
                        if !shape_has_identity {
                            read_identity(e, shape);
                            shape_has_identity = true;
                        }
                    }
                }
                b"off" => {
                    if let Some(ref mut shape) = current_shape {
                        if !shape_has_offset {
                            read_offset(e, shape);
                            shape_has_offset = true;
                        }
                    }
                }
                b"br" => push_break(&mut text_body),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::XmlError(format!("bad text: {}", e)))?;
                    if let Some(current) = text_body.as_mut().and_then(|b| b.paragraphs.last_mut()) {
                        current.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match local_name_bytes(e.name().as_ref()) {
                b"sp" => {
                    if let Some(shape) = current_shape.take() {
                        shapes.push(shape);
                    }
                }
                b"txBody" => {
                    if let Some(body) = text_body.take() {
                        let text = body.text();
                        if let Some(ref mut shape) = current_shape {
                            if shape.text.is_empty() {
                                shape.text = text.clone();
                            }
                        }
                        if !text.is_empty() {
                            texts.push(text);
                        }
                    }
                }
                b"r" => {
                    in_run = false;
                    in_text = false;
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok((shapes, texts))
}
