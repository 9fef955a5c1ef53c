//! Reading and writing the ZIP container of a presentation package.

use crate::xml::local_name_bytes;
use mathslides_core::{Error, GeneratedPackage, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";
pub const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

const SLIDE_RELATIONSHIP_SUFFIX: &str = "/relationships/slide";

fn zip_error(e: ZipError) -> Error {
    Error::ZipError(e.to_string())
}

/// A slide part in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidePart {
    /// Relationship id from `ppt/_rels/presentation.xml.rels`.
    pub relationship_id: String,
    /// Full part path inside the archive, e.g. `ppt/slides/slide1.xml`.
    pub path: String,
}

/// One archive entry with its contents.
#[derive(Debug)]
pub struct PackageEntry {
    pub name: String,
    pub is_dir: bool,
    pub data: Vec<u8>,
}

/// Read access to an existing package. Works on a private copy of the bytes.
pub struct PackageReader {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl PackageReader {
    /// Open a package, failing with `InvalidPackage` unless it is a ZIP
    /// container holding `ppt/presentation.xml`.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| Error::InvalidPackageError(format!("not a ZIP container: {}", e)))?;

        let reader = Self { archive };
        if !reader.contains(PRESENTATION_PART) {
            return Err(Error::InvalidPackageError(format!(
                "missing required part '{}'",
                PRESENTATION_PART
            )));
        }

        Ok(reader)
    }

    /// Number of archive entries.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.archive.file_names().any(|name| name == path)
    }

    /// Read a part's raw bytes.
    pub fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("Part not found in archive '{}': {}", path, e)))?;

        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(data)
    }

    /// Read a part as UTF-8 text.
    pub fn read_string(&mut self, path: &str) -> Result<String> {
        let data = self.read_bytes(path)?;
        String::from_utf8(data)
            .map_err(|e| Error::InvalidPackageError(format!("part '{}' is not UTF-8: {}", path, e)))
    }

    /// Read the entry at `index` in stored order.
    pub fn entry(&mut self, index: usize) -> Result<PackageEntry> {
        let mut file = self.archive.by_index(index).map_err(zip_error)?;
        let name = file.name().to_string();
        let is_dir = file.is_dir();

        let mut data = Vec::new();
        if !is_dir {
            file.read_to_end(&mut data)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;
        }

        Ok(PackageEntry { name, is_dir, data })
    }

    /// Slide parts in the order the presentation lists them.
    ///
    /// The order comes from `p:sldIdLst` resolved through the presentation
    /// relationships. Packages without a slide id list fall back to the
    /// numbering of the relationship ids.
    pub fn slide_parts(&mut self) -> Result<Vec<SlidePart>> {
        let rels = self.read_string(PRESENTATION_RELS_PART).map_err(|_| {
            Error::InvalidPackageError(format!("missing required part '{}'", PRESENTATION_RELS_PART))
        })?;
        let targets = slide_relationships(&rels)?;

        let presentation = self.read_string(PRESENTATION_PART)?;
        let order = slide_id_list(&presentation)?;

        if order.is_empty() {
            if !targets.is_empty() {
                log::warn!(
                    "Presentation has no slide id list; ordering {} slide(s) by relationship id",
                    targets.len()
                );
            }
            let mut slides = targets;
            slides.sort_by(|a, b| {
                match (
                    extract_slide_number(&a.relationship_id),
                    extract_slide_number(&b.relationship_id),
                ) {
                    (Some(na), Some(nb)) => na.cmp(&nb),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.path.cmp(&b.path),
                }
            });
            return Ok(slides);
        }

        let by_id: HashMap<&str, &SlidePart> = targets
            .iter()
            .map(|slide| (slide.relationship_id.as_str(), slide))
            .collect();

        order
            .iter()
            .map(|rel_id| {
                by_id.get(rel_id.as_str()).map(|slide| (*slide).clone()).ok_or_else(|| {
                    Error::InvalidPackageError(format!(
                        "slide id list references unknown relationship '{}'",
                        rel_id
                    ))
                })
            })
            .collect()
    }
}

/// Collect slide relationships (id and resolved part path).
fn slide_relationships(rels: &str) -> Result<Vec<SlidePart>> {
    let mut slides = Vec::new();
    let mut reader = Reader::from_str(rels);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name_bytes(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();

                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                    match attr.key.as_ref() {
                        b"Type" => rel_type = value,
                        b"Target" => target = value,
                        b"Id" => id = value,
                        _ => {}
                    }
                }

                if rel_type.ends_with(SLIDE_RELATIONSHIP_SUFFIX) {
                    slides.push(SlidePart {
                        relationship_id: id,
                        path: resolve_part_path("ppt", &target),
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidPackageError(format!(
                    "Error parsing presentation relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(slides)
}

/// Relationship ids of `p:sldId` entries, in list order.
fn slide_id_list(presentation: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(presentation);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name_bytes(e.name().as_ref()) == b"sldId" =>
            {
                // The relationship id is the namespaced `id`; the bare `id` is the slide id.
                let rel_id = e.attributes().flatten().find_map(|attr| {
                    let key = attr.key.as_ref();
                    let is_rel_id = key != b"id" && local_name_bytes(key) == b"id";
                    is_rel_id.then(|| String::from_utf8_lossy(&attr.value).into_owned())
                });
                if let Some(rel_id) = rel_id {
                    ids.push(rel_id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidPackageError(format!(
                    "Error parsing presentation part: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_part_path(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

/// Writes a new package into memory.
pub struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    parts: usize,
}

impl PackageWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
            parts: 0,
        }
    }

    /// Add a part. Paths have no leading slash.
    pub fn add_part(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.zip
            .start_file(path, self.options)
            .map_err(zip_error)?;
        self.zip.write_all(data)?;
        self.parts += 1;
        Ok(())
    }

    /// Add a directory entry, as found in some existing packages.
    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        self.zip
            .add_directory(path, self.options)
            .map_err(zip_error)?;
        Ok(())
    }

    /// Finish the archive and hand back its bytes.
    pub fn finish(mut self) -> Result<GeneratedPackage> {
        let cursor = self.zip.finish().map_err(zip_error)?;
        let bytes = cursor.into_inner();
        log::debug!("Wrote package with {} part(s), {} bytes", self.parts, bytes.len());
        Ok(GeneratedPackage::new(bytes))
    }
}

impl Default for PackageWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
<Relationship Id="rId8" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="/ppt/slides/slide2.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="slideLayouts/slideLayout1.xml"/>
</Relationships>"#;

    fn package_with(presentation: &str) -> Vec<u8> {
        let mut writer = PackageWriter::new();
        writer.add_part(PRESENTATION_PART, presentation.as_bytes()).unwrap();
        writer.add_part(PRESENTATION_RELS_PART, RELS.as_bytes()).unwrap();
        writer.add_part("ppt/slides/slide1.xml", b"<p:sld/>").unwrap();
        writer.add_part("ppt/slides/slide2.xml", b"<p:sld/>").unwrap();
        writer.finish().unwrap().into_bytes()
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_resolve_part_path() {
        assert_eq!(resolve_part_path("ppt", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_part_path("ppt", "/ppt/slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(
            resolve_part_path("ppt/slides", "../slideLayouts/slideLayout1.xml"),
            "ppt/slideLayouts/slideLayout1.xml"
        );
    }

    #[test]
    fn test_slide_order_follows_id_list() {
        let presentation = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="257" r:id="rId8"/><p:sldId id="256" r:id="rId7"/></p:sldIdLst></p:presentation>"#;
        let bytes = package_with(presentation);
        let mut reader = PackageReader::open(&bytes).unwrap();

        let slides = reader.slide_parts().unwrap();
        assert_eq!(
            slides,
            vec![
                SlidePart {
                    relationship_id: "rId8".to_string(),
                    path: "ppt/slides/slide2.xml".to_string(),
                },
                SlidePart {
                    relationship_id: "rId7".to_string(),
                    path: "ppt/slides/slide1.xml".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_slide_order_without_id_list() {
        let bytes = package_with(r#"<p:presentation xmlns:p="p"/>"#);
        let mut reader = PackageReader::open(&bytes).unwrap();

        let paths: Vec<String> = reader
            .slide_parts()
            .unwrap()
            .into_iter()
            .map(|s| s.path)
            .collect();
        assert_eq!(paths, vec!["ppt/slides/slide1.xml", "ppt/slides/slide2.xml"]);
    }

    #[test]
    fn test_unknown_relationship_in_id_list() {
        let presentation = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId99"/></p:sldIdLst></p:presentation>"#;
        let bytes = package_with(presentation);
        let mut reader = PackageReader::open(&bytes).unwrap();
        assert!(matches!(reader.slide_parts(), Err(Error::InvalidPackageError(_))));
    }

    #[test]
    fn test_open_rejects_non_packages() {
        assert!(matches!(
            PackageReader::open(b"not a zip"),
            Err(Error::InvalidPackageError(_))
        ));

        let mut writer = PackageWriter::new();
        writer.add_part("word/document.xml", b"<w:document/>").unwrap();
        let bytes = writer.finish().unwrap().into_bytes();
        assert!(matches!(
            PackageReader::open(&bytes),
            Err(Error::InvalidPackageError(_))
        ));
    }

    #[test]
    fn test_entries_in_stored_order() {
        let bytes = package_with(r#"<p:presentation xmlns:p="p"/>"#);
        let mut reader = PackageReader::open(&bytes).unwrap();

        assert_eq!(reader.len(), 4);
        let first = reader.entry(0).unwrap();
        assert_eq!(first.name, PRESENTATION_PART);
        assert!(!first.is_dir);
        assert_eq!(reader.read_bytes("ppt/slides/slide2.xml").unwrap(), b"<p:sld/>");
    }
}
