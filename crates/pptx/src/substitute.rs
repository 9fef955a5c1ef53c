//! Placeholder tag substitution in existing presentation packages.

use crate::package::{PackageReader, PackageWriter, SlidePart};
use crate::text::{Paragraph, RunEdit, TextRun};
use crate::xml::{parse_document, XmlElement, XmlNode};
use mathslides_core::{Error, GeneratedPackage, PlaceholderMap, Result};
use std::collections::{BTreeSet, HashMap};

/// Tags to apply to one slide, addressed by zero-based presentation order.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideAssignment {
    pub slide_index: usize,
    pub tags: PlaceholderMap,
}

impl SlideAssignment {
    pub fn new(slide_index: usize, tags: PlaceholderMap) -> Self {
        Self { slide_index, tags }
    }
}

/// Replaces literal tag tokens inside the runs of a package's slides and
/// writes a new package. The input bytes are never modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagSubstitutionEngine;

impl TagSubstitutionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply one map to every slide.
    pub fn substitute(&self, package: &[u8], tags: &PlaceholderMap) -> Result<GeneratedPackage> {
        let mut reader = PackageReader::open(package)?;
        let slides = reader.slide_parts()?;
        log::info!("Substituting {} tag(s) across {} slide(s)", tags.len(), slides.len());

        let plan = slides.into_iter().map(|slide| (slide, vec![tags])).collect();
        self.rewrite(reader, plan)
    }

    /// Apply a map per slide. Slides without an assignment are copied as is.
    ///
    /// Several assignments for the same slide are applied in the given order.
    pub fn substitute_slides(
        &self,
        package: &[u8],
        assignments: &[SlideAssignment],
    ) -> Result<GeneratedPackage> {
        let mut reader = PackageReader::open(package)?;
        let slides = reader.slide_parts()?;

        if let Some(max_index) = assignments.iter().map(|a| a.slide_index).max() {
            if max_index >= slides.len() {
                return Err(Error::InsufficientSlidesError {
                    required: max_index + 1,
                    available: slides.len(),
                });
            }
        }
        log::info!(
            "Substituting {} slide assignment(s) into a {}-slide package",
            assignments.len(),
            slides.len()
        );

        let plan = slides
            .into_iter()
            .enumerate()
            .map(|(index, slide)| {
                let maps = assignments
                    .iter()
                    .filter(|a| a.slide_index == index)
                    .map(|a| &a.tags)
                    .collect();
                (slide, maps)
            })
            .collect();
        self.rewrite(reader, plan)
    }

    fn rewrite(
        &self,
        mut reader: PackageReader,
        plan: Vec<(SlidePart, Vec<&PlaceholderMap>)>,
    ) -> Result<GeneratedPackage> {
        let mut used = BTreeSet::new();
        let mut replaced: HashMap<String, Vec<u8>> = HashMap::new();

        for (slide, maps) in &plan {
            if maps.iter().all(|tags| tags.is_empty()) {
                continue;
            }

            let xml = reader.read_string(&slide.path).map_err(|e| {
                Error::InvalidPackageError(format!("cannot read slide '{}': {}", slide.path, e))
            })?;
            if let Some(rewritten) = rewrite_slide(&xml, maps, &mut used)
                .map_err(|e| Error::InvalidPackageError(format!("unreadable slide '{}': {}", slide.path, e)))?
            {
                log::debug!("Rewrote {}", slide.path);
                replaced.insert(slide.path.clone(), rewritten.into_bytes());
            }
        }

        let unused: BTreeSet<&str> = plan
            .iter()
            .flat_map(|(_, maps)| maps.iter().flat_map(|tags| tags.iter().map(|(tag, _)| tag)))
            .filter(|tag| !used.contains(*tag))
            .collect();
        if !unused.is_empty() {
            log::debug!("Tags not found in any run: {:?}", unused);
        }

        let mut writer = PackageWriter::new();
        for index in 0..reader.len() {
            let entry = reader.entry(index)?;
            if entry.is_dir {
                writer.add_directory(&entry.name)?;
                continue;
            }
            let data = replaced.remove(&entry.name).unwrap_or(entry.data);
            writer.add_part(&entry.name, &data)?;
        }

        writer.finish()
    }
}

/// Rewrite one slide part. `None` when no run matched.
fn rewrite_slide(
    xml: &str,
    maps: &[&PlaceholderMap],
    used: &mut BTreeSet<String>,
) -> Result<Option<String>> {
    let mut doc = parse_document(xml)?;
    let mut changed = false;

    for tags in maps.iter().filter(|tags| !tags.is_empty()) {
        let mut pass = SubstitutionPass {
            tags,
            used: &mut *used,
            skipped_runs: 0,
        };
        changed |= pass.visit(&mut doc.root, false);
        if pass.skipped_runs > 0 {
            log::debug!("Skipped {} run(s) without text", pass.skipped_runs);
        }
    }

    Ok(changed.then(|| doc.to_xml()))
}

struct SubstitutionPass<'a> {
    tags: &'a PlaceholderMap,
    used: &'a mut BTreeSet<String>,
    skipped_runs: usize,
}

impl SubstitutionPass<'_> {
    /// Walk the tree; paragraphs count only inside a text body.
    fn visit(&mut self, el: &mut XmlElement, in_text_body: bool) -> bool {
        let mut changed = false;

        for node in el.children.iter_mut() {
            let XmlNode::Element(child) = node else {
                continue;
            };

            if in_text_body && child.local_name() == "p" {
                let mut paragraph = Paragraph::from_element(child);
                if paragraph.rewrite_runs(|run| self.edit_run(run)) {
                    *child = paragraph.to_element();
                    changed = true;
                }
            } else {
                let inside = in_text_body || child.local_name() == "txBody";
                changed |= self.visit(child, inside);
            }
        }

        changed
    }

    fn edit_run(&mut self, run: &TextRun) -> RunEdit {
        let text = match run.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => {
                self.skipped_runs += 1;
                return RunEdit::Keep;
            }
        };

        match expand_tags(text, self.tags, self.used) {
            Some(lines) => RunEdit::Replace(run.split_lines(&lines)),
            None => RunEdit::Keep,
        }
    }
}

/// Scan `text` once, replacing the earliest tag at each point (longest on
/// ties). Returns the resulting lines, or `None` when no tag occurs.
///
/// The first line is the run text with every tag replaced by the first line
/// of its value, so text after a tag stays in the run. The remaining lines of
/// each multi-line value follow in order of appearance.
fn expand_tags(text: &str, tags: &PlaceholderMap, used: &mut BTreeSet<String>) -> Option<Vec<String>> {
    let mut first = String::with_capacity(text.len());
    let mut extra = Vec::new();
    let mut rest = text;
    let mut matched = false;

    while !rest.is_empty() {
        let next = tags
            .iter()
            .filter_map(|(tag, value)| rest.find(tag).map(|pos| (pos, tag, value)))
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.len().cmp(&a.1.len())));

        let Some((pos, tag, value)) = next else {
            first.push_str(rest);
            break;
        };

        matched = true;
        used.insert(tag.to_string());
        first.push_str(&rest[..pos]);

        let mut value_lines = value.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));
        if let Some(line) = value_lines.next() {
            first.push_str(line);
        }
        extra.extend(value_lines.map(str::to_string));

        rest = &rest[pos + tag.len()..];
    }

    matched.then(|| std::iter::once(first).chain(extra).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::ParagraphItem;

    fn tags(pairs: &[(&str, &str)]) -> PlaceholderMap {
        PlaceholderMap::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn expand(text: &str, map: &PlaceholderMap) -> Option<Vec<String>> {
        expand_tags(text, map, &mut BTreeSet::new())
    }

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="urn:a" xmlns:p="urn:p"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="en-US" sz="2000" b="1"/><a:t>Title: {{TITLE}}</a:t></a:r><a:r><a:rPr lang="en-US"/><a:t></a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_expand_single_line() {
        let map = tags(&[("{{A}}", "x"), ("{{B}}", "y")]);
        assert_eq!(
            expand("{{B}} and {{A}}{{A}}", &map),
            Some(vec!["y and xx".to_string()])
        );
        assert_eq!(expand("nothing here", &map), None);
    }

    #[test]
    fn test_expand_does_not_rescan_values() {
        let map = tags(&[("{{A}}", "{{B}}"), ("{{B}}", "done")]);
        assert_eq!(expand("{{A}}", &map), Some(vec!["{{B}}".to_string()]));
    }

    #[test]
    fn test_expand_multi_line_value() {
        let map = tags(&[("{{F}}", "a\nb\r\nc")]);
        assert_eq!(
            expand("x {{F}} y", &map),
            Some(vec!["x a y".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_expand_two_multi_line_values() {
        let map = tags(&[("{{A}}", "a1\na2"), ("{{B}}", "b1\nb2")]);
        assert_eq!(
            expand("{{A}}, {{B}}!", &map),
            Some(vec!["a1, b1!".to_string(), "a2".to_string(), "b2".to_string()])
        );
    }

    #[test]
    fn test_rewrite_keeps_trailing_text_in_first_run() {
        let xml = r#"<p:sld xmlns:a="urn:a" xmlns:p="urn:p"><p:txBody><a:p><a:r><a:rPr lang="en-US"/><a:t>Before {{T}} after</a:t></a:r></a:p></p:txBody></p:sld>"#;
        let map = tags(&[("{{T}}", "L1\nL2")]);
        let rewritten = rewrite_slide(xml, &[&map], &mut BTreeSet::new())
            .unwrap()
            .unwrap();

        let doc = parse_document(&rewritten).unwrap();
        let paragraph = find_paragraph(&doc.root).unwrap();
        let runs: Vec<&str> = paragraph
            .runs()
            .filter_map(|run| run.text.as_deref())
            .collect();
        assert_eq!(runs, vec!["Before L1 after", "L2"]);
        assert_eq!(run_and_break_counts(&paragraph), (2, 1));
    }

    #[test]
    fn test_expand_records_used_tags() {
        let map = tags(&[("{{A}}", "1"), ("{{B}}", "2")]);
        let mut used = BTreeSet::new();
        expand_tags("{{A}}", &map, &mut used);
        assert!(used.contains("{{A}}"));
        assert!(!used.contains("{{B}}"));
    }

    #[test]
    fn test_rewrite_slide_splits_lines() {
        let map = tags(&[("{{TITLE}}", "one\ntwo\nthree")]);
        let xml = rewrite_slide(SLIDE, &[&map], &mut BTreeSet::new())
            .unwrap()
            .unwrap();

        assert_eq!(paragraph_texts(&xml).unwrap(), vec!["Title: one\ntwo\nthree"]);

        let doc = parse_document(&xml).unwrap();
        let paragraph = find_paragraph(&doc.root).unwrap();
        // Three value runs plus the untouched empty run.
        assert_eq!(run_and_break_counts(&paragraph), (4, 2));
        assert_eq!(xml.matches(r#"<a:rPr lang="en-US" sz="2000" b="1"/>"#).count(), 5);
    }

    #[test]
    fn test_rewrite_slide_without_match() {
        let map = tags(&[("{{OTHER}}", "v")]);
        assert_eq!(rewrite_slide(SLIDE, &[&map], &mut BTreeSet::new()).unwrap(), None);
    }

    #[test]
    fn test_paragraphs_outside_text_body_are_ignored() {
        let xml = r#"<p:sld xmlns:a="urn:a" xmlns:p="urn:p"><a:p><a:r><a:t>{{T}}</a:t></a:r></a:p></p:sld>"#;
        let map = tags(&[("{{T}}", "v")]);
        assert_eq!(rewrite_slide(xml, &[&map], &mut BTreeSet::new()).unwrap(), None);
    }

    /// Paragraph texts of a slide part, breaks as `\n`.
    fn paragraph_texts(xml: &str) -> Result<Vec<String>> {
        fn collect(el: &XmlElement, in_text_body: bool, out: &mut Vec<String>) {
            for child in el.elements() {
                if in_text_body && child.local_name() == "p" {
                    out.push(Paragraph::from_element(child).text());
                } else {
                    collect(child, in_text_body || child.local_name() == "txBody", out);
                }
            }
        }

        let doc = parse_document(xml)?;
        let mut texts = Vec::new();
        collect(&doc.root, false, &mut texts);
        Ok(texts)
    }

    fn run_and_break_counts(paragraph: &Paragraph) -> (usize, usize) {
        paragraph.items.iter().fold((0, 0), |(runs, breaks), item| match item {
            ParagraphItem::Run(_) => (runs + 1, breaks),
            ParagraphItem::Break(_) => (runs, breaks + 1),
            ParagraphItem::Other(_) => (runs, breaks),
        })
    }

    fn find_paragraph(el: &XmlElement) -> Option<Paragraph> {
        if el.local_name() == "p" {
            return Some(Paragraph::from_element(el));
        }
        el.elements().find_map(find_paragraph)
    }
}
