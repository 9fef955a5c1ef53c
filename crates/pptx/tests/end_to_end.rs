use mathslides_core::ports::{ContentStore, LayoutSource, TemplateSource, TextGenerator, TopicSource};
use mathslides_core::{
    parse_generated_content, ContentUnit, Error, LayoutSchema, MathNotationFormatter,
    PlaceholderMap, Result, Topic,
};
use mathslides_pptx::text::{Paragraph, ParagraphItem};
use mathslides_pptx::xml::{parse_document, XmlElement};
use mathslides_pptx::{
    BuildOptions, Collaborators, GenerateDocument, GenerationOrchestrator, GenerationRequest,
    PackageInspector, PackageReader, PackageSlideBuilder, SlideAssignment, TagSubstitutionEngine,
    TemplateStrategy,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const LAYOUT: &str = r#"{
  "slideWidthEmu": 9144000,
  "slideHeightEmu": 6858000,
  "marginEmu": 457200,
  "layouts": {
    "titleSlide": {
      "title": {"x": 457200, "y": 2000000, "w": 8229600, "h": 1200000, "fontSize": 40, "align": "center"},
      "subtitle": {"x": 457200, "y": 3400000, "w": 8229600, "h": 800000, "fontSize": 24, "align": "center"}
    },
    "contentSlide": {
      "title": {"x": 457200, "y": 300000, "w": 8229600, "h": 900000, "fontSize": 32},
      "content": {"x": 457200, "y": 1400000, "w": 8229600, "h": 4800000, "fontSize": 24}
    },
    "splitSlide": {
      "title": {"x": 457200, "y": 300000, "w": 8229600, "h": 900000, "fontSize": 32},
      "left": {"x": 457200, "y": 1400000, "w": 4000000, "h": 4800000, "fontSize": 22},
      "right": {"x": 4686800, "y": 1400000, "w": 4000000, "h": 4800000, "fontSize": 22, "align": "right"}
    }
  },
  "comment": "unknown fields are ignored"
}"#;

fn schema() -> LayoutSchema {
    LayoutSchema::from_json(LAYOUT).unwrap()
}

fn slide_texts(package: &[u8]) -> Vec<Vec<String>> {
    PackageInspector::new()
        .inspect(package)
        .unwrap()
        .slides
        .into_iter()
        .map(|slide| slide.texts)
        .collect()
}

fn collect_shape_ids(el: &XmlElement, ids: &mut Vec<String>) {
    if el.local_name() == "cNvPr" {
        if let Some(id) = el.attr("id") {
            ids.push(id.to_string());
        }
    }
    for child in el.elements() {
        collect_shape_ids(child, ids);
    }
}

fn find_paragraphs(el: &XmlElement, out: &mut Vec<Paragraph>) {
    if el.local_name() == "p" && el.prefix() == Some("a") {
        out.push(Paragraph::from_element(el));
        return;
    }
    for child in el.elements() {
        find_paragraphs(child, out);
    }
}

/// A minimal hand-written package with the given slide bodies.
fn fixture_package(slides: &[&str]) -> Vec<u8> {
    let mut sld_ids = String::new();
    let mut rels = String::new();
    for index in 0..slides.len() {
        sld_ids.push_str(&format!(
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            256 + index,
            10 + index
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
            10 + index,
            index + 1
        ));
    }

    let mut parts = vec![
        (
            "[Content_Types].xml".to_string(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_string(),
        ),
        (
            "ppt/presentation.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
                sld_ids
            ),
        ),
        (
            "ppt/_rels/presentation.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                rels
            ),
        ),
    ];
    for (index, body) in slides.iter().enumerate() {
        parts.push((
            format!("ppt/slides/slide{}.xml", index + 1),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:cNvPr id="2" name="Body"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
                body
            ),
        ));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    for (name, data) in &parts {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn all_parts(package: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut reader = PackageReader::open(package).unwrap();
    (0..reader.len())
        .map(|index| {
            let entry = reader.entry(index).unwrap();
            (entry.name, entry.data)
        })
        .collect()
}

#[test]
fn algebra_deck_from_layout() {
    let units = vec![ContentUnit::new("Basics").with_summary("x=1")];
    let package = PackageSlideBuilder::default()
        .build(&units, &schema(), "Algebra")
        .unwrap();

    let summary = PackageInspector::new().inspect(package.as_bytes()).unwrap();
    assert_eq!(summary.slide_count, 2);
    assert_eq!(summary.slides[0].texts, vec!["Algebra", "Basics"]);
    assert_eq!(summary.slides[1].texts, vec!["Basics", "x=1"]);
    assert_eq!(summary.slides[1].shapes[1].name, "content 8");
}

#[test]
fn generated_latex_builds_well_formed_slides() {
    let raw = r#"[{"title":"Cases","summary":"\begin{cases} 1 \end{cases}, \bar{x} \boxed{y}"},
 {"title":"Raw","summary":"bell\u0007 and tab\tok"}]"#;
    let formatter = MathNotationFormatter::new();
    let units: Vec<ContentUnit> = parse_generated_content(raw)
        .unwrap()
        .iter()
        .map(|unit| unit.formatted(&formatter))
        .collect();

    let package = PackageSlideBuilder::default()
        .build(&units, &schema(), "Deck")
        .unwrap();

    let mut reader = PackageReader::open(package.as_bytes()).unwrap();
    for slide in reader.slide_parts().unwrap() {
        let xml = reader.read_string(&slide.path).unwrap();
        let forbidden: Vec<char> = xml
            .chars()
            .filter(|c| *c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r'))
            .collect();
        assert!(forbidden.is_empty(), "{:?} in {}", forbidden, slide.path);
        parse_document(&xml).unwrap();
    }

    let texts = slide_texts(package.as_bytes());
    assert_eq!(texts[2], vec!["Raw", "bell and tab\tok"]);
}

#[test]
fn slide_count_follows_units() {
    let units = vec![
        ContentUnit::new("A").with_summary("only summary"),
        ContentUnit::new("B").with_formula("a+b", None),
        ContentUnit::new("C").with_summary("both").with_example("1+1"),
        ContentUnit::new("D"),
    ];
    // 1 title + 2 with summary + 2 with formulas or examples.
    let package = PackageSlideBuilder::default()
        .build(&units, &schema(), "Deck")
        .unwrap();

    let texts = slide_texts(package.as_bytes());
    assert_eq!(texts.len(), 5);
    assert_eq!(texts[1], vec!["A", "only summary"]);
    assert_eq!(texts[2], vec!["B", "a+b"]);
    assert_eq!(texts[3], vec!["C", "both"]);
    assert_eq!(texts[4], vec!["C", "1+1"]);
}

#[test]
fn shape_ids_are_unique_across_the_package() {
    let units = vec![
        ContentUnit::new("A").with_summary("s").with_formula("f", Some("e")),
        ContentUnit::new("B").with_summary("t").with_example("x"),
    ];
    let package = PackageSlideBuilder::default()
        .build(&units, &schema(), "Deck")
        .unwrap();

    let mut ids = Vec::new();
    for (name, data) in all_parts(package.as_bytes()) {
        if name.ends_with(".xml") {
            let xml = String::from_utf8(data).unwrap();
            collect_shape_ids(&parse_document(&xml).unwrap().root, &mut ids);
        }
    }

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "duplicate ids in {:?}", ids);
    // master + layout group roots, 5 slide group roots, 2 + 2 + 3 + 2 + 3 text boxes.
    assert_eq!(ids.len(), 2 + 5 + 12);
}

#[test]
fn multi_line_value_becomes_runs_and_breaks() {
    let package = fixture_package(&[
        r#"<a:p><a:pPr algn="l"/><a:r><a:rPr lang="en-US" sz="2000" b="1"/><a:t>Steps: {{BODY}}</a:t></a:r><a:endParaRPr lang="en-US"/></a:p>"#,
    ]);
    let tags = PlaceholderMap::from_pairs([("{{BODY}}", "one\ntwo\nthree\nfour")]).unwrap();

    let output = TagSubstitutionEngine::new().substitute(&package, &tags).unwrap();

    let mut reader = PackageReader::open(output.as_bytes()).unwrap();
    let xml = reader.read_string("ppt/slides/slide1.xml").unwrap();
    let mut paragraphs = Vec::new();
    find_paragraphs(&parse_document(&xml).unwrap().root, &mut paragraphs);

    assert_eq!(paragraphs.len(), 1);
    let paragraph = &paragraphs[0];
    let breaks = paragraph
        .items
        .iter()
        .filter(|item| matches!(item, ParagraphItem::Break(_)))
        .count();
    assert_eq!((paragraph.runs().count(), breaks), (4, 3));
    assert_eq!(paragraph.text(), "Steps: one\ntwo\nthree\nfour");

    let original = paragraph.runs().next().unwrap().properties.clone();
    for item in &paragraph.items {
        match item {
            ParagraphItem::Run(run) => assert_eq!(run.properties, original),
            ParagraphItem::Break(br) => assert_eq!(br.properties, original),
            ParagraphItem::Other(_) => {}
        }
    }
}

#[test]
fn empty_map_leaves_every_part_unchanged() {
    let package = fixture_package(&[
        r#"<a:p><a:r><a:t>{{TITLE}}</a:t></a:r></a:p>"#,
        r#"<a:p><a:r><a:t>plain</a:t></a:r></a:p>"#,
    ]);

    let output = TagSubstitutionEngine::new()
        .substitute(&package, &PlaceholderMap::new())
        .unwrap();

    assert_eq!(all_parts(&package), all_parts(output.as_bytes()));
}

#[test]
fn untouched_slides_are_copied_verbatim() {
    let package = fixture_package(&[
        r#"<a:p><a:r><a:t>{{TITLE}}</a:t></a:r></a:p>"#,
        r#"<a:p>  <a:r><a:t>keep &amp; spacing</a:t></a:r></a:p>"#,
    ]);
    let tags = PlaceholderMap::from_pairs([("{{TITLE}}", "Algebra")]).unwrap();

    let output = TagSubstitutionEngine::new().substitute(&package, &tags).unwrap();

    let before = all_parts(&package);
    let after = all_parts(output.as_bytes());
    assert_eq!(before.len(), after.len());
    for ((name, old), (new_name, new)) in before.iter().zip(&after) {
        assert_eq!(name, new_name);
        if name == "ppt/slides/slide1.xml" {
            assert_ne!(old, new);
        } else {
            assert_eq!(old, new, "{} changed", name);
        }
    }
    assert_eq!(slide_texts(output.as_bytes())[0], vec!["Algebra"]);
}

#[test]
fn assignments_beyond_the_template_fail() {
    let package = fixture_package(&[r#"<a:p><a:r><a:t>{{TITLE}}</a:t></a:r></a:p>"#]);
    let tags = PlaceholderMap::from_pairs([("{{TITLE}}", "x")]).unwrap();

    let err = TagSubstitutionEngine::new()
        .substitute_slides(
            &package,
            &[
                SlideAssignment::new(0, tags.clone()),
                SlideAssignment::new(2, tags),
            ],
        )
        .unwrap_err();

    assert!(matches!(
        err,
        Error::InsufficientSlidesError {
            required: 3,
            available: 1
        }
    ));
}

#[test]
fn invalid_packages_are_rejected() {
    let engine = TagSubstitutionEngine::new();
    assert!(matches!(
        engine.substitute(b"PK not really", &PlaceholderMap::new()),
        Err(Error::InvalidPackageError(_))
    ));
    assert!(matches!(
        PackageInspector::new().inspect(&[]),
        Err(Error::InvalidPackageError(_))
    ));
}

/// A template made by the builder itself, with tags as text.
fn tagged_template() -> Vec<u8> {
    let units = vec![
        ContentUnit::new("{{TITLE}}").with_summary("{{SUMMARY}}"),
        ContentUnit::new("{{TITLE}}").with_summary("{{FORMULAS}}"),
    ];
    PackageSlideBuilder::new(BuildOptions::default())
        .build(&units, &schema(), "{{DECK_TITLE}}")
        .unwrap()
        .into_bytes()
}

#[test]
fn template_strategy_fills_slides_in_order() {
    let strategy = TemplateStrategy::new(tagged_template(), Default::default());
    let units = vec![
        ContentUnit::new("Circles").with_summary("S = π r^2"),
        ContentUnit::new("Squares")
            .with_formula("S = a^2", Some("area"))
            .with_formula("P = 4a", None),
    ];

    let package = strategy
        .generate(&Topic::new(3, "Geometry"), &units)
        .unwrap();

    let texts = slide_texts(package.as_bytes());
    assert_eq!(texts[0], vec!["Geometry", "{{TITLE}}"]);
    assert_eq!(texts[1], vec!["Circles", "S = π r^2"]);
    assert_eq!(texts[2], vec!["Squares", "S = a^2 (area)\nP = 4a"]);
}

#[test]
fn template_strategy_needs_a_slide_per_unit() {
    let strategy = TemplateStrategy::new(tagged_template(), Default::default());
    let units = vec![
        ContentUnit::new("A").with_summary("a"),
        ContentUnit::new("B").with_summary("b"),
        ContentUnit::new("C").with_summary("c"),
    ];

    let err = strategy
        .generate(&Topic::new(3, "Geometry"), &units)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientSlidesError {
            required: 4,
            available: 3
        }
    ));
}

#[derive(Default)]
struct MemoryWorkspace {
    content: RefCell<HashMap<u32, Vec<ContentUnit>>>,
    prompts: RefCell<Vec<String>>,
    response: String,
}

impl TopicSource for MemoryWorkspace {
    fn topic(&self, topic_id: u32) -> Result<Topic> {
        match topic_id {
            7 => Ok(Topic::new(7, "Phân số: cộng/trừ")),
            _ => Err(Error::NotFound(format!("topic {}", topic_id))),
        }
    }
}

impl ContentStore for MemoryWorkspace {
    fn content_units(&self, topic_id: u32) -> Result<Vec<ContentUnit>> {
        Ok(self
            .content
            .borrow()
            .get(&topic_id)
            .cloned()
            .unwrap_or_default())
    }

    fn store_content_units(&self, topic_id: u32, units: &[ContentUnit]) -> Result<()> {
        self.content.borrow_mut().insert(topic_id, units.to_vec());
        Ok(())
    }
}

impl LayoutSource for MemoryWorkspace {
    fn layout(&self, name: &str) -> Result<String> {
        match name {
            "default" => Ok(LAYOUT.to_string()),
            _ => Err(Error::NotFound(format!("layout {}", name))),
        }
    }
}

impl TemplateSource for MemoryWorkspace {
    fn template(&self, name: &str) -> Result<Vec<u8>> {
        match name {
            "tagged.pptx" => Ok(tagged_template()),
            _ => Err(Error::NotFound(format!("template {}", name))),
        }
    }
}

impl TextGenerator for MemoryWorkspace {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

fn orchestrator(workspace: &MemoryWorkspace) -> GenerationOrchestrator<'_> {
    GenerationOrchestrator::new(
        Collaborators {
            topics: workspace,
            content: workspace,
            layouts: workspace,
            templates: workspace,
            generator: workspace,
        },
        Default::default(),
    )
}

#[test]
fn orchestrator_generates_and_stores_missing_content() {
    let workspace = MemoryWorkspace {
        response: r#"```json
[{"title":"Basics","summary":"\frac{1}{2} + x","formulas":[{"formulaText":"a \times b","explanation":"product"}],"examples":[{"exampleText":"2 \cdot 3"}]}]
```"#
            .to_string(),
        ..Default::default()
    };

    let document = orchestrator(&workspace)
        .generate(&GenerationRequest {
            topic_id: 7,
            template_name: "default".to_string(),
        })
        .unwrap();

    assert_eq!(document.file_name, "Phân số cộngtrừ.pptx");
    assert_eq!(workspace.prompts.borrow().len(), 1);

    // Stored units keep the raw notation; the deck shows the formatted one.
    let stored = workspace.content.borrow().get(&7).cloned().unwrap();
    assert_eq!(stored[0].summary.as_deref(), Some(r"\frac{1}{2} + x"));

    let texts = slide_texts(document.package.as_bytes());
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[1], vec!["Basics", "1/2 + x"]);
    assert_eq!(texts[2], vec!["Basics", "a × b (product)", "2 · 3"]);
}

#[test]
fn orchestrator_uses_stored_content_and_templates() {
    let workspace = MemoryWorkspace::default();
    workspace
        .store_content_units(7, &[ContentUnit::new("Stored").with_summary(r"a \le b")])
        .unwrap();

    let document = orchestrator(&workspace)
        .generate(&GenerationRequest {
            topic_id: 7,
            template_name: "tagged.pptx".to_string(),
        })
        .unwrap();

    assert!(workspace.prompts.borrow().is_empty());
    let texts = slide_texts(document.package.as_bytes());
    assert_eq!(texts[0][0], "Phân số: cộng/trừ");
    assert_eq!(texts[1], vec!["Stored", "a ≤ b"]);
    // The second content slide had no unit; its tags stay as written.
    assert_eq!(texts[2], vec!["{{TITLE}}", "{{FORMULAS}}"]);
}

#[test]
fn orchestrator_propagates_collaborator_errors() {
    let workspace = MemoryWorkspace::default();
    let err = orchestrator(&workspace)
        .generate(&GenerationRequest {
            topic_id: 99,
            template_name: "default".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // No stored content and an unusable response.
    let err = orchestrator(&workspace)
        .generate(&GenerationRequest {
            topic_id: 7,
            template_name: "default".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::ContentValidationError(_)));
    assert!(workspace.content.borrow().is_empty());
}
