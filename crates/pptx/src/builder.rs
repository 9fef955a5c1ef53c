//! Builds a complete presentation package from content units and a
//! layout schema.

use crate::package::{PackageWriter, CONTENT_TYPES_PART, PRESENTATION_PART, PRESENTATION_RELS_PART};
use crate::scaffold::{self, FIRST_SLIDE_ID};
use crate::text::{Paragraph, RunProperties};
use crate::xml::escape_attr;
use mathslides_core::{
    ContentUnit, Error, GeneratedPackage, GenerationConfig, LayoutSchema, Result, ShapeSpec,
    SlideArchetype,
};
use std::fmt::Write as FmtWrite;

/// Formatting choices that are not part of the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Language tag on every run.
    pub language: String,
    /// Creator in the document properties.
    pub author: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        GenerationConfig::default().into()
    }
}

impl From<&GenerationConfig> for BuildOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            language: config.language.clone(),
            author: config.author.clone(),
        }
    }
}

impl From<GenerationConfig> for BuildOptions {
    fn from(config: GenerationConfig) -> Self {
        Self::from(&config)
    }
}

/// Id counters for one build. Every `cNvPr` in the package draws from
/// the same shape counter.
#[derive(Debug)]
struct BuildContext {
    next_shape_id: u32,
    next_slide_id: u32,
}

impl BuildContext {
    fn new() -> Self {
        Self {
            next_shape_id: 1,
            next_slide_id: FIRST_SLIDE_ID,
        }
    }

    fn shape_id(&mut self) -> u32 {
        let id = self.next_shape_id;
        self.next_shape_id += 1;
        id
    }

    fn slide_id(&mut self) -> u32 {
        let id = self.next_slide_id;
        self.next_slide_id += 1;
        id
    }
}

/// One planned slide: its archetype and the text for each region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidePlan {
    pub archetype: SlideArchetype,
    pub regions: Vec<(&'static str, String)>,
}

impl SlidePlan {
    fn title(deck_title: &str, subtitle: Option<&str>) -> Self {
        let mut regions = vec![("title", deck_title.to_string())];
        if let Some(subtitle) = subtitle {
            regions.push(("subtitle", subtitle.to_string()));
        }
        Self {
            archetype: SlideArchetype::Title,
            regions,
        }
    }

    fn content(unit: &ContentUnit, summary: &str) -> Self {
        Self {
            archetype: SlideArchetype::Content,
            regions: vec![
                ("title", unit.title.clone()),
                ("content", summary.to_string()),
            ],
        }
    }

    fn split(unit: &ContentUnit) -> Self {
        Self {
            archetype: SlideArchetype::Split,
            regions: vec![
                ("title", unit.title.clone()),
                ("left", unit.formula_lines().join("\n\n")),
                ("right", unit.example_lines().join("\n\n")),
            ],
        }
    }
}

/// Slide sequence for a deck: a title slide, then per unit a content
/// slide when it has a summary and a split slide when it has formulas or
/// examples.
pub fn plan_slides(units: &[ContentUnit], deck_title: &str) -> Vec<SlidePlan> {
    let subtitle = units.first().map(|unit| unit.title.as_str());
    let mut plan = vec![SlidePlan::title(deck_title, subtitle)];

    for unit in units {
        if let Some(summary) = unit.non_empty_summary() {
            plan.push(SlidePlan::content(unit, summary));
        }
        if unit.has_formulas_or_examples() {
            plan.push(SlidePlan::split(unit));
        }
    }

    plan
}

/// A planned slide with every region resolved against the schema.
struct ResolvedSlide<'a> {
    boxes: Vec<(&'static str, &'a ShapeSpec, &'a str)>,
}

fn resolve<'a>(plan: &'a [SlidePlan], schema: &'a LayoutSchema) -> Result<Vec<ResolvedSlide<'a>>> {
    plan.iter()
        .map(|slide| {
            let boxes = slide
                .regions
                .iter()
                .map(|(name, text)| {
                    let spec = schema.region(slide.archetype, name)?;
                    Ok((*name, spec, text.as_str()))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ResolvedSlide { boxes })
        })
        .collect()
}

/// Emits a fresh package: one master, one blank layout, one theme and a
/// slide per planned slide.
#[derive(Debug, Clone, Default)]
pub struct PackageSlideBuilder {
    options: BuildOptions,
}

impl PackageSlideBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Build from raw layout JSON. An absent schema is a configuration error.
    pub fn build_from_json(
        &self,
        units: &[ContentUnit],
        schema_json: Option<&str>,
        deck_title: &str,
    ) -> Result<GeneratedPackage> {
        let json = schema_json
            .ok_or_else(|| Error::ConfigurationError("no layout schema supplied".to_string()))?;
        let schema = LayoutSchema::from_json(json)?;
        self.build(units, &schema, deck_title)
    }

    /// Build the package. The plan is checked against the schema before
    /// anything is written.
    pub fn build(
        &self,
        units: &[ContentUnit],
        schema: &LayoutSchema,
        deck_title: &str,
    ) -> Result<GeneratedPackage> {
        let plan = plan_slides(units, deck_title);
        let slides = resolve(&plan, schema)?;
        log::info!(
            "Building package '{}' with {} slide(s) from {} unit(s)",
            deck_title,
            slides.len(),
            units.len()
        );

        let mut ctx = BuildContext::new();
        let master_group = ctx.shape_id();
        let layout_group = ctx.shape_id();

        let mut slide_ids = Vec::with_capacity(slides.len());
        let mut slide_parts = Vec::with_capacity(slides.len());
        for (slide, planned) in slides.iter().zip(&plan) {
            log::debug!("Slide {}: {}", slide_ids.len() + 1, planned.archetype.key());
            slide_ids.push(ctx.slide_id());
            slide_parts.push(self.render_slide(&mut ctx, slide));
        }

        let mut writer = PackageWriter::new();
        writer.add_part(CONTENT_TYPES_PART, scaffold::content_types(slides.len()).as_bytes())?;
        writer.add_part(scaffold::ROOT_RELS_PART, scaffold::root_relationships().as_bytes())?;
        writer.add_part(
            PRESENTATION_PART,
            scaffold::presentation(&slide_ids, schema.slide_width, schema.slide_height).as_bytes(),
        )?;
        writer.add_part(
            PRESENTATION_RELS_PART,
            scaffold::presentation_relationships(slides.len()).as_bytes(),
        )?;
        writer.add_part(scaffold::MASTER_PART, scaffold::slide_master(master_group).as_bytes())?;
        writer.add_part(
            scaffold::MASTER_RELS_PART,
            scaffold::slide_master_relationships().as_bytes(),
        )?;
        writer.add_part(scaffold::LAYOUT_PART, scaffold::slide_layout(layout_group).as_bytes())?;
        writer.add_part(
            scaffold::LAYOUT_RELS_PART,
            scaffold::slide_layout_relationships().as_bytes(),
        )?;
        writer.add_part(scaffold::THEME_PART, scaffold::theme().as_bytes())?;
        writer.add_part(
            scaffold::PRES_PROPS_PART,
            scaffold::presentation_properties().as_bytes(),
        )?;
        writer.add_part(scaffold::VIEW_PROPS_PART, scaffold::view_properties().as_bytes())?;
        writer.add_part(scaffold::TABLE_STYLES_PART, scaffold::table_styles().as_bytes())?;

        for (index, xml) in slide_parts.iter().enumerate() {
            let number = index + 1;
            writer.add_part(&scaffold::slide_part(number), xml.as_bytes())?;
            writer.add_part(
                &scaffold::slide_rels_part(number),
                scaffold::slide_relationships().as_bytes(),
            )?;
        }

        writer.add_part(
            scaffold::CORE_PROPS_PART,
            scaffold::core_properties(deck_title, &self.options.author).as_bytes(),
        )?;
        writer.add_part(
            scaffold::APP_PROPS_PART,
            scaffold::app_properties(slides.len()).as_bytes(),
        )?;

        writer.finish()
    }

    fn render_slide(&self, ctx: &mut BuildContext, slide: &ResolvedSlide) -> String {
        let group_id = ctx.shape_id();
        let mut shapes = String::with_capacity(1024 * slide.boxes.len());
        for (region, spec, text) in &slide.boxes {
            let id = ctx.shape_id();
            self.write_text_box(&mut shapes, id, region, spec, text);
        }
        scaffold::slide(group_id, &shapes)
    }

    /// A text box with exactly one paragraph holding one run.
    fn write_text_box(&self, out: &mut String, id: u32, region: &str, spec: &ShapeSpec, text: &str) {
        let _ = write!(
            out,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            id,
            escape_attr(&format!("{} {}", region, id))
        );
        let _ = write!(
            out,
            r#"<p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
            spec.x, spec.y, spec.width, spec.height
        );
        out.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
        out.push_str(r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#);

        let properties = RunProperties::new(&self.options.language, spec.font_size);
        let paragraph = Paragraph::single_run(spec.alignment, properties, text);
        out.push_str(&paragraph.to_element().to_xml());

        out.push_str("</p:txBody></p:sp>");
    }
}
