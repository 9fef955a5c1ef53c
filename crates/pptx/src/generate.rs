//! End-to-end generation: content lookup or generation, math formatting,
//! strategy selection and file naming.

use crate::builder::{BuildOptions, PackageSlideBuilder};
use crate::substitute::{SlideAssignment, TagSubstitutionEngine};
use mathslides_core::ports::{ContentStore, LayoutSource, TemplateSource, TextGenerator, TopicSource};
use mathslides_core::{
    generation_prompt, parse_generated_content, ContentUnit, GeneratedDocument, GeneratedPackage,
    GenerationConfig, LayoutSchema, MathNotationFormatter, PlaceholderMap, Result, TemplateTags,
    Topic,
};

/// Produces a package for a topic from its (already formatted) units.
pub trait GenerateDocument {
    fn generate(&self, topic: &Topic, units: &[ContentUnit]) -> Result<GeneratedPackage>;
}

/// Builds a fresh package from a layout schema.
#[derive(Debug, Clone)]
pub struct LayoutStrategy {
    schema: LayoutSchema,
    builder: PackageSlideBuilder,
}

impl LayoutStrategy {
    pub fn new(schema: LayoutSchema, options: BuildOptions) -> Self {
        Self {
            schema,
            builder: PackageSlideBuilder::new(options),
        }
    }
}

impl GenerateDocument for LayoutStrategy {
    fn generate(&self, topic: &Topic, units: &[ContentUnit]) -> Result<GeneratedPackage> {
        self.builder.build(units, &self.schema, &topic.name)
    }
}

/// Fills the tags of a template package: the deck title on the first
/// slide, then one unit per following slide.
#[derive(Debug, Clone)]
pub struct TemplateStrategy {
    template: Vec<u8>,
    tags: TemplateTags,
    engine: TagSubstitutionEngine,
}

impl TemplateStrategy {
    pub fn new(template: Vec<u8>, tags: TemplateTags) -> Self {
        Self {
            template,
            tags,
            engine: TagSubstitutionEngine::new(),
        }
    }

    /// Per-slide tag maps for a topic and its units.
    pub fn assignments(&self, topic: &Topic, units: &[ContentUnit]) -> Result<Vec<SlideAssignment>> {
        let mut assignments = Vec::with_capacity(units.len() + 1);

        let deck = PlaceholderMap::from_pairs([(self.tags.deck_title.as_str(), topic.name.as_str())])?;
        assignments.push(SlideAssignment::new(0, deck));

        for (index, unit) in units.iter().enumerate() {
            let tags = PlaceholderMap::from_pairs([
                (self.tags.title.clone(), unit.title.clone()),
                (
                    self.tags.summary.clone(),
                    unit.non_empty_summary().unwrap_or_default().to_string(),
                ),
                (self.tags.formulas.clone(), unit.formula_lines().join("\n")),
                (self.tags.examples.clone(), unit.example_lines().join("\n")),
            ])?;
            assignments.push(SlideAssignment::new(index + 1, tags));
        }

        Ok(assignments)
    }
}

impl GenerateDocument for TemplateStrategy {
    fn generate(&self, topic: &Topic, units: &[ContentUnit]) -> Result<GeneratedPackage> {
        let assignments = self.assignments(topic, units)?;
        self.engine.substitute_slides(&self.template, &assignments)
    }
}

/// Either strategy, chosen from the template name.
#[derive(Debug, Clone)]
pub enum DocumentStrategy {
    Layout(LayoutStrategy),
    Template(TemplateStrategy),
}

impl GenerateDocument for DocumentStrategy {
    fn generate(&self, topic: &Topic, units: &[ContentUnit]) -> Result<GeneratedPackage> {
        match self {
            Self::Layout(strategy) => strategy.generate(topic, units),
            Self::Template(strategy) => strategy.generate(topic, units),
        }
    }
}

/// What kind of template a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// A layout schema document.
    Layout,
    /// A tagged presentation package.
    Package,
}

impl TemplateKind {
    /// `*.pptx` names are packages, everything else is a layout schema.
    pub fn from_name(name: &str) -> Self {
        let is_package = std::path::Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pptx"))
            .unwrap_or(false);

        if is_package {
            Self::Package
        } else {
            Self::Layout
        }
    }
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic_id: u32,
    pub template_name: String,
}

/// The collaborators generation reads from and writes to.
pub struct Collaborators<'a> {
    pub topics: &'a dyn TopicSource,
    pub content: &'a dyn ContentStore,
    pub layouts: &'a dyn LayoutSource,
    pub templates: &'a dyn TemplateSource,
    pub generator: &'a dyn TextGenerator,
}

/// Turns a request into a finished, named document.
pub struct GenerationOrchestrator<'a> {
    collaborators: Collaborators<'a>,
    config: GenerationConfig,
    formatter: MathNotationFormatter,
}

impl<'a> GenerationOrchestrator<'a> {
    pub fn new(collaborators: Collaborators<'a>, config: GenerationConfig) -> Self {
        Self {
            collaborators,
            config,
            formatter: MathNotationFormatter::new(),
        }
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<GeneratedDocument> {
        let topic = self.collaborators.topics.topic(request.topic_id)?;
        let units = self.content_units(&topic)?;

        let formatted: Vec<ContentUnit> = units
            .iter()
            .map(|unit| unit.formatted(&self.formatter))
            .collect();

        let strategy = self.strategy_for(&request.template_name)?;
        let package = strategy.generate(&topic, &formatted)?;

        let file_name = output_file_name(&topic.name);
        log::info!(
            "Generated '{}' ({} bytes) for topic {}",
            file_name,
            package.len(),
            topic.id
        );

        Ok(GeneratedDocument::new(package, file_name))
    }

    /// Stored units, or freshly generated ones that are then stored.
    fn content_units(&self, topic: &Topic) -> Result<Vec<ContentUnit>> {
        let stored = self.collaborators.content.content_units(topic.id)?;
        if !stored.is_empty() {
            for unit in &stored {
                unit.validate()?;
            }
            log::debug!("Using {} stored unit(s) for topic {}", stored.len(), topic.id);
            return Ok(stored);
        }

        log::info!("No stored content for topic {}; asking the text generator", topic.id);
        let raw = self.collaborators.generator.generate(&generation_prompt(topic))?;
        let units = parse_generated_content(&raw)?;
        self.collaborators.content.store_content_units(topic.id, &units)?;
        Ok(units)
    }

    /// Pick the strategy for a template name and load what it needs.
    pub fn strategy_for(&self, template_name: &str) -> Result<DocumentStrategy> {
        let kind = TemplateKind::from_name(template_name);
        log::info!("Template '{}' selects the {:?} strategy", template_name, kind);

        match kind {
            TemplateKind::Layout => {
                let json = self.collaborators.layouts.layout(template_name)?;
                let schema = LayoutSchema::from_json(&json)?;
                Ok(DocumentStrategy::Layout(LayoutStrategy::new(
                    schema,
                    BuildOptions::from(&self.config),
                )))
            }
            TemplateKind::Package => {
                let bytes = self.collaborators.templates.template(template_name)?;
                Ok(DocumentStrategy::Template(TemplateStrategy::new(
                    bytes,
                    self.config.tags.clone(),
                )))
            }
        }
    }
}

/// Topic name made safe as a file name, plus `.pptx`.
pub fn output_file_name(topic_name: &str) -> String {
    let sanitized: String = topic_name
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let sanitized = sanitized.trim().trim_end_matches('.').trim();

    if sanitized.is_empty() {
        "Untitled.pptx".to_string()
    } else {
        format!("{}.pptx", sanitized)
    }
}
