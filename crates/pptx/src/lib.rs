//! PPTX (Office Open XML) package generation for math lesson decks.
//!
//! Packages are ZIP archives of XML parts. This crate builds new ones from
//! a layout schema, fills placeholder tags in existing ones, and inspects
//! their slides.

pub mod builder;
pub mod generate;
pub mod inspect;
pub mod package;
pub mod scaffold;
pub mod substitute;
pub mod text;
pub mod xml;

pub use builder::{plan_slides, BuildOptions, PackageSlideBuilder, SlidePlan};
pub use generate::{
    output_file_name, Collaborators, DocumentStrategy, GenerateDocument, GenerationOrchestrator,
    GenerationRequest, LayoutStrategy, TemplateKind, TemplateStrategy,
};
pub use inspect::{PackageInspector, PackageSummary, ShapeSummary, SlideSummary};
pub use package::{PackageReader, PackageWriter, SlidePart};
pub use substitute::{SlideAssignment, TagSubstitutionEngine};
