//! Core domain types, math notation formatting, layout schema and
//! collaborator ports for math slide deck generation.

pub mod config;
pub mod error;
pub mod generated;
pub mod layout;
pub mod math;
pub mod ports;
pub mod types;

pub use config::{GenerationConfig, TemplateTags};
pub use error::{Error, Result};
pub use generated::{generation_prompt, parse_generated_content};
pub use layout::{Alignment, LayoutSchema, Rect, ShapeSpec, SlideArchetype};
pub use math::MathNotationFormatter;
pub use types::{
    ContentUnit, Example, Formula, GeneratedDocument, GeneratedPackage, Media, PlaceholderMap,
    Topic,
};
