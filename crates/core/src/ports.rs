//! Collaborators the generator depends on but does not implement.
//!
//! Storage, template catalogs and the text generation provider live
//! outside this crate; the orchestrator only sees these traits.

use crate::types::{ContentUnit, Topic};
use crate::Result;

/// Looks up curriculum topics.
pub trait TopicSource {
    fn topic(&self, topic_id: u32) -> Result<Topic>;
}

/// Reads and stores the content units of a topic.
pub trait ContentStore {
    /// Content units in presentation order. Empty when none are stored yet.
    fn content_units(&self, topic_id: u32) -> Result<Vec<ContentUnit>>;

    /// Persist freshly generated units for later requests.
    fn store_content_units(&self, topic_id: u32, units: &[ContentUnit]) -> Result<()>;
}

/// Provides layout schema documents by name.
pub trait LayoutSource {
    /// Raw JSON text of the named layout schema.
    fn layout(&self, name: &str) -> Result<String>;
}

/// Provides template package bytes by name.
pub trait TemplateSource {
    fn template(&self, name: &str) -> Result<Vec<u8>>;
}

/// External text generation provider.
pub trait TextGenerator {
    /// Raw model output for a prompt. Validated by the caller, never trusted.
    fn generate(&self, prompt: &str) -> Result<String>;
}
