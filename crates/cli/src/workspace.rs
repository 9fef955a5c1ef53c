//! File-system backed collaborators for the `generate` command.
//!
//! Layout of a workspace directory:
//!
//! ```text
//! topics.json            array of topics
//! content/<topic>.json   stored content units per topic
//! layouts/<name>         layout schema documents
//! templates/<name>.pptx  tagged template packages
//! ```

use mathslides_core::ports::{ContentStore, LayoutSource, TemplateSource, TextGenerator, TopicSource};
use mathslides_core::{ContentUnit, Error, Result, Topic};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn content_path(&self, topic_id: u32) -> PathBuf {
        self.root.join("content").join(format!("{}.json", topic_id))
    }

    /// Resolve a catalog entry, refusing names that leave the directory.
    fn catalog_path(&self, dir: &str, name: &str) -> Result<PathBuf> {
        let file_name = Path::new(name);
        if file_name.components().count() != 1 || file_name.file_name().is_none() {
            return Err(Error::NotFound(format!("invalid {} name '{}'", dir, name)));
        }
        Ok(self.root.join(dir).join(file_name))
    }
}

fn read_or_not_found(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::NotFound(format!("{} not found at {}", what, path.display())),
        _ => Error::IoError(e),
    })
}

impl TopicSource for FsWorkspace {
    fn topic(&self, topic_id: u32) -> Result<Topic> {
        let path = self.root.join("topics.json");
        let data = read_or_not_found(&path, "topic list")?;
        let topics: Vec<Topic> = serde_json::from_slice(&data).map_err(|e| {
            Error::ConfigurationError(format!("invalid topic list {}: {}", path.display(), e))
        })?;

        topics
            .into_iter()
            .find(|topic| topic.id == topic_id)
            .ok_or_else(|| Error::NotFound(format!("topic {} does not exist", topic_id)))
    }
}

impl ContentStore for FsWorkspace {
    fn content_units(&self, topic_id: u32) -> Result<Vec<ContentUnit>> {
        let path = self.content_path(topic_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&path)?;
        serde_json::from_slice(&data).map_err(|e| {
            Error::ContentValidationError(format!("invalid stored content {}: {}", path.display(), e))
        })
    }

    fn store_content_units(&self, topic_id: u32, units: &[ContentUnit]) -> Result<()> {
        let path = self.content_path(topic_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(units)
            .map_err(|e| Error::ContentValidationError(format!("cannot serialize content: {}", e)))?;
        fs::write(&path, json)?;
        log::info!("Stored {} unit(s) at {}", units.len(), path.display());
        Ok(())
    }
}

impl LayoutSource for FsWorkspace {
    fn layout(&self, name: &str) -> Result<String> {
        let path = self.catalog_path("layouts", name)?;
        let data = read_or_not_found(&path, "layout")?;
        String::from_utf8(data)
            .map_err(|e| Error::ConfigurationError(format!("layout {} is not UTF-8: {}", name, e)))
    }
}

impl TemplateSource for FsWorkspace {
    fn template(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.catalog_path("templates", name)?;
        read_or_not_found(&path, "template")
    }
}

/// A text generator that answers every prompt with a saved model response.
pub struct RecordedResponse {
    path: Option<PathBuf>,
}

impl RecordedResponse {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl TextGenerator for RecordedResponse {
    fn generate(&self, prompt: &str) -> Result<String> {
        let path = self.path.as_ref().ok_or_else(|| {
            Error::GenerationError("no stored content and no --response file to generate from".to_string())
        })?;

        log::debug!("Prompt: {}", prompt);
        fs::read_to_string(path)
            .map_err(|e| Error::GenerationError(format!("cannot read response {}: {}", path.display(), e)))
    }
}
