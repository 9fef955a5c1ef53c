//! Generation settings, loadable from an optional JSON file.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder tokens looked for in template packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateTags {
    /// Replaced by the topic name on the first slide.
    pub deck_title: String,
    pub title: String,
    pub summary: String,
    pub formulas: String,
    pub examples: String,
}

impl Default for TemplateTags {
    fn default() -> Self {
        Self {
            deck_title: "{{DECK_TITLE}}".to_string(),
            title: "{{TITLE}}".to_string(),
            summary: "{{SUMMARY}}".to_string(),
            formulas: "{{FORMULAS}}".to_string(),
            examples: "{{EXAMPLES}}".to_string(),
        }
    }
}

/// Settings shared by both generation strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Language tag written on every generated run (`a:rPr lang`).
    pub language: String,

    /// Author recorded in the document properties.
    pub author: String,

    pub tags: TemplateTags,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            author: "mathslides".to_string(),
            tags: TemplateTags::default(),
        }
    }
}

impl GenerationConfig {
    /// Parse settings from JSON text. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::ConfigurationError(format!("invalid configuration: {}", e)))
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
