//! Domain types for describing deck content and generated packages.

use crate::math::MathNotationFormatter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A curriculum topic that a deck is generated for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Identifier used by the content store.
    pub id: u32,

    /// Display name, also used as the deck title and output file name.
    pub name: String,

    /// Class the topic belongs to (e.g. "Lớp 7").
    #[serde(default)]
    pub class_name: Option<String>,

    /// Grade level of the class.
    #[serde(default)]
    pub grade_name: Option<String>,
}

impl Topic {
    /// Create a topic with just an id and a name.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            class_name: None,
            grade_name: None,
        }
    }
}

/// One unit of lesson content: a titled block with optional summary,
/// formulas, worked examples and media references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub title: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub formulas: Vec<Formula>,

    #[serde(default)]
    pub examples: Vec<Example>,

    #[serde(default)]
    pub media: Vec<Media>,
}

impl ContentUnit {
    /// Create a content unit with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the summary text.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Append a formula.
    pub fn with_formula(mut self, text: impl Into<String>, explanation: Option<&str>) -> Self {
        self.formulas.push(Formula {
            text: text.into(),
            explanation: explanation.map(str::to_string),
        });
        self
    }

    /// Append a worked example.
    pub fn with_example(mut self, text: impl Into<String>) -> Self {
        self.examples.push(Example { text: text.into() });
        self
    }

    /// The summary, if present and not blank.
    pub fn non_empty_summary(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// Whether this unit carries anything for a formula/example slide.
    pub fn has_formulas_or_examples(&self) -> bool {
        !self.formulas.is_empty() || !self.examples.is_empty()
    }

    /// Formulas one per entry, each followed by its explanation in parentheses.
    pub fn formula_lines(&self) -> Vec<String> {
        self.formulas
            .iter()
            .map(|f| match f.explanation.as_deref().filter(|e| !e.trim().is_empty()) {
                Some(explanation) => format!("{} ({})", f.text, explanation),
                None => f.text.clone(),
            })
            .collect()
    }

    /// Example texts in order.
    pub fn example_lines(&self) -> Vec<String> {
        self.examples.iter().map(|e| e.text.clone()).collect()
    }

    /// Check the minimal shape of externally supplied content.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::ContentValidationError(
                "content unit is missing a title".to_string(),
            ));
        }

        if let Some(pos) = self.formulas.iter().position(|f| f.text.trim().is_empty()) {
            return Err(Error::ContentValidationError(format!(
                "formula {} of '{}' has no text",
                pos + 1,
                self.title
            )));
        }

        Ok(())
    }

    /// Return a copy with every math-bearing field run through the formatter.
    ///
    /// Titles are left as written.
    pub fn formatted(&self, formatter: &MathNotationFormatter) -> Self {
        Self {
            title: self.title.clone(),
            summary: self.summary.as_deref().map(|s| formatter.format(s)),
            formulas: self
                .formulas
                .iter()
                .map(|f| Formula {
                    text: formatter.format(&f.text),
                    explanation: f.explanation.as_deref().map(|e| formatter.format(e)),
                })
                .collect(),
            examples: self
                .examples
                .iter()
                .map(|e| Example {
                    text: formatter.format(&e.text),
                })
                .collect(),
            media: self.media.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub text: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
}

/// A media reference attached to content. Never embedded, only carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Mapping from placeholder tag to replacement text for one substitution pass.
///
/// Insertion order is preserved. Tags must be non-empty, unique, and must
/// not contain one another, since matching is by plain substring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderMap {
    entries: Vec<(String, String)>,
}

impl PlaceholderMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from tag/value pairs, rejecting collisions.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (tag, value) in pairs {
            map.insert(tag, value)?;
        }
        Ok(map)
    }

    /// Add a tag. Fails if the tag is empty or collides with an existing tag.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(Error::TagCollisionError("empty tag".to_string()));
        }

        for (existing, _) in &self.entries {
            if *existing == tag {
                return Err(Error::TagCollisionError(format!("duplicate tag '{}'", tag)));
            }
            if existing.contains(tag.as_str()) || tag.contains(existing.as_str()) {
                return Err(Error::TagCollisionError(format!(
                    "tag '{}' overlaps tag '{}'",
                    tag, existing
                )));
            }
        }

        self.entries.push((tag, value.into()));
        Ok(())
    }

    /// Look up the replacement for a tag.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over (tag, value) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A complete, independently openable package held in memory.
///
/// Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPackage {
    bytes: Vec<u8>,
}

impl GeneratedPackage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A generated package together with the file name it should be served under.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub package: GeneratedPackage,
    pub file_name: String,
}

impl GeneratedDocument {
    pub fn new(package: GeneratedPackage, file_name: impl Into<String>) -> Self {
        Self {
            package,
            file_name: file_name.into(),
        }
    }
}
