//! Error types for slide deck generation.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating a slide deck.
///
/// Every variant is terminal for the current generation call; nothing is
/// retried internally and no partial package is ever returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The layout schema or configuration is malformed or incomplete.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Template bytes are not a well-formed package or lack required parts.
    #[error("Invalid package: {0}")]
    InvalidPackageError(String),

    /// The template has fewer slides than the content needs.
    #[error("Template has {available} slide(s) but {required} are required")]
    InsufficientSlidesError { required: usize, available: usize },

    /// Externally supplied content failed minimal shape checks.
    #[error("Content validation error: {0}")]
    ContentValidationError(String),

    /// Two placeholder tags collide within one substitution pass.
    #[error("Placeholder tag collision: {0}")]
    TagCollisionError(String),

    /// A collaborator could not find the requested topic, layout or template.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The text generation provider failed.
    #[error("Text generation error: {0}")]
    GenerationError(String),

    /// ZIP container error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlError(String),
}
