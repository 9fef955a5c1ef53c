//! Parsing and validation of content produced by the text generation provider.

use crate::math::is_known_command;
use crate::types::{ContentUnit, Example, Formula, Topic};
use crate::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedUnit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    formulas: Vec<GeneratedFormula>,
    #[serde(default)]
    examples: Vec<GeneratedExample>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedFormula {
    #[serde(default)]
    formula_text: String,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedExample {
    #[serde(default)]
    example_text: String,
}

impl From<GeneratedUnit> for ContentUnit {
    fn from(unit: GeneratedUnit) -> Self {
        Self {
            title: unit.title,
            summary: unit.summary.filter(|s| !s.trim().is_empty()),
            formulas: unit
                .formulas
                .into_iter()
                .map(|f| Formula {
                    text: f.formula_text,
                    explanation: f.explanation.filter(|e| !e.trim().is_empty()),
                })
                .collect(),
            examples: unit
                .examples
                .into_iter()
                .map(|e| Example {
                    text: e.example_text,
                })
                .collect(),
            media: Vec::new(),
        }
    }
}

/// Build the prompt asking the provider for a topic's lesson content.
pub fn generation_prompt(topic: &Topic) -> String {
    let mut context = format!("'{}'", topic.name);
    if let Some(class_name) = &topic.class_name {
        context.push_str(&format!(", class {}", class_name));
    }
    if let Some(grade_name) = &topic.grade_name {
        context.push_str(&format!(", grade {}", grade_name));
    }

    format!(
        "Act as an author of school mathematics textbooks. \
         Write lesson content for the topic {}. \
         Return a single JSON array (one line, no line breaks) of content objects. \
         Each object must have the keys: \
         1. 'title': (string) the slide title, e.g. 'Summary', 'Key formulas', 'Example 1'. \
         2. 'summary': (string) the main text of the slide, using LaTeX for math. \
         3. 'formulas': (array) objects with 'formulaText' and 'explanation'. \
         4. 'examples': (array) objects with 'exampleText'. \
         Example: [{{\"title\":\"Summary\",\"summary\":\"...\",\"formulas\":[],\"examples\":[]}}]",
        context
    )
}

/// Strip a ```json ... ``` or ``` ... ``` fence around model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));

    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

/// Double lone LaTeX backslashes so JSON does not read `\frac` as a form feed.
///
/// A backslash before a letter that JSON cannot escape (`\pi`, `\sum`) is
/// always doubled. Backspace and form feed never appear in lesson text, so
/// `\b` or `\f` followed by two more letters (`\begin`, `\bar`) is LaTeX.
/// Before `n`, `r`, `t` or `u` it is doubled only when the letter run is a
/// known command, so `\nabla` is LaTeX while `\nThe` stays a newline.
/// Already doubled backslashes are kept.
fn escape_latex_backslashes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut output = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            output.push(c);
            i += 1;
            continue;
        }

        if chars.get(i + 1) == Some(&'\\') {
            output.push_str("\\\\");
            i += 2;
            continue;
        }

        let command: String = chars[i + 1..]
            .iter()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        let is_latex = match command.chars().next() {
            None => false,
            Some('b' | 'f') => command.len() >= 3 || is_known_command(&command),
            Some('n' | 'r' | 't' | 'u') => is_known_command(&command),
            Some(_) => true,
        };

        if is_latex {
            output.push_str("\\\\");
        } else {
            output.push('\\');
        }
        i += 1;
    }

    output
}

/// Parse and validate the provider's JSON array of content units.
pub fn parse_generated_content(raw: &str) -> Result<Vec<ContentUnit>> {
    let body = strip_json_fences(raw);
    if body.is_empty() {
        return Err(Error::ContentValidationError(
            "text generator returned no content".to_string(),
        ));
    }

    let escaped = escape_latex_backslashes(body);
    let generated: Vec<GeneratedUnit> = serde_json::from_str(&escaped).map_err(|e| {
        log::warn!("Generated content is not valid JSON: {}", e);
        Error::ContentValidationError(format!("generated content is not a JSON array of units: {}", e))
    })?;

    if generated.is_empty() {
        return Err(Error::ContentValidationError(
            "generated content is an empty array".to_string(),
        ));
    }

    let units: Vec<ContentUnit> = generated.into_iter().map(ContentUnit::from).collect();
    for unit in &units {
        unit.validate()?;
    }

    log::info!("Parsed {} generated content unit(s)", units.len());
    Ok(units)
}
