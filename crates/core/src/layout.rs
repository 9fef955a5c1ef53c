//! Layout schema: where generated text boxes go on each slide archetype.
//!
//! Parsed from a JSON document of the form
//!
//! ```json
//! {
//!   "slideWidthEmu": 12192000,
//!   "slideHeightEmu": 6858000,
//!   "marginEmu": 457200,
//!   "layouts": {
//!     "titleSlide":   { "title": { "x": 0, "y": 0, "w": 100, "h": 100, "fontSize": 40, "align": "center" } },
//!     "contentSlide": { "title": { ... }, "content": { ... } },
//!     "splitSlide":   { "title": { ... }, "left": { ... }, "right": { ... } }
//!   }
//! }
//! ```
//!
//! Distances are EMU (914400 per inch). Unknown fields are ignored.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Horizontal paragraph alignment of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    /// The DrawingML `algn` attribute value.
    pub fn as_ooxml(&self) -> &'static str {
        match self {
            Self::Left => "l",
            Self::Center => "ctr",
            Self::Right => "r",
        }
    }

    /// Parse a DrawingML `algn` attribute value.
    pub fn from_ooxml(value: &str) -> Option<Self> {
        match value {
            "l" => Some(Self::Left),
            "ctr" => Some(Self::Center),
            "r" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Position, size and text style of one named region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeSpec {
    pub x: i64,
    pub y: i64,
    #[serde(rename = "w")]
    pub width: i64,
    #[serde(rename = "h")]
    pub height: i64,
    /// Font size in points.
    pub font_size: u32,
    #[serde(rename = "align", default)]
    pub alignment: Alignment,
}

/// Largest font size DrawingML accepts, in points.
pub const MAX_FONT_SIZE: u32 = 4000;

impl ShapeSpec {
    fn right(&self) -> i64 {
        self.x.saturating_add(self.width)
    }

    fn bottom(&self) -> i64 {
        self.y.saturating_add(self.height)
    }

    fn validate(&self, archetype: SlideArchetype, name: &str) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::ConfigurationError(format!(
                "region '{}' of '{}' must have a positive size, got {}x{}",
                name,
                archetype.key(),
                self.width,
                self.height
            )));
        }
        if !(1..=MAX_FONT_SIZE).contains(&self.font_size) {
            return Err(Error::ConfigurationError(format!(
                "region '{}' of '{}' has font size {}, expected 1 to {}",
                name,
                archetype.key(),
                self.font_size,
                MAX_FONT_SIZE
            )));
        }
        Ok(())
    }
}

/// The three slide archetypes the builder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideArchetype {
    Title,
    Content,
    Split,
}

impl SlideArchetype {
    pub const ALL: [Self; 3] = [Self::Title, Self::Content, Self::Split];

    /// Key of this archetype under `layouts` in the JSON document.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Title => "titleSlide",
            Self::Content => "contentSlide",
            Self::Split => "splitSlide",
        }
    }
}

/// Named regions of one archetype.
pub type RegionMap = BTreeMap<String, ShapeSpec>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Layouts {
    #[serde(default)]
    title_slide: RegionMap,
    #[serde(default)]
    content_slide: RegionMap,
    #[serde(default)]
    split_slide: RegionMap,
}

/// A rectangle in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    /// Whether `spec` lies entirely inside this rectangle.
    pub fn contains(&self, spec: &ShapeSpec) -> bool {
        spec.x >= self.x
            && spec.y >= self.y
            && spec.right() <= self.x.saturating_add(self.width)
            && spec.bottom() <= self.y.saturating_add(self.height)
    }
}

/// Typed layout description for a freshly built deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSchema {
    #[serde(rename = "slideWidthEmu")]
    pub slide_width: i64,
    #[serde(rename = "slideHeightEmu")]
    pub slide_height: i64,
    #[serde(rename = "marginEmu")]
    pub margin: i64,
    #[serde(default)]
    layouts: Layouts,
}

impl LayoutSchema {
    /// Parse a layout schema from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(Error::ConfigurationError("layout schema is empty".to_string()));
        }

        let schema: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigurationError(format!("invalid layout schema: {}", e)))?;

        if schema.slide_width <= 0 || schema.slide_height <= 0 {
            return Err(Error::ConfigurationError(format!(
                "slide size must be positive, got {}x{}",
                schema.slide_width, schema.slide_height
            )));
        }
        if schema.margin < 0 {
            return Err(Error::ConfigurationError(format!(
                "margin must not be negative, got {}",
                schema.margin
            )));
        }
        for archetype in SlideArchetype::ALL {
            for (name, spec) in schema.regions(archetype) {
                spec.validate(archetype, name)?;
            }
        }

        schema.warn_out_of_bounds();
        Ok(schema)
    }

    /// All regions of one archetype.
    pub fn regions(&self, archetype: SlideArchetype) -> &RegionMap {
        match archetype {
            SlideArchetype::Title => &self.layouts.title_slide,
            SlideArchetype::Content => &self.layouts.content_slide,
            SlideArchetype::Split => &self.layouts.split_slide,
        }
    }

    /// Look up a region that the builder requires.
    pub fn region(&self, archetype: SlideArchetype, name: &str) -> Result<&ShapeSpec> {
        self.regions(archetype).get(name).ok_or_else(|| {
            Error::ConfigurationError(format!(
                "layout '{}' has no '{}' region",
                archetype.key(),
                name
            ))
        })
    }

    /// Insert or replace a region. Used to assemble schemas in code.
    pub fn set_region(&mut self, archetype: SlideArchetype, name: impl Into<String>, spec: ShapeSpec) {
        let regions = match archetype {
            SlideArchetype::Title => &mut self.layouts.title_slide,
            SlideArchetype::Content => &mut self.layouts.content_slide,
            SlideArchetype::Split => &mut self.layouts.split_slide,
        };
        regions.insert(name.into(), spec);
    }

    /// Create a schema with the given slide size and margin and no regions.
    pub fn new(slide_width: i64, slide_height: i64, margin: i64) -> Self {
        Self {
            slide_width,
            slide_height,
            margin,
            layouts: Layouts::default(),
        }
    }

    /// The slide area inside the margin.
    pub fn content_area(&self) -> Rect {
        Rect {
            x: self.margin,
            y: self.margin,
            width: self
                .slide_width
                .saturating_sub(self.margin.saturating_mul(2))
                .max(0),
            height: self
                .slide_height
                .saturating_sub(self.margin.saturating_mul(2))
                .max(0),
        }
    }

    fn warn_out_of_bounds(&self) {
        let slide = Rect {
            x: 0,
            y: 0,
            width: self.slide_width,
            height: self.slide_height,
        };
        let content = self.content_area();

        for archetype in SlideArchetype::ALL {
            for (name, spec) in self.regions(archetype) {
                if !slide.contains(spec) {
                    log::warn!(
                        "Region '{}' of '{}' extends outside the {}x{} slide",
                        name,
                        archetype.key(),
                        self.slide_width,
                        self.slide_height
                    );
                } else if !content.contains(spec) {
                    log::debug!("Region '{}' of '{}' crosses the margin", name, archetype.key());
                }
            }
        }
    }
}
