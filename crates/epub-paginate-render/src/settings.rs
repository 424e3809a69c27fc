use serde::{Deserialize, Serialize};

use crate::measure::{normalize_scale, TextStyle};
use crate::page::{PaginationCacheKey, ViewportSize};

/// Reader-facing layout settings: viewport plus text style.
///
/// Every field participates in the [`PaginationCacheKey`]; changing any of
/// them requires a fresh pagination. Missing JSON fields take their default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Viewport width in px.
    pub viewport_width: f32,
    /// Viewport height in px.
    pub viewport_height: f32,
    /// Font family name.
    pub font_family: String,
    /// Base font size in px.
    pub font_size: u16,
    /// Line spacing percentage.
    pub line_spacing: u16,
    /// Horizontal margin in px.
    pub margin: u16,
    /// Paragraph gap override in px.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_spacing: Option<u16>,
    /// Text scale factor, clamped to `[0.5, 3.0]` when used.
    pub text_scale: f32,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        let style = TextStyle::default();
        Self {
            viewport_width: 480.0,
            viewport_height: 800.0,
            font_family: style.font_family,
            font_size: style.font_size,
            line_spacing: style.line_spacing,
            margin: style.margin,
            paragraph_spacing: style.paragraph_spacing,
            text_scale: 1.0,
        }
    }
}

impl ReaderSettings {
    /// Default style for a target display size.
    pub fn for_display(width: f32, height: f32) -> Self {
        Self {
            viewport_width: width,
            viewport_height: height,
            ..Self::default()
        }
    }

    /// Parse settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Override the font family.
    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        let family = family.into();
        let trimmed = family.trim();
        if !trimmed.is_empty() {
            self.font_family = trimmed.to_string();
        }
        self
    }

    /// Override the font size.
    pub fn with_font_size(mut self, font_size: u16) -> Self {
        self.font_size = font_size.max(1);
        self
    }

    /// Override the line spacing percentage.
    pub fn with_line_spacing(mut self, line_spacing: u16) -> Self {
        self.line_spacing = line_spacing;
        self
    }

    /// Override the horizontal margin.
    pub fn with_margin(mut self, margin: u16) -> Self {
        self.margin = margin;
        self
    }

    /// Fix the paragraph gap instead of deriving it from the font size.
    pub fn with_paragraph_spacing(mut self, spacing: u16) -> Self {
        self.paragraph_spacing = Some(spacing);
        self
    }

    /// Override the text scale.
    pub fn with_text_scale(mut self, text_scale: f32) -> Self {
        self.text_scale = text_scale;
        self
    }

    /// Viewport dimensions.
    pub fn viewport(&self) -> ViewportSize {
        ViewportSize::new(self.viewport_width, self.viewport_height)
    }

    /// Text style handed to the measurer.
    pub fn style(&self) -> TextStyle {
        TextStyle {
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            line_spacing: self.line_spacing,
            margin: self.margin,
            paragraph_spacing: self.paragraph_spacing,
        }
    }

    /// Clamped text scale.
    pub fn effective_scale(&self) -> f32 {
        normalize_scale(self.text_scale)
    }

    /// Layout identity for these settings.
    pub fn cache_key(&self) -> PaginationCacheKey {
        PaginationCacheKey::new(self.viewport(), &self.style(), self.text_scale)
    }
}
