//! embedded-graphics measurement and drawing for `epub-paginate-render` pages.
//!
//! [`EgTextMeasurer`] and [`EgPageRenderer`] share one wrap model, so a page
//! sized by the measurer draws within the viewport it was sized for.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

use std::borrow::Cow;
use std::sync::Arc;

use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X9, FONT_7X14, FONT_8X13},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use epub_paginate_render::{PageUnit, ReaderSettings, TextMeasurer, TextStyle};

/// Mono font chosen for a scaled font size, with its derived metrics.
#[derive(Clone, Copy)]
pub struct MonoMetrics {
    font: &'static MonoFont<'static>,
    /// Horizontal advance per character in px.
    pub advance: u32,
    /// Glyph cell height in px.
    pub cell_height: u32,
}

impl core::fmt::Debug for MonoMetrics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MonoMetrics")
            .field("advance", &self.advance)
            .field("cell_height", &self.cell_height)
            .finish_non_exhaustive()
    }
}

impl MonoMetrics {
    /// Pick the mono font bucket for `style` at `text_scale`.
    pub fn for_style(style: &TextStyle, text_scale: f32) -> Self {
        let size = style.scaled_font_size(text_scale);
        let font: &'static MonoFont<'static> = if size >= 24.0 {
            &FONT_10X20
        } else if size >= 20.0 {
            &FONT_8X13
        } else if size >= 16.0 {
            &FONT_7X14
        } else {
            &FONT_6X9
        };
        if !family_supported(&style.font_family) {
            log::trace!(
                "family {:?} has no mono mapping; using {}px cell",
                style.font_family,
                font.character_size.height
            );
        }
        Self {
            font,
            advance: font.character_size.width + font.character_spacing,
            cell_height: font.character_size.height,
        }
    }

    /// Line pitch in px for `line_spacing` percent, never below one cell.
    pub fn line_height(&self, line_spacing: u16) -> f32 {
        self.cell_height as f32 * line_spacing.max(100) as f32 / 100.0
    }

    /// Whole characters that fit in `max_width`, at least one.
    pub fn columns(&self, max_width: f32) -> usize {
        let advance = self.advance.max(1) as f32;
        ((max_width.max(0.0) / advance).floor() as usize).max(1)
    }

    fn text_style(&self) -> MonoTextStyle<'static, BinaryColor> {
        MonoTextStyle::new(self.font, BinaryColor::On)
    }
}

fn family_supported(family: &str) -> bool {
    matches!(
        family.trim().to_ascii_lowercase().as_str(),
        "monospace" | "mono" | "fixed" | "serif" | "sans-serif"
    )
}

/// Greedy word wrap at `columns` characters.
///
/// Words longer than a line are hard-broken. Empty or whitespace-only text
/// yields no lines.
pub fn wrap_lines(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let normalized = normalize_text_for_mono(text);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0usize;
    for word in normalized.split_whitespace() {
        let word_len = word.chars().count();
        if line_len > 0 && line_len + 1 + word_len <= columns {
            line.push(' ');
            line.push_str(word);
            line_len += 1 + word_len;
            continue;
        }
        if line_len > 0 {
            lines.push(std::mem::take(&mut line));
            line_len = 0;
        }
        let chars: Vec<char> = word.chars().collect();
        let mut chunks = chars.chunks(columns).peekable();
        while let Some(chunk) = chunks.next() {
            let piece: String = chunk.iter().collect();
            if chunks.peek().is_some() {
                lines.push(piece);
            } else {
                line_len = chunk.len();
                line = piece;
            }
        }
    }
    if line_len > 0 {
        lines.push(line);
    }
    lines
}

fn normalize_text_for_mono(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|ch| {
        matches!(
            ch,
            '\u{00A0}' | '\u{2013}' | '\u{2014}' | '\u{2018}' | '\u{2019}' | '\u{201C}'
                | '\u{201D}' | '\u{2026}'
        )
    }) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{00A0}' => out.push(' '),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// `TextMeasurer` backed by embedded-graphics mono font cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct EgTextMeasurer;

impl EgTextMeasurer {
    /// Create a measurer.
    pub fn new() -> Self {
        Self
    }

    /// Shared measurer trait object for paginator wiring.
    pub fn shared() -> Arc<dyn TextMeasurer> {
        Arc::new(Self)
    }
}

impl TextMeasurer for EgTextMeasurer {
    fn measure_height(
        &self,
        text: &str,
        style: &TextStyle,
        max_width: f32,
        text_scale: f32,
    ) -> f32 {
        let metrics = MonoMetrics::for_style(style, text_scale);
        let lines = wrap_lines(text, metrics.columns(max_width)).len();
        lines as f32 * metrics.line_height(style.line_spacing)
    }
}

/// Draws page text top-down with the same wrap model as [`EgTextMeasurer`].
#[derive(Clone, Debug)]
pub struct EgPageRenderer {
    settings: ReaderSettings,
}

impl EgPageRenderer {
    /// Create a renderer for `settings`.
    pub fn new(settings: ReaderSettings) -> Self {
        Self { settings }
    }

    /// Active settings.
    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// Draw `page` and return the height consumed in px.
    ///
    /// Rich-only paragraphs (images, rules) reserve one blank line.
    pub fn render_page<D>(&self, page: &PageUnit, display: &mut D) -> Result<f32, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let style = self.settings.style();
        let scale = self.settings.effective_scale();
        let metrics = MonoMetrics::for_style(&style, scale);
        let text_style = metrics.text_style();
        let line_height = metrics.line_height(style.line_spacing);
        let spacing = style.paragraph_spacing_px(scale);
        let columns = metrics.columns(style.content_width(self.settings.viewport_width));
        let x = style.margin as i32;

        let mut y = 0.0f32;
        for (i, paragraph) in page.paragraphs.iter().enumerate() {
            if i > 0 {
                y += spacing;
            }
            if paragraph.is_whitespace_only() {
                y += spacing;
                continue;
            }
            let lines = wrap_lines(&paragraph.plain_text, columns);
            if lines.is_empty() {
                y += style.line_height_px(scale);
                continue;
            }
            for line in &lines {
                let origin = Point::new(x, y.round() as i32);
                Text::with_baseline(line, origin, text_style, Baseline::Top).draw(display)?;
                y += line_height;
            }
        }
        Ok(y)
    }
}
