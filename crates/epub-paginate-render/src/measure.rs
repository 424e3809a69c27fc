use std::sync::Arc;

/// Text settings that affect rendered paragraph height.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextStyle {
    /// Font family name as understood by the host renderer.
    pub font_family: String,
    /// Base font size in px before text scaling.
    pub font_size: u16,
    /// Line height as a percentage of the font size (150 = 1.5).
    pub line_spacing: u16,
    /// Horizontal page margin in px, applied on both sides.
    pub margin: u16,
    /// Explicit paragraph gap in px; derived from the font size when unset.
    pub paragraph_spacing: Option<u16>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "serif".to_string(),
            font_size: 18,
            line_spacing: 150,
            margin: 16,
            paragraph_spacing: None,
        }
    }
}

impl TextStyle {
    /// Effective font size in px after scaling.
    pub fn scaled_font_size(&self, text_scale: f32) -> f32 {
        self.font_size as f32 * normalize_scale(text_scale)
    }

    /// Height of one rendered line in px.
    pub fn line_height_px(&self, text_scale: f32) -> f32 {
        self.scaled_font_size(text_scale) * self.line_spacing.max(100) as f32 / 100.0
    }

    /// Vertical gap between consecutive paragraphs in px.
    pub fn paragraph_spacing_px(&self, text_scale: f32) -> f32 {
        match self.paragraph_spacing {
            Some(px) => px as f32,
            None => self.scaled_font_size(text_scale) * 0.8,
        }
    }

    /// Width available for text inside a viewport of `viewport_width`.
    pub fn content_width(&self, viewport_width: f32) -> f32 {
        (viewport_width - 2.0 * self.margin as f32).max(1.0)
    }
}

/// Fit threshold for page content: the viewport height minus
/// `safety_lines` scaled line heights, never less than one line.
pub fn safe_usable_height(
    viewport_height: f32,
    style: &TextStyle,
    text_scale: f32,
    safety_lines: u8,
) -> f32 {
    let line = style.line_height_px(text_scale);
    (viewport_height - safety_lines as f32 * line).max(line)
}

/// Clamp a text scale into the supported `[0.5, 3.0]` range.
pub fn normalize_scale(text_scale: f32) -> f32 {
    if text_scale.is_finite() {
        text_scale.clamp(0.5, 3.0)
    } else {
        1.0
    }
}

/// Height measurement hook supplied by the host renderer.
///
/// Implementations must be pure for fixed inputs: pagination determinism
/// depends on it.
pub trait TextMeasurer: Send + Sync {
    /// Rendered height in px of `text` wrapped at `max_width`.
    fn measure_height(&self, text: &str, style: &TextStyle, max_width: f32, text_scale: f32)
        -> f32;
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for Arc<T> {
    fn measure_height(
        &self,
        text: &str,
        style: &TextStyle,
        max_width: f32,
        text_scale: f32,
    ) -> f32 {
        (**self).measure_height(text, style, max_width, text_scale)
    }
}

/// Glyph-class width model with greedy word wrap.
///
/// Used when the host has no real shaping engine to offer. Widths are
/// averaged per glyph class, so results are an estimate but stable across
/// runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicTextMeasurer;

impl HeuristicTextMeasurer {
    /// Shared trait object for paginator wiring.
    pub fn shared() -> Arc<dyn TextMeasurer> {
        Arc::new(Self)
    }

    /// Estimated width of `text` in px.
    pub fn text_width(text: &str, style: &TextStyle, text_scale: f32) -> f32 {
        let family = style.font_family.to_ascii_lowercase();
        let proportional = !(family.contains("mono") || family.contains("fixed"));
        let em_sum: f32 = if proportional {
            text.chars().map(proportional_glyph_em_width).sum()
        } else {
            text.chars()
                .map(|ch| if ch == ' ' { 0.52 } else { 0.58 })
                .sum()
        };
        let family_scale = if family.contains("serif") && !family.contains("sans") {
            1.03
        } else if family.contains("sans") {
            0.99
        } else {
            1.00
        };
        em_sum * style.scaled_font_size(text_scale) * family_scale
    }

    /// Number of lines `text` wraps into at `max_width`.
    pub fn line_count(text: &str, style: &TextStyle, max_width: f32, text_scale: f32) -> usize {
        let max_width = max_width.max(1.0);
        let space = Self::text_width(" ", style, text_scale);
        let mut lines = 0usize;
        let mut line_width = 0.0f32;
        for word in text.split_whitespace() {
            let word_width = Self::text_width(word, style, text_scale);
            if lines > 0 && line_width + space + word_width <= max_width {
                line_width += space + word_width;
                continue;
            }
            // Start a new line; overlong words hard-break across extra lines.
            let (extra, rest) = hard_break(word_width, max_width);
            lines += 1 + extra;
            line_width = rest;
        }
        lines
    }
}

fn hard_break(word_width: f32, max_width: f32) -> (usize, f32) {
    if word_width <= max_width {
        return (0, word_width);
    }
    let spans = (word_width / max_width).ceil() as usize;
    let extra = spans.saturating_sub(1);
    (extra, word_width - extra as f32 * max_width)
}

impl TextMeasurer for HeuristicTextMeasurer {
    fn measure_height(
        &self,
        text: &str,
        style: &TextStyle,
        max_width: f32,
        text_scale: f32,
    ) -> f32 {
        Self::line_count(text, style, max_width, text_scale) as f32
            * style.line_height_px(text_scale)
    }
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' => 0.32,
        '\t' => 1.28,
        '\u{00A0}' => 0.32,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.23,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => 0.34,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.30,
        'f' | 't' | 'j' | 'r' => 0.34,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 0.74,
        c if c.is_ascii_digit() => 0.52,
        c if c.is_ascii_uppercase() => 0.64,
        c if c.is_ascii_lowercase() => 0.52,
        c if c.is_whitespace() => 0.32,
        c if c.is_ascii_punctuation() => 0.42,
        // CJK ideographs and kana occupy a full em.
        c if ('\u{2E80}'..='\u{9FFF}').contains(&c) || ('\u{FF00}'..='\u{FFEF}').contains(&c) => {
            1.0
        }
        _ => 0.56,
    }
}
