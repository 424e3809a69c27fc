use epub_paginate::{PageAnchor, ParagraphUnit};
use serde::{Deserialize, Serialize};

use crate::measure::{normalize_scale, TextStyle};

/// One rendered page: an ordered, non-empty run of paragraph units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageUnit {
    /// Paragraphs (or sentence-group split units) in document order.
    pub paragraphs: Vec<ParagraphUnit>,
}

impl PageUnit {
    /// Create a page from its paragraphs.
    pub fn new(paragraphs: Vec<ParagraphUnit>) -> Self {
        Self { paragraphs }
    }

    /// Concatenated markup of all paragraphs.
    pub fn html(&self) -> String {
        let mut out = String::with_capacity(self.paragraphs.iter().map(|p| p.html.len()).sum());
        for paragraph in &self.paragraphs {
            out.push_str(&paragraph.html);
        }
        out
    }

    /// Plain text of all non-empty paragraphs separated by blank lines.
    pub fn plain_text(&self) -> String {
        let parts: Vec<&str> = self
            .paragraphs
            .iter()
            .map(|p| p.plain_text.as_str())
            .filter(|text| !text.is_empty())
            .collect();
        parts.join("\n\n")
    }

    /// Paragraph indices on this page, in order (split units repeat their
    /// parent's index).
    pub fn paragraph_indices(&self) -> Vec<usize> {
        self.paragraphs.iter().map(|p| p.index).collect()
    }

    /// Whether any paragraph needs rich rendering.
    pub fn requires_rich_content(&self) -> bool {
        self.paragraphs.iter().any(|p| p.requires_rich_content)
    }
}

impl PageAnchor for PageUnit {
    fn first_paragraph_index(&self) -> Option<usize> {
        self.paragraphs.first().map(|p| p.index)
    }
}

/// Compact, serializable view of a page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    /// Zero-based page index.
    pub page_index: usize,
    /// Paragraph indices on the page.
    pub paragraphs: Vec<usize>,
    /// Leading excerpt of the page text.
    pub excerpt: String,
}

impl PageSummary {
    /// Summarize `page`, keeping at most `excerpt_chars` characters of text.
    pub fn from_page(page_index: usize, page: &PageUnit, excerpt_chars: usize) -> Self {
        let text = page.plain_text();
        let mut excerpt: String = text.chars().take(excerpt_chars).collect();
        if text.chars().nth(excerpt_chars).is_some() {
            excerpt.push('\u{2026}');
        }
        Self {
            page_index,
            paragraphs: page.paragraph_indices(),
            excerpt,
        }
    }
}

/// Viewport dimensions in px.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Width in px.
    pub width: f32,
    /// Height in px.
    pub height: f32,
}

impl ViewportSize {
    /// Create a viewport.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Finite and strictly positive in both dimensions.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Identity of a pagination layout.
///
/// Two runs with equal keys over the same paragraphs produce the same pages.
/// Fractional inputs are quantized: viewport to tenths of a px, text scale to
/// hundredths.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginationCacheKey {
    /// Viewport width in tenths of a px.
    pub width_tenths: i64,
    /// Viewport height in tenths of a px.
    pub height_tenths: i64,
    /// Font family.
    pub font_family: String,
    /// Font size in px.
    pub font_size: u16,
    /// Line spacing percentage.
    pub line_spacing: u16,
    /// Horizontal margin in px.
    pub margin: u16,
    /// Explicit paragraph spacing override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_spacing: Option<u16>,
    /// Text scale in hundredths.
    pub scale_hundredths: i64,
}

impl PaginationCacheKey {
    /// Build a key from layout inputs.
    pub fn new(viewport: ViewportSize, style: &TextStyle, text_scale: f32) -> Self {
        Self {
            width_tenths: quantize(viewport.width, 10.0),
            height_tenths: quantize(viewport.height, 10.0),
            font_family: style.font_family.clone(),
            font_size: style.font_size,
            line_spacing: style.line_spacing,
            margin: style.margin,
            paragraph_spacing: style.paragraph_spacing,
            scale_hundredths: quantize(normalize_scale(text_scale), 100.0),
        }
    }
}

fn quantize(value: f32, factor: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    (value as f64 * factor).round() as i64
}

/// Stable fingerprint of a paragraph sequence.
///
/// Distinguishes cache entries for the same layout key over different
/// content (a reloaded or different book).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(pub [u8; 16]);

impl ContentFingerprint {
    /// Fingerprint paragraph indices and content.
    pub fn of(paragraphs: &[ParagraphUnit]) -> Self {
        let mut a = Fnv64::new(0xcbf29ce484222325);
        let mut b = Fnv64::new(0x9e3779b97f4a7c15);
        for p in paragraphs {
            for hasher in [&mut a, &mut b] {
                hasher.write(&(p.index as u64).to_le_bytes());
                hasher.write(&(p.chapter_index as u64).to_le_bytes());
                hasher.write(p.html.as_bytes());
                hasher.write(&[0xff]);
            }
        }
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&a.0.to_le_bytes());
        out[8..16].copy_from_slice(&b.0.to_le_bytes());
        Self(out)
    }
}

struct Fnv64(u64);

impl Fnv64 {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn write(&mut self, payload: &[u8]) {
        for byte in payload {
            self.0 ^= *byte as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}
