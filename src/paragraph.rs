//! Paragraph units: the atomic input of pagination.
//!
//! Source paragraphs arrive per chapter, either pre-parsed or as raw XHTML.
//! Each is cloned, block-split, and turned into zero or more
//! [`ParagraphUnit`]s carrying a document-global, strictly increasing index.

use crate::block_split::split_blocks;
use crate::error::PrepError;
use crate::markup::{parse_block, MarkupNode};

/// One block-level content fragment ready for pagination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParagraphUnit {
    /// Document-global index, strictly increasing in document order.
    pub index: usize,
    /// Source chapter index.
    pub chapter_index: usize,
    /// Serialized markup for rich rendering.
    pub html: String,
    /// Trimmed plain text used for measurement and excerpts.
    pub plain_text: String,
    /// Whether `html` renders differently from `plain_text` alone.
    pub requires_rich_content: bool,
}

impl ParagraphUnit {
    /// Build a unit from a leaf node.
    pub fn from_node(index: usize, chapter_index: usize, node: &MarkupNode) -> Self {
        Self {
            index,
            chapter_index,
            html: node.to_html(),
            plain_text: node.plain_text(),
            requires_rich_content: node.has_rich_content(),
        }
    }

    /// Empty text and no rich markup: contributes spacing only.
    pub fn is_whitespace_only(&self) -> bool {
        self.plain_text.is_empty() && !self.requires_rich_content
    }

    /// Synthesize a sentence-group unit sharing this unit's location.
    pub fn split_unit(&self, sentences: &[String]) -> Self {
        let plain_text = sentences.join(" ");
        let mut html = String::with_capacity(plain_text.len() + 7);
        html.push_str("<p>");
        html.push_str(&quick_xml::escape::escape(plain_text.as_str()));
        html.push_str("</p>");
        Self {
            index: self.index,
            chapter_index: self.chapter_index,
            html,
            plain_text,
            requires_rich_content: false,
        }
    }
}

/// One paragraph as delivered by the document collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceParagraph {
    /// Already-parsed node.
    Node(MarkupNode),
    /// Raw XHTML fragment, parsed on demand.
    Markup(String),
}

impl From<MarkupNode> for SourceParagraph {
    fn from(value: MarkupNode) -> Self {
        Self::Node(value)
    }
}

impl From<&str> for SourceParagraph {
    fn from(value: &str) -> Self {
        Self::Markup(value.to_string())
    }
}

/// Source paragraphs of one chapter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChapterSource {
    /// Chapter index in reading order.
    pub chapter_index: usize,
    /// Paragraph-level nodes in document order.
    pub paragraphs: Vec<SourceParagraph>,
}

impl ChapterSource {
    /// Create a chapter source.
    pub fn new(chapter_index: usize, paragraphs: Vec<SourceParagraph>) -> Self {
        Self {
            chapter_index,
            paragraphs,
        }
    }

    /// Build a chapter from a whole chapter body, one source paragraph per
    /// top-level node.
    pub fn from_markup(chapter_index: usize, markup: &str) -> Result<Self, PrepError> {
        let nodes = crate::markup::parse_fragment(markup)
            .map_err(|err| err.with_chapter_index(chapter_index))?;
        Ok(Self::new(
            chapter_index,
            nodes.into_iter().map(SourceParagraph::Node).collect(),
        ))
    }

    /// Like [`from_markup`](Self::from_markup), but a chapter that does not
    /// parse as a whole is cut into raw block fragments instead, so only the
    /// malformed paragraphs are skipped later.
    ///
    /// Fails only when the chapter neither parses nor contains any block.
    pub fn from_markup_recovering(chapter_index: usize, markup: &str) -> Result<Self, PrepError> {
        let err = match Self::from_markup(chapter_index, markup) {
            Ok(chapter) => return Ok(chapter),
            Err(err) => err,
        };
        let fragments = crate::markup::split_block_fragments(markup);
        if fragments.is_empty() {
            return Err(PrepError::flatten(
                "FLATTEN_NO_BLOCKS",
                format!("no block fragments to recover after: {}", err.message),
            )
            .with_chapter_index(chapter_index));
        }
        log::warn!(
            "chapter {} does not parse as a whole ({}); recovering {} block fragments",
            chapter_index,
            err,
            fragments.len()
        );
        Ok(Self::new(
            chapter_index,
            fragments.into_iter().map(SourceParagraph::Markup).collect(),
        ))
    }
}

/// Running index counter and emitter for paragraph units.
///
/// Only emitted units consume an index, so indices stay contiguous.
#[derive(Clone, Debug, Default)]
pub struct ParagraphBuilder {
    next_index: usize,
    skipped_fragments: usize,
}

impl ParagraphBuilder {
    /// Create a builder starting at index 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder starting at an explicit index.
    pub fn starting_at(next_index: usize) -> Self {
        Self {
            next_index,
            skipped_fragments: 0,
        }
    }

    /// Next index to be assigned.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Number of malformed source paragraphs skipped so far.
    pub fn skipped_fragments(&self) -> usize {
        self.skipped_fragments
    }

    /// Convert one source paragraph into units appended to `out`.
    ///
    /// Returns the number of units emitted. Malformed fragments are logged,
    /// counted and skipped; they never fail the caller.
    pub fn push_source(
        &mut self,
        chapter_index: usize,
        source_index: usize,
        source: &SourceParagraph,
        out: &mut Vec<ParagraphUnit>,
    ) -> usize {
        match self.try_push_source(chapter_index, source_index, source, out) {
            Ok(count) => count,
            Err(err) => {
                log::warn!("skipping malformed paragraph: {}", err);
                self.skipped_fragments += 1;
                0
            }
        }
    }

    fn try_push_source(
        &mut self,
        chapter_index: usize,
        source_index: usize,
        source: &SourceParagraph,
        out: &mut Vec<ParagraphUnit>,
    ) -> Result<usize, PrepError> {
        let node = match source {
            SourceParagraph::Node(node) => node.clone(),
            SourceParagraph::Markup(markup) => parse_block(markup).map_err(|err| {
                err.with_chapter_index(chapter_index)
                    .with_source_index(source_index)
            })?,
        };
        let leaves = split_blocks(&node);
        let before = out.len();
        if leaves.len() > 1 {
            for leaf in &leaves {
                self.push_leaf(chapter_index, leaf, out);
            }
        } else {
            self.push_leaf(chapter_index, &node, out);
        }
        Ok(out.len() - before)
    }

    fn push_leaf(&mut self, chapter_index: usize, node: &MarkupNode, out: &mut Vec<ParagraphUnit>) {
        let unit = ParagraphUnit::from_node(self.next_index, chapter_index, node);
        if unit.is_whitespace_only() {
            return;
        }
        self.next_index += 1;
        out.push(unit);
    }
}

/// Result of flattening a whole document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlattenOutcome {
    /// Emitted units in document order.
    pub paragraphs: Vec<ParagraphUnit>,
    /// Malformed source paragraphs that were skipped.
    pub skipped_fragments: usize,
}

impl FlattenOutcome {
    /// No paragraphs survived flattening: the document has no content.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}

/// Share of overall load progress owned by flattening.
pub const FLATTEN_PROGRESS_SPAN: f32 = 0.5;

/// Flatten chapters into paragraph units, reporting progress in `[0, 0.5]`.
///
/// Progress callbacks are throttled to roughly one per percent and always
/// end with exactly `0.5`.
pub fn flatten_document<F>(chapters: &[ChapterSource], mut on_progress: F) -> FlattenOutcome
where
    F: FnMut(f32),
{
    let total: usize = chapters.iter().map(|c| c.paragraphs.len()).sum();
    let mut builder = ParagraphBuilder::new();
    let mut paragraphs = Vec::with_capacity(total);
    let mut processed = 0usize;
    let mut last_reported = -1.0f32;

    for chapter in chapters {
        for (source_index, source) in chapter.paragraphs.iter().enumerate() {
            builder.push_source(chapter.chapter_index, source_index, source, &mut paragraphs);
            processed += 1;
            let progress = processed as f32 / total.max(1) as f32 * FLATTEN_PROGRESS_SPAN;
            if progress - last_reported >= 0.01 && progress < FLATTEN_PROGRESS_SPAN {
                on_progress(progress);
                last_reported = progress;
            }
        }
    }
    on_progress(FLATTEN_PROGRESS_SPAN);

    if paragraphs.is_empty() {
        log::debug!("document flattened to zero paragraphs");
    }
    FlattenOutcome {
        paragraphs,
        skipped_fragments: builder.skipped_fragments(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(index: usize, fragments: &[&str]) -> ChapterSource {
        ChapterSource::new(
            index,
            fragments.iter().map(|f| SourceParagraph::from(*f)).collect(),
        )
    }

    #[test]
    fn container_paragraph_emits_one_unit_per_leaf() {
        let doc = [chapter(0, &["<div><p>a</p><p>b</p></div>", "<p>c</p>"])];
        let outcome = flatten_document(&doc, |_| {});
        let texts: Vec<&str> = outcome
            .paragraphs
            .iter()
            .map(|p| p.plain_text.as_str())
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        let indices: Vec<usize> = outcome.paragraphs.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn whitespace_only_units_are_dropped_without_consuming_index() {
        let doc = [
            chapter(0, &["<p>one</p>", "<p>   </p>", "<div><p>two</p><p> </p></div>"]),
            chapter(1, &["<p>three</p>"]),
        ];
        let outcome = flatten_document(&doc, |_| {});
        let pairs: Vec<(usize, usize, &str)> = outcome
            .paragraphs
            .iter()
            .map(|p| (p.index, p.chapter_index, p.plain_text.as_str()))
            .collect();
        assert_eq!(pairs, vec![(0, 0, "one"), (1, 0, "two"), (2, 1, "three")]);
    }

    #[test]
    fn rich_empty_paragraph_is_kept() {
        let doc = [chapter(0, &[r#"<p><img src="a.png"/></p>"#, "<hr/>"])];
        let outcome = flatten_document(&doc, |_| {});
        assert_eq!(outcome.paragraphs.len(), 2);
        assert!(outcome.paragraphs.iter().all(|p| p.requires_rich_content));
        assert!(outcome.paragraphs.iter().all(|p| !p.is_whitespace_only()));
    }

    #[test]
    fn malformed_fragment_is_skipped_and_counted() {
        let doc = [chapter(0, &["<p>ok</p>", "<p>broken", "<p>fine</p>"])];
        let outcome = flatten_document(&doc, |_| {});
        assert_eq!(outcome.skipped_fragments, 1);
        let texts: Vec<&str> = outcome
            .paragraphs
            .iter()
            .map(|p| p.plain_text.as_str())
            .collect();
        assert_eq!(texts, vec!["ok", "fine"]);
    }

    #[test]
    fn empty_document_is_no_content_not_error() {
        let outcome = flatten_document(&[], |_| {});
        assert!(outcome.is_empty());
        let outcome = flatten_document(&[chapter(0, &["<p> </p>"])], |_| {});
        assert!(outcome.is_empty());
        assert_eq!(outcome.skipped_fragments, 0);
    }

    #[test]
    fn progress_is_monotonic_and_bounded() {
        let fragments: Vec<String> = (0..250).map(|i| format!("<p>p{}</p>", i)).collect();
        let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
        let doc = [chapter(0, &refs)];
        let mut seen = Vec::new();
        flatten_document(&doc, |p| seen.push(p));
        assert!(seen.len() <= 102, "too many progress callbacks: {}", seen.len());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|p| (0.0..=0.5).contains(p)));
        assert_eq!(seen.last().copied(), Some(0.5));
    }

    #[test]
    fn source_nodes_are_not_shared_with_units() {
        let node = parse_block("<p>shared</p>").expect("parse");
        let source = SourceParagraph::Node(node.clone());
        let mut builder = ParagraphBuilder::starting_at(10);
        let mut out = Vec::new();
        assert_eq!(builder.push_source(3, 0, &source, &mut out), 1);
        assert_eq!(out[0].index, 10);
        assert_eq!(out[0].chapter_index, 3);
        assert_eq!(source, SourceParagraph::Node(node));
        assert_eq!(builder.next_index(), 11);
    }

    #[test]
    fn split_unit_keeps_location_and_escapes() {
        let parent = ParagraphUnit {
            index: 4,
            chapter_index: 1,
            html: "<p>x</p>".to_string(),
            plain_text: "x".to_string(),
            requires_rich_content: true,
        };
        let unit = parent.split_unit(&["A < B.".to_string(), "C.".to_string()]);
        assert_eq!(unit.index, 4);
        assert_eq!(unit.chapter_index, 1);
        assert_eq!(unit.plain_text, "A < B. C.");
        assert_eq!(unit.html, "<p>A &lt; B. C.</p>");
    }

    #[test]
    fn broken_chapter_recovers_all_but_the_bad_paragraph() {
        let markup = "<html><body><h1>T</h1><p>before</p><p><b>unbalanced</p><p>after</p></body></html>";
        assert!(ChapterSource::from_markup(0, markup).is_err());
        let chapter = ChapterSource::from_markup_recovering(1, markup).expect("recover");
        assert_eq!(chapter.paragraphs.len(), 4);
        let outcome = flatten_document(&[chapter], |_| {});
        assert_eq!(outcome.skipped_fragments, 1);
        let texts: Vec<&str> = outcome
            .paragraphs
            .iter()
            .map(|p| p.plain_text.as_str())
            .collect();
        assert_eq!(texts, vec!["T", "before", "after"]);
        assert!(outcome.paragraphs.iter().all(|p| p.chapter_index == 1));
    }

    #[test]
    fn well_formed_chapter_is_not_fragmented() {
        let markup = "<html><body><p>a</p><p>b</p></body></html>";
        let chapter = ChapterSource::from_markup_recovering(0, markup).expect("parse");
        assert_eq!(chapter, ChapterSource::from_markup(0, markup).expect("parse"));
    }

    #[test]
    fn chapter_without_blocks_fails_in_flatten_phase() {
        let err = ChapterSource::from_markup_recovering(4, r#"<span><a id="x"></span>"#)
            .expect_err("no blocks");
        assert_eq!(err.phase, crate::error::PrepPhase::Flatten);
        assert_eq!(err.code, "FLATTEN_NO_BLOCKS");
        assert_eq!(err.chapter_index, Some(4));
    }

    #[test]
    fn chapter_from_markup_uses_top_level_nodes() {
        let ch = ChapterSource::from_markup(2, "<h1>T</h1>\n<p>a</p>").expect("parse");
        assert_eq!(ch.chapter_index, 2);
        assert_eq!(ch.paragraphs.len(), 2);
        let err = ChapterSource::from_markup(5, "<p>").expect_err("unclosed");
        assert_eq!(err.chapter_index, Some(5));
    }
}
