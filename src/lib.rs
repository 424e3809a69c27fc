//! epub-paginate -- paragraph preparation for paginated EPUB readers
//!
//! Turns chapter XHTML into a flat, globally indexed sequence of paragraph
//! units, degrades oversized paragraphs into sentences, and maps between
//! page index, paragraph index and reading progress. Page construction
//! itself lives in `epub-paginate-render`.
//!
//! # Pipeline
//!
//! raw chapter markup -> [`markup`] tree -> [`block_split`] leaves ->
//! [`paragraph`] units -> paginator -> pages -> [`position`] mapping.

#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented
    )
)]
#![warn(missing_docs)]

pub mod block_split;
pub mod error;
pub mod markup;
pub mod paragraph;
pub mod position;
pub mod sentence;

pub use block_split::split_blocks;
pub use error::{PrepError, PrepPhase};
pub use markup::{
    parse_block, parse_fragment, split_block_fragments, Element, MarkupNode, TagClass,
};
pub use paragraph::{
    flatten_document, ChapterSource, FlattenOutcome, ParagraphBuilder, ParagraphUnit,
    SourceParagraph, FLATTEN_PROGRESS_SPAN,
};
pub use position::{
    page_for_progress, page_index_for_paragraph, progress_for_page, remap_page_by_progress,
    PageAnchor, Position,
};
pub use sentence::split_sentences;
