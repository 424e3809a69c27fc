//! Structured errors for markup parsing and paragraph preparation.

use core::fmt;

/// Processing phase where a [`PrepError`] originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepPhase {
    /// XHTML fragment tokenizing/tree building.
    Parse,
    /// Block splitting and paragraph construction.
    Flatten,
}

impl fmt::Display for PrepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => f.write_str("parse"),
            Self::Flatten => f.write_str("flatten"),
        }
    }
}

/// Structured error for fragment parsing and paragraph preparation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrepError {
    /// Processing phase where this error originated.
    pub phase: PrepPhase,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional chapter index context.
    pub chapter_index: Option<usize>,
    /// Optional source paragraph position within its chapter.
    pub source_index: Option<usize>,
    /// Optional tokenizer byte offset.
    pub token_offset: Option<usize>,
}

impl PrepError {
    pub(crate) fn new(phase: PrepPhase, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            phase,
            code,
            message: message.into().into_boxed_str(),
            chapter_index: None,
            source_index: None,
            token_offset: None,
        }
    }

    pub(crate) fn parse(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PrepPhase::Parse, code, message)
    }

    pub(crate) fn flatten(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PrepPhase::Flatten, code, message)
    }

    pub(crate) fn with_chapter_index(mut self, chapter_index: usize) -> Self {
        self.chapter_index = Some(chapter_index);
        self
    }

    pub(crate) fn with_source_index(mut self, source_index: usize) -> Self {
        self.source_index = Some(source_index);
        self
    }

    pub(crate) fn with_token_offset(mut self, token_offset: usize) -> Self {
        self.token_offset = Some(token_offset);
        self
    }
}

impl fmt::Display for PrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.phase, self.code, self.message)?;
        if let Some(chapter_index) = self.chapter_index {
            write!(f, " [chapter_index={}]", chapter_index)?;
        }
        if let Some(source_index) = self.source_index {
            write!(f, " [source_index={}]", source_index)?;
        }
        if let Some(token_offset) = self.token_offset {
            write!(f, " [token_offset={}]", token_offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for PrepError {}
