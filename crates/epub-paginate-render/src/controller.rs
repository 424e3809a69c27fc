use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use epub_paginate::{page_index_for_paragraph, ParagraphUnit, Position};

use crate::cache::PageCacheStore;
use crate::error::PaginateError;
use crate::page::{ContentFingerprint, PageUnit, PaginationCacheKey};
use crate::paginator::{
    CancelToken, PaginationDiagnostic, PaginationResult, PaginationRun, Paginator,
};
use crate::settings::ReaderSettings;

/// Cancel token bound to one generation of a shared counter.
///
/// Fires as soon as the counter moves past the generation it was minted for.
#[derive(Clone, Debug)]
pub struct GenerationToken {
    shared: Arc<AtomicU64>,
    generation: u64,
}

impl GenerationToken {
    /// Generation this token guards.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl CancelToken for GenerationToken {
    fn is_cancelled(&self) -> bool {
        self.shared.load(Ordering::Acquire) != self.generation
    }
}

/// Pagination lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub enum PaginationState {
    /// Nothing requested yet.
    Idle,
    /// A run for `generation` is in flight.
    Paginating {
        /// Generation of the in-flight run.
        generation: u64,
        /// Layout being computed.
        key: PaginationCacheKey,
    },
    /// Pages for `key` are current.
    Ready {
        /// Committed pages.
        pages: Vec<PageUnit>,
        /// Layout they were computed for.
        key: PaginationCacheKey,
    },
    /// Pages are still viewable but no longer match the content.
    Stale {
        /// Last committed pages.
        pages: Vec<PageUnit>,
        /// Layout they were computed for.
        key: PaginationCacheKey,
    },
}

impl PaginationState {
    /// Pages available for display, current or stale.
    pub fn pages(&self) -> Option<&[PageUnit]> {
        match self {
            Self::Ready { pages, .. } | Self::Stale { pages, .. } => Some(pages),
            Self::Idle | Self::Paginating { .. } => None,
        }
    }

    /// Ready with zero pages: the document has no content.
    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::Ready { pages, .. } if pages.is_empty())
    }
}

/// Result of [`PaginationController::request`].
#[derive(Debug)]
pub enum RequestOutcome<'p> {
    /// Ready pages already match the request.
    UpToDate,
    /// A run for the same layout and content is still in flight; keep
    /// driving it.
    InFlight {
        /// Generation of the in-flight run.
        generation: u64,
    },
    /// Pages were loaded from the cache store and are now ready.
    CacheHit {
        /// Page count served.
        page_count: usize,
    },
    /// A new run must be driven and its result committed.
    Started(PaginationRun<'p>),
}

/// Result of [`PaginationController::commit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Pages were applied and are now ready.
    Applied,
    /// The result belongs to a superseded generation and was dropped.
    Stale,
}

/// Explicit pagination state machine.
///
/// Transitions happen only through [`request`](Self::request),
/// [`commit`](Self::commit) and [`invalidate`](Self::invalidate). Every
/// request that needs work advances the generation, which cancels any run
/// still in flight at its next yield point.
pub struct PaginationController {
    paginator: Paginator,
    generation: Arc<AtomicU64>,
    state: PaginationState,
    content: Option<ContentFingerprint>,
    cache: Option<Arc<dyn PageCacheStore + Send + Sync>>,
}

impl core::fmt::Debug for PaginationController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PaginationController")
            .field("generation", &self.generation())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PaginationController {
    /// Create an idle controller.
    pub fn new(paginator: Paginator) -> Self {
        Self {
            paginator,
            generation: Arc::new(AtomicU64::new(0)),
            state: PaginationState::Idle,
            content: None,
            cache: None,
        }
    }

    /// Attach a page cache store.
    pub fn with_cache(mut self, cache: Arc<dyn PageCacheStore + Send + Sync>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current state.
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Pages available for display.
    pub fn pages(&self) -> Option<&[PageUnit]> {
        self.state.pages()
    }

    fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Ask for pages matching `settings` over `paragraphs`.
    ///
    /// A degenerate viewport is rejected before any state changes. Asking
    /// again for the layout already being computed does not restart it.
    pub fn request<'p>(
        &mut self,
        paragraphs: &'p [ParagraphUnit],
        settings: &ReaderSettings,
    ) -> Result<RequestOutcome<'p>, PaginateError> {
        self.request_inner(paragraphs, settings, false)
    }

    fn request_inner<'p>(
        &mut self,
        paragraphs: &'p [ParagraphUnit],
        settings: &ReaderSettings,
        supersede_in_flight: bool,
    ) -> Result<RequestOutcome<'p>, PaginateError> {
        let viewport = settings.viewport();
        if !viewport.is_valid() {
            return Err(PaginateError::DegenerateViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let key = settings.cache_key();
        let content = ContentFingerprint::of(paragraphs);

        let same_content = self.content == Some(content);
        match &self.state {
            PaginationState::Ready { key: ready_key, .. } if *ready_key == key && same_content => {
                return Ok(RequestOutcome::UpToDate);
            }
            PaginationState::Paginating {
                generation,
                key: running_key,
            } if *running_key == key && same_content && !supersede_in_flight => {
                return Ok(RequestOutcome::InFlight {
                    generation: *generation,
                });
            }
            _ => {}
        }

        if let Some(cache) = &self.cache {
            if let Some(pages) = cache.load_pages(&key, content) {
                let page_count = pages.len();
                self.advance_generation();
                log::debug!("page cache hit: {} pages", page_count);
                self.paginator
                    .emit_diagnostic(PaginationDiagnostic::CacheHit { page_count });
                self.content = Some(content);
                self.state = PaginationState::Ready { pages, key };
                return Ok(RequestOutcome::CacheHit { page_count });
            }
            self.paginator.emit_diagnostic(PaginationDiagnostic::CacheMiss);
        }

        let generation = self.advance_generation();
        let token = GenerationToken {
            shared: Arc::clone(&self.generation),
            generation,
        };
        let run = self
            .paginator
            .start_with_cancel(paragraphs, settings, generation, Arc::new(token))?;
        self.content = Some(content);
        self.state = PaginationState::Paginating { generation, key };
        Ok(RequestOutcome::Started(run))
    }

    /// Apply a finished run's pages if its generation is still current.
    pub fn commit(&mut self, result: PaginationResult) -> CommitOutcome {
        let current = match &self.state {
            PaginationState::Paginating { generation, key } => {
                *generation == result.generation && *key == result.key
            }
            _ => false,
        };
        if !current || result.generation != self.generation() {
            log::debug!(
                "dropping stale pagination result (generation {}, current {})",
                result.generation,
                self.generation()
            );
            return CommitOutcome::Stale;
        }
        if let (Some(cache), Some(content)) = (&self.cache, self.content) {
            cache.store_pages(&result.key, content, &result.pages);
        }
        self.state = PaginationState::Ready {
            pages: result.pages,
            key: result.key,
        };
        CommitOutcome::Applied
    }

    /// Mark current pages as out of date (e.g. paragraphs were reloaded).
    ///
    /// An in-flight run is cancelled and the controller returns to idle.
    pub fn invalidate(&mut self) {
        self.content = None;
        self.state = match std::mem::replace(&mut self.state, PaginationState::Idle) {
            PaginationState::Ready { pages, key } | PaginationState::Stale { pages, key } => {
                PaginationState::Stale { pages, key }
            }
            PaginationState::Paginating { .. } => {
                self.advance_generation();
                PaginationState::Idle
            }
            PaginationState::Idle => PaginationState::Idle,
        };
    }

    /// Position for `page_index`, clamped to the page count.
    pub fn position(&self, page_index: usize) -> Option<Position> {
        self.pages()
            .map(|pages| Position::new(page_index, pages.len()))
    }

    /// Page holding `paragraph_index`.
    pub fn page_for_paragraph(&self, paragraph_index: usize) -> Option<usize> {
        self.pages()
            .map(|pages| page_index_for_paragraph(pages, paragraph_index))
    }

    /// Position of the page holding a paragraph remembered from an earlier
    /// layout, so the reader stays on the same content after a relayout.
    pub fn reanchor(&self, previous_first_paragraph_index: usize) -> Option<Position> {
        let page = self.page_for_paragraph(previous_first_paragraph_index)?;
        self.position(page)
    }

    /// Request and, if needed, paginate to completion on this thread.
    ///
    /// A run already in flight cannot be driven from here, so it is
    /// superseded by a fresh one.
    pub fn paginate_blocking<F>(
        &mut self,
        paragraphs: &[ParagraphUnit],
        settings: &ReaderSettings,
        on_progress: F,
    ) -> Result<&[PageUnit], PaginateError>
    where
        F: FnMut(f32),
    {
        if let RequestOutcome::Started(run) = self.request_inner(paragraphs, settings, true)? {
            let result = run.run_to_completion(on_progress)?;
            if self.commit(result) == CommitOutcome::Stale {
                return Err(PaginateError::Cancelled {
                    generation: self.generation(),
                });
            }
        }
        Ok(self.pages().unwrap_or(&[]))
    }
}
