use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use epub_paginate::{split_sentences, ParagraphUnit, FLATTEN_PROGRESS_SPAN};

use crate::error::PaginateError;
use crate::measure::{safe_usable_height, HeuristicTextMeasurer, TextMeasurer, TextStyle};
use crate::page::{PageUnit, PaginationCacheKey};
use crate::settings::ReaderSettings;

/// Cancellation hook checked at every yield point of a run.
pub trait CancelToken {
    /// Whether the run should stop.
    fn is_cancelled(&self) -> bool;
}

/// Never-cancel token for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Runtime diagnostics from pagination.
#[derive(Clone, Debug, PartialEq)]
pub enum PaginationDiagnostic {
    /// Wall time of a completed run.
    PaginateTimeMs(u32),
    /// A run stopped because its generation was superseded.
    Cancelled {
        /// Generation of the abandoned run.
        generation: u64,
    },
    /// Pages served from the cache store.
    CacheHit {
        /// Cached page count.
        page_count: usize,
    },
    /// Cache store consulted without a match.
    CacheMiss,
    /// A paragraph taller than the safe height was sentence-split.
    OversizedParagraph {
        /// Paragraph index.
        index: usize,
        /// Measured height in px.
        height: f32,
    },
}

type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(PaginationDiagnostic) + Send + 'static>>>;
type DiagnosticSink = Option<DiagnosticCallback>;

/// Paginator tuning that does not change the layout identity of a result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaginatorOptions {
    /// Lines reserved at the bottom of the viewport for measurement drift.
    pub safety_lines: u8,
    /// Progress delta that forces a yield.
    pub yield_progress_step: f32,
    /// Continuous work time that forces a yield.
    pub yield_interval: Duration,
}

impl Default for PaginatorOptions {
    fn default() -> Self {
        Self {
            safety_lines: 5,
            yield_progress_step: 0.05,
            yield_interval: Duration::from_millis(50),
        }
    }
}

impl PaginatorOptions {
    /// Override the reserved line count.
    pub fn with_safety_lines(mut self, safety_lines: u8) -> Self {
        self.safety_lines = safety_lines;
        self
    }

    /// Override the progress delta between yields.
    pub fn with_yield_progress_step(mut self, step: f32) -> Self {
        self.yield_progress_step = if step.is_finite() { step.max(0.0) } else { 0.05 };
        self
    }

    /// Override the time slice between yields.
    pub fn with_yield_interval(mut self, interval: Duration) -> Self {
        self.yield_interval = interval;
        self
    }
}

/// Groups paragraph units into pages that fit a viewport.
#[derive(Clone)]
pub struct Paginator {
    opts: PaginatorOptions,
    measurer: Arc<dyn TextMeasurer>,
    diagnostic_sink: DiagnosticSink,
}

impl fmt::Debug for Paginator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PaginatorOptions::default())
    }
}

impl Paginator {
    /// Create a paginator using the heuristic measurer.
    pub fn new(opts: PaginatorOptions) -> Self {
        Self {
            opts,
            measurer: HeuristicTextMeasurer::shared(),
            diagnostic_sink: None,
        }
    }

    /// Replace the text measurer.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    /// Active options.
    pub fn options(&self) -> PaginatorOptions {
        self.opts
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(PaginationDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    pub(crate) fn emit_diagnostic(&self, diagnostic: PaginationDiagnostic) {
        let Some(sink) = &self.diagnostic_sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(diagnostic);
        }
    }

    /// Fit threshold for `settings`.
    pub fn safe_usable_height(&self, settings: &ReaderSettings) -> f32 {
        safe_usable_height(
            settings.viewport_height,
            &settings.style(),
            settings.effective_scale(),
            self.opts.safety_lines,
        )
    }

    /// Begin an uncancellable run.
    pub fn start<'p>(
        &self,
        paragraphs: &'p [ParagraphUnit],
        settings: &ReaderSettings,
    ) -> Result<PaginationRun<'p>, PaginateError> {
        self.start_run(paragraphs, settings, 0, Arc::new(NeverCancel))
    }

    /// Begin a run tagged with `generation` that stops once `cancel` fires.
    pub fn start_with_cancel<'p>(
        &self,
        paragraphs: &'p [ParagraphUnit],
        settings: &ReaderSettings,
        generation: u64,
        cancel: Arc<dyn CancelToken + Send + Sync>,
    ) -> Result<PaginationRun<'p>, PaginateError> {
        self.start_run(paragraphs, settings, generation, cancel)
    }

    fn start_run<'p>(
        &self,
        paragraphs: &'p [ParagraphUnit],
        settings: &ReaderSettings,
        generation: u64,
        cancel: Arc<dyn CancelToken + Send + Sync>,
    ) -> Result<PaginationRun<'p>, PaginateError> {
        let viewport = settings.viewport();
        if !viewport.is_valid() {
            return Err(PaginateError::DegenerateViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let style = settings.style();
        let text_scale = settings.effective_scale();
        let now = Instant::now();
        Ok(PaginationRun {
            paginator: self.clone(),
            paragraphs,
            key: settings.cache_key(),
            generation,
            cancel,
            content_width: style.content_width(viewport.width),
            safe_height: self.safe_usable_height(settings),
            spacing: style.paragraph_spacing_px(text_scale),
            line_height: style.line_height_px(text_scale),
            style,
            text_scale,
            cursor: 0,
            pages: Vec::new(),
            current: Vec::new(),
            current_height: 0.0,
            last_yield_progress: FLATTEN_PROGRESS_SPAN,
            last_yield_at: now,
            started_at: now,
            done: false,
        })
    }

    /// Paginate to completion.
    pub fn paginate(
        &self,
        paragraphs: &[ParagraphUnit],
        settings: &ReaderSettings,
    ) -> Result<Vec<PageUnit>, PaginateError> {
        self.paginate_with_progress(paragraphs, settings, |_| {})
    }

    /// Paginate to completion, reporting progress in `[0.5, 1.0]`.
    pub fn paginate_with_progress<F>(
        &self,
        paragraphs: &[ParagraphUnit],
        settings: &ReaderSettings,
        on_progress: F,
    ) -> Result<Vec<PageUnit>, PaginateError>
    where
        F: FnMut(f32),
    {
        let run = self.start(paragraphs, settings)?;
        Ok(run.run_to_completion(on_progress)?.pages)
    }
}

/// Pages produced by a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct PaginationResult {
    /// Generation the run was started with.
    pub generation: u64,
    /// Layout identity the pages were computed for.
    pub key: PaginationCacheKey,
    /// Pages in document order.
    pub pages: Vec<PageUnit>,
}

/// Outcome of one [`PaginationRun::step`].
#[derive(Clone, Debug, PartialEq)]
pub enum RunStatus {
    /// Work paused at a yield point.
    Yielded {
        /// Overall load progress in `[0.5, 1.0]`.
        progress: f32,
    },
    /// All paragraphs placed.
    Finished(PaginationResult),
    /// Generation superseded; partial pages were discarded.
    Cancelled {
        /// Generation of the abandoned run.
        generation: u64,
    },
}

/// Resumable pagination over a borrowed paragraph slice.
///
/// Each [`step`](Self::step) places paragraphs until a yield point, so a
/// host event loop can interleave other work. The page partition does not
/// depend on where yields fall. After a terminal status the run is spent and
/// `step` returns `None`.
pub struct PaginationRun<'p> {
    paginator: Paginator,
    paragraphs: &'p [ParagraphUnit],
    key: PaginationCacheKey,
    generation: u64,
    cancel: Arc<dyn CancelToken + Send + Sync>,
    style: TextStyle,
    text_scale: f32,
    content_width: f32,
    safe_height: f32,
    spacing: f32,
    line_height: f32,
    cursor: usize,
    pages: Vec<PageUnit>,
    current: Vec<ParagraphUnit>,
    current_height: f32,
    last_yield_progress: f32,
    last_yield_at: Instant,
    started_at: Instant,
    done: bool,
}

impl fmt::Debug for PaginationRun<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationRun")
            .field("generation", &self.generation)
            .field("key", &self.key)
            .field("cursor", &self.cursor)
            .field("total", &self.paragraphs.len())
            .field("pages", &self.pages.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<'p> PaginationRun<'p> {
    /// Generation this run was started with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Layout identity of this run.
    pub fn key(&self) -> &PaginationCacheKey {
        &self.key
    }

    /// Fit threshold in px.
    pub fn safe_height(&self) -> f32 {
        self.safe_height
    }

    /// Overall load progress in `[0.5, 1.0]`.
    pub fn progress(&self) -> f32 {
        let total = self.paragraphs.len();
        if total == 0 {
            return 1.0;
        }
        FLATTEN_PROGRESS_SPAN + (1.0 - FLATTEN_PROGRESS_SPAN) * self.cursor as f32 / total as f32
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Advance to the next yield point.
    pub fn step(&mut self) -> Option<RunStatus> {
        if self.done {
            return None;
        }
        if self.is_cancelled() {
            return Some(self.abort());
        }
        // Host time between steps is not continuous work.
        self.last_yield_at = Instant::now();
        let paragraphs = self.paragraphs;
        while let Some(paragraph) = paragraphs.get(self.cursor) {
            self.place(paragraph);
            self.cursor += 1;
            if self.cursor == paragraphs.len() {
                break;
            }
            let progress = self.progress();
            if progress - self.last_yield_progress >= self.paginator.opts.yield_progress_step
                || self.last_yield_at.elapsed() >= self.paginator.opts.yield_interval
            {
                self.last_yield_progress = progress;
                self.last_yield_at = Instant::now();
                return Some(RunStatus::Yielded { progress });
            }
        }
        if self.is_cancelled() {
            return Some(self.abort());
        }
        Some(self.finish())
    }

    /// Drive the run to a terminal state on the current thread.
    pub fn run_to_completion<F>(mut self, mut on_progress: F) -> Result<PaginationResult, PaginateError>
    where
        F: FnMut(f32),
    {
        while let Some(status) = self.step() {
            match status {
                RunStatus::Yielded { progress } => on_progress(progress),
                RunStatus::Finished(result) => {
                    on_progress(1.0);
                    return Ok(result);
                }
                RunStatus::Cancelled { generation } => {
                    return Err(PaginateError::Cancelled { generation });
                }
            }
        }
        Err(PaginateError::Cancelled {
            generation: self.generation,
        })
    }

    fn abort(&mut self) -> RunStatus {
        self.done = true;
        self.pages.clear();
        self.current.clear();
        log::debug!(
            "pagination generation {} superseded at {}/{}",
            self.generation,
            self.cursor,
            self.paragraphs.len()
        );
        self.paginator
            .emit_diagnostic(PaginationDiagnostic::Cancelled {
                generation: self.generation,
            });
        RunStatus::Cancelled {
            generation: self.generation,
        }
    }

    fn finish(&mut self) -> RunStatus {
        self.done = true;
        self.close_page();
        let pages = std::mem::take(&mut self.pages);
        let elapsed = self.started_at.elapsed().as_millis().min(u32::MAX as u128) as u32;
        log::debug!(
            "paginated {} paragraphs into {} pages in {}ms (generation {})",
            self.paragraphs.len(),
            pages.len(),
            elapsed,
            self.generation
        );
        self.paginator
            .emit_diagnostic(PaginationDiagnostic::PaginateTimeMs(elapsed));
        RunStatus::Finished(PaginationResult {
            generation: self.generation,
            key: self.key.clone(),
            pages,
        })
    }

    fn measure(&self, text: &str) -> f32 {
        self.paginator
            .measurer
            .measure_height(text, &self.style, self.content_width, self.text_scale)
    }

    fn paragraph_height(&self, paragraph: &ParagraphUnit) -> f32 {
        if paragraph.is_whitespace_only() {
            return self.spacing;
        }
        let measured = self.measure(&paragraph.plain_text);
        if paragraph.requires_rich_content {
            measured.max(self.line_height)
        } else {
            measured
        }
    }

    fn place(&mut self, paragraph: &ParagraphUnit) {
        let height = self.paragraph_height(paragraph);
        if height > self.safe_height && !paragraph.plain_text.is_empty() {
            self.place_oversized(paragraph, height);
            return;
        }
        let pre_spacing = if self.current.is_empty() {
            0.0
        } else {
            self.spacing
        };
        let tentative = self.current_height + pre_spacing + height;
        if tentative <= self.safe_height || self.current.is_empty() {
            self.current.push(paragraph.clone());
            self.current_height = tentative;
            return;
        }
        self.close_page();
        self.current.push(paragraph.clone());
        self.current_height = height;
    }

    fn place_oversized(&mut self, paragraph: &ParagraphUnit, height: f32) {
        self.paginator
            .emit_diagnostic(PaginationDiagnostic::OversizedParagraph {
                index: paragraph.index,
                height,
            });
        self.close_page();
        let sentences = split_sentences(&paragraph.plain_text);
        if sentences.len() <= 1 {
            log::debug!(
                "paragraph {} exceeds safe height ({:.1} > {:.1}) and cannot be split",
                paragraph.index,
                height,
                self.safe_height
            );
            self.pages.push(PageUnit::new(vec![paragraph.clone()]));
            return;
        }

        let mut pack: Vec<String> = Vec::with_capacity(sentences.len());
        let mut pack_height = 0.0f32;
        for sentence in sentences {
            if pack.is_empty() {
                pack_height = self.measure(&sentence);
                pack.push(sentence);
                continue;
            }
            pack.push(sentence);
            let candidate = self.measure(&pack.join(" "));
            if candidate <= self.safe_height {
                pack_height = candidate;
                continue;
            }
            let overflow = pack.pop();
            self.pages
                .push(PageUnit::new(vec![paragraph.split_unit(&pack)]));
            pack.clear();
            if let Some(sentence) = overflow {
                pack_height = self.measure(&sentence);
                pack.push(sentence);
            }
        }
        if !pack.is_empty() {
            self.current.push(paragraph.split_unit(&pack));
            self.current_height = pack_height;
        }
    }

    fn close_page(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let paragraphs = std::mem::take(&mut self.current);
        self.pages.push(PageUnit::new(paragraphs));
        self.current_height = 0.0;
    }
}

impl Iterator for PaginationRun<'_> {
    type Item = RunStatus;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}
