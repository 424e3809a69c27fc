//! Mapping between page index, paragraph index and continuous progress.

/// Anything that knows the paragraph index it starts at.
pub trait PageAnchor {
    /// Index of the first paragraph on this page, if any.
    fn first_paragraph_index(&self) -> Option<usize>;
}

impl PageAnchor for usize {
    fn first_paragraph_index(&self) -> Option<usize> {
        Some(*self)
    }
}

/// Reading position within a paginated document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    /// Zero-based page index.
    pub page_index: usize,
    /// Page count of the current pagination.
    pub total_pages: usize,
    /// Continuous progress in `[0, 1]`.
    pub progress: f32,
}

impl Position {
    /// Position for a page, with the index clamped into range.
    pub fn new(page_index: usize, total_pages: usize) -> Self {
        let page_index = page_index.min(total_pages.saturating_sub(1));
        Self {
            page_index,
            total_pages,
            progress: progress_for_page(page_index, total_pages),
        }
    }

    /// Position nearest to a progress value.
    pub fn from_progress(progress: f32, total_pages: usize) -> Self {
        Self::new(page_for_progress(progress, total_pages), total_pages)
    }

    /// Whether this is the last page (or the document is empty).
    pub fn is_last_page(&self) -> bool {
        self.page_index + 1 >= self.total_pages
    }
}

/// Index of the last page whose first paragraph is `<= paragraph_index`.
///
/// Returns 0 when there are no pages or no page qualifies.
pub fn page_index_for_paragraph<P: PageAnchor>(pages: &[P], paragraph_index: usize) -> usize {
    pages
        .iter()
        .rposition(|page| {
            page.first_paragraph_index()
                .is_some_and(|first| first <= paragraph_index)
        })
        .unwrap_or(0)
}

/// `page_index / (total_pages - 1)`, or 0 for zero or one page.
pub fn progress_for_page(page_index: usize, total_pages: usize) -> f32 {
    if total_pages <= 1 {
        return 0.0;
    }
    let max_index = total_pages - 1;
    (page_index.min(max_index) as f64 / max_index as f64) as f32
}

/// Nearest page to `progress`, clamped to `[0, total_pages - 1]`.
///
/// Non-finite progress maps to page 0.
pub fn page_for_progress(progress: f32, total_pages: usize) -> usize {
    if total_pages <= 1 {
        return 0;
    }
    let max_index = total_pages - 1;
    let normalized = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let rounded = (normalized as f64 * max_index as f64).round();
    if rounded <= 0.0 {
        return 0;
    }
    (rounded as usize).min(max_index)
}

/// Carry a page index across a repagination by progress ratio.
pub fn remap_page_by_progress(old_page: usize, old_total: usize, new_total: usize) -> usize {
    page_for_progress(progress_for_page(old_page, old_total), new_total)
}
