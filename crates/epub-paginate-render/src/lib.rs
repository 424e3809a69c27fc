//! Page construction, layout identity, and pagination lifecycle for
//! `epub-paginate`.

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

#[cfg(feature = "async")]
mod async_run;
mod cache;
mod controller;
mod error;
mod measure;
mod page;
mod paginator;
mod settings;

#[cfg(feature = "async")]
pub use async_run::paginate_cooperative;
pub use cache::{MemoryPageCache, PageCacheStore};
pub use controller::{
    CommitOutcome, GenerationToken, PaginationController, PaginationState, RequestOutcome,
};
pub use epub_paginate::{ParagraphUnit, Position};
pub use error::PaginateError;
pub use measure::{
    normalize_scale, safe_usable_height, HeuristicTextMeasurer, TextMeasurer, TextStyle,
};
pub use page::{ContentFingerprint, PageSummary, PageUnit, PaginationCacheKey, ViewportSize};
pub use paginator::{
    CancelToken, NeverCancel, PaginationDiagnostic, PaginationResult, PaginationRun, Paginator,
    PaginatorOptions, RunStatus,
};
pub use settings::ReaderSettings;
