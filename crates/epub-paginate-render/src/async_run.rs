//! Cooperative driver for tokio hosts.

use crate::error::PaginateError;
use crate::paginator::{PaginationResult, PaginationRun, RunStatus};

/// Drive `run` to completion, handing control back to the tokio scheduler
/// at every yield point.
pub async fn paginate_cooperative<F>(
    mut run: PaginationRun<'_>,
    mut on_progress: F,
) -> Result<PaginationResult, PaginateError>
where
    F: FnMut(f32),
{
    let generation = run.generation();
    while let Some(status) = run.step() {
        match status {
            RunStatus::Yielded { progress } => {
                on_progress(progress);
                tokio::task::yield_now().await;
            }
            RunStatus::Finished(result) => {
                on_progress(1.0);
                return Ok(result);
            }
            RunStatus::Cancelled { generation } => {
                return Err(PaginateError::Cancelled { generation });
            }
        }
    }
    Err(PaginateError::Cancelled { generation })
}
