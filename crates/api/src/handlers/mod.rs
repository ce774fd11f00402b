pub mod finetune;
pub mod form;
pub mod generate;
pub mod headshot;

use std::future::Future;

use crate::error::{AppError, AppResult};

/// Run provider work on its own task and wait for it.
///
/// The work outlives the request future: a client disconnect or the request
/// timeout stops the wait, not the job. A panicking job is reported as an
/// internal error.
pub(crate) async fn run_detached<T, F>(work: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| AppError::InternalError(format!("Job task failed: {e}")))?
}
