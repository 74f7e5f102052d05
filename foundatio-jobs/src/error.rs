use thiserror::Error;

use foundatio_lock::LockError;
use foundatio_queue::QueueError;

/// Errors surfaced by [`crate::JobRunner`] (spec §4.6, C6).
#[derive(Debug, Error)]
pub enum JobError {
    #[error("queue operation failed: {0}")]
    Queue(#[from] QueueError),

    #[error("lock operation failed: {0}")]
    Lock(#[from] LockError),

    /// Raised by [`crate::EntryProcessor::process`]. The runner abandons
    /// the entry (driving the normal retry/dead-letter policy) and
    /// propagates this to the caller of `run_once`/`run_n_times`; it never
    /// stops a `run_continuous` loop.
    #[error("job processing failed: {0}")]
    Processing(String),
}
