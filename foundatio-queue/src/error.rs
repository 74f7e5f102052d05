use thiserror::Error;

/// Errors from queue operations (spec §7's error taxonomy, the parts that
/// apply to C4/C5).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend failed: {0}")]
    Backend(String),

    /// Raised by `renew`/`complete`/`abandon` when the entry's lease was
    /// already taken over by maintenance (or another holder). The caller
    /// should treat this as "someone else will process it".
    #[error("lease was lost to auto-abandon or another holder")]
    LeaseLost,

    /// Raised by `complete`/`abandon` on an entry that already completed
    /// a terminal transition. Non-retryable.
    #[error("entry is already in a terminal state")]
    InvalidEntryState,

    #[error("invalid queue configuration: {0}")]
    ConfigurationInvalid(String),
}
