use thiserror::Error;

use foundatio_cache::CacheError;

/// Errors from lock provider operations.
///
/// Cancellation is deliberately not an error: `acquire` returns `Ok(None)`
/// when the cancel signal fires rather than propagating an
/// `AcquireCancelled` variant, preferring result/option values over
/// control-flow exceptions for expected outcomes.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock backing store failed: {0}")]
    Backend(#[from] CacheError),

    #[error("invalid lock configuration: {0}")]
    Configuration(String),
}
