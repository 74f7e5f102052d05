use thiserror::Error;

/// Errors from cache operations.
///
/// Transient backend failures (`Connection`) are the only kind the lock and
/// queue layers treat specially: they are retried by the caller's own
/// resilience policy and never surfaced as "lock not acquired" or "queue
/// empty" on their own.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Connection(String),

    #[error("value at key {0:?} is not a valid integer counter")]
    NotACounter(String),
}
