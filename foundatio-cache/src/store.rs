use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

/// The atomic single-key cache primitives consumed by the lock and queue
/// subsystems.
///
/// Every method is single-key atomic; no multi-key transactions are
/// required or assumed. Implementations must be `Send + Sync` for use
/// across async tasks.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Atomically insert `value` at `key` only if no live value is present.
    /// Returns `true` if the insert happened.
    async fn add_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>;

    /// Get the current value for `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Unconditionally set `key` to `value`, overwriting any prior value.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove `key` unconditionally. Returns `true` if it was present.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove `key` only if its current value equals `expected`. Returns
    /// `true` if the removal happened. This is the compare-and-swap
    /// primitive a lock's `release` uses so a stale holder can never
    /// disturb a lock that has since been reacquired by someone else.
    async fn remove_if_equal(&self, key: &str, expected: &str) -> Result<bool, CacheError>;

    /// Replace `key`'s value with `new_value` only if its current value
    /// equals `expected`, optionally resetting the TTL. Returns `true` if
    /// the replace happened.
    async fn replace_if_equal(
        &self,
        key: &str,
        expected: &str,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>;

    /// Atomically add `delta` to the integer counter at `key`, creating it
    /// at zero first if absent. Returns the new value.
    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>)
        -> Result<i64, CacheError>;

    /// Return the remaining TTL for `key`, or `None` if it has no TTL or
    /// does not exist.
    async fn get_expiration(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Set (or reset) the TTL on an existing key. A no-op if the key is
    /// absent.
    async fn set_expiration(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Return `true` if `key` is present and unexpired.
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }
}
