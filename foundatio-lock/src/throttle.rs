use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use foundatio_cache::Cache;
use foundatio_core::CancellationToken;

use crate::error::LockError;
use crate::provider::{AcquireOptions, Lock, LockProvider};
use crate::token::generate_lock_id;

const MIN_POLL_DELAY: Duration = Duration::from_millis(50);

/// Extra TTL past the window boundary so a key touched right at the edge
/// doesn't expire a moment early and let the next caller see a reset count
/// while still inside the old window.
const GRACE: Duration = Duration::from_millis(50);

/// Bucket `now` into its window under `period` (spec §4.2: `floor(now,
/// period)`), at full `Duration` resolution rather than whole seconds so a
/// sub-second `period` (e.g. the 100ms window in spec scenario S5) gets its
/// own bucket instead of collapsing into a one-second bucket.
fn window_key(resource: &str, period: Duration, now: Duration) -> String {
    let period_ms = period.as_millis().max(1);
    let bucket = now.as_millis() / period_ms;
    format!("throttle:{resource}:{bucket}")
}

/// Time remaining until `now`'s window rolls over (spec §4.2: `ceil(now,
/// period)`), floored at `MIN_POLL_DELAY` so a caller right at the boundary
/// doesn't spin.
fn time_until_next_window(period: Duration, now: Duration) -> Duration {
    let period_ms = period.as_millis().max(1);
    let elapsed_ms = now.as_millis() % period_ms;
    let remaining_ms = u64::try_from(period_ms - elapsed_ms).unwrap_or(u64::MAX);
    Duration::from_millis(remaining_ms).max(MIN_POLL_DELAY)
}

/// TTL to stamp on the window's counter key: spans to the window boundary
/// plus a small grace period (spec §4.2: `ceil(now, period) + grace`).
fn window_ttl(period: Duration, now: Duration) -> Duration {
    time_until_next_window(period, now) + GRACE
}

/// Rate limiter exposed through the [`LockProvider`] interface: "acquire"
/// succeeds up to `max_hits` times per rolling `period`, then blocks (or is
/// cancelled) until the next window opens.
///
/// `release`/`renew` are no-ops — a throttle permit is not returned, it
/// simply expires with its counting window. Built on the cache's
/// `increment` primitive, the same CAS-free atomic counter used to count
/// hits per window.
pub struct ThrottlingLockProvider {
    cache: Arc<dyn Cache>,
    max_hits: i64,
    period: Duration,
}

impl ThrottlingLockProvider {
    /// Allow up to `max_hits` acquisitions per rolling `period`.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, max_hits: i64, period: Duration) -> Self {
        Self {
            cache,
            max_hits,
            period,
        }
    }

    fn now_since_epoch() -> Duration {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
    }

    async fn hits_in_current_window(&self, resource: &str) -> Result<i64, LockError> {
        let now = Self::now_since_epoch();
        let key = window_key(resource, self.period, now);
        Ok(self
            .cache
            .increment(&key, 0, Some(window_ttl(self.period, now)))
            .await?)
    }
}

#[async_trait]
impl LockProvider for ThrottlingLockProvider {
    #[instrument(skip(self, cancel), fields(resource))]
    async fn acquire(
        self: Arc<Self>,
        resource: &str,
        _opts: AcquireOptions,
        cancel: CancellationToken,
    ) -> Result<Option<Lock>, LockError> {
        loop {
            let now = Self::now_since_epoch();
            let key = window_key(resource, self.period, now);
            let ttl = window_ttl(self.period, now);
            let hits = self.cache.increment(&key, 1, Some(ttl)).await?;

            if hits <= self.max_hits {
                return Ok(Some(Lock {
                    resource: resource.to_owned(),
                    lock_id: generate_lock_id(),
                }));
            }

            if cancel.is_cancelled() {
                return Ok(None);
            }

            let delay = time_until_next_window(self.period, now);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return Ok(None),
            }
        }
    }

    async fn is_locked(&self, resource: &str) -> Result<bool, LockError> {
        Ok(self.hits_in_current_window(resource).await? >= self.max_hits)
    }

    async fn is_held(&self, _resource: &str, _lock_id: &str) -> Result<bool, LockError> {
        Ok(true)
    }

    async fn release(&self, _resource: &str, _lock_id: &str) -> Result<(), LockError> {
        Ok(())
    }

    async fn renew(&self, _resource: &str, _lock_id: &str, _extension: Duration) -> Result<(), LockError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundatio_cache::InMemoryCache;

    fn provider(max_hits: i64, period: Duration) -> Arc<ThrottlingLockProvider> {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        Arc::new(ThrottlingLockProvider::new(cache, max_hits, period))
    }

    #[tokio::test]
    async fn allows_up_to_max_hits_per_window() {
        let provider = provider(3, Duration::from_secs(60));
        for _ in 0..3 {
            let lock = provider
                .clone()
                .acquire("r", AcquireOptions::default(), CancellationToken::new())
                .await
                .unwrap();
            assert!(lock.is_some());
        }
    }

    #[tokio::test]
    async fn fourth_hit_in_window_is_cancelled_rather_than_granted() {
        let provider = provider(1, Duration::from_secs(60));
        provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let second = provider
            .clone()
            .acquire("r", AcquireOptions::default(), cancel)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn is_locked_reflects_exhausted_window() {
        let provider = provider(1, Duration::from_secs(60));
        assert!(!provider.is_locked("r").await.unwrap());
        provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert!(provider.is_locked("r").await.unwrap());
    }

    #[tokio::test]
    async fn release_and_renew_are_harmless_no_ops() {
        let provider = provider(1, Duration::from_secs(60));
        provider.release("r", "whatever").await.unwrap();
        provider
            .renew("r", "whatever", Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sub_second_period_blocks_to_its_own_window_not_a_full_second() {
        let provider = provider(1, Duration::from_millis(100));
        let first = provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert!(first.is_some());

        let started = std::time::Instant::now();
        let second = provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        let waited = started.elapsed();

        assert!(second.is_some());
        assert!(
            waited < Duration::from_millis(500),
            "waited {waited:?} for a 100ms window to roll over; whole-second bucketing regressed"
        );
    }

    #[tokio::test]
    async fn distinct_resources_have_independent_windows() {
        let provider = provider(1, Duration::from_secs(60));
        let a = provider
            .clone()
            .acquire("a", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        let b = provider
            .clone()
            .acquire("b", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert!(a.is_some());
        assert!(b.is_some());
    }
}
