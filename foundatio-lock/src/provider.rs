use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{instrument, warn};

use foundatio_cache::Cache;
use foundatio_core::{CancellationToken, MetricsSink, NoopMetricsSink};
use foundatio_messaging::{LockReleased, MessageBus};

use crate::error::LockError;
use crate::token::generate_lock_id;
use crate::wakeup::WakeupRegistry;

/// Default time until a held lock expires if never renewed.
pub const DEFAULT_TTL: Duration = Duration::from_secs(20 * 60);

const MIN_POLL_DELAY: Duration = Duration::from_millis(50);
const MAX_POLL_DELAY: Duration = Duration::from_secs(3);
const SLOW_ACQUIRE_THRESHOLD: Duration = Duration::from_secs(5);

const RELEASED_TOPIC: &str = "cache_lock_released";

fn clamp_delay(delay: Duration) -> Duration {
    delay.clamp(MIN_POLL_DELAY, MAX_POLL_DELAY)
}

/// Options controlling a single [`LockProvider::acquire`] call.
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// Time until the lease expires if never renewed. A value of
    /// [`Duration::ZERO`] means "no TTL" — the lock is held until an
    /// explicit release.
    pub time_until_expires: Duration,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            time_until_expires: DEFAULT_TTL,
        }
    }
}

/// A successfully acquired lock. Dropping it without calling
/// [`LockProvider::release`] is allowed — the lease simply expires at its
/// TTL — but explicit release frees the resource for waiters immediately.
#[derive(Debug, Clone)]
pub struct Lock {
    pub resource: String,
    pub lock_id: String,
}

/// Mutual-exclusion lease over a named resource.
///
/// `acquire` takes `self: Arc<Self>` so the returned [`Lock`] need not carry
/// a circular reference back to the provider — callers hold their own
/// `Arc<dyn LockProvider>` and pass `lock.resource`/`lock.lock_id` back into
/// [`release`](Self::release)/[`renew`](Self::renew).
/// [`crate::ThrottlingLockProvider`] and [`crate::ScopedLockProvider`]
/// implement the same trait with different semantics.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Block until `resource` is acquired or `cancel` fires. Returns
    /// `Ok(None)` on cancellation rather than an error.
    async fn acquire(
        self: Arc<Self>,
        resource: &str,
        opts: AcquireOptions,
        cancel: CancellationToken,
    ) -> Result<Option<Lock>, LockError>;

    /// Return `true` if `resource` is currently held by anyone.
    async fn is_locked(&self, resource: &str) -> Result<bool, LockError>;

    /// Return `true` if `resource` is currently held by `lock_id`
    /// specifically.
    async fn is_held(&self, resource: &str, lock_id: &str) -> Result<bool, LockError>;

    /// Release `resource` if it is still held by `lock_id`. A no-op
    /// (not an error) if the lock already expired or was reacquired by
    /// someone else — enforced by a compare-and-swap against the stored
    /// `lock_id`.
    async fn release(&self, resource: &str, lock_id: &str) -> Result<(), LockError>;

    /// Extend `resource`'s TTL by `extension` if it is still held by
    /// `lock_id`. A no-op on mismatch.
    async fn renew(&self, resource: &str, lock_id: &str, extension: Duration) -> Result<(), LockError>;
}

fn lock_key(resource: &str) -> String {
    format!("lock:{resource}")
}

/// Cache-backed [`LockProvider`] implementation.
///
/// The lock is a single cache key whose value is the holder's `lock_id`.
/// Acquisition is `add_if_absent`; waiting combines a per-resource wake-up
/// event (for same-process waiters) with a subscription to the shared
/// message bus's `released` topic (for waiters in other processes sharing
/// the same cache+bus), falling back to a clamped poll timer either way.
pub struct CacheLockProvider {
    cache: Arc<dyn Cache>,
    bus: Arc<dyn MessageBus<LockReleased>>,
    wakeup: WakeupRegistry,
    subscribed: OnceCell<()>,
    metrics: Arc<dyn MetricsSink>,
}

impl CacheLockProvider {
    /// Create a new lock provider over the given cache and message bus.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, bus: Arc<dyn MessageBus<LockReleased>>) -> Self {
        Self {
            cache,
            bus,
            wakeup: WakeupRegistry::new(),
            subscribed: OnceCell::new(),
            metrics: Arc::new(NoopMetricsSink),
        }
    }

    /// Attach a metrics sink used to report slow acquisitions.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Subscribe to the shared `released` topic exactly once for this
    /// provider instance, forwarding every message into the local wake-up
    /// registry. Guarded by `OnceCell` so the subscription only ever
    /// happens once per provider instance.
    async fn ensure_subscribed(self: &Arc<Self>) {
        self.subscribed
            .get_or_init(|| async {
                let mut sub = self.bus.subscribe(RELEASED_TOPIC);
                let provider = Arc::clone(self);
                tokio::spawn(async move {
                    while let Some(message) = sub.recv().await {
                        provider.wakeup.notify(&message.resource);
                    }
                });
            })
            .await;
    }

    async fn try_insert(&self, resource: &str, lock_id: &str, ttl: Duration) -> Result<bool, LockError> {
        let ttl = (!ttl.is_zero()).then_some(ttl);
        self.cache
            .add_if_absent(&lock_key(resource), lock_id, ttl)
            .await
            .map_err(LockError::from)
    }
}

#[async_trait]
impl LockProvider for CacheLockProvider {
    #[instrument(skip(self, cancel), fields(resource))]
    async fn acquire(
        self: Arc<Self>,
        resource: &str,
        opts: AcquireOptions,
        cancel: CancellationToken,
    ) -> Result<Option<Lock>, LockError> {
        let lock_id = generate_lock_id();
        let started = Instant::now();

        loop {
            // Always make one best-effort attempt, even if already
            // cancelled, matching the "drain on shutdown" convention.
            match self.try_insert(resource, &lock_id, opts.time_until_expires).await {
                Ok(true) => {
                    let elapsed = started.elapsed();
                    if elapsed > SLOW_ACQUIRE_THRESHOLD {
                        self.metrics.timer("lock.acquire_ms", elapsed.as_millis() as f64);
                    }
                    return Ok(Some(Lock {
                        resource: resource.to_owned(),
                        lock_id,
                    }));
                }
                Ok(false) => {}
                Err(err) => {
                    // Backing store errors during acquire are treated as
                    // "did not acquire"; the loop continues under the
                    // cancel signal rather than propagating.
                    warn!(resource, error = %err, "cache error while acquiring lock, will retry");
                }
            }

            if cancel.is_cancelled() {
                return Ok(None);
            }

            self.ensure_subscribed().await;
            let notify = self.wakeup.subscribe(resource);

            let remaining = self
                .cache
                .get_expiration(&lock_key(resource))
                .await
                .unwrap_or(None)
                .unwrap_or(MIN_POLL_DELAY);
            let delay = clamp_delay(remaining);

            tokio::select! {
                () = notify.notified() => {}
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    self.wakeup.unsubscribe(resource, notify);
                    return Ok(None);
                }
            }
            self.wakeup.unsubscribe(resource, notify);
        }
    }

    async fn is_locked(&self, resource: &str) -> Result<bool, LockError> {
        Ok(self.cache.exists(&lock_key(resource)).await?)
    }

    async fn is_held(&self, resource: &str, lock_id: &str) -> Result<bool, LockError> {
        Ok(self.cache.get(&lock_key(resource)).await?.as_deref() == Some(lock_id))
    }

    async fn release(&self, resource: &str, lock_id: &str) -> Result<(), LockError> {
        match self.cache.remove_if_equal(&lock_key(resource), lock_id).await {
            Ok(_) => {}
            Err(err) => warn!(resource, error = %err, "cache error releasing lock"),
        }
        // The wake-up publish happens even on an idempotent no-op release
        // so that waiters are always notified.
        let _ = self
            .bus
            .publish(
                RELEASED_TOPIC,
                LockReleased {
                    resource: resource.to_owned(),
                    lock_id: lock_id.to_owned(),
                },
            )
            .await;
        self.wakeup.notify(resource);
        Ok(())
    }

    async fn renew(&self, resource: &str, lock_id: &str, extension: Duration) -> Result<(), LockError> {
        let ttl = (!extension.is_zero()).then_some(extension);
        match self
            .cache
            .replace_if_equal(&lock_key(resource), lock_id, lock_id, ttl)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(resource, error = %err, "cache error renewing lock");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundatio_cache::InMemoryCache;
    use foundatio_messaging::InMemoryMessageBus;

    fn provider() -> Arc<CacheLockProvider> {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let bus: Arc<dyn MessageBus<LockReleased>> = Arc::new(InMemoryMessageBus::new());
        Arc::new(CacheLockProvider::new(cache, bus))
    }

    #[tokio::test]
    async fn acquire_uncontested_succeeds() {
        let provider = provider();
        let lock = provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert!(lock.is_some());
    }

    #[tokio::test]
    async fn second_acquire_blocks_until_release() {
        let provider = provider();
        let lock = provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        let p2 = provider.clone();
        let waiter = tokio::spawn(async move {
            p2.acquire("r", AcquireOptions::default(), CancellationToken::new())
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        provider.release(&lock.resource, &lock.lock_id).await.unwrap();

        let second = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("should not time out")
            .unwrap()
            .unwrap();
        assert!(second.is_some(), "should acquire after release");
    }

    #[tokio::test]
    async fn release_is_idempotent_and_does_not_disturb_new_holder() {
        let provider = provider();
        let lock = provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        provider.release(&lock.resource, &lock.lock_id).await.unwrap();

        let new_holder = provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        // The original holder releases again -- must not disturb the new one.
        provider.release(&lock.resource, &lock.lock_id).await.unwrap();

        assert!(provider
            .is_held(&new_holder.resource, &new_holder.lock_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn renew_extends_only_for_current_holder() {
        let provider = provider();
        let lock = provider
            .clone()
            .acquire(
                "r",
                AcquireOptions {
                    time_until_expires: Duration::from_secs(5),
                },
                CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();

        provider
            .renew(&lock.resource, &lock.lock_id, Duration::from_secs(30))
            .await
            .unwrap();
        assert!(provider.is_held(&lock.resource, &lock.lock_id).await.unwrap());

        // Renew with the wrong lock_id is a no-op, not an error.
        provider
            .renew(&lock.resource, "not-the-holder", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(provider.is_held(&lock.resource, &lock.lock_id).await.unwrap());
    }

    #[tokio::test]
    async fn acquire_cancelled_returns_none() {
        let provider = provider();
        let _held = provider
            .clone()
            .acquire("r", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = provider
            .clone()
            .acquire("r", AcquireOptions::default(), cancel)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_means_no_expiry() {
        let provider = provider();
        let lock = provider
            .clone()
            .acquire(
                "r",
                AcquireOptions {
                    time_until_expires: Duration::ZERO,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.cache.get_expiration(&lock_key(&lock.resource)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_contention_only_one_winner_at_a_time() {
        let provider = provider();
        let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let provider = provider.clone();
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let lock = provider
                    .clone()
                    .acquire(
                        "contended",
                        AcquireOptions {
                            time_until_expires: Duration::from_millis(200),
                        },
                        CancellationToken::new(),
                    )
                    .await
                    .unwrap()
                    .unwrap();
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                provider.release(&lock.resource, &lock.lock_id).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 8);
    }
}
