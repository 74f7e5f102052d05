use std::sync::Arc;
use std::time::Duration;

use foundatio_core::CancellationToken;

use crate::error::LockError;
use crate::provider::{AcquireOptions, LockProvider};

/// Run the throttling lock provider conformance suite against any
/// [`LockProvider`] backed by [`crate::ThrottlingLockProvider`]'s
/// permit-counter semantics.
///
/// This is deliberately **not** [`run_lock_conformance_tests`]: a throttle
/// has no holder identity and no release, so the mutex suite's
/// "is_held reflects the holder" and "a cancelled contender is refused while
/// another holds the resource" assertions don't apply. `provider` must have
/// been constructed with the given `max_hits`/`period` so this suite can
/// drive it to its cap and back.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_throttle_conformance_tests(
    provider: Arc<dyn LockProvider>,
    max_hits: i64,
    period: Duration,
) -> Result<(), LockError> {
    test_cap_per_window(Arc::clone(&provider), max_hits).await?;
    test_release_and_renew_are_noops(Arc::clone(&provider)).await?;
    test_is_held_reports_outstanding_permit_not_identity(Arc::clone(&provider)).await?;
    test_blocked_acquire_unblocks_at_window_boundary(provider, max_hits, period).await?;
    Ok(())
}

async fn test_cap_per_window(provider: Arc<dyn LockProvider>, max_hits: i64) -> Result<(), LockError> {
    for _ in 0..max_hits {
        let lock = provider
            .clone()
            .acquire("throttle-cap", AcquireOptions::default(), CancellationToken::new())
            .await?;
        assert!(lock.is_some(), "acquire within max_hits should succeed");
    }
    assert!(
        provider.is_locked("throttle-cap").await?,
        "window should report exhausted once max_hits is reached"
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let overflow = provider
        .clone()
        .acquire("throttle-cap", AcquireOptions::default(), cancel)
        .await?;
    assert!(overflow.is_none(), "a cancelled acquire past the cap must not be granted");
    Ok(())
}

async fn test_release_and_renew_are_noops(provider: Arc<dyn LockProvider>) -> Result<(), LockError> {
    provider.release("throttle-noop", "whatever").await?;
    provider.renew("throttle-noop", "whatever", Duration::from_secs(1)).await?;
    Ok(())
}

async fn test_is_held_reports_outstanding_permit_not_identity(
    provider: Arc<dyn LockProvider>,
) -> Result<(), LockError> {
    let lock = provider
        .clone()
        .acquire("throttle-held", AcquireOptions::default(), CancellationToken::new())
        .await?
        .expect("should acquire uncontested permit");

    // A throttle has no per-holder identity, so unlike the mutex suite's
    // "is_held reflects the holder", any lock_id answers the same question:
    // "is a permit outstanding in this window?"
    assert!(provider.is_held(&lock.resource, &lock.lock_id).await?);
    assert!(provider.is_held(&lock.resource, "not-the-holder").await?);
    Ok(())
}

async fn test_blocked_acquire_unblocks_at_window_boundary(
    provider: Arc<dyn LockProvider>,
    max_hits: i64,
    period: Duration,
) -> Result<(), LockError> {
    for _ in 0..max_hits {
        provider
            .clone()
            .acquire("throttle-boundary", AcquireOptions::default(), CancellationToken::new())
            .await?;
    }

    let wait_for_next_window = tokio::time::timeout(
        period * 5 + Duration::from_secs(2),
        provider
            .clone()
            .acquire("throttle-boundary", AcquireOptions::default(), CancellationToken::new()),
    )
    .await
    .expect("acquire should unblock once the window rolls over, not hang")?;
    assert!(wait_for_next_window.is_some());
    Ok(())
}

fn opts(ttl_secs: u64) -> AcquireOptions {
    AcquireOptions {
        time_until_expires: Duration::from_secs(ttl_secs),
    }
}

/// Run the full lock provider conformance test suite against any
/// [`LockProvider`] implementation.
///
/// Call this from a backend's own test module with a fresh provider
/// instance, the same way `run_cache_conformance_tests` is used for
/// [`foundatio_cache::Cache`] backends.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_lock_conformance_tests(provider: Arc<dyn LockProvider>) -> Result<(), LockError> {
    test_acquire_and_release(Arc::clone(&provider)).await?;
    test_acquire_contention(Arc::clone(&provider)).await?;
    test_renew_keeps_lock_held(Arc::clone(&provider)).await?;
    test_is_held_reflects_holder(Arc::clone(&provider)).await?;
    test_release_is_idempotent(provider).await?;
    Ok(())
}

async fn test_acquire_and_release(provider: Arc<dyn LockProvider>) -> Result<(), LockError> {
    let lock = provider
        .clone()
        .acquire("conformance-1", opts(10), CancellationToken::new())
        .await?;
    let lock = lock.expect("should acquire uncontested lock");
    provider.release(&lock.resource, &lock.lock_id).await?;
    Ok(())
}

async fn test_acquire_contention(provider: Arc<dyn LockProvider>) -> Result<(), LockError> {
    let held = provider
        .clone()
        .acquire("conformance-2", opts(10), CancellationToken::new())
        .await?
        .expect("should acquire uncontested lock");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let second = provider
        .clone()
        .acquire("conformance-2", opts(10), cancel)
        .await?;
    assert!(
        second.is_none(),
        "acquire on a held resource should not succeed while cancelled"
    );

    provider.release(&held.resource, &held.lock_id).await?;
    Ok(())
}

async fn test_renew_keeps_lock_held(provider: Arc<dyn LockProvider>) -> Result<(), LockError> {
    let lock = provider
        .clone()
        .acquire("conformance-3", opts(5), CancellationToken::new())
        .await?
        .expect("should acquire lock");

    provider
        .renew(&lock.resource, &lock.lock_id, Duration::from_secs(10))
        .await?;
    assert!(
        provider.is_held(&lock.resource, &lock.lock_id).await?,
        "lock should still be held after renew"
    );

    provider.release(&lock.resource, &lock.lock_id).await?;
    Ok(())
}

async fn test_is_held_reflects_holder(provider: Arc<dyn LockProvider>) -> Result<(), LockError> {
    let lock = provider
        .clone()
        .acquire("conformance-4", opts(10), CancellationToken::new())
        .await?
        .expect("should acquire lock");

    assert!(provider.is_held(&lock.resource, &lock.lock_id).await?);
    assert!(!provider.is_held(&lock.resource, "someone-else").await?);

    provider.release(&lock.resource, &lock.lock_id).await?;
    Ok(())
}

async fn test_release_is_idempotent(provider: Arc<dyn LockProvider>) -> Result<(), LockError> {
    let lock = provider
        .clone()
        .acquire("conformance-5", opts(10), CancellationToken::new())
        .await?
        .expect("should acquire lock");

    provider.release(&lock.resource, &lock.lock_id).await?;
    // Releasing again, after someone else may have already acquired the
    // resource, must not error and must not be treated as re-acquiring it.
    provider.release(&lock.resource, &lock.lock_id).await?;
    Ok(())
}
