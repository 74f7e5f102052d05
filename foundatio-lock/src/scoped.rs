use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use foundatio_core::CancellationToken;

use crate::error::LockError;
use crate::provider::{AcquireOptions, Lock, LockProvider};

/// Decorator that prefixes every resource name with a fixed scope before
/// delegating to an inner provider: `"tenant-a"` and `"tenant-b"` scopes
/// over the same cache never collide on resource names.
///
/// The scope is set once at construction and has no setter, so it cannot be
/// changed after first use — the type system rules out a scope changing
/// mid-flight rather than checking for it at runtime.
pub struct ScopedLockProvider<P> {
    scope: String,
    inner: Arc<P>,
}

impl<P> ScopedLockProvider<P> {
    #[must_use]
    pub fn new(scope: impl Into<String>, inner: Arc<P>) -> Self {
        Self {
            scope: scope.into(),
            inner,
        }
    }

    fn scoped(&self, resource: &str) -> String {
        format!("{}:{resource}", self.scope)
    }
}

#[async_trait]
impl<P: LockProvider + 'static> LockProvider for ScopedLockProvider<P> {
    async fn acquire(
        self: Arc<Self>,
        resource: &str,
        opts: AcquireOptions,
        cancel: CancellationToken,
    ) -> Result<Option<Lock>, LockError> {
        let scoped_resource = self.scoped(resource);
        let inner = Arc::clone(&self.inner);
        let lock = inner.acquire(&scoped_resource, opts, cancel).await?;
        Ok(lock.map(|lock| Lock {
            resource: resource.to_owned(),
            lock_id: lock.lock_id,
        }))
    }

    async fn is_locked(&self, resource: &str) -> Result<bool, LockError> {
        self.inner.is_locked(&self.scoped(resource)).await
    }

    async fn is_held(&self, resource: &str, lock_id: &str) -> Result<bool, LockError> {
        self.inner.is_held(&self.scoped(resource), lock_id).await
    }

    async fn release(&self, resource: &str, lock_id: &str) -> Result<(), LockError> {
        self.inner.release(&self.scoped(resource), lock_id).await
    }

    async fn renew(&self, resource: &str, lock_id: &str, extension: Duration) -> Result<(), LockError> {
        self.inner.renew(&self.scoped(resource), lock_id, extension).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CacheLockProvider;
    use foundatio_cache::{Cache, InMemoryCache};
    use foundatio_messaging::{InMemoryMessageBus, LockReleased, MessageBus};

    fn inner() -> Arc<CacheLockProvider> {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let bus: Arc<dyn MessageBus<LockReleased>> = Arc::new(InMemoryMessageBus::new());
        Arc::new(CacheLockProvider::new(cache, bus))
    }

    #[tokio::test]
    async fn distinct_scopes_over_same_resource_do_not_collide() {
        let shared = inner();
        let tenant_a = Arc::new(ScopedLockProvider::new("tenant-a", shared.clone()));
        let tenant_b = Arc::new(ScopedLockProvider::new("tenant-b", shared));

        let lock_a = tenant_a
            .clone()
            .acquire("queue", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        let lock_b = tenant_b
            .clone()
            .acquire("queue", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap();

        assert!(lock_a.is_some());
        assert!(lock_b.is_some());
    }

    #[tokio::test]
    async fn same_scope_over_same_resource_does_collide() {
        let shared = inner();
        let tenant_a = Arc::new(ScopedLockProvider::new("tenant-a", shared));

        let _lock = tenant_a
            .clone()
            .acquire("queue", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let blocked = tenant_a
            .clone()
            .acquire("queue", AcquireOptions::default(), cancel)
            .await
            .unwrap();
        assert!(blocked.is_none());
    }

    #[tokio::test]
    async fn returned_lock_reports_unscoped_resource_name() {
        let shared = inner();
        let tenant_a = Arc::new(ScopedLockProvider::new("tenant-a", shared));
        let lock = tenant_a
            .clone()
            .acquire("queue", AcquireOptions::default(), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lock.resource, "queue");
    }
}
