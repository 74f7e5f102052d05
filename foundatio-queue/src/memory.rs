use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use uuid::Uuid;

use foundatio_core::{CancellationToken, Clock, EntryId, LeaseToken, SystemClock};
use foundatio_messaging::{MessageBus, QueueEnqueued};

use crate::config::QueueConfig;
use crate::entry::QueueEntry;
use crate::envelope::WorkItemEnvelope;
use crate::error::QueueError;
use crate::events::QueueEventHandler;
use crate::queue::{Maintainable, Queue};
use crate::stats::QueueStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    In,
    Work,
    Wait,
    Dead,
}

struct EntryRecord<T> {
    envelope: WorkItemEnvelope<T>,
    bucket: Bucket,
    lease_token: Option<LeaseToken>,
    dequeued_at: Option<DateTime<Utc>>,
    not_before: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    deadletter: AtomicU64,
    queued: AtomicU64,
    working: AtomicU64,
}

/// In-process [`Queue`] implementation over a [`DashMap`] plus a handful of
/// small auxiliary structures for each bucket (spec §6's conceptual key
/// layout, generalized: the abstract cache contract has no primitive for an
/// ordered or time-indexed collection, so buckets are modeled directly
/// rather than through [`foundatio_cache::Cache`]).
///
/// The `wait` bucket's time index is a `RwLock<BTreeMap<i64, Vec<EntryId>>>`
/// keyed by not-before-in-millis, the same shape
/// `acteon-state-memory::store::MemoryStateStore` uses for its TTL index.
pub struct InMemoryQueue<T> {
    name: String,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    bus: Arc<dyn MessageBus<QueueEnqueued>>,
    entries: DashMap<EntryId, EntryRecord<T>>,
    ready: Mutex<VecDeque<EntryId>>,
    wait_index: RwLock<BTreeMap<i64, Vec<EntryId>>>,
    dead: Mutex<VecDeque<EntryId>>,
    counters: Counters,
    notify: Notify,
    handlers: Mutex<Vec<Arc<dyn QueueEventHandler<T>>>>,
}

impl<T> InMemoryQueue<T> {
    #[must_use]
    pub fn new(name: impl Into<String>, config: QueueConfig, bus: Arc<dyn MessageBus<QueueEnqueued>>) -> Self {
        Self {
            name: name.into(),
            config,
            clock: Arc::new(SystemClock),
            bus,
            entries: DashMap::new(),
            ready: Mutex::new(VecDeque::new()),
            wait_index: RwLock::new(BTreeMap::new()),
            dead: Mutex::new(VecDeque::new()),
            counters: Counters::default(),
            notify: Notify::new(),
            handlers: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn notify_handlers(&self, f: impl Fn(&dyn QueueEventHandler<T>)) {
        let handlers = self.handlers.lock().expect("handler list mutex poisoned");
        for handler in handlers.iter() {
            f(handler.as_ref());
        }
    }

    fn pop_ready(&self) -> Option<EntryId> {
        self.ready.lock().expect("ready queue mutex poisoned").pop_front()
    }

    fn lease(&self, id: EntryId) -> QueueEntry<T>
    where
        T: Clone,
    {
        let lease_token = LeaseToken::new(Uuid::new_v4().to_string());
        let now = self.clock.now();

        let envelope = {
            let mut record = self
                .entries
                .get_mut(&id)
                .expect("ready id must have a backing record");
            record.bucket = Bucket::Work;
            record.lease_token = Some(lease_token.clone());
            record.dequeued_at = Some(now);
            record.envelope.clone()
        };

        self.counters.queued.fetch_sub(1, Ordering::SeqCst);
        self.counters.working.fetch_add(1, Ordering::SeqCst);
        self.counters.dequeued.fetch_add(1, Ordering::SeqCst);

        self.notify_handlers(|h| h.on_dequeued(&id));
        QueueEntry::new(envelope, lease_token, now)
    }

    fn move_to_ready(&self, id: EntryId) {
        self.ready.lock().expect("ready queue mutex poisoned").push_back(id);
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn move_to_wait(&self, id: EntryId, not_before: DateTime<Utc>) {
        let mut index = self.wait_index.write().expect("wait index lock poisoned");
        index.entry(not_before.timestamp_millis()).or_default().push(id);
    }

    fn move_to_dead(&self, id: EntryId) {
        let mut dead = self.dead.lock().expect("dead queue mutex poisoned");
        dead.push_back(id);
        self.counters.deadletter.fetch_add(1, Ordering::SeqCst);
        while dead.len() > self.config.dead_letter_max_items {
            if let Some(oldest) = dead.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Bump `attempts` and route the entry to `dead`/`wait`/`in` per policy.
    /// Returns `(new_attempts, is_dead_letter)`. The caller is responsible
    /// for the `working`/`abandoned`/`timeouts` counters — this only
    /// decides and performs the bucket transition.
    fn apply_abandon(&self, id: &EntryId) -> (u32, bool) {
        let (attempts, is_dead, not_before) = {
            let mut record = self.entries.get_mut(id).expect("entry must exist while abandoning");
            record.envelope.attempts += 1;
            let attempts = record.envelope.attempts;
            let is_dead = attempts > self.config.retries;
            let not_before = (!is_dead && !self.config.retry_delay.is_zero()).then(|| {
                let delay = self.config.retry_delay * attempts;
                self.clock.now() + chrono::Duration::from_std(delay).unwrap_or_default()
            });

            record.bucket = if is_dead {
                Bucket::Dead
            } else if not_before.is_some() {
                Bucket::Wait
            } else {
                Bucket::In
            };
            record.lease_token = None;
            record.dequeued_at = None;
            record.not_before = not_before;

            (attempts, is_dead, not_before)
        };

        match (is_dead, not_before) {
            (true, _) => self.move_to_dead(id.clone()),
            (false, Some(nb)) => self.move_to_wait(id.clone(), nb),
            (false, None) => self.move_to_ready(id.clone()),
        }
        (attempts, is_dead)
    }
}

#[async_trait]
impl<T> Queue<T> for InMemoryQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn enqueue(&self, payload: T) -> Result<Option<EntryId>, QueueError> {
        {
            let handlers = self.handlers.lock().expect("handler list mutex poisoned");
            for handler in handlers.iter() {
                if !handler.on_enqueuing(&payload) {
                    return Ok(None);
                }
            }
        }

        let id = EntryId::new(Uuid::new_v4().to_string());
        let envelope = WorkItemEnvelope {
            id: id.clone(),
            payload,
            type_name: std::any::type_name::<T>().to_owned(),
            enqueued_at: self.clock.now(),
            attempts: 0,
            correlation_id: None,
            unique_id: None,
        };

        self.entries.insert(
            id.clone(),
            EntryRecord {
                envelope,
                bucket: Bucket::In,
                lease_token: None,
                dequeued_at: None,
                not_before: None,
            },
        );
        self.move_to_ready(id.clone());
        self.counters.enqueued.fetch_add(1, Ordering::SeqCst);

        let _ = self
            .bus
            .publish(
                &format!("queue:{}:enqueued", self.name),
                QueueEnqueued {
                    queue_name: self.name.clone(),
                },
            )
            .await;

        self.notify_handlers(|h| h.on_enqueued(&id));
        Ok(Some(id))
    }

    async fn dequeue(
        &self,
        wait_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Result<Option<QueueEntry<T>>, QueueError> {
        if let Some(id) = self.pop_ready() {
            return Ok(Some(self.lease(id)));
        }
        if cancel.is_cancelled() || wait_timeout == Some(Duration::ZERO) {
            return Ok(None);
        }

        loop {
            let notified = self.notify.notified();
            let timed_out = match wait_timeout {
                None => {
                    tokio::select! {
                        () = notified => false,
                        () = cancel.cancelled() => return Ok(None),
                    }
                }
                Some(remaining) => {
                    tokio::select! {
                        () = notified => false,
                        () = tokio::time::sleep(remaining) => true,
                        () = cancel.cancelled() => return Ok(None),
                    }
                }
            };

            if let Some(id) = self.pop_ready() {
                return Ok(Some(self.lease(id)));
            }
            if timed_out || cancel.is_cancelled() {
                return Ok(None);
            }
        }
    }

    async fn renew(&self, entry: &QueueEntry<T>) -> Result<(), QueueError> {
        let id = &entry.envelope.id;
        let mut record = self.entries.get_mut(id).ok_or(QueueError::LeaseLost)?;
        if record.bucket != Bucket::Work || record.lease_token.as_ref() != Some(&entry.lease_token) {
            return Err(QueueError::LeaseLost);
        }
        record.dequeued_at = Some(self.clock.now());
        drop(record);
        self.notify_handlers(|h| h.on_renewed(id));
        Ok(())
    }

    async fn complete(&self, entry: &QueueEntry<T>) -> Result<(), QueueError> {
        entry.try_complete()?;
        let id = entry.envelope.id.clone();

        let matched = self
            .entries
            .remove_if(&id, |_, record| {
                record.bucket == Bucket::Work && record.lease_token.as_ref() == Some(&entry.lease_token)
            })
            .is_some();

        if !matched {
            return Err(QueueError::LeaseLost);
        }

        self.counters.working.fetch_sub(1, Ordering::SeqCst);
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        self.notify_handlers(|h| h.on_completed(&id));
        Ok(())
    }

    async fn abandon(&self, entry: &QueueEntry<T>) -> Result<(), QueueError> {
        entry.try_abandon()?;
        let id = entry.envelope.id.clone();

        let lease_ok = self
            .entries
            .get(&id)
            .is_some_and(|record| record.bucket == Bucket::Work && record.lease_token.as_ref() == Some(&entry.lease_token));
        if !lease_ok {
            return Err(QueueError::LeaseLost);
        }

        self.counters.working.fetch_sub(1, Ordering::SeqCst);
        self.counters.abandoned.fetch_add(1, Ordering::SeqCst);
        let (_, is_dead) = self.apply_abandon(&id);
        self.notify_handlers(|h| h.on_abandoned(&id, is_dead));
        Ok(())
    }

    async fn queue_stats(&self) -> Result<QueueStats, QueueError> {
        Ok(QueueStats {
            enqueued: self.counters.enqueued.load(Ordering::SeqCst),
            dequeued: self.counters.dequeued.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            abandoned: self.counters.abandoned.load(Ordering::SeqCst),
            errors: self.counters.errors.load(Ordering::SeqCst),
            timeouts: self.counters.timeouts.load(Ordering::SeqCst),
            deadletter: self.counters.deadletter.load(Ordering::SeqCst),
            queued: self.counters.queued.load(Ordering::SeqCst),
            working: self.counters.working.load(Ordering::SeqCst),
        })
    }

    async fn deadletter_items(&self) -> Result<Vec<WorkItemEnvelope<T>>, QueueError> {
        let dead = self.dead.lock().expect("dead queue mutex poisoned");
        Ok(dead
            .iter()
            .filter_map(|id| self.entries.get(id).map(|record| record.envelope.clone()))
            .collect())
    }

    async fn delete_queue(&self) -> Result<(), QueueError> {
        self.entries.clear();
        self.ready.lock().expect("ready queue mutex poisoned").clear();
        self.wait_index.write().expect("wait index lock poisoned").clear();
        self.dead.lock().expect("dead queue mutex poisoned").clear();

        for counter in [
            &self.counters.enqueued,
            &self.counters.dequeued,
            &self.counters.completed,
            &self.counters.abandoned,
            &self.counters.errors,
            &self.counters.timeouts,
            &self.counters.deadletter,
            &self.counters.queued,
            &self.counters.working,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        Ok(())
    }

    fn add_event_handler(&self, handler: Arc<dyn QueueEventHandler<T>>) {
        self.handlers.lock().expect("handler list mutex poisoned").push(handler);
    }

    fn record_error(&self) {
        self.counters.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T> Maintainable for InMemoryQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run_maintenance_once(&self) -> Result<usize, QueueError> {
        let now = self.clock.now();
        let mut handled = 0usize;

        let due_ids: Vec<EntryId> = {
            let mut index = self.wait_index.write().expect("wait index lock poisoned");
            let now_ms = now.timestamp_millis();
            let due_keys: Vec<i64> = index.range(..=now_ms).map(|(k, _)| *k).collect();
            let mut ids = Vec::new();
            for key in due_keys {
                if let Some(bucket_ids) = index.remove(&key) {
                    ids.extend(bucket_ids);
                }
            }
            ids
        };

        for id in due_ids {
            let promotable = self
                .entries
                .get(&id)
                .is_some_and(|record| record.bucket == Bucket::Wait);
            if !promotable {
                continue;
            }
            if let Some(mut record) = self.entries.get_mut(&id) {
                record.bucket = Bucket::In;
                record.not_before = None;
            }
            self.move_to_ready(id);
            handled += 1;
        }

        let timeout = chrono::Duration::from_std(self.config.work_item_timeout).unwrap_or_default();
        let expired: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|e| e.value().bucket == Bucket::Work && e.value().dequeued_at.is_some_and(|d| now >= d + timeout))
            .map(|e| e.key().clone())
            .collect();

        for id in expired {
            self.counters.working.fetch_sub(1, Ordering::SeqCst);
            self.counters.abandoned.fetch_add(1, Ordering::SeqCst);
            self.counters.timeouts.fetch_add(1, Ordering::SeqCst);
            let (_, is_dead) = self.apply_abandon(&id);
            self.notify_handlers(|h| h.on_abandoned(&id, is_dead));
            handled += 1;
        }

        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundatio_messaging::InMemoryMessageBus;

    fn queue<T>(config: QueueConfig) -> Arc<InMemoryQueue<T>> {
        let bus: Arc<dyn MessageBus<QueueEnqueued>> = Arc::new(InMemoryMessageBus::new());
        Arc::new(InMemoryQueue::new("test", config, bus))
    }

    #[tokio::test]
    async fn enqueue_dequeue_complete_round_trip() {
        let q = queue::<String>(QueueConfig::default());
        let id = q.enqueue("hello".to_owned()).await.unwrap().unwrap();

        let entry = q
            .dequeue(Some(Duration::from_millis(50)), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.envelope.id, id);
        assert_eq!(entry.envelope.payload, "hello");

        q.complete(&entry).await.unwrap();
        let stats = q.queue_stats().await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                enqueued: 1,
                dequeued: 1,
                completed: 1,
                queued: 0,
                working: 0,
                ..QueueStats::default()
            }
        );
    }

    #[tokio::test]
    async fn fifo_order_for_single_dequeuer() {
        let q = queue::<String>(QueueConfig::default());
        q.enqueue("first".to_owned()).await.unwrap();
        q.enqueue("second".to_owned()).await.unwrap();

        let a = q.dequeue(Some(Duration::ZERO), CancellationToken::new()).await.unwrap().unwrap();
        let b = q.dequeue(Some(Duration::ZERO), CancellationToken::new()).await.unwrap().unwrap();
        assert_eq!(a.envelope.payload, "first");
        assert_eq!(b.envelope.payload, "second");
    }

    #[tokio::test]
    async fn double_complete_fails_loudly() {
        let q = queue::<String>(QueueConfig::default());
        q.enqueue("x".to_owned()).await.unwrap();
        let entry = q
            .dequeue(Some(Duration::from_millis(50)), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        q.complete(&entry).await.unwrap();
        let second = q.complete(&entry).await;
        assert!(matches!(second, Err(QueueError::InvalidEntryState)));
    }

    #[tokio::test]
    async fn double_abandon_fails_loudly() {
        let q = queue::<String>(QueueConfig {
            retries: 5,
            ..QueueConfig::default()
        });
        q.enqueue("x".to_owned()).await.unwrap();
        let entry = q
            .dequeue(Some(Duration::from_millis(50)), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        q.abandon(&entry).await.unwrap();
        let second = q.abandon(&entry).await;
        assert!(matches!(second, Err(QueueError::InvalidEntryState)));
    }

    #[tokio::test]
    async fn abandon_past_retry_budget_moves_to_dead_letter() {
        let q = queue::<String>(QueueConfig {
            retries: 2,
            ..QueueConfig::default()
        });
        q.enqueue("x".to_owned()).await.unwrap();

        for _ in 0..3 {
            let entry = q
                .dequeue(Some(Duration::from_millis(50)), CancellationToken::new())
                .await
                .unwrap()
                .unwrap();
            q.abandon(&entry).await.unwrap();
        }

        let stats = q.queue_stats().await.unwrap();
        assert_eq!(stats.dequeued, 3);
        assert_eq!(stats.abandoned, 3);
        assert_eq!(stats.deadletter, 1);

        let dead = q.deadletter_items().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_abandon_via_maintenance_after_lease_expiry() {
        let q = queue::<String>(QueueConfig {
            retries: 0,
            work_item_timeout: Duration::from_millis(50),
            ..QueueConfig::default()
        });
        q.enqueue("x".to_owned()).await.unwrap();
        let _entry = q
            .dequeue(Some(Duration::from_millis(50)), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;

        let handled = q.run_maintenance_once().await.unwrap();
        assert_eq!(handled, 1);

        let stats = q.queue_stats().await.unwrap();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.deadletter, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_holds_entry_in_wait_then_requeues() {
        let q = queue::<String>(QueueConfig {
            retries: 2,
            retry_delay: Duration::from_secs(1),
            ..QueueConfig::default()
        });
        q.enqueue("x".to_owned()).await.unwrap();
        let entry = q
            .dequeue(Some(Duration::from_millis(50)), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        q.abandon(&entry).await.unwrap();

        // Not yet due: nothing to promote.
        assert_eq!(q.run_maintenance_once().await.unwrap(), 0);
        let immediate = q.dequeue(Some(Duration::ZERO), CancellationToken::new()).await.unwrap();
        assert!(immediate.is_none(), "should still be waiting out its retry delay");

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert_eq!(q.run_maintenance_once().await.unwrap(), 1);

        let second = q.dequeue(Some(Duration::ZERO), CancellationToken::new()).await.unwrap();
        assert!(second.is_some(), "should be back in the ready bucket after its delay");
    }

    #[tokio::test]
    async fn lease_lost_when_maintenance_reassigns_before_original_holder_completes() {
        let q = queue::<String>(QueueConfig {
            retries: 5,
            work_item_timeout: Duration::from_millis(10),
            ..QueueConfig::default()
        });
        q.enqueue("x".to_owned()).await.unwrap();
        let stale_entry = q
            .dequeue(Some(Duration::from_millis(50)), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        q.run_maintenance_once().await.unwrap();

        let result = q.complete(&stale_entry).await;
        assert!(matches!(result, Err(QueueError::LeaseLost)));
    }

    #[tokio::test]
    async fn enqueuing_handler_can_veto_enqueue() {
        struct Reject;
        impl QueueEventHandler<String> for Reject {
            fn on_enqueuing(&self, _payload: &String) -> bool {
                false
            }
        }

        let q = queue::<String>(QueueConfig::default());
        q.add_event_handler(Arc::new(Reject));
        let id = q.enqueue("x".to_owned()).await.unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn delete_queue_clears_buckets_and_stats() {
        let q = queue::<String>(QueueConfig::default());
        q.enqueue("x".to_owned()).await.unwrap();
        q.delete_queue().await.unwrap();
        assert_eq!(q.queue_stats().await.unwrap(), QueueStats::default());
        let none = q.dequeue(Some(Duration::ZERO), CancellationToken::new()).await.unwrap();
        assert!(none.is_none());
    }
}
