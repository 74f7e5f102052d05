use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use foundatio_core::{CancellationToken, EntryId};

use crate::entry::QueueEntry;
use crate::envelope::WorkItemEnvelope;
use crate::error::QueueError;
use crate::events::QueueEventHandler;
use crate::stats::QueueStats;

/// Lease-based work queue (spec §4.4, C4).
///
/// `dequeue`'s `wait_timeout` follows spec §6's blocking contract:
/// `Some(Duration::ZERO)` is a single non-blocking attempt, `Some(d)` bounds
/// the wait to `d`, and `None` waits until an item arrives or `cancel`
/// fires (the `wait=inf` mode the worker loop in §4.5 uses).
#[async_trait]
pub trait Queue<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Serialize and enqueue `payload`. Returns `Ok(None)` if a registered
    /// `on_enqueuing` handler vetoed the enqueue.
    async fn enqueue(&self, payload: T) -> Result<Option<EntryId>, QueueError>;

    /// Atomically move the head of the ready bucket into the working
    /// bucket, or wait for one per the contract above.
    async fn dequeue(
        &self,
        wait_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Result<Option<QueueEntry<T>>, QueueError>;

    /// Extend `entry`'s lease by `work_item_timeout`.
    async fn renew(&self, entry: &QueueEntry<T>) -> Result<(), QueueError>;

    /// Terminal success.
    async fn complete(&self, entry: &QueueEntry<T>) -> Result<(), QueueError>;

    /// Return the entry to the queue, applying retry/delay/dead-letter
    /// policy per §4.4.
    async fn abandon(&self, entry: &QueueEntry<T>) -> Result<(), QueueError>;

    async fn queue_stats(&self) -> Result<QueueStats, QueueError>;

    async fn deadletter_items(&self) -> Result<Vec<WorkItemEnvelope<T>>, QueueError>;

    /// Clear every bucket and reset counters.
    async fn delete_queue(&self) -> Result<(), QueueError>;

    /// Register an observer, invoked serially after every handler already
    /// registered.
    fn add_event_handler(&self, handler: Arc<dyn QueueEventHandler<T>>);

    /// Record a handler failure against this queue's `errors` stat (spec
    /// §3). Called by `QueueWorker`/`JobRunner`, not by `Queue` itself.
    fn record_error(&self);
}

/// Implemented by queue backends that support the periodic auto-abandon
/// sweep described in spec §4.4. Kept separate from [`Queue`] because the
/// sweep is an implementation-internal maintenance operation, not part of
/// the producer/consumer contract, and doesn't need to be generic over the
/// lock provider used to gate it.
#[async_trait]
pub trait Maintainable: Send + Sync {
    /// Promote due `wait` entries back to `in`, and auto-abandon any
    /// `work` entries whose lease has expired. Returns the number of
    /// entries handled.
    async fn run_maintenance_once(&self) -> Result<usize, QueueError>;
}
