use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use foundatio_core::CancellationToken;

use crate::entry::QueueEntry;
use crate::queue::Queue;

/// User processing logic invoked by [`QueueWorker`] for each dequeued entry.
///
/// Returning `Err` marks the invocation a failure: the worker increments
/// the queue's `errors` counter and, if the handler left the entry
/// non-terminal, abandons it on the handler's behalf so the normal
/// retry/dead-letter policy in [`Queue::abandon`] takes over. A handler
/// that wants a custom retry/dead-letter outcome should call
/// `complete`/`abandon` itself before returning.
#[async_trait]
pub trait WorkItemHandler<T>: Send + Sync {
    async fn handle(
        &self,
        entry: &QueueEntry<T>,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Long-running consumer loop built on top of a [`Queue`].
///
/// Dequeues with an unbounded wait, invokes the handler, then
/// auto-completes or abandons. Never lets one failed iteration stop the
/// loop — a handler error or a queue error is logged and counted, and the
/// next dequeue attempt proceeds regardless.
pub struct QueueWorker<T> {
    queue: Arc<dyn Queue<T>>,
    handler: Arc<dyn WorkItemHandler<T>>,
    auto_complete: bool,
}

impl<T> QueueWorker<T>
where
    T: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(queue: Arc<dyn Queue<T>>, handler: Arc<dyn WorkItemHandler<T>>, auto_complete: bool) -> Self {
        Self {
            queue,
            handler,
            auto_complete,
        }
    }

    /// Run the consumer loop until `cancel` fires. Each iteration dequeues
    /// with an unbounded wait (`wait_timeout = None`), so the loop only
    /// wakes up when an item arrives, a `released`/`enqueued` bus message
    /// nudges it, or cancellation fires.
    pub async fn run(&self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            let entry = match self.queue.dequeue(None, cancel.clone()).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "dequeue failed, retrying");
                    continue;
                }
            };

            self.process(entry, cancel.clone()).await;
        }
    }

    /// Spawn [`Self::run`] as a background task, returning its handle so
    /// the caller can await clean shutdown after cancelling.
    #[must_use]
    pub fn start_working(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()>
    where
        T: 'static,
    {
        tokio::spawn(async move { self.run(cancel).await })
    }

    #[instrument(skip(self, entry, cancel), fields(entry_id = %entry.envelope.id))]
    async fn process(&self, entry: QueueEntry<T>, cancel: CancellationToken) {
        match self.handler.handle(&entry, cancel).await {
            Ok(()) => {
                if self.auto_complete && !entry.is_terminal() {
                    if let Err(err) = self.queue.complete(&entry).await {
                        warn!(error = %err, "auto-complete failed");
                    }
                } else {
                    debug!("handler completed, entry already terminal or auto_complete disabled");
                }
            }
            Err(err) => {
                warn!(error = %err, "handler failed");
                self.queue.record_error();
                if !entry.is_terminal() {
                    if let Err(abandon_err) = self.queue.abandon(&entry).await {
                        warn!(error = %abandon_err, "failed to abandon entry after handler error");
                    }
                }
            }
        }
    }
}
