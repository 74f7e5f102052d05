use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use foundatio_core::{CancellationToken, EntryId, JsonSerializer, Serializer};
use foundatio_messaging::{MessageBus, WorkItemStatus};
use foundatio_queue::{Queue, QueueEntry};

use crate::context::WorkItemContext;
use crate::envelope::WorkItem;
use crate::error::WorkItemError;
use crate::registry::HandlerRegistry;

/// A specialization of C4 whose payload is the tagged [`WorkItem`] envelope
/// (spec §4.7, C7): `enqueue` serializes a typed payload under a
/// `type_name` tag, and the worker loop looks up the matching handler in a
/// [`HandlerRegistry`] and dispatches to it.
pub struct WorkItemDispatcher {
    queue: Arc<dyn Queue<WorkItem>>,
    registry: Arc<HandlerRegistry>,
    bus: Arc<dyn MessageBus<WorkItemStatus>>,
    serializer: Arc<dyn Serializer>,
    auto_complete: bool,
}

impl WorkItemDispatcher {
    #[must_use]
    pub fn new(
        queue: Arc<dyn Queue<WorkItem>>,
        registry: Arc<HandlerRegistry>,
        bus: Arc<dyn MessageBus<WorkItemStatus>>,
    ) -> Self {
        Self {
            queue,
            registry,
            bus,
            serializer: Arc::new(JsonSerializer),
            auto_complete: true,
        }
    }

    #[must_use]
    pub fn with_auto_complete(mut self, auto_complete: bool) -> Self {
        self.auto_complete = auto_complete;
        self
    }

    /// Serialize `payload` and enqueue it tagged as `type_name`.
    pub async fn enqueue<T: serde::Serialize>(
        &self,
        type_name: impl Into<String>,
        payload: &T,
    ) -> Result<Option<EntryId>, WorkItemError> {
        let bytes = self.serializer.serialize(payload)?;
        Ok(self.queue.enqueue(WorkItem::new(type_name, bytes)).await?)
    }

    /// Run the consumer loop until `cancel` fires: dequeue, look up the
    /// handler for the entry's `type_name`, build a [`WorkItemContext`],
    /// and dispatch. A missing handler or handler error abandons the
    /// entry, driving the normal retry/dead-letter policy.
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

            self.dispatch(entry, cancel.clone()).await;
        }
    }

    #[must_use]
    pub fn start_working(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    #[instrument(skip(self, entry, cancel), fields(entry_id = %entry.envelope.id, type_name = %entry.envelope.payload.type_name))]
    async fn dispatch(&self, entry: QueueEntry<WorkItem>, cancel: CancellationToken) {
        let type_name = entry.envelope.payload.type_name.clone();
        let Some(handler) = self.registry.get(&type_name) else {
            warn!(type_name, "no handler registered for work item type");
            self.queue.record_error();
            if !entry.is_terminal() {
                if let Err(err) = self.queue.abandon(&entry).await {
                    warn!(error = %err, "failed to abandon entry with no matching handler");
                }
            }
            return;
        };

        let context = WorkItemContext::new(
            entry.envelope.id.clone(),
            entry.envelope.payload.payload_bytes.clone(),
            Arc::clone(&self.bus),
            cancel,
        );

        match handler.handle(context).await {
            Ok(()) => {
                if self.auto_complete && !entry.is_terminal() {
                    if let Err(err) = self.queue.complete(&entry).await {
                        warn!(error = %err, "auto-complete failed");
                    }
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
