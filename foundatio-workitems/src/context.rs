use std::sync::Arc;

use foundatio_core::{CancellationToken, EntryId, JsonSerializer, Serializer};
use foundatio_messaging::{MessageBus, WorkItemStatus};

use crate::error::WorkItemError;

const STATUS_TOPIC: &str = "work_item_status";

/// Passed to a [`crate::WorkItemHandler`] for one dispatched entry (spec
/// §4.7): typed payload access, progress reporting over the message bus's
/// side channel, and the worker's cancellation signal.
pub struct WorkItemContext {
    work_item_id: EntryId,
    payload_bytes: Vec<u8>,
    serializer: Arc<dyn Serializer>,
    bus: Arc<dyn MessageBus<WorkItemStatus>>,
    cancel: CancellationToken,
}

impl WorkItemContext {
    #[must_use]
    pub fn new(
        work_item_id: EntryId,
        payload_bytes: Vec<u8>,
        bus: Arc<dyn MessageBus<WorkItemStatus>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            work_item_id,
            payload_bytes,
            serializer: Arc::new(JsonSerializer),
            bus,
            cancel,
        }
    }

    /// Deserialize the entry's payload bytes as `T`.
    pub fn get_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, WorkItemError> {
        Ok(self.serializer.deserialize(&self.payload_bytes)?)
    }

    /// Publish a progress update on the `work_item_status` topic. Best
    /// effort: a missed publish (no subscriber, bus error) is swallowed,
    /// matching spec §6's "delivery is at-most-once; missed messages are
    /// tolerable" for this side channel.
    pub async fn report_progress(&self, progress: u8, message: Option<String>) {
        let _ = self
            .bus
            .publish(
                STATUS_TOPIC,
                WorkItemStatus {
                    work_item_id: self.work_item_id.to_string(),
                    progress,
                    message,
                },
            )
            .await;
    }

    #[must_use]
    pub fn work_item_id(&self) -> &EntryId {
        &self.work_item_id
    }

    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
