use serde::{Deserialize, Serialize};

/// Published on `cache_lock_released:<resource>` when a lock is released,
/// including an idempotent no-op release — the publish still fires so that
/// waiters always get notified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockReleased {
    pub resource: String,
    pub lock_id: String,
}

/// Published on `queue_enqueued:<queue_name>` whenever an item lands in a
/// queue's ready bucket, so blocked dequeuers can wake up immediately
/// instead of waiting out their poll timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEnqueued {
    pub queue_name: String,
}

/// Published on `work_item_status` by a handler calling
/// [`WorkItemContext::report_progress`](foundatio_workitems) — a
/// side-channel for progress reporting, not used for delivery guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemStatus {
    pub work_item_id: String,
    pub progress: u8,
    pub message: Option<String>,
}
