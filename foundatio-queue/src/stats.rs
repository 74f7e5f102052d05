use serde::{Deserialize, Serialize};

/// Snapshot of a queue's monotonic counters and instantaneous gauges
/// (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub deadletter: u64,
    pub queued: u64,
    pub working: u64,
}
