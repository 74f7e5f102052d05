use chrono::{DateTime, Utc};

use foundatio_core::EntryId;

/// The persistent record created by `enqueue` (spec §3 "Work Item
/// Envelope").
#[derive(Debug, Clone)]
pub struct WorkItemEnvelope<T> {
    pub id: EntryId,
    pub payload: T,
    pub type_name: String,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
    pub correlation_id: Option<String>,
    pub unique_id: Option<String>,
}
