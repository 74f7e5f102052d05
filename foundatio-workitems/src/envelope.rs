/// The queue payload C7 dispatches on: a type tag plus opaque serialized
/// bytes (spec §3 "Handler Registry", §4.7). This is what flows through
/// [`foundatio_queue::Queue<WorkItem>`] — distinct from
/// [`foundatio_queue::WorkItemEnvelope`], which wraps *this* in the
/// queue's own id/attempts/timestamps bookkeeping.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub type_name: String,
    pub payload_bytes: Vec<u8>,
}

impl WorkItem {
    #[must_use]
    pub fn new(type_name: impl Into<String>, payload_bytes: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            payload_bytes,
        }
    }
}
