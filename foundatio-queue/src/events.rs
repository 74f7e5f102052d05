use foundatio_core::EntryId;

/// Observer over one queue instance's lifecycle (spec §4.4: "the queue
/// exposes observable events ... subscribers are invoked serially in
/// registration order").
///
/// Handlers are infallible by design: a callback that needs to report
/// failure does so through its own side channel (logging, metrics) rather
/// than propagating an error that would abort the triggering operation —
/// the "a thrown subscriber error is logged and does not abort the op"
/// requirement is satisfied by construction rather than by catching panics
/// at the dispatch boundary.
pub trait QueueEventHandler<T>: Send + Sync {
    /// Called before an enqueue is committed. Returning `false` cancels it;
    /// `enqueue` then returns `Ok(None)`.
    fn on_enqueuing(&self, _payload: &T) -> bool {
        true
    }

    fn on_enqueued(&self, _id: &EntryId) {}
    fn on_dequeued(&self, _id: &EntryId) {}
    fn on_renewed(&self, _id: &EntryId) {}
    fn on_completed(&self, _id: &EntryId) {}
    fn on_abandoned(&self, _id: &EntryId, _is_dead_letter: bool) {}
}
