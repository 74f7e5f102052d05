use thiserror::Error;

use foundatio_core::SerializerError;
use foundatio_queue::QueueError;

/// Errors surfaced by [`crate::WorkItemDispatcher`] (spec §4.7, C7).
#[derive(Debug, Error)]
pub enum WorkItemError {
    #[error("queue operation failed: {0}")]
    Queue(#[from] QueueError),

    #[error("payload (de)serialization failed: {0}")]
    Serializer(#[from] SerializerError),

    /// No handler is registered for the envelope's `type_name`. The entry
    /// is abandoned rather than silently dropped, so it re-enters the
    /// retry/dead-letter policy a missing-handler deployment mistake
    /// should trigger.
    #[error("no handler registered for work item type {0:?}")]
    HandlerNotFound(String),

    #[error("handler failed: {0}")]
    HandlerFailed(String),
}
