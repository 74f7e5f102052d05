use thiserror::Error;

/// Errors from message bus operations.
///
/// Delivery is at-most-once: a publish with no subscribers is not an error,
/// and a lagging subscriber simply misses messages rather than
/// failing the publisher. This type exists mainly for transport-level
/// failures in real backends (Redis, Azure Service Bus); the in-memory bus
/// never returns one.
#[derive(Debug, Error)]
pub enum MessageBusError {
    #[error("message bus backend error: {0}")]
    Connection(String),
}
