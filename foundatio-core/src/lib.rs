pub mod clock;
pub mod ids;
pub mod metrics;
pub mod serializer;

pub use clock::{Clock, SystemClock};
pub use ids::{EntryId, LeaseToken, LockId, QueueName};
pub use metrics::{MetricsSink, NoopMetricsSink};
pub use serializer::{JsonSerializer, Serializer, SerializerError};

/// Cooperative cancellation signal threaded through every suspension point
/// (acquire's retry loop, dequeue's wait, worker loops). Re-exported so
/// downstream crates don't each depend on `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
