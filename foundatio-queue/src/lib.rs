//! Lease-based distributed work queue: enqueue, dequeue with a renewable
//! lease, complete/abandon, retry with backoff, dead-lettering, and
//! auto-abandon maintenance for lapsed leases, on top of
//! [`foundatio_lock`] and [`foundatio_messaging`].

mod config;
mod entry;
mod envelope;
mod error;
mod events;
mod maintenance;
mod memory;
mod queue;
mod stats;
mod worker;

pub use config::QueueConfig;
pub use entry::QueueEntry;
pub use envelope::WorkItemEnvelope;
pub use error::QueueError;
pub use events::QueueEventHandler;
pub use maintenance::QueueMaintenance;
pub use memory::InMemoryQueue;
pub use queue::{Maintainable, Queue};
pub use stats::QueueStats;
pub use worker::{QueueWorker, WorkItemHandler};
