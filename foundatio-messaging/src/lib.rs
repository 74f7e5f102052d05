pub mod bus;
pub mod error;
pub mod memory;
pub mod messages;

pub use bus::{MessageBus, Subscription};
pub use error::MessageBusError;
pub use memory::InMemoryMessageBus;
pub use messages::{LockReleased, QueueEnqueued, WorkItemStatus};
