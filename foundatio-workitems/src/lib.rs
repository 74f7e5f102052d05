//! Work-item dispatcher (spec §4.7, C7): a [`foundatio_queue::Queue`]
//! specialized to a tagged `{type_name, bytes}` payload, routed through a
//! [`HandlerRegistry`] to per-type handlers.

mod context;
mod dispatcher;
mod envelope;
mod error;
mod registry;

pub use context::WorkItemContext;
pub use dispatcher::WorkItemDispatcher;
pub use envelope::WorkItem;
pub use error::WorkItemError;
pub use registry::{HandlerRegistry, WorkItemHandler};
