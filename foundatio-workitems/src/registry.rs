use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::WorkItemContext;
use crate::error::WorkItemError;

/// Per-type dispatch target (spec §4.7, §9 "dynamic dispatch of
/// handlers"). Handlers are stateless from the registry's point of view —
/// any state they need they own themselves behind the `Arc`.
#[async_trait]
pub trait WorkItemHandler: Send + Sync {
    async fn handle(&self, context: WorkItemContext) -> Result<(), WorkItemError>;
}

/// Maps `type_name` to a registered [`WorkItemHandler`] (spec §3 "Handler
/// Registry"). Directly grounded on `acteon-provider::ProviderRegistry`:
/// same `HashMap<String, Arc<dyn Trait>>` storage, same
/// `register`/`get`/`list` surface, built once at startup and shared
/// behind an `Arc`.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn WorkItemHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` under `type_name`, replacing any existing
    /// registration for that name.
    pub fn register(&mut self, type_name: impl Into<String>, handler: Arc<dyn WorkItemHandler>) {
        self.handlers.insert(type_name.into(), handler);
    }

    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn WorkItemHandler>> {
        self.handlers.get(type_name).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
