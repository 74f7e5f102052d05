use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::bus::{wrap, MessageBus, Subscription};
use crate::error::MessageBusError;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// In-memory [`MessageBus`] backed by one [`broadcast::Sender`] per topic,
/// the same `tokio::sync::broadcast` pattern used for a fire-and-forget SSE
/// event stream (`acteon-gateway`'s `stream_tx`), generalized here to
/// per-topic channels the way a process-wide pub/sub bus needs.
///
/// Topics are created lazily on first publish or subscribe and never
/// removed, matching the "subscription happens at most once per provider
/// instance" lifecycle the lock provider relies on (spec §5).
pub struct InMemoryMessageBus<M> {
    topics: DashMap<String, broadcast::Sender<M>>,
    capacity: usize,
}

impl<M: Clone + Send + Sync + 'static> InMemoryMessageBus<M> {
    /// Create a bus with the default per-topic channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose per-topic broadcast channels hold up to
    /// `capacity` buffered messages before a slow subscriber starts lagging.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity,
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<M> {
        self.topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl<M: Clone + Send + Sync + 'static> Default for InMemoryMessageBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: Clone + Send + Sync + 'static> MessageBus<M> for InMemoryMessageBus<M> {
    async fn publish(&self, topic: &str, message: M) -> Result<(), MessageBusError> {
        // `send` errors only when there are zero receivers; that is a
        // tolerable no-op, not a bus failure.
        let _ = self.sender_for(topic).send(message);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Subscription<M> {
        wrap(self.sender_for(topic).subscribe())
    }
}
