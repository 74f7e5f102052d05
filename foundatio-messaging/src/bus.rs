use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::MessageBusError;

/// A live subscription to a topic. Wraps a [`broadcast::Receiver`] so
/// callers don't take a direct dependency on `tokio::sync::broadcast`.
///
/// A lagging receiver (the channel's bounded buffer overflowed) silently
/// skips ahead to the oldest message still buffered rather than erroring —
/// callers that need every message should size the bus's channel capacity
/// accordingly. Missed messages are tolerable here because every waiter
/// also bounds its wait with a fall-back timer.
pub struct Subscription<M> {
    inner: broadcast::Receiver<M>,
}

impl<M: Clone + Send + 'static> Subscription<M> {
    /// Wait for the next message on this subscription. Returns `None` once
    /// every sender for the topic has been dropped.
    pub async fn recv(&mut self) -> Option<M> {
        loop {
            match self.inner.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Topic publish/subscribe bus for typed messages.
///
/// Used purely as a wake-up signal in this subsystem: a missed publish is
/// tolerable because every waiter also polls on a bounded timer.
#[async_trait]
pub trait MessageBus<M: Clone + Send + Sync + 'static>: Send + Sync {
    /// Publish `message` on `topic`. A no-op (not an error) if nobody is
    /// currently subscribed.
    async fn publish(&self, topic: &str, message: M) -> Result<(), MessageBusError>;

    /// Subscribe to `topic`, receiving every message published after this
    /// call returns.
    fn subscribe(&self, topic: &str) -> Subscription<M>;
}

pub(crate) fn wrap<M>(inner: broadcast::Receiver<M>) -> Subscription<M> {
    Subscription { inner }
}
