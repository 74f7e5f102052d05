use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;

/// Process-wide (per-provider-instance) map of per-resource wake-up events.
///
/// A waiter calls [`subscribe`](Self::subscribe) before its next acquire
/// attempt and awaits the returned `Notify`'s `notified()` future racing a
/// fallback timer. A releaser calls [`notify`](Self::notify) to wake every
/// current waiter for that resource. Entries are reference counted via the
/// `Arc<Notify>` strong count; the last waiter to drop its handle removes
/// the map entry so a finished waiter never leaks a registry slot.
#[derive(Debug, Default)]
pub struct WakeupRegistry {
    events: DashMap<String, Arc<Notify>>,
}

impl WakeupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (creating if absent) the wake-up event for `resource`.
    pub fn subscribe(&self, resource: &str) -> Arc<Notify> {
        self.events
            .entry(resource.to_owned())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Wake every current waiter on `resource`, if any are registered.
    pub fn notify(&self, resource: &str) {
        if let Some(notify) = self.events.get(resource) {
            notify.notify_waiters();
        }
    }

    /// Release this waiter's interest in `resource`. If no other holder of
    /// the `Arc<Notify>` remains (the registry's own entry plus `handle`
    /// are the only two references), the map entry is removed.
    pub fn unsubscribe(&self, resource: &str, handle: Arc<Notify>) {
        drop(handle);
        self.events
            .remove_if(resource, |_, notify| Arc::strong_count(notify) <= 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_wakes_waiting_subscriber() {
        let registry = Arc::new(WakeupRegistry::new());
        let notify = registry.subscribe("r");

        let registry2 = Arc::clone(&registry);
        let waiter = tokio::spawn(async move {
            let n = registry2.subscribe("r");
            n.notified().await;
        });

        tokio::task::yield_now().await;
        registry.notify("r");
        waiter.await.unwrap();
    }

    #[test]
    fn unsubscribe_removes_last_entry() {
        let registry = WakeupRegistry::new();
        let handle = registry.subscribe("r");
        assert!(registry.events.contains_key("r"));
        registry.unsubscribe("r", handle);
        assert!(!registry.events.contains_key("r"));
    }

    #[test]
    fn unsubscribe_keeps_entry_while_others_hold_it() {
        let registry = WakeupRegistry::new();
        let handle_a = registry.subscribe("r");
        let _handle_b = registry.subscribe("r");
        registry.unsubscribe("r", handle_a);
        assert!(
            registry.events.contains_key("r"),
            "entry should survive while another subscriber still holds a handle"
        );
    }
}
