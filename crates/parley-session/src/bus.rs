//! Synchronous publish/subscribe fan-out to UI subscribers.
//!
//! Subscribers register a callback against an event name and receive events
//! synchronously, in registration order, within the emitting context — there
//! is no queue and no implicit async hop. Callers that need async behavior
//! layer it themselves.
//!
//! Deregistration is by [`SubscriptionId`] (returned from
//! [`EventBus::on`]): closures have no useful reference identity in Rust,
//! so the ID plays the role the source callback reference plays elsewhere.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::warn;

use crate::events::SessionEvent;

/// Opaque handle identifying one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = std::sync::Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Registration-order synchronous event fan-out.
///
/// Shared via `Arc`; all methods take `&self`.
pub struct EventBus {
    subscribers: RwLock<HashMap<&'static str, Vec<(SubscriptionId, Callback)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe `callback` to events named `event_type`.
    ///
    /// Unknown names are accepted (and warn-logged) so a UI built against a
    /// newer event vocabulary degrades quietly; such callbacks simply never
    /// fire.
    pub fn on(
        &self,
        event_type: &str,
        callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match crate::events::ALL_EVENT_TYPES
            .iter()
            .find(|&&name| name == event_type)
        {
            Some(&name) => {
                self.subscribers
                    .write()
                    .entry(name)
                    .or_default()
                    .push((id, std::sync::Arc::new(callback)));
            }
            None => {
                warn!(event_type, "subscription to unknown event type");
            }
        }
        id
    }

    /// Remove a subscription. Unknown IDs are a no-op.
    pub fn off(&self, id: SubscriptionId) {
        let mut map = self.subscribers.write();
        for list in map.values_mut() {
            list.retain(|(sub_id, _)| *sub_id != id);
        }
    }

    /// Deliver `event` to its subscribers, synchronously, in registration
    /// order. Each subscriber is invoked at most once per emit.
    pub fn emit(&self, event: &SessionEvent) {
        // Callbacks run outside the lock so a subscriber may call on/off
        // re-entrantly without deadlocking. The subscriber list is
        // snapshotted first; callbacks registered during this emit do not
        // fire for it, and each snapshot entry fires exactly once.
        let snapshot: Vec<Callback> = {
            let map = self.subscribers.read();
            map.get(event.event_type())
                .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default()
        };

        for callback in snapshot {
            callback(event);
        }
    }

    /// Number of live subscriptions for an event name (test/diagnostic aid).
    #[must_use]
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers
            .read()
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
