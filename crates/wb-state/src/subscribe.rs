//! State-change subscribers.

use std::fmt;
use wb_core::Value;

/// Handle returned by `StateManager::subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&Value) + Send>;

/// Listeners notified, in registration order, whenever the live state is
/// replaced or re-broadcast.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl Subscribers {
    pub fn subscribe(&mut self, listener: impl FnMut(&Value) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn notify(&mut self, state: &Value) {
        for (_, listener) in &mut self.listeners {
            listener(state);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.listeners.len())
            .finish()
    }
}
