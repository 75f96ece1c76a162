use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

use super::types::{EventKind, TrackerEvent};

/// Callback handle registered for one event kind.
pub type Listener = Arc<dyn Fn(&TrackerEvent) + Send + Sync>;

/// Ordered listener fan-out, one list per event kind.
///
/// Dispatch is synchronous within the calling context and walks listeners
/// in registration order. The listener list is cloned out of the lock
/// before the walk, so a callback may register further listeners without
/// deadlocking; those take effect from the next dispatch.
#[derive(Default)]
pub struct Dispatcher {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, kind: EventKind, listener: Listener) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.entry(kind).or_default().push(listener);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        let listeners = self.listeners.lock().unwrap();
        listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn dispatch(&self, event: &TrackerEvent) {
        let registered: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap();
            listeners.get(&event.kind()).cloned().unwrap_or_default()
        };

        trace!(kind = ?event.kind(), count = registered.len(), "dispatching event");

        for listener in registered {
            listener(event);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("updated", &self.listener_count(EventKind::Updated))
            .field("received", &self.listener_count(EventKind::Received))
            .finish()
    }
}
