//! Synchronous event listeners on the simulation thread.
//!
//! The host publishes every event the world raises. Listeners run inline,
//! in subscription order, on the simulation thread; anything slow must be
//! handed off (the webhook dispatcher spawns its deliveries onto a runtime).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use simgate_types::{EventKind, SimEvent};

/// Callback invoked for every matching event.
pub type Listener = Arc<dyn Fn(&SimEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Which events a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSelector {
    /// Every event.
    All,
    /// Events of one built-in kind.
    Kind(EventKind),
    /// Custom events with this tag.
    Custom(String),
}

impl EventSelector {
    /// Whether `event` matches.
    pub fn matches(&self, event: &SimEvent) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => *kind == event.kind,
            Self::Custom(tag) => event.tag.as_deref() == Some(tag.as_str()),
        }
    }
}

struct Registration {
    id: ListenerId,
    selector: EventSelector,
    listener: Listener,
}

/// Registry of simulation-side listeners.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Registration>>,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events matching `selector`.
    pub fn subscribe(&self, selector: EventSelector, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Registration {
            id,
            selector,
            listener,
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Invoke every matching listener. Returns how many ran.
    ///
    /// The matching set is fixed before the first listener runs, so a
    /// listener may subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: &SimEvent) -> usize {
        let matching: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|registration| registration.selector.matches(event))
            .map(|registration| Arc::clone(&registration.listener))
            .collect();
        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use simgate_types::EventData;

    use super::*;

    fn counter(hits: &Arc<AtomicUsize>) -> Listener {
        let hits = Arc::clone(hits);
        Arc::new(move |_event| {
            hits.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn selectors_filter_events() {
        let bus = EventBus::new();
        let all = Arc::new(AtomicUsize::new(0));
        let joins = Arc::new(AtomicUsize::new(0));
        let regions = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventSelector::All, counter(&all));
        bus.subscribe(EventSelector::Kind(EventKind::PlayerJoin), counter(&joins));
        bus.subscribe(
            EventSelector::Custom(String::from("region_enter")),
            counter(&regions),
        );

        bus.publish(&SimEvent::new(EventKind::PlayerJoin, EventData::default()));
        bus.publish(&SimEvent::new(EventKind::Chat, EventData::default()));
        bus.publish(&SimEvent::custom("region_enter", EventData::default()));

        assert_eq!(all.load(Ordering::Relaxed), 3);
        assert_eq!(joins.load(Ordering::Relaxed), 1);
        assert_eq!(regions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = bus.subscribe(EventSelector::All, counter(&hits));
        bus.publish(&SimEvent::new(EventKind::Chat, EventData::default()));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&SimEvent::new(EventKind::Chat, EventData::default()));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new());
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let listener: Listener = {
            let bus = Arc::clone(&bus);
            let slot = Arc::clone(&slot);
            Arc::new(move |_event| {
                if let Some(id) = slot.lock().take() {
                    bus.unsubscribe(id);
                }
            })
        };
        let id = bus.subscribe(EventSelector::All, listener);
        *slot.lock() = Some(id);
        assert_eq!(bus.publish(&SimEvent::new(EventKind::Chat, EventData::default())), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
