//! Event Bus
//!
//! Synchronous publish/subscribe keyed by [`EventKind`]. Handlers run on
//! the publishing task, in subscription order. A panicking handler stops
//! delivery to the handlers after it.

use crate::domain::models::{CubeEvent, EventKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event handler. Identity (for [`Subscriber::unsubscribe`]) is the
/// allocation behind the `Arc`.
pub type Handler = Arc<dyn Fn(&CubeEvent) + Send + Sync>;

/// Wrap a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&CubeEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handler forwarding every event it sees into a channel
pub fn channel_handler(sender: mpsc::UnboundedSender<CubeEvent>) -> Handler {
    handler(move |event| {
        let _ = sender.send(event.clone());
    })
}

pub trait Publisher {
    /// Deliver `event` to its subscribers. Returns whether any existed.
    fn publish(&self, event: &CubeEvent) -> bool;
}

pub trait Subscriber {
    fn subscribe(&mut self, kind: EventKind, handler: Handler);

    /// Remove the first subscription of this exact handler instance.
    /// Returns whether one was removed.
    fn unsubscribe(&mut self, kind: EventKind, handler: &Handler) -> bool;
}

#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

impl Publisher for EventBus {
    fn publish(&self, event: &CubeEvent) -> bool {
        match self.handlers.get(&event.kind()) {
            Some(handlers) if !handlers.is_empty() => {
                for handler in handlers {
                    handler(event);
                }
                true
            }
            _ => false,
        }
    }
}

impl Subscriber for EventBus {
    fn subscribe(&mut self, kind: EventKind, handler: Handler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    fn unsubscribe(&mut self, kind: EventKind, handler: &Handler) -> bool {
        let Some(handlers) = self.handlers.get_mut(&kind) else {
            return false;
        };
        match handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self
            .handlers
            .iter()
            .map(|(kind, handlers)| (kind.name(), handlers.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Face, Move, Turn};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Handler {
        let log = log.clone();
        handler(move |event| log.lock().unwrap().push(format!("{tag}:{}", event.kind())))
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert!(!bus.publish(&CubeEvent::Connected));
    }

    #[test]
    fn test_publish_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::Connected, recorder(&log, "a"));
        bus.subscribe(EventKind::Connected, recorder(&log, "b"));
        bus.subscribe(EventKind::Disconnected, recorder(&log, "c"));

        assert!(bus.publish(&CubeEvent::Connected));
        assert_eq!(*log.lock().unwrap(), vec!["a:connected", "b:connected"]);
    }

    #[test]
    fn test_unsubscribe_removes_first_matching_instance() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let h = recorder(&log, "h");
        bus.subscribe(EventKind::UpdateState, h.clone());
        bus.subscribe(EventKind::UpdateState, h.clone());

        assert!(bus.unsubscribe(EventKind::UpdateState, &h));
        assert_eq!(bus.handler_count(EventKind::UpdateState), 1);
        assert!(bus.unsubscribe(EventKind::UpdateState, &h));
        assert!(!bus.unsubscribe(EventKind::UpdateState, &h));
        assert!(!bus.publish(&CubeEvent::UpdateState));
    }

    #[test]
    fn test_unsubscribe_uses_identity_not_behavior() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::Move, recorder(&log, "x"));
        let lookalike = recorder(&log, "x");
        assert!(!bus.unsubscribe(EventKind::Move, &lookalike));
        assert!(!bus.unsubscribe(EventKind::Battery, &lookalike));
    }

    #[test]
    fn test_panicking_handler_stops_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::Move, recorder(&log, "before"));
        bus.subscribe(EventKind::Move, handler(|_| panic!("handler failed")));
        bus.subscribe(EventKind::Move, recorder(&log, "after"));

        let event = CubeEvent::Move(Move {
            face: Face::U,
            turn: Turn::Clockwise,
            notation: "U".to_string(),
        });
        let result = panic::catch_unwind(AssertUnwindSafe(|| bus.publish(&event)));

        assert!(result.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["before:move"]);
        assert_eq!(bus.handler_count(EventKind::Move), 3);
    }

    #[test]
    fn test_channel_handler_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::MoveCount, channel_handler(tx));
        bus.publish(&CubeEvent::MoveCount(42));
        assert_eq!(rx.try_recv().ok(), Some(CubeEvent::MoveCount(42)));
    }
}
