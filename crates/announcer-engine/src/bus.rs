//! Synchronous fan-out of engine events.

use announcer_types::EngineEvent;
use std::sync::Arc;

/// Receiver of engine events.
///
/// `deliver` runs on the writer's thread while the engine lock is held, so
/// implementations must return promptly and must not call back into the
/// engine.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &EngineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&EngineEvent) + Send + Sync,
{
    fn deliver(&self, event: &EngineEvent) {
        self(event)
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of sinks. Events are never buffered or coalesced.
#[derive(Default)]
pub struct EventBus {
    sinks: Vec<(SubscriptionId, Arc<dyn EventSink>)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `sink` to the delivery order.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.sinks.push((id, sink));
        id
    }

    /// Removes a sink. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sink_id, _)| *sink_id != id);
        self.sinks.len() != before
    }

    /// Delivers `event` to every sink in registration order.
    pub fn publish(&self, event: &EngineEvent) {
        tracing::debug!(
            event = event.kind(),
            sinks = self.sinks.len(),
            "publishing engine event"
        );
        for (_, sink) in &self.sinks {
            sink.deliver(event);
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn delivers_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for name in ["first", "second", "third"] {
            let log = log.clone();
            bus.subscribe(Arc::new(move |_: &EngineEvent| {
                log.lock().unwrap().push(name);
            }));
        }

        bus.publish(&EngineEvent::Stopped {});
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribed_sink_stops_receiving() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let id = {
            let count = count.clone();
            bus.subscribe(Arc::new(move |_: &EngineEvent| {
                *count.lock().unwrap() += 1;
            }))
        };

        bus.publish(&EngineEvent::Stopped {});
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&EngineEvent::Stopped {});

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(bus.is_empty());
    }
}
