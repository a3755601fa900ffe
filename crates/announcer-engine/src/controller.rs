//! Playback state machine and the single serialization point for mutations.

use crate::bus::{EventBus, EventSink, SubscriptionId};
use crate::player::{PlaybackTicket, Player};
use crate::queue::AnnouncementQueue;
use announcer_types::{ControlAction, EngineEvent, PlaybackState, QueueItem, Snapshot};
use std::sync::{Arc, Mutex, MutexGuard};

struct Inner {
    queue: AnnouncementQueue,
    bus: EventBus,
}

impl Inner {
    fn publish_queue(&self) {
        self.bus.publish(&EngineEvent::QueueChange {
            snapshot: self.queue.pending_summary(),
        });
    }

    /// Moves the head into `current` if eligible, starting playback.
    fn try_advance(&mut self, player: &dyn Player) -> bool {
        let Some(item) = self.queue.advance().cloned() else {
            return false;
        };
        self.bus.publish(&EngineEvent::PlaybackStarted { item: item.clone() });
        self.publish_queue();
        player.begin(&item, PlaybackTicket(item.enqueued_at));
        true
    }
}

/// Owns the queue, the event bus, and the player.
///
/// Every mutation takes one short-held lock, changes the state, and
/// publishes the resulting events before releasing it, so observers see
/// events in mutation order. Control operations are total: invoking one
/// in a state where it has nothing to do is a silent no-op.
///
/// Items have no playback timeout. An item whose player never reports
/// completion stays current until it is skipped or stopped.
pub struct PlaybackController {
    inner: Mutex<Inner>,
    player: Arc<dyn Player>,
}

impl PlaybackController {
    pub fn new(player: Arc<dyn Player>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: AnnouncementQueue::new(),
                bus: EventBus::new(),
            }),
            player,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!("engine state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Registers an observer. Delivery follows registration order.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) -> SubscriptionId {
        self.lock().bus.subscribe(sink)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().bus.unsubscribe(id)
    }

    /// Inserts one item and starts it if the controller is idle.
    pub fn enqueue(&self, item: QueueItem) -> QueueItem {
        self.enqueue_all(vec![item]).remove(0)
    }

    /// Inserts a batch under one lock, publishing `queue_change` after each
    /// insertion, then attempts a single advance.
    ///
    /// Returns the stored copies with their arrival sequence filled in.
    pub fn enqueue_all(&self, items: Vec<QueueItem>) -> Vec<QueueItem> {
        let mut inner = self.lock();
        let stored: Vec<QueueItem> = items
            .into_iter()
            .map(|item| {
                let stored = inner.queue.enqueue(item);
                tracing::debug!(
                    id = %stored.id,
                    priority = stored.priority,
                    seq = stored.enqueued_at,
                    "enqueued announcement"
                );
                inner.publish_queue();
                stored
            })
            .collect();
        inner.try_advance(self.player.as_ref());
        stored
    }

    pub fn peek_next(&self) -> Option<QueueItem> {
        self.lock().queue.peek_next().cloned()
    }

    /// Starts the next item if not paused and nothing is playing.
    pub fn advance(&self) -> bool {
        self.lock().try_advance(self.player.as_ref())
    }

    /// Reports that the item identified by `ticket` finished playing.
    ///
    /// Stale tickets (the item was already skipped or stopped) are ignored.
    /// Returns `true` if the current item was cleared.
    pub fn finish(&self, ticket: PlaybackTicket) -> bool {
        let mut inner = self.lock();
        let matches = inner
            .queue
            .current()
            .is_some_and(|current| current.enqueued_at == ticket.0);
        if !matches {
            tracing::debug!(ticket = ticket.0, "ignoring stale playback completion");
            return false;
        }
        if let Some(item) = inner.queue.take_current() {
            tracing::info!(id = %item.id, "announcement finished");
            inner.bus.publish(&EngineEvent::PlaybackFinished { item });
        }
        inner.try_advance(self.player.as_ref());
        true
    }

    /// Sets the paused flag. The current item, if any, keeps playing.
    pub fn pause(&self) {
        let mut inner = self.lock();
        if inner.queue.set_paused(true) {
            tracing::info!("playback paused");
            inner.bus.publish(&EngineEvent::PauseChanged { paused: true });
        }
    }

    /// Clears the paused flag and attempts to advance.
    pub fn resume(&self) {
        let mut inner = self.lock();
        if inner.queue.set_paused(false) {
            tracing::info!("playback resumed");
            inner.bus.publish(&EngineEvent::PauseChanged { paused: false });
        }
        inner.try_advance(self.player.as_ref());
    }

    /// Interrupts the current item and moves on. No-op when idle.
    ///
    /// Returns `true` if an item was skipped.
    pub fn skip_current(&self) -> bool {
        let mut inner = self.lock();
        let Some(item) = inner.queue.take_current() else {
            return false;
        };
        self.player.interrupt();
        tracing::info!(id = %item.id, "skipped current announcement");
        inner.bus.publish(&EngineEvent::Stopped {});
        inner.try_advance(self.player.as_ref());
        true
    }

    /// Interrupts the current item and discards every pending item.
    ///
    /// The paused flag is left as is. Always publishes a `queue_change`
    /// with an empty snapshot.
    pub fn stop_all(&self) {
        let mut inner = self.lock();
        if let Some(item) = inner.queue.take_current() {
            self.player.interrupt();
            tracing::info!(id = %item.id, "stopped current announcement");
            inner.bus.publish(&EngineEvent::Stopped {});
        }
        let dropped = inner.queue.clear_pending();
        if dropped > 0 {
            tracing::info!(dropped, "cleared pending announcements");
        }
        inner.publish_queue();
    }

    /// Dispatches a parsed control action.
    pub fn apply(&self, action: ControlAction) {
        match action {
            ControlAction::Pause => self.pause(),
            ControlAction::Resume => self.resume(),
            ControlAction::Skip => {
                self.skip_current();
            }
            ControlAction::Stop => self.stop_all(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().queue.snapshot()
    }

    pub fn current(&self) -> Option<QueueItem> {
        self.lock().queue.current().cloned()
    }

    pub fn pending(&self) -> Vec<QueueItem> {
        self.lock().queue.pending().to_vec()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_paused(&self) -> bool {
        self.lock().queue.is_paused()
    }

    /// `Paused` while the flag is set, else `Playing` with a current item,
    /// else `Idle`.
    pub fn state(&self) -> PlaybackState {
        let inner = self.lock();
        if inner.queue.is_paused() {
            PlaybackState::Paused
        } else if inner.queue.current().is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    pub fn observer_count(&self) -> usize {
        self.lock().bus.len()
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("PlaybackController")
            .field("queue", &inner.queue)
            .field("bus", &inner.bus)
            .finish()
    }
}
