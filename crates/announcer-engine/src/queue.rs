//! Pending queue plus the single current item.

use announcer_types::{ItemSummary, QueueItem, Snapshot};

/// Priority-ordered pending items and the item currently playing.
///
/// Pending items are kept sorted by descending priority; equal priorities
/// keep arrival order. An item lives in exactly one place: `pending`,
/// `current`, or nowhere.
#[derive(Debug, Default)]
pub struct AnnouncementQueue {
    pending: Vec<QueueItem>,
    current: Option<QueueItem>,
    paused: bool,
    next_seq: u64,
}

impl AnnouncementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `item` behind every pending item of equal or higher priority.
    ///
    /// Overwrites `item.enqueued_at` with the next arrival sequence and
    /// returns the stored copy. Never touches `current`.
    pub fn enqueue(&mut self, mut item: QueueItem) -> QueueItem {
        self.next_seq += 1;
        item.enqueued_at = self.next_seq;
        let at = self
            .pending
            .partition_point(|queued| queued.priority >= item.priority);
        self.pending.insert(at, item.clone());
        item
    }

    /// Head of the pending queue, without removing it.
    pub fn peek_next(&self) -> Option<&QueueItem> {
        self.pending.first()
    }

    /// Whether [`advance`](Self::advance) would move an item.
    pub fn can_advance(&self) -> bool {
        !self.paused && self.current.is_none() && !self.pending.is_empty()
    }

    /// Pops the head into `current` when not paused and nothing is playing.
    pub fn advance(&mut self) -> Option<&QueueItem> {
        if !self.can_advance() {
            return None;
        }
        let next = self.pending.remove(0);
        self.current = Some(next);
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    /// Clears and returns the current item.
    pub fn take_current(&mut self) -> Option<QueueItem> {
        self.current.take()
    }

    /// Drops every pending item and returns how many were discarded.
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sets the paused flag. Returns `true` if the flag changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        let changed = self.paused != paused;
        self.paused = paused;
        changed
    }

    pub fn pending(&self) -> &[QueueItem] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// `{id, priority}` pairs in play order.
    pub fn pending_summary(&self) -> Vec<ItemSummary> {
        self.pending.iter().map(QueueItem::summary).collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            queue: self.pending_summary(),
            current: self.current.as_ref().map(QueueItem::summary),
            paused: self.paused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, priority: i64) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            text: format!("text {}", id),
            audio_ref: None,
            priority,
            context: Default::default(),
            enqueued_at: 0,
        }
    }

    fn ids(queue: &AnnouncementQueue) -> Vec<&str> {
        queue.pending().iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn orders_by_priority_then_arrival() {
        let mut queue = AnnouncementQueue::new();
        queue.enqueue(item("a", 1));
        queue.enqueue(item("b", 5));
        queue.enqueue(item("c", 1));
        queue.enqueue(item("d", 5));
        queue.enqueue(item("e", 9));
        queue.enqueue(item("f", -2));

        assert_eq!(ids(&queue), vec!["e", "b", "d", "a", "c", "f"]);
    }

    #[test]
    fn assigns_increasing_sequence_numbers() {
        let mut queue = AnnouncementQueue::new();
        let first = queue.enqueue(item("a", 0));
        let second = queue.enqueue(item("b", 0));
        assert!(second.enqueued_at > first.enqueued_at);
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut queue = AnnouncementQueue::new();
        queue.enqueue(item("a", 1));
        assert_eq!(queue.peek_next().map(|i| i.id.as_str()), Some("a"));
        assert_eq!(queue.peek_next().map(|i| i.id.as_str()), Some("a"));
        assert_eq!(queue.len(), 1);
        assert!(queue.current().is_none());
    }

    #[test]
    fn advance_moves_head_into_current() {
        let mut queue = AnnouncementQueue::new();
        queue.enqueue(item("low", 1));
        queue.enqueue(item("high", 2));

        let started = queue.advance().map(|i| i.id.clone());
        assert_eq!(started.as_deref(), Some("high"));
        assert_eq!(ids(&queue), vec!["low"]);

        // Only one item may be current at a time.
        assert!(queue.advance().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn enqueue_never_preempts_current() {
        let mut queue = AnnouncementQueue::new();
        queue.enqueue(item("first", 1));
        queue.advance();
        queue.enqueue(item("urgent", 100));

        assert_eq!(queue.current().map(|i| i.id.as_str()), Some("first"));
        assert_eq!(ids(&queue), vec!["urgent"]);
    }

    #[test]
    fn paused_queue_does_not_advance() {
        let mut queue = AnnouncementQueue::new();
        queue.enqueue(item("a", 1));
        assert!(queue.set_paused(true));
        assert!(!queue.set_paused(true));
        assert!(queue.advance().is_none());

        queue.set_paused(false);
        assert!(queue.advance().is_some());
    }

    #[test]
    fn snapshot_reflects_all_fields() {
        let mut queue = AnnouncementQueue::new();
        queue.enqueue(item("a", 3));
        queue.enqueue(item("b", 2));
        queue.advance();
        queue.set_paused(true);

        let snapshot = queue.snapshot();
        assert_eq!(
            snapshot.current,
            Some(ItemSummary {
                id: "a".to_string(),
                priority: 3
            })
        );
        assert_eq!(snapshot.queue.len(), 1);
        assert!(snapshot.paused);
    }
}
