//! Playback collaborators.
//!
//! The engine never decodes audio. A [`Player`] is told when an item starts
//! and when it must be cut short, and reports completion by handing the
//! item's [`PlaybackTicket`] back to
//! [`PlaybackController::finish`](crate::PlaybackController::finish).

use crate::controller::PlaybackController;
use announcer_types::QueueItem;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies which item a completion signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackTicket(pub u64);

/// Playback side of the engine.
///
/// Both methods are called with the engine lock held: they must not block
/// and must not call back into the controller synchronously.
pub trait Player: Send + Sync {
    /// Starts playing `item`. Completion is reported later with `ticket`.
    fn begin(&self, item: &QueueItem, ticket: PlaybackTicket);

    /// Aborts whatever is currently playing.
    fn interrupt(&self);
}

/// Player that never completes on its own.
///
/// Items stay current until skipped or stopped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPlayer;

impl Player for NoopPlayer {
    fn begin(&self, item: &QueueItem, ticket: PlaybackTicket) {
        tracing::debug!(id = %item.id, ticket = ticket.0, "holding item until skipped");
    }

    fn interrupt(&self) {}
}

/// Speaking-rate model used by [`TimedPlayer`].
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub words_per_minute: u32,
    pub min_duration: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            words_per_minute: 160,
            min_duration: Duration::from_millis(1500),
        }
    }
}

impl Pacing {
    /// Estimated time to speak `text`.
    pub fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        let wpm = u64::from(self.words_per_minute.max(1));
        let spoken = Duration::from_millis(words * 60_000 / wpm);
        spoken.max(self.min_duration)
    }
}

/// Simulates speech by holding each item for its estimated duration.
///
/// Completed tickets are sent on the channel returned by
/// [`TimedPlayer::new`]; feed it to [`run_completions`].
#[derive(Debug)]
pub struct TimedPlayer {
    pacing: Pacing,
    completions: mpsc::UnboundedSender<PlaybackTicket>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TimedPlayer {
    pub fn new(pacing: Pacing) -> (Self, mpsc::UnboundedReceiver<PlaybackTicket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Self {
            pacing,
            completions: tx,
            task: Mutex::new(None),
        };
        (player, rx)
    }

    fn task_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| {
            tracing::error!("player task lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Player for TimedPlayer {
    fn begin(&self, item: &QueueItem, ticket: PlaybackTicket) {
        let duration = self.pacing.duration_for(&item.text);
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(id = %item.id, "no async runtime to time playback: {}", e);
                return;
            }
        };

        tracing::info!(
            id = %item.id,
            ticket = ticket.0,
            duration_ms = duration.as_millis() as u64,
            "playing announcement"
        );

        let completions = self.completions.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep(duration).await;
            if completions.send(ticket).is_err() {
                tracing::warn!(ticket = ticket.0, "completion receiver dropped");
            }
        });

        if let Some(previous) = self.task_slot().replace(task) {
            previous.abort();
        }
    }

    fn interrupt(&self) {
        if let Some(task) = self.task_slot().take() {
            task.abort();
        }
    }
}

/// Feeds completion tickets back into the controller until the channel closes.
pub async fn run_completions(
    controller: Arc<PlaybackController>,
    mut completions: mpsc::UnboundedReceiver<PlaybackTicket>,
) {
    while let Some(ticket) = completions.recv().await {
        controller.finish(ticket);
    }
    tracing::debug!("playback completion channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_uses_minimum_duration() {
        let pacing = Pacing::default();
        assert_eq!(pacing.duration_for("Gear down"), Duration::from_millis(1500));
        assert_eq!(pacing.duration_for(""), Duration::from_millis(1500));
    }

    #[test]
    fn long_text_scales_with_word_count() {
        let pacing = Pacing {
            words_per_minute: 120,
            min_duration: Duration::ZERO,
        };
        let text = vec!["word"; 60].join(" ");
        assert_eq!(pacing.duration_for(&text), Duration::from_secs(30));
    }

    #[test]
    fn zero_rate_does_not_divide_by_zero() {
        let pacing = Pacing {
            words_per_minute: 0,
            min_duration: Duration::ZERO,
        };
        assert_eq!(pacing.duration_for("one"), Duration::from_secs(60));
    }
}
