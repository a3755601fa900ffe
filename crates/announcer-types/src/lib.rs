//! Shared types for the announcer workspace.
//!
//! Queue items, engine events, snapshots, control actions, and bind tokens
//! are defined here so the engine, the session registry, and the transport
//! adapters agree on one wire shape. Every type that crosses a transport
//! boundary serializes to the JSON layout observers already consume
//! (`snake_case` tags under a `type` key).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// String-to-string context bag supplied with a trigger.
pub type Context = BTreeMap<String, String>;

/// A rendered announcement waiting in (or playing from) the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Identifier copied from the source rule. Not unique across items.
    pub id: String,
    /// Template output after placeholder substitution.
    pub text: String,
    /// Absolute or audio-dir-relative path of the paired audio file.
    #[serde(rename = "audioPath")]
    pub audio_ref: Option<PathBuf>,
    pub priority: i64,
    pub context: Context,
    /// Monotonic arrival sequence assigned by the queue on insertion.
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at: u64,
}

impl QueueItem {
    /// Compact `{id, priority}` view used in snapshots.
    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id.clone(),
            priority: self.priority,
        }
    }
}

/// The `{id, priority}` pair broadcast in queue snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub priority: i64,
}

/// Point-in-time view of the engine state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub queue: Vec<ItemSummary>,
    pub current: Option<ItemSummary>,
    pub paused: bool,
}

/// Engine state change, published synchronously by the single writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The pending queue changed. Carries the full pending order.
    QueueChange { snapshot: Vec<ItemSummary> },
    /// An item moved from the queue into `current`.
    PlaybackStarted { item: QueueItem },
    /// The current item completed on its own.
    PlaybackFinished { item: QueueItem },
    /// Playback of the current item was cut short by skip or stop.
    Stopped {},
    /// The paused flag flipped.
    PauseChanged { paused: bool },
}

impl EngineEvent {
    /// Returns the wire tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueueChange { .. } => "queue_change",
            Self::PlaybackStarted { .. } => "playback_started",
            Self::PlaybackFinished { .. } => "playback_finished",
            Self::Stopped {} => "stopped",
            Self::PauseChanged { .. } => "pause_changed",
        }
    }
}

/// Derived playback state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing playing and the paused flag is clear.
    Idle,
    /// A current item is set.
    Playing,
    /// The paused flag is set; a current item may still be finishing.
    Paused,
}

impl PlaybackState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

/// Control actions accepted by the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Pause,
    Resume,
    Skip,
    Stop,
}

impl ControlAction {
    /// Returns the canonical lowercase action name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Skip => "skip",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ControlAction {
    type Err = ParseControlActionError;

    /// Parses an action name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "skip" => Ok(Self::Skip),
            "stop" => Ok(Self::Stop),
            _ => Err(ParseControlActionError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown control action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct ParseControlActionError(pub String);

/// An opaque bearer token issued by the bind endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Converts a JSON object into a string context bag.
///
/// Strings are taken as-is, numbers and booleans use their JSON text, nested
/// values are kept as compact JSON, and `null` entries are dropped. Any
/// non-object input yields an empty context.
pub fn context_from_json(value: &serde_json::Value) -> Context {
    let Some(map) = value.as_object() else {
        return Context::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}
