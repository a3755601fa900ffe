//! Announcement dispatch engine.
//!
//! Resolves trigger names to configured rules, renders their templates,
//! and serializes playback through a priority queue with at most one
//! current item. Every state change is published synchronously to the
//! registered observers, in the order the mutations happened.
//!
//! # Pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`RuleCatalog`] | trigger name → rules, loaded once |
//! | [`render`] | `{name}` placeholder substitution |
//! | [`AnnouncementQueue`] | pending order plus the current item |
//! | [`PlaybackController`] | pause/resume/skip/stop, the single writer |
//! | [`EventBus`] | ordered observer fan-out |
//! | [`Player`] | starts, interrupts, and completes playback |
//! | [`AnnouncementEngine`] | dispatches a trigger end to end |
//!
//! # Usage
//!
//! ```rust,ignore
//! use announcer_engine::{AnnouncementEngine, NoopPlayer, RuleCatalog};
//!
//! let catalog = RuleCatalog::load("announcements-config.json")?;
//! let engine = AnnouncementEngine::new(catalog, Arc::new(NoopPlayer), "audio");
//! engine.controller().subscribe(Arc::new(|event: &EngineEvent| println!("{:?}", event)));
//! engine.dispatch("gear_down", &context)?;
//! ```

mod bus;
mod catalog;
mod controller;
mod engine;
mod error;
mod player;
mod queue;
mod template;

pub use bus::{EventBus, EventSink, SubscriptionId};
pub use catalog::{Rule, RuleCatalog};
pub use controller::PlaybackController;
pub use engine::AnnouncementEngine;
pub use error::EngineError;
pub use player::{run_completions, NoopPlayer, Pacing, PlaybackTicket, Player, TimedPlayer};
pub use queue::AnnouncementQueue;
pub use template::render;
