//! Trigger dispatch: catalog lookup, rendering, and enqueueing.

use crate::catalog::{Rule, RuleCatalog};
use crate::controller::PlaybackController;
use crate::error::EngineError;
use crate::player::Player;
use crate::template;
use announcer_types::{Context, QueueItem};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Facade tying the immutable catalog to the playback controller.
///
/// Catalog lookups and rendering happen outside the controller lock; only
/// the final insertion is serialized.
#[derive(Debug)]
pub struct AnnouncementEngine {
    catalog: RuleCatalog,
    controller: Arc<PlaybackController>,
    audio_dir: PathBuf,
}

impl AnnouncementEngine {
    pub fn new(catalog: RuleCatalog, player: Arc<dyn Player>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            controller: Arc::new(PlaybackController::new(player)),
            audio_dir: audio_dir.into(),
        }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn find_for_trigger(&self, name: &str) -> Vec<&Rule> {
        self.catalog.find_for_trigger(name)
    }

    pub fn list_triggers(&self) -> BTreeSet<String> {
        self.catalog.list_triggers()
    }

    /// Renders `rule` against `context` into an unqueued item.
    pub fn build_item(&self, rule: &Rule, context: &Context) -> QueueItem {
        QueueItem {
            id: rule.id.clone(),
            text: template::render(&rule.template, context),
            audio_ref: rule.audio_ref.as_ref().map(|audio| self.audio_dir.join(audio)),
            priority: rule.priority,
            context: context.clone(),
            enqueued_at: 0,
        }
    }

    /// Resolves `trigger`, renders every matching rule, and enqueues the
    /// results as one batch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRulesForTrigger`] when nothing matches. In
    /// that case no state changes and no event is published.
    pub fn dispatch(&self, trigger: &str, context: &Context) -> Result<Vec<QueueItem>, EngineError> {
        let rules = self.catalog.find_for_trigger(trigger);
        if rules.is_empty() {
            tracing::debug!(trigger = %trigger, "no announcements configured for trigger");
            return Err(EngineError::NoRulesForTrigger(trigger.to_string()));
        }

        let items = rules
            .into_iter()
            .map(|rule| self.build_item(rule, context))
            .collect();
        let stored = self.controller.enqueue_all(items);
        tracing::info!(trigger = %trigger, enqueued = stored.len(), "trigger dispatched");
        Ok(stored)
    }
}
