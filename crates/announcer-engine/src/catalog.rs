//! Trigger-to-rule catalog, loaded once at startup.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// A configured announcement: which trigger fires it, what it says, and how
/// urgently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(rename = "trigger")]
    pub trigger_name: String,
    pub template: String,
    /// Audio file name, relative to the configured audio directory.
    #[serde(default, rename = "audio")]
    pub audio_ref: Option<String>,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    announcements: Vec<Rule>,
}

/// Immutable lookup from trigger name to rules.
///
/// Many rules may share a trigger name; lookups return them in file order.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    by_trigger: HashMap<String, Vec<usize>>,
}

impl RuleCatalog {
    /// Builds a catalog from already-parsed rules.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRule`] if a rule has an empty id,
    /// trigger, or template.
    pub fn from_rules(rules: Vec<Rule>) -> Result<Self, EngineError> {
        let mut by_trigger: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(EngineError::InvalidRule(format!(
                    "rule #{} has an empty id",
                    index
                )));
            }
            if rule.trigger_name.is_empty() {
                return Err(EngineError::InvalidRule(format!(
                    "rule {} has an empty trigger",
                    rule.id
                )));
            }
            if rule.template.is_empty() {
                return Err(EngineError::InvalidRule(format!(
                    "rule {} has an empty template",
                    rule.id
                )));
            }
            by_trigger
                .entry(rule.trigger_name.clone())
                .or_default()
                .push(index);
        }
        Ok(Self { rules, by_trigger })
    }

    /// Parses a catalog document of the form `{"announcements": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_rules(file.announcements)
    }

    /// Reads and parses the catalog file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| EngineError::CatalogRead {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&contents)?;
        tracing::info!(
            path = %path.display(),
            rules = catalog.len(),
            triggers = catalog.by_trigger.len(),
            "loaded announcement catalog"
        );
        Ok(catalog)
    }

    /// Returns every rule whose trigger name matches `name` exactly.
    ///
    /// The match is case-sensitive. An unknown trigger yields an empty list.
    pub fn find_for_trigger(&self, name: &str) -> Vec<&Rule> {
        self.by_trigger
            .get(name)
            .map(|indices| indices.iter().map(|&i| &self.rules[i]).collect())
            .unwrap_or_default()
    }

    /// Returns the distinct configured trigger names, sorted.
    pub fn list_triggers(&self) -> BTreeSet<String> {
        self.by_trigger.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
