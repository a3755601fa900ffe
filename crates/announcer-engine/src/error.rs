//! Error types for the announcement engine.

use std::path::PathBuf;

/// Errors raised while loading the catalog or resolving triggers.
///
/// Control operations never produce an error; see
/// [`PlaybackController`](crate::PlaybackController).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid JSON or has the wrong shape.
    #[error("failed to parse catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    /// A rule in the catalog is missing a required field.
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// No rule is configured for the requested trigger.
    #[error("No announcements for trigger {0}")]
    NoRulesForTrigger(String),
}
