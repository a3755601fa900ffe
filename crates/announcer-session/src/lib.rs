//! Bearer-token issuance and watcher bookkeeping.
//!
//! A client binds with a display name and, when the server is configured
//! with one, the shared bind secret. The returned token is opaque, lives
//! for the process lifetime, and gates write access (triggers and control
//! commands) from real-time connections.
//!
//! Each token is associated with at most one live real-time connection.
//! Registering a newer connection silently replaces the previous
//! association.

use announcer_types::Token;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Errors returned by the session registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The supplied bind secret does not match the configured one.
    #[error("invalid bind secret")]
    InvalidSecret,

    /// The token was never issued by this process.
    #[error("invalid token")]
    UnknownToken,
}

#[derive(Default)]
struct State {
    tokens: HashMap<String, Token>,
    /// token id -> id of the connection currently registered with it.
    watchers: HashMap<String, Uuid>,
}

/// Process-lifetime token store shared by every transport adapter.
///
/// Cloning is cheap; clones share the same state. All lock acquisitions
/// are brief map operations and never span an `.await`.
#[derive(Clone)]
pub struct SessionRegistry {
    secret_digest: Option<[u8; 32]>,
    state: Arc<RwLock<State>>,
}

fn digest(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"announcer-bind-secret:");
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

impl SessionRegistry {
    /// Creates a registry. With `bind_secret == None` every bind succeeds.
    pub fn new(bind_secret: Option<&str>) -> Self {
        Self {
            secret_digest: bind_secret.map(digest),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    pub fn requires_secret(&self) -> bool {
        self.secret_digest.is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| {
            tracing::error!("session registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| {
            tracing::error!("session registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Issues a new token for `name`.
    ///
    /// A missing or blank name is recorded as `"unknown"`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSecret`] when a bind secret is
    /// configured and `supplied_secret` does not match it.
    pub fn issue(&self, name: Option<&str>, supplied_secret: Option<&str>) -> Result<Token, SessionError> {
        if let Some(expected) = &self.secret_digest {
            let matches = supplied_secret.is_some_and(|secret| digest(secret) == *expected);
            if !matches {
                tracing::warn!(binder = name.unwrap_or("unknown"), "rejected bind with invalid secret");
                return Err(SessionError::InvalidSecret);
            }
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("unknown");
        let token = Token {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: chrono::Utc::now(),
        };
        self.write().tokens.insert(token.id.clone(), token.clone());
        tracing::info!(token = %token.id, binder = %token.name, "issued bind token");
        Ok(token)
    }

    /// Returns `true` if `token_id` was issued by this registry.
    pub fn validate(&self, token_id: &str) -> bool {
        self.read().tokens.contains_key(token_id)
    }

    pub fn get(&self, token_id: &str) -> Option<Token> {
        self.read().tokens.get(token_id).cloned()
    }

    /// Associates `connection_id` with `token_id`, replacing any previous
    /// connection.
    ///
    /// Returns the replaced connection id, if there was one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownToken`] for tokens never issued.
    pub fn attach(&self, token_id: &str, connection_id: Uuid) -> Result<Option<Uuid>, SessionError> {
        let mut state = self.write();
        if !state.tokens.contains_key(token_id) {
            return Err(SessionError::UnknownToken);
        }
        let previous = state.watchers.insert(token_id.to_string(), connection_id);
        if let Some(previous) = previous.filter(|p| *p != connection_id) {
            tracing::debug!(
                token = %token_id,
                previous = %previous,
                connection = %connection_id,
                "replaced watcher connection for token"
            );
        }
        Ok(previous)
    }

    /// Removes the association if `connection_id` is still the one attached.
    ///
    /// A replaced connection tearing down never removes its successor.
    pub fn detach(&self, token_id: &str, connection_id: Uuid) -> bool {
        let mut state = self.write();
        match state.watchers.get(token_id) {
            Some(current) if *current == connection_id => {
                state.watchers.remove(token_id);
                true
            }
            _ => false,
        }
    }

    /// The connection currently attached to `token_id`.
    pub fn watcher(&self, token_id: &str) -> Option<Uuid> {
        self.read().watchers.get(token_id).copied()
    }

    pub fn watcher_count(&self) -> usize {
        self.read().watchers.len()
    }

    pub fn token_count(&self) -> usize {
        self.read().tokens.len()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("requires_secret", &self.requires_secret())
            .field("tokens", &self.token_count())
            .field("watchers", &self.watcher_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_registry_issues_without_secret() {
        let registry = SessionRegistry::new(None);
        let token = registry.issue(Some("cockpit"), None).unwrap();
        assert_eq!(token.name, "cockpit");
        assert!(registry.validate(&token.id));
        assert!(!registry.requires_secret());
    }

    #[test]
    fn open_registry_ignores_supplied_secret() {
        let registry = SessionRegistry::new(None);
        assert!(registry.issue(Some("a"), Some("anything")).is_ok());
    }

    #[test]
    fn secret_must_match() {
        let registry = SessionRegistry::new(Some("s3cret"));
        assert_eq!(
            registry.issue(Some("a"), Some("wrong")),
            Err(SessionError::InvalidSecret)
        );
        assert_eq!(registry.issue(Some("a"), None), Err(SessionError::InvalidSecret));
        assert_eq!(registry.token_count(), 0);

        let token = registry.issue(Some("a"), Some("s3cret")).unwrap();
        assert!(registry.validate(&token.id));
    }

    #[test]
    fn blank_name_becomes_unknown() {
        let registry = SessionRegistry::new(None);
        assert_eq!(registry.issue(None, None).unwrap().name, "unknown");
        assert_eq!(registry.issue(Some("   "), None).unwrap().name, "unknown");
    }

    #[test]
    fn tokens_are_unique_and_unknown_ids_fail() {
        let registry = SessionRegistry::new(None);
        let a = registry.issue(Some("a"), None).unwrap();
        let b = registry.issue(Some("a"), None).unwrap();
        assert_ne!(a.id, b.id);
        assert!(!registry.validate("not-a-token"));
        assert!(registry.get(&a.id).is_some());
    }

    #[test]
    fn newest_connection_replaces_previous() {
        let registry = SessionRegistry::new(None);
        let token = registry.issue(Some("panel"), None).unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(registry.attach(&token.id, first), Ok(None));
        assert_eq!(registry.attach(&token.id, second), Ok(Some(first)));
        assert_eq!(registry.watcher(&token.id), Some(second));
        assert_eq!(registry.watcher_count(), 1);

        // The replaced connection closing must not evict its successor.
        assert!(!registry.detach(&token.id, first));
        assert_eq!(registry.watcher(&token.id), Some(second));

        assert!(registry.detach(&token.id, second));
        assert_eq!(registry.watcher_count(), 0);
    }

    #[test]
    fn attach_rejects_unknown_token() {
        let registry = SessionRegistry::new(None);
        assert_eq!(
            registry.attach("missing", Uuid::new_v4()),
            Err(SessionError::UnknownToken)
        );
    }

    #[test]
    fn clones_share_state() {
        let registry = SessionRegistry::new(None);
        let clone = registry.clone();
        let token = clone.issue(Some("x"), None).unwrap();
        assert!(registry.validate(&token.id));
    }
}
