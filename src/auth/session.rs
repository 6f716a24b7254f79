//! Bearer token and user identity of the current session.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, KEY_TOKEN};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// Session state shared by the request client and the tenant directory.
///
/// The token is persisted; the user identity is held in memory only and
/// must be restored by the application (e.g. from a `/me` call) after a
/// restart.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    token: Arc<ArcSwapOption<String>>,
    user: Arc<ArcSwapOption<UserIdentity>>,
}

impl Session {
    /// Restore the session from the store.
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let token = store.get(KEY_TOKEN).filter(|t| !t.is_empty()).map(Arc::new);
        if token.is_some() {
            tracing::debug!("Restored bearer token from storage");
        }
        Self {
            store,
            token: Arc::new(ArcSwapOption::new(token)),
            user: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Install the token and user after a successful login.
    pub fn login(&self, token: impl Into<String>, user: UserIdentity) {
        let token = token.into();
        if let Err(e) = self.store.set(KEY_TOKEN, &token) {
            tracing::warn!(error = %e, "Failed to persist bearer token");
        }
        self.token.store(Some(Arc::new(token)));
        tracing::info!(user_id = %user.id, "Session established");
        self.user.store(Some(Arc::new(user)));
    }

    /// Set the user identity for a restored token.
    pub fn set_user(&self, user: Option<UserIdentity>) {
        self.user.store(user.map(Arc::new));
    }

    /// Current bearer token.
    pub fn token(&self) -> Option<Arc<String>> {
        self.token.load_full()
    }

    /// Current user identity.
    pub fn user(&self) -> Option<Arc<UserIdentity>> {
        self.user.load_full()
    }

    /// True when a token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.load().is_some()
    }

    /// Drop the token and identity, locally and in storage.
    pub fn logout(&self) {
        self.token.store(None);
        self.user.store(None);
        if let Err(e) = self.store.remove(KEY_TOKEN) {
            tracing::warn!(error = %e, "Failed to remove bearer token");
        }
    }

    /// Clear the session because `token` was rejected by the backend.
    ///
    /// A newer token installed while the rejected request was in flight is
    /// left untouched.
    pub fn invalidate(&self, token: &str) -> bool {
        let current = self.token.load();
        match current.as_deref() {
            Some(t) if t.as_str() == token => {
                tracing::warn!("Backend rejected session token, logging out locally");
                self.logout();
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("user", &self.user())
            .finish()
    }
}
