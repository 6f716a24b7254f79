//! Tenant directory caching and persistence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::directory::types::Tenant;
use crate::storage::{KeyValueStore, KEY_DIRECTORY, KEY_SELECTED_TENANT};

/// Persisted directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// User the list belongs to.
    pub user_id: String,
    /// Fetch time (epoch millis).
    pub fetched_at_ms: u64,
    pub ttl_ms: u64,
    pub tenants: Vec<Tenant>,
}

impl DirectorySnapshot {
    /// Check if the entry is still within its TTL.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.fetched_at_ms) < self.ttl_ms
    }
}

/// Reads and writes directory state in the key-value store.
///
/// Storage failures are logged and swallowed: the in-memory directory
/// stays authoritative for the running process.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the snapshot for `user_id` if one exists and is still fresh.
    pub fn load_fresh(&self, user_id: &str, now_ms: u64) -> Option<DirectorySnapshot> {
        let raw = self.store.get(KEY_DIRECTORY)?;
        let snapshot: DirectorySnapshot = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable directory snapshot");
                return None;
            }
        };
        if snapshot.user_id != user_id {
            tracing::debug!("Directory snapshot belongs to another user, ignoring");
            return None;
        }
        if !snapshot.is_fresh(now_ms) {
            tracing::debug!(
                age_ms = now_ms.saturating_sub(snapshot.fetched_at_ms),
                "Directory snapshot expired"
            );
            return None;
        }
        Some(snapshot)
    }

    pub fn save(&self, snapshot: &DirectorySnapshot) {
        let result = serde_json::to_string(snapshot)
            .map_err(crate::storage::StoreError::from)
            .and_then(|json| self.store.set(KEY_DIRECTORY, &json));
        match result {
            Ok(()) => tracing::debug!(tenants = snapshot.tenants.len(), "Saved directory snapshot"),
            Err(e) => tracing::warn!(error = %e, "Failed to save directory snapshot"),
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(KEY_DIRECTORY) {
            tracing::warn!(error = %e, "Failed to remove directory snapshot");
        }
    }

    pub fn selected_id(&self) -> Option<String> {
        self.store.get(KEY_SELECTED_TENANT).filter(|id| !id.is_empty())
    }

    pub fn save_selected_id(&self, id: &str) {
        if let Err(e) = self.store.set(KEY_SELECTED_TENANT, id) {
            tracing::warn!(error = %e, "Failed to persist selected tenant");
        }
    }

    pub fn clear_selected_id(&self) {
        if let Err(e) = self.store.remove(KEY_SELECTED_TENANT) {
            tracing::warn!(error = %e, "Failed to remove selected tenant");
        }
    }
}
