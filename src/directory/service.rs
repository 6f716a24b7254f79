//! Tenant directory cache.
//!
//! # Responsibilities
//! - Race the configured lookup endpoints and keep the first usable list
//! - Preserve the last good list when every lookup fails
//! - Clear everything as soon as one lookup reports the session unauthorized
//! - Track the selected tenant and publish transition events
//! - Seed from the persisted snapshot on start (stale-while-revalidate)
//!
//! Observers receive complete `DirectoryState` values through a watch
//! channel; every change replaces the state as a whole.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::Session;
use crate::config::DirectoryConfig;
use crate::directory::cache::{DirectorySnapshot, SnapshotStore};
use crate::directory::normalize::normalize_body;
use crate::directory::types::{DirectoryState, Tenant, TransitionEvent};
use crate::error::ClientError;
use crate::http::{ApiResponse, RequestClient};
use crate::observability::metrics;
use crate::resilience::{first_qualifying, RaceOutcome, Verdict};
use crate::schedule::{Clock, ScheduledEvent};
use crate::storage::KeyValueStore;

/// Why a lookup attempt did not qualify.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    /// Non-2xx, or a synthetic failure.
    Failed(u16),
    /// 2xx but the body was not JSON.
    Malformed,
    /// 2xx with a usable shape but no tenants.
    Empty,
}

fn classify(response: ApiResponse) -> Verdict<Vec<Tenant>, Rejection, ClientError> {
    if response.failure().is_none() && response.is_unauthorized() {
        return Verdict::Abort(ClientError::Unauthorized(response.status.as_u16()));
    }
    if !response.is_success() {
        return Verdict::Reject(Rejection::Failed(response.status.as_u16()));
    }
    match normalize_body(&response.body) {
        None => Verdict::Reject(Rejection::Malformed),
        Some(tenants) if tenants.is_empty() => Verdict::Reject(Rejection::Empty),
        Some(tenants) => Verdict::Accept(tenants),
    }
}

/// Pick the selection after the list changed.
///
/// Keeps the current selection if still present (with refreshed data),
/// then the persisted choice, then the first tenant.
fn reconcile_selection(tenants: &[Tenant], current: Option<&str>, persisted: Option<&str>) -> Option<Tenant> {
    let find = |id: &str| tenants.iter().find(|t| t.id == id);
    current
        .and_then(find)
        .or_else(|| persisted.and_then(find))
        .or_else(|| tenants.first())
        .cloned()
}

/// Shared handle to the directory. Cheap to clone.
#[derive(Clone)]
pub struct TenantDirectory {
    inner: Arc<Inner>,
}

struct Inner {
    client: RequestClient,
    snapshots: SnapshotStore,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    transition_duration: Duration,
    lookup_paths: Vec<String>,
    state: watch::Sender<DirectoryState>,
    transition_timer: Mutex<Option<ScheduledEvent>>,
}

impl TenantDirectory {
    pub fn new(
        config: &DirectoryConfig,
        client: RequestClient,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(DirectoryState::default());
        Self {
            inner: Arc::new(Inner {
                client,
                snapshots: SnapshotStore::new(store),
                clock,
                ttl: Duration::from_secs(config.ttl_secs),
                transition_duration: Duration::from_millis(config.transition_ms),
                lookup_paths: config.lookup_paths.clone(),
                state,
                transition_timer: Mutex::new(None),
            }),
        }
    }

    fn session(&self) -> &Session {
        self.inner.client.session()
    }

    /// Seed from the persisted snapshot, then refresh in the background.
    ///
    /// Seeding happens before this returns, so observers have content
    /// immediately when a fresh snapshot exists.
    pub fn start(&self) -> JoinHandle<()> {
        self.seed();
        let directory = self.clone();
        tokio::spawn(async move {
            directory.refresh().await;
        })
    }

    /// Load the persisted snapshot for the current user if it is within its TTL.
    pub fn seed(&self) -> bool {
        let Some(user) = self.session().user() else {
            return false;
        };
        let now = self.inner.clock.now_ms();
        let Some(snapshot) = self.inner.snapshots.load_fresh(&user.id, now) else {
            return false;
        };

        let persisted = self.inner.snapshots.selected_id();
        let selected = reconcile_selection(&snapshot.tenants, None, persisted.as_deref());
        tracing::debug!(
            user_id = %user.id,
            tenants = snapshot.tenants.len(),
            "Seeded tenant directory from snapshot"
        );
        self.inner.state.send_modify(|s| {
            s.tenants = Arc::new(snapshot.tenants);
            s.selected = selected;
            s.fetched_at_ms = Some(snapshot.fetched_at_ms);
        });
        true
    }

    /// Refetch the directory for the current user.
    ///
    /// Safe to call repeatedly; overlapping calls resolve last-writer-wins.
    pub async fn refresh(&self) {
        let Some(user) = self.session().user() else {
            tracing::debug!("No user identity, clearing tenant directory");
            self.reset_state();
            return;
        };

        self.inner.state.send_modify(|s| s.loading = true);

        let user_id: String = url::form_urlencoded::byte_serialize(user.id.as_bytes()).collect();
        let attempts = self.inner.lookup_paths.iter().map(|template| {
            let path = template.replace("{user_id}", &user_id);
            let client = self.inner.client.clone();
            async move { client.get(&path).await }
        });

        match first_qualifying(attempts, classify).await {
            RaceOutcome::Won { index, value } => {
                tracing::info!(
                    user_id = %user.id,
                    tenants = value.len(),
                    endpoint = %self.inner.lookup_paths[index],
                    "Tenant directory refreshed"
                );
                metrics::record_directory_refresh("ok", value.len());
                self.apply(&user.id, value);
            }
            RaceOutcome::Aborted { index, reason } => {
                tracing::warn!(
                    user_id = %user.id,
                    endpoint = %self.inner.lookup_paths[index],
                    error = %reason,
                    "Directory lookup unauthorized, clearing tenants"
                );
                metrics::record_directory_refresh("unauthorized", 0);
                self.cancel_transition();
                self.inner.snapshots.clear();
                self.inner.state.send_replace(DirectoryState {
                    error: Some(reason),
                    ..DirectoryState::default()
                });
            }
            RaceOutcome::Exhausted(rejections) => {
                if !rejections.is_empty() && rejections.iter().all(|r| *r == Rejection::Empty) {
                    tracing::info!(user_id = %user.id, "User belongs to no tenants");
                    metrics::record_directory_refresh("empty", 0);
                    self.apply(&user.id, Vec::new());
                    return;
                }
                let held = self.inner.state.borrow().tenants.len();
                tracing::warn!(
                    user_id = %user.id,
                    rejections = ?rejections,
                    held,
                    "All directory lookups failed, keeping last known tenants"
                );
                metrics::record_directory_refresh("unavailable", held);
                self.inner.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(ClientError::DirectoryUnavailable);
                });
            }
        }
    }

    fn apply(&self, user_id: &str, tenants: Vec<Tenant>) {
        let now = self.inner.clock.now_ms();
        let persisted = self.inner.snapshots.selected_id();

        self.inner.snapshots.save(&DirectorySnapshot {
            user_id: user_id.to_string(),
            fetched_at_ms: now,
            ttl_ms: self.inner.ttl.as_millis() as u64,
            tenants: tenants.clone(),
        });

        let mut selected_id = None;
        self.inner.state.send_modify(|s| {
            let current = s.selected.as_ref().map(|t| t.id.as_str());
            let selected = reconcile_selection(&tenants, current, persisted.as_deref());
            selected_id = selected.as_ref().map(|t| t.id.clone());
            s.tenants = Arc::new(tenants);
            s.selected = selected;
            s.loading = false;
            s.error = None;
            s.fetched_at_ms = Some(now);
        });

        if let Some(id) = selected_id {
            if persisted.as_deref() != Some(id.as_str()) {
                self.inner.snapshots.save_selected_id(&id);
            }
        }
    }

    /// Select the tenant with `id`.
    ///
    /// No-op if it is already selected or not in the list. Otherwise the
    /// selection changes immediately and a transition event is published,
    /// cleared again after the configured duration. Outside a Tokio
    /// runtime the transition is cleared at once.
    pub fn select_tenant(&self, id: &str) {
        let duration = self.inner.transition_duration;
        let mut event = None;
        self.inner.state.send_if_modified(|s| {
            if s.selected.as_ref().is_some_and(|t| t.id == id) {
                return false;
            }
            let Some(target) = s.tenant(id).cloned() else {
                return false;
            };
            let transition = TransitionEvent {
                from: s.selected.take(),
                to: target.clone(),
                duration,
            };
            s.selected = Some(target);
            s.transition = Some(transition.clone());
            event = Some(transition);
            true
        });

        let Some(event) = event else {
            tracing::debug!(tenant_id = %id, "Selection unchanged");
            return;
        };

        tracing::info!(
            from = ?event.from.as_ref().map(|t| &t.id),
            to = %event.to.id,
            "Tenant selected"
        );
        self.inner.snapshots.save_selected_id(id);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let to_id = event.to.id.clone();
        let timer = ScheduledEvent::after(duration, move || {
            if let Some(inner) = weak.upgrade() {
                inner.end_transition(&to_id);
            }
        });
        if timer.is_none() {
            tracing::warn!(to = %event.to.id, "No runtime for the transition timer, ending transition now");
            self.inner.end_transition(&event.to.id);
        }
        // Replacing drops, and thereby cancels, the previous timer.
        *self.inner.transition_timer.lock() = timer;
    }

    /// Merge a tenant created through a side channel.
    ///
    /// Appended if its id is new; selected if nothing is selected yet.
    pub fn add_tenant(&self, tenant: Tenant) {
        if tenant.id.is_empty() {
            tracing::warn!("Ignoring tenant without id");
            return;
        }

        let mut added = None;
        let mut now_selected = false;
        self.inner.state.send_if_modified(|s| {
            if s.contains(&tenant.id) {
                return false;
            }
            let mut tenants = s.tenants.as_ref().clone();
            tenants.push(tenant.clone());
            s.tenants = Arc::new(tenants);
            if s.selected.is_none() {
                s.selected = Some(tenant.clone());
                now_selected = true;
            }
            added = Some((s.tenants.clone(), s.fetched_at_ms));
            true
        });

        let Some((tenants, fetched_at_ms)) = added else {
            tracing::debug!(tenant_id = %tenant.id, "Tenant already present");
            return;
        };
        tracing::info!(tenant_id = %tenant.id, selected = now_selected, "Tenant added");

        if now_selected {
            self.inner.snapshots.save_selected_id(&tenant.id);
        }
        if let Some(user) = self.session().user() {
            self.inner.snapshots.save(&DirectorySnapshot {
                user_id: user.id.clone(),
                fetched_at_ms: fetched_at_ms.unwrap_or_else(|| self.inner.clock.now_ms()),
                ttl_ms: self.inner.ttl.as_millis() as u64,
                tenants: tenants.as_ref().clone(),
            });
        }
    }

    /// Drop all directory state, in memory and in storage.
    pub fn clear(&self) {
        self.reset_state();
        self.inner.snapshots.clear();
        self.inner.snapshots.clear_selected_id();
    }

    fn reset_state(&self) {
        self.cancel_transition();
        self.inner.state.send_replace(DirectoryState::default());
    }

    fn cancel_transition(&self) {
        if let Some(timer) = self.inner.transition_timer.lock().take() {
            timer.cancel();
        }
    }

    /// True when the held list is within its TTL.
    pub fn is_fresh(&self) -> bool {
        let fetched = self.inner.state.borrow().fetched_at_ms;
        fetched.is_some_and(|at| {
            self.inner.clock.now_ms().saturating_sub(at) < self.inner.ttl.as_millis() as u64
        })
    }

    /// Current state.
    pub fn snapshot(&self) -> DirectoryState {
        self.inner.state.borrow().clone()
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<DirectoryState> {
        self.inner.state.subscribe()
    }

    pub fn tenants(&self) -> Arc<Vec<Tenant>> {
        self.inner.state.borrow().tenants.clone()
    }

    pub fn selected(&self) -> Option<Tenant> {
        self.inner.state.borrow().selected.clone()
    }
}

impl Inner {
    /// Clear the transition if it still targets `to_id`.
    fn end_transition(&self, to_id: &str) {
        self.state.send_if_modified(|s| {
            if s.transition.as_ref().is_some_and(|t| t.to.id == to_id) {
                s.transition = None;
                true
            } else {
                false
            }
        });
    }
}

impl std::fmt::Debug for TenantDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("TenantDirectory")
            .field("tenants", &state.tenants.len())
            .field("selected", &state.selected.as_ref().map(|t| &t.id))
            .field("loading", &state.loading)
            .finish()
    }
}
