//! Endpoint resolver.
//!
//! Holds the ordered candidate list and decides which base address the
//! request client talks to.
//!
//! # Resolution round
//! ```text
//! for candidate in order:
//!     skip if failures >= threshold (unless forced)
//!     probe /api/health, then /health (each bounded by the probe timeout)
//!     first healthy candidate → adopt, reset its counter, persist
//! none healthy → keep the retained address, open the backoff window
//! ```
//!
//! Only one round runs at a time. Callers arriving while a round is in
//! flight await that same round.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ResolverConfig;
use crate::discovery::candidate::{build_candidates, normalize_address, Candidate};
use crate::discovery::probe::HealthProber;
use crate::error::ClientError;
use crate::http::transport::HttpTransport;
use crate::observability::metrics;
use crate::resilience::CircuitBreaker;
use crate::schedule::Clock;
use crate::storage::{KeyValueStore, KEY_BASE_URL};

/// Used only when no candidate was configured at all.
pub const DEFAULT_ADDRESS: &str = "http://localhost:8080";

type Round = Shared<BoxFuture<'static, String>>;

/// Diagnostic snapshot of the resolver.
#[derive(Debug, Clone, Serialize)]
pub struct ResolverState {
    pub current: Option<String>,
    pub last_resolved_ms: Option<u64>,
    pub down_until_ms: Option<u64>,
    pub trusted: bool,
    pub candidates: Vec<CandidateState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateState {
    pub address: String,
    pub failures: u32,
}

/// Shared handle to the resolver. Cheap to clone.
#[derive(Clone)]
pub struct EndpointResolver {
    inner: Arc<Inner>,
}

struct Inner {
    candidates: Vec<Candidate>,
    prober: HealthProber,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    breaker: CircuitBreaker,
    threshold: u32,
    /// Set in the trusted profile: used without probing.
    trusted: Option<String>,
    current: ArcSwapOption<String>,
    last_resolved_ms: AtomicU64,
    in_flight: Mutex<Option<Round>>,
    changes: broadcast::Sender<String>,
}

impl EndpointResolver {
    /// Build a resolver, seeding candidates from storage and configuration.
    pub fn new(
        config: &ResolverConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let persisted = store.get(KEY_BASE_URL);
        let mut candidates = build_candidates(
            persisted.as_deref(),
            config.configured_address.as_deref(),
            config.fallback_addresses.iter().map(String::as_str),
        );
        if candidates.is_empty() {
            tracing::warn!(address = DEFAULT_ADDRESS, "No candidate addresses configured, using default");
            candidates.push(Candidate::new(DEFAULT_ADDRESS));
        }

        let trusted = match (&config.configured_address, config.trusted) {
            (Some(addr), true) => Some(normalize_address(addr)),
            (None, true) => {
                tracing::warn!("Trusted profile requested without a configured address, probing instead");
                None
            }
            _ => None,
        };
        let current = trusted.clone().map(Arc::new);

        tracing::info!(
            candidates = candidates.len(),
            trusted = trusted.is_some(),
            "Endpoint resolver initialized"
        );

        let (changes, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                candidates,
                prober: HealthProber::new(
                    transport,
                    config.health_paths.clone(),
                    Duration::from_millis(config.probe_timeout_ms),
                ),
                store,
                breaker: CircuitBreaker::new(clock.clone(), Duration::from_millis(config.backoff_ms)),
                clock,
                threshold: config.failure_threshold.max(1),
                trusted,
                current: ArcSwapOption::new(current),
                last_resolved_ms: AtomicU64::new(0),
                in_flight: Mutex::new(None),
                changes,
            }),
        }
    }

    /// Resolve the backend address.
    ///
    /// Without `force`, a healthy current address is returned as is and an
    /// open backoff window returns the retained address without probing.
    /// `force` resets every failure counter and probes from the top.
    pub async fn resolve(&self, force: bool) -> String {
        if let Some(addr) = &self.inner.trusted {
            return addr.clone();
        }
        if !force {
            if self.inner.breaker.is_open() {
                return self.inner.retained_address();
            }
            if let Some(addr) = self.inner.healthy_current() {
                return addr;
            }
        }

        let round = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(round) => round.clone(),
                None => {
                    let inner = self.inner.clone();
                    let round = async move {
                        let addr = inner.run_round(force).await;
                        *inner.in_flight.lock() = None;
                        addr
                    }
                    .boxed()
                    .shared();
                    *slot = Some(round.clone());
                    // Keep probing even if every waiter is cancelled.
                    tokio::spawn(round.clone());
                    round
                }
            }
        };
        round.await
    }

    /// The address adopted by the last successful resolution.
    pub fn current_address(&self) -> Option<String> {
        self.inner.current.load_full().map(|a| a.as_ref().clone())
    }

    /// Absolute URL for `path` against the current (or retained) address.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.inner.retained_address(), path)
    }

    /// True while the backoff window is open.
    pub fn is_backend_down(&self) -> bool {
        self.inner.breaker.is_open()
    }

    /// Time left in the backoff window.
    pub fn backoff_remaining(&self) -> Duration {
        self.inner.breaker.remaining()
    }

    /// Feed a successful request back into the counters.
    pub fn record_success(&self, address: &str) {
        if let Some(c) = self.inner.candidate(address) {
            c.mark_success();
        }
    }

    /// Feed a failed request back into the counters.
    ///
    /// Returns true if this failure opened (or found open) the backoff window.
    pub fn record_failure(&self, address: &str) -> bool {
        let Some(c) = self.inner.candidate(address) else {
            return false;
        };
        let failures = c.mark_failure();
        if failures < self.inner.threshold {
            return false;
        }
        if !self.inner.breaker.is_open() {
            self.inner.engage_backoff(&format!("{} consecutive request failures", failures));
        }
        true
    }

    /// Receive every newly adopted address.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.changes.subscribe()
    }

    /// Diagnostic snapshot.
    pub fn state(&self) -> ResolverState {
        let last = self.inner.last_resolved_ms.load(Ordering::Relaxed);
        ResolverState {
            current: self.current_address(),
            last_resolved_ms: (last > 0).then_some(last),
            down_until_ms: self.inner.breaker.down_until(),
            trusted: self.inner.trusted.is_some(),
            candidates: self
                .inner
                .candidates
                .iter()
                .map(|c| CandidateState {
                    address: c.address.clone(),
                    failures: c.failures(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("current", &self.current_address())
            .field("candidates", &self.inner.candidates.len())
            .field("breaker", &self.inner.breaker)
            .finish()
    }
}

impl Inner {
    fn candidate(&self, address: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.address == address)
    }

    fn below_threshold(&self, address: &str) -> bool {
        self.candidate(address)
            .map_or(true, |c| !c.is_skipped(self.threshold))
    }

    fn healthy_current(&self) -> Option<String> {
        let current = self.current.load_full()?;
        self.below_threshold(&current).then(|| current.as_ref().clone())
    }

    /// Address used when no round produced a healthy one.
    ///
    /// Prefers the current address, then the first candidate still below
    /// the threshold; only when every candidate is at the threshold does it
    /// fall back to the current address or the first candidate regardless.
    fn retained_address(&self) -> String {
        let current = self.current.load_full();
        if let Some(addr) = current.as_deref() {
            if self.below_threshold(addr) {
                return addr.clone();
            }
        }
        if let Some(c) = self.candidates.iter().find(|c| !c.is_skipped(self.threshold)) {
            return c.address.clone();
        }
        match current {
            Some(addr) => addr.as_ref().clone(),
            None => self.candidates[0].address.clone(),
        }
    }

    async fn run_round(&self, force: bool) -> String {
        let mut forced = force;
        if !forced && self.candidates.iter().all(|c| c.is_skipped(self.threshold)) {
            tracing::debug!("Every candidate reached the failure threshold, forcing a full round");
            forced = true;
        }
        if forced {
            for c in &self.candidates {
                c.mark_success();
            }
        }

        for candidate in &self.candidates {
            if candidate.is_skipped(self.threshold) {
                tracing::debug!(address = %candidate.address, failures = candidate.failures(), "Skipping candidate");
                continue;
            }
            match self.prober.probe(&candidate.address).await {
                Ok(()) => {
                    candidate.mark_success();
                    self.adopt(&candidate.address);
                    return candidate.address.clone();
                }
                Err(e) => {
                    let failures = candidate.mark_failure();
                    tracing::warn!(address = %candidate.address, failures, error = %e, "Candidate unhealthy");
                }
            }
        }

        let err = ClientError::ResolutionExhausted {
            candidates: self.candidates.len(),
        };
        self.engage_backoff(&err.to_string());
        self.retained_address()
    }

    fn adopt(&self, address: &str) {
        self.breaker.reset();
        self.last_resolved_ms.store(self.clock.now_ms(), Ordering::Relaxed);

        let previous = self.current.swap(Some(Arc::new(address.to_string())));
        if previous.as_deref().map(String::as_str) == Some(address) {
            return;
        }

        tracing::info!(
            address = %address,
            previous = ?previous.as_deref(),
            "Resolved new backend address"
        );
        metrics::record_address_change();
        if let Err(e) = self.store.set(KEY_BASE_URL, address) {
            tracing::warn!(error = %e, "Failed to persist backend address");
        }
        let _ = self.changes.send(address.to_string());
    }

    fn engage_backoff(&self, reason: &str) {
        let until = self.breaker.trip();
        metrics::record_backoff_engaged();
        tracing::warn!(
            reason = %reason,
            down_until_ms = until,
            window_ms = self.breaker.remaining().as_millis() as u64,
            "Backend marked down, suppressing network attempts"
        );
    }
}

/// Join a base address and a path. Absolute URLs pass through unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
