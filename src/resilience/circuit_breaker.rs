//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down until `down_until`; requests fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: resolution exhausted, or the current address reached
//!                its failure threshold
//! Open → Closed: the window elapses (no probe is needed to close it)
//! ```
//!
//! # Design Decisions
//! - One breaker for the logical backend, owned by the resolver
//! - Fail fast in Open state (no network attempt, no probe)
//! - The window is a timestamp read through `Clock`, so tests move it explicitly

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::schedule::Clock;

/// Timed suppression of network attempts.
pub struct CircuitBreaker {
    clock: Arc<dyn Clock>,
    window: Duration,
    /// Epoch millis until which the circuit is open. Zero when closed.
    down_until_ms: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            clock,
            window,
            down_until_ms: AtomicU64::new(0),
        }
    }

    /// True while the backoff window is active.
    pub fn is_open(&self) -> bool {
        self.clock.now_ms() < self.down_until_ms.load(Ordering::Acquire)
    }

    /// Open the circuit for one window starting now. Returns the deadline.
    pub fn trip(&self) -> u64 {
        let until = self.clock.now_ms() + self.window.as_millis() as u64;
        self.down_until_ms.fetch_max(until, Ordering::AcqRel);
        until
    }

    /// Close the circuit immediately.
    pub fn reset(&self) {
        self.down_until_ms.store(0, Ordering::Release);
    }

    /// Deadline of the current window, if open.
    pub fn down_until(&self) -> Option<u64> {
        self.is_open()
            .then(|| self.down_until_ms.load(Ordering::Acquire))
    }

    /// Time left in the current window.
    pub fn remaining(&self) -> Duration {
        let until = self.down_until_ms.load(Ordering::Acquire);
        Duration::from_millis(until.saturating_sub(self.clock.now_ms()))
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("window", &self.window)
            .field("open", &self.is_open())
            .finish()
    }
}
