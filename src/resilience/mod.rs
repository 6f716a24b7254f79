//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → circuit_breaker.rs (fail fast while the backoff window is open)
//!     → timeouts.rs (deadline + caller cancellation, first to fire wins)
//!     → on failure: resolver counters, which may trip the breaker
//!
//! Directory lookup:
//!     → race.rs (first qualifying success over several endpoint variants)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries: the breaker bounds request storms instead
//! - Racing is generic; the caller supplies the qualification rule

pub mod circuit_breaker;
pub mod race;
pub mod timeouts;

pub use circuit_breaker::CircuitBreaker;
pub use race::{first_qualifying, RaceOutcome, Verdict};
pub use timeouts::{with_deadline, Interruption};
