//! Endpoint discovery subsystem.
//!
//! # Data Flow
//! ```text
//! persisted address, configured address, fallbacks
//!     → candidate.rs (ordered, de-duplicated candidate list)
//!     → resolver.rs (resolution rounds, coalesced)
//!     → probe.rs (health check per candidate)
//!     → adopted address persisted and broadcast
//!
//! Request outcomes:
//!     http client → resolver.record_failure / record_success
//!     → threshold reached → circuit breaker opens
//! ```
//!
//! # Design Decisions
//! - Failure counters are per candidate, shared by probes and requests
//! - One resolution round in flight at a time
//! - Exhausted resolution never clears the retained address

pub mod candidate;
pub mod probe;
pub mod resolver;

pub use resolver::{join_url, EndpointResolver, ResolverState};
