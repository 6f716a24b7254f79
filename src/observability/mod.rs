//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! discovery, http, directory produce:
//!     → tracing events (structured fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (CLI, demos)
//!     → whatever metrics recorder the embedding application installs
//! ```

pub mod logging;
pub mod metrics;
