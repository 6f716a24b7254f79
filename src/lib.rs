//! Tenant Gateway client library.
//!
//! Client-side plumbing for a multi-tenant backend whose address is not
//! known ahead of time.
//!
//! # Architecture Overview
//!
//! ```text
//!   application
//!       │
//!       ▼
//!  ┌──────────────┐   resolve()   ┌──────────────────┐   probes   ┌─────────┐
//!  │ RequestClient│──────────────▶│ EndpointResolver │───────────▶│ backend │
//!  │  (http)      │               │  (discovery)     │            │ /health │
//!  └──────┬───────┘               └────────┬─────────┘            └─────────┘
//!         │ bearer token                   │ breaker, persisted base URL
//!         ▼                                ▼
//!  ┌──────────────┐               ┌──────────────────┐
//!  │   Session    │               │   KeyValueStore  │
//!  │   (auth)     │               │   (storage)      │
//!  └──────────────┘               └────────▲─────────┘
//!                                          │ snapshot, selection
//!                                 ┌────────┴─────────┐
//!                                 │ TenantDirectory  │──▶ watch::Receiver<DirectoryState>
//!                                 │  (directory)     │
//!                                 └──────────────────┘
//! ```
//!
//! Cross-cutting: `config` (TOML + env overrides), `resilience` (breaker,
//! deadlines, racing), `schedule` (clock, timers), `observability`
//! (tracing, metrics).

pub mod auth;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod http;
pub mod observability;
pub mod resilience;
pub mod schedule;
pub mod storage;

pub use config::GatewayConfig;
pub use directory::TenantDirectory;
pub use discovery::EndpointResolver;
pub use error::ClientError;
pub use gateway::{BuildError, Gateway};
pub use http::{ApiResponse, RequestClient, RequestOptions};
