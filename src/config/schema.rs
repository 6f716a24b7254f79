//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Endpoint discovery settings.
    pub resolver: ResolverConfig,

    /// Outbound request settings.
    pub request: RequestConfig,

    /// Tenant directory cache settings.
    pub directory: DirectoryConfig,

    /// Persisted client state.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Endpoint discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Address supplied by the deployment environment, if any.
    pub configured_address: Option<String>,

    /// Hardcoded fallback addresses, probed after the configured one.
    pub fallback_addresses: Vec<String>,

    /// Trusted deployment profile: use `configured_address` without probing.
    pub trusted: bool,

    /// Per-request health probe timeout in milliseconds.
    pub probe_timeout_ms: u64,

    /// Health paths tried in order for every candidate.
    pub health_paths: Vec<String>,

    /// Consecutive failures after which a candidate is skipped.
    pub failure_threshold: u32,

    /// Backoff window after exhausted resolution, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            configured_address: None,
            fallback_addresses: vec![
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
            trusted: false,
            probe_timeout_ms: 1_800,
            health_paths: vec!["/api/health".to_string(), "/health".to_string()],
            failure_threshold: 2,
            backoff_ms: 5_000,
        }
    }
}

/// Outbound request configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 4_000,
            user_agent: concat!("tenant-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Tenant directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Cache entry time-to-live in seconds.
    pub ttl_secs: u64,

    /// How long a selection transition stays visible, in milliseconds.
    pub transition_ms: u64,

    /// Lookup path templates raced on refresh. `{user_id}` is substituted.
    pub lookup_paths: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            transition_ms: 900,
            lookup_paths: vec![
                "/api/organizations/mine".to_string(),
                "/api/users/{user_id}/organizations".to_string(),
                "/api/organizations?member={user_id}".to_string(),
            ],
        }
    }
}

/// Persisted state configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file backing the key-value store. In-memory when unset.
    pub path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
