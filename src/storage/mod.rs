//! Persisted client state.
//!
//! # Data Flow
//! ```text
//! resolver  ──▶ api.base_url
//! session   ──▶ auth.token
//! directory ──▶ tenant.selected, tenant.directory
//!                   │
//!                   ▼
//!            KeyValueStore (memory.rs | file.rs)
//! ```
//!
//! # Design Decisions
//! - Values are strings; callers own their serialization
//! - The trait is synchronous, matching the storage media it abstracts
//! - Write failures are surfaced as `StoreError`, but callers in the core
//!   log and continue rather than fail the operation

pub mod file;
pub mod memory;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Last-known healthy base address.
pub const KEY_BASE_URL: &str = "api.base_url";
/// Bearer token of the current session.
pub const KEY_TOKEN: &str = "auth.token";
/// Id of the last selected tenant.
pub const KEY_SELECTED_TENANT: &str = "tenant.selected";
/// Timestamped tenant directory snapshot.
pub const KEY_DIRECTORY: &str = "tenant.directory";

/// Errors raised by a key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value interface for persisted client state.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
