//! Failure taxonomy for the gateway client.
//!
//! Network and resolution failures never reach application code as `Err`;
//! they are recorded, logged, and converted into synthetic responses or a
//! preserved directory state. These variants exist so that every such
//! conversion has a name in logs and in directory snapshots.

use thiserror::Error;

/// Errors produced inside the resolution and dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// A single candidate did not answer its health check.
    #[error("health probe failed for {address}: {reason}")]
    ProbeFailure { address: String, reason: String },

    /// No candidate answered; the retained address stays in use.
    #[error("no healthy backend among {candidates} candidates")]
    ResolutionExhausted { candidates: usize },

    /// The request exceeded its deadline.
    #[error("request timed out after {0} ms")]
    RequestTimeout(u64),

    /// The caller cancelled the request.
    #[error("request aborted by caller")]
    RequestAborted,

    /// Connection-level failure (refused, reset, DNS).
    #[error("connection refused: {0}")]
    RequestRefused(String),

    /// The backend rejected the session credentials.
    #[error("unauthorized (status {0})")]
    Unauthorized(u16),

    /// Every racing directory lookup failed.
    #[error("tenant directory unavailable")]
    DirectoryUnavailable,
}
