//! Session management.
//!
//! # Responsibilities
//! - Hold the bearer token attached to outbound requests
//! - Hold the current user identity required by the tenant directory
//! - Clear both when the backend answers 401/403 to an authenticated call

pub mod session;

pub use session::{Session, UserIdentity};
