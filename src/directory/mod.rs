//! Tenant directory subsystem.
//!
//! # Responsibilities
//! - Fetch the organizations the current user belongs to
//! - Normalize the response shapes different backends produce
//! - Persist a per-user snapshot for stale-while-revalidate startup
//! - Track the selected tenant and its transition events
//!
//! # Data Flow
//! ```text
//! start() → cache.rs seed (if fresh) → service.rs refresh
//!     → lookup paths raced through RequestClient
//!     → normalize.rs → reconcile selection → watch channel + snapshot
//! ```

pub mod cache;
pub mod normalize;
pub mod service;
pub mod types;

pub use cache::{DirectorySnapshot, SnapshotStore};
pub use normalize::normalize;
pub use service::TenantDirectory;
pub use types::{DirectoryState, SocialLinks, Tenant, TransitionEvent};
