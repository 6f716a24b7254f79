//! Time sources and timers.
//!
//! # Design Decisions
//! - Timestamps go through the `Clock` trait, never `SystemTime` directly
//! - Delayed work is an explicit `ScheduledEvent` handle, not a detached task

pub mod clock;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timer::ScheduledEvent;
