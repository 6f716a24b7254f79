//! Candidate endpoint abstraction.
//!
//! # Responsibilities
//! - Represent one possible base address of the backend
//! - Track consecutive failures (probe failures and request failures)
//! - Build the ordered, de-duplicated candidate list

use std::sync::atomic::{AtomicU32, Ordering};

/// One possible base address.
#[derive(Debug)]
pub struct Candidate {
    /// Normalized base address (no trailing slash).
    pub address: String,
    /// Consecutive failure count.
    consecutive_failures: AtomicU32,
}

impl Candidate {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// True once the candidate reached `threshold` consecutive failures.
    pub fn is_skipped(&self, threshold: u32) -> bool {
        self.failures() >= threshold
    }

    /// Report a successful probe or request.
    pub fn mark_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Report a failed probe or request. Returns the new count.
    pub fn mark_failure(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Strip whitespace and trailing slashes.
pub fn normalize_address(address: &str) -> String {
    address.trim().trim_end_matches('/').to_string()
}

/// Build the candidate list in priority order: persisted, configured, fallbacks.
///
/// Blank entries are dropped and later duplicates removed.
pub fn build_candidates<'a, I>(
    persisted: Option<&'a str>,
    configured: Option<&'a str>,
    fallbacks: I,
) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: Vec<String> = Vec::new();
    for raw in persisted.into_iter().chain(configured).chain(fallbacks) {
        let address = normalize_address(raw);
        if !address.is_empty() && !seen.contains(&address) {
            seen.push(address);
        }
    }
    seen.into_iter().map(Candidate::new).collect()
}
