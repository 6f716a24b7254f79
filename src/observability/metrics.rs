//! Metrics collection.
//!
//! # Metrics
//! - `gateway_probe_total` (counter): health probes by outcome
//! - `gateway_address_changes_total` (counter): adoptions of a new base address
//! - `gateway_backoff_engaged_total` (counter): backoff windows opened
//! - `gateway_requests_total` (counter): requests by outcome
//! - `gateway_request_duration_seconds` (histogram): latency of network attempts
//! - `gateway_directory_refresh_total` (counter): directory refreshes by outcome
//! - `gateway_directory_tenants` (gauge): tenants currently cached
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the embedding application
//!   chooses the exporter
//! - Low-cardinality labels only (no addresses or paths)

use std::sync::Once;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

static METRICS_INIT: Once = Once::new();

/// Register metric descriptions. Call once at startup.
pub fn init() {
    METRICS_INIT.call_once(|| {
        describe_counter!("gateway_probe_total", "Health probes issued, by outcome");
        describe_counter!("gateway_address_changes_total", "Times a new base address was adopted");
        describe_counter!("gateway_backoff_engaged_total", "Backoff windows opened");
        describe_counter!("gateway_requests_total", "Requests dispatched, by outcome");
        describe_histogram!(
            "gateway_request_duration_seconds",
            "Duration of requests that reached the network"
        );
        describe_counter!("gateway_directory_refresh_total", "Directory refreshes, by outcome");
        describe_gauge!("gateway_directory_tenants", "Tenants held by the directory cache");
    });
}

pub fn record_probe(healthy: bool) {
    let outcome = if healthy { "healthy" } else { "unhealthy" };
    counter!("gateway_probe_total", "outcome" => outcome).increment(1);
}

pub fn record_address_change() {
    counter!("gateway_address_changes_total").increment(1);
}

pub fn record_backoff_engaged() {
    counter!("gateway_backoff_engaged_total").increment(1);
}

/// Record a request outcome. `start` is set only for attempts that hit the network.
pub fn record_request(outcome: &'static str, start: Option<Instant>) {
    counter!("gateway_requests_total", "outcome" => outcome).increment(1);
    if let Some(start) = start {
        histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
    }
}

pub fn record_directory_refresh(outcome: &'static str, tenants: usize) {
    counter!("gateway_directory_refresh_total", "outcome" => outcome).increment(1);
    gauge!("gateway_directory_tenants").set(tenants as f64);
}
