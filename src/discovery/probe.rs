//! Active health probing.
//!
//! # Responsibilities
//! - Probe one candidate against each health path in order
//! - Bound every probe with the probe timeout
//! - Classify the result (2xx/3xx healthy, anything else unhealthy)

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, USER_AGENT};

use crate::error::ClientError;
use crate::http::transport::{HttpTransport, TransportRequest};
use crate::observability::metrics;
use crate::resilience::{with_deadline, Interruption};

pub struct HealthProber {
    transport: Arc<dyn HttpTransport>,
    paths: Vec<String>,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(transport: Arc<dyn HttpTransport>, paths: Vec<String>, timeout: Duration) -> Self {
        Self {
            transport,
            paths,
            timeout,
        }
    }

    /// Probe `base`. Succeeds on the first path answering 2xx/3xx.
    pub async fn probe(&self, base: &str) -> Result<(), ClientError> {
        let mut last_reason = String::from("no health paths configured");

        for path in &self.paths {
            let mut request = TransportRequest::get(format!("{}{}", base, path));
            request
                .headers
                .insert(USER_AGENT, HeaderValue::from_static("tenant-gateway-health-check"));

            match with_deadline(self.transport.send(request), self.timeout, None).await {
                Ok(Ok(response)) => {
                    let status = response.status;
                    if status.is_success() || status.is_redirection() {
                        tracing::debug!(address = %base, path = %path, status = %status, "Health probe passed");
                        metrics::record_probe(true);
                        return Ok(());
                    }
                    tracing::debug!(address = %base, path = %path, status = %status, "Health probe failed: non-success status");
                    last_reason = format!("status {}", status);
                }
                Ok(Err(e)) => {
                    tracing::debug!(address = %base, path = %path, error = %e, "Health probe failed: connection error");
                    last_reason = e.to_string();
                }
                Err(Interruption::TimedOut(_)) | Err(Interruption::Cancelled) => {
                    tracing::debug!(address = %base, path = %path, "Health probe failed: timeout");
                    last_reason = "timeout".to_string();
                }
            }
        }

        metrics::record_probe(false);
        Err(ClientError::ProbeFailure {
            address: base.to_string(),
            reason: last_reason,
        })
    }
}
