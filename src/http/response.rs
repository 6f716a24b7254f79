//! Responses returned to application code.
//!
//! # Design Decisions
//! - Callers always get an `ApiResponse`, never an `Err`
//! - Failures become synthetic 503/504 responses carrying a JSON envelope
//!   `{ "error": <reason>, "hint": <text> }`
//! - `failure()` tells a synthetic response apart from a real backend 503

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http::transport::TransportResponse;

/// Machine-readable reason carried by a synthetic response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Connection-level failure.
    Offline,
    /// The backoff window is open; no network attempt was made.
    CircuitOpen,
    /// The request deadline fired.
    Timeout,
    /// The caller cancelled the request.
    Aborted,
}

impl FailureReason {
    pub fn status(self) -> StatusCode {
        match self {
            FailureReason::Offline | FailureReason::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            FailureReason::Timeout | FailureReason::Aborted => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Offline => "offline",
            FailureReason::CircuitOpen => "circuit_open",
            FailureReason::Timeout => "timeout",
            FailureReason::Aborted => "aborted",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            FailureReason::Offline => "The server could not be reached. Retrying shortly.",
            FailureReason::CircuitOpen => "The server is temporarily unavailable. Retrying shortly.",
            FailureReason::Timeout => "The server took too long to respond.",
            FailureReason::Aborted => "The request was cancelled.",
        }
    }
}

/// Body of a synthetic failure response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: FailureReason,
    pub hint: String,
}

/// Response handed to application code.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    failure: Option<FailureReason>,
}

impl ApiResponse {
    /// Build the synthetic response for `reason`.
    pub fn synthetic(reason: FailureReason) -> Self {
        let envelope = ErrorEnvelope {
            error: reason,
            hint: reason.hint().to_string(),
        };
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status: reason.status(),
            headers,
            body: serde_json::to_vec(&envelope).unwrap_or_default(),
            failure: Some(reason),
        }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// True for 401 and 403.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    /// Reason, when this response was synthesized by the client.
    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<TransportResponse> for ApiResponse {
    fn from(r: TransportResponse) -> Self {
        Self {
            status: r.status,
            headers: r.headers,
            body: r.body,
            failure: None,
        }
    }
}
