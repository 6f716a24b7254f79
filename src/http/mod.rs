//! HTTP dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! application call (path, RequestOptions)
//!     → client.rs (breaker check, resolve, token + request ID injection)
//!     → transport.rs (reqwest, or a fake in tests)
//!     → response.rs (real response, or synthetic 503/504 envelope)
//!     → back to the caller, never as an error
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod transport;

pub use client::RequestClient;
pub use request::{RequestOptions, X_REQUEST_ID};
pub use response::{ApiResponse, ErrorEnvelope, FailureReason};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportRequest, TransportResponse};
