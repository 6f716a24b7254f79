//! Resilient request client.
//!
//! # Responsibilities
//! - Resolve the backend address before every call (respecting backoff)
//! - Inject the session bearer token and a request ID
//! - Enforce the request timeout together with caller cancellation
//! - Convert every failure into a synthetic response
//! - Feed outcomes back into the resolver's failure counters
//!
//! # Outcomes
//! ```text
//! caller cancelled         → 504 aborted   (does not count; wins over backoff)
//! backoff window open      → 503 circuit_open (no network attempt)
//! HTTP response            → returned as-is, any status
//! deadline fired           → 504 timeout   (counts once an address was used)
//! connection failure       → 503 offline   (counts as a failure)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;

use crate::auth::Session;
use crate::config::RequestConfig;
use crate::discovery::{join_url, EndpointResolver};
use crate::error::ClientError;
use crate::http::request::{new_request_id, RequestOptions, X_REQUEST_ID};
use crate::http::response::{ApiResponse, FailureReason};
use crate::http::transport::{HttpTransport, TransportError, TransportRequest};
use crate::observability::metrics;
use crate::resilience::{with_deadline, Interruption};

/// Shared handle to the request client. Cheap to clone.
#[derive(Clone)]
pub struct RequestClient {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: EndpointResolver,
    transport: Arc<dyn HttpTransport>,
    session: Session,
    timeout: Duration,
}

impl RequestClient {
    pub fn new(
        config: &RequestConfig,
        resolver: EndpointResolver,
        transport: Arc<dyn HttpTransport>,
        session: Session,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                transport,
                session,
                timeout: Duration::from_millis(config.timeout_ms),
            }),
        }
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.inner.resolver
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Issue a request. Never fails; see the module docs for the outcomes.
    ///
    /// The timeout and the caller's cancellation cover resolution as well
    /// as the request itself.
    pub async fn request(&self, path: &str, options: RequestOptions) -> ApiResponse {
        let resolver = &self.inner.resolver;
        let RequestOptions {
            method,
            mut headers,
            body,
            cancel,
        } = options;

        if cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return self.aborted(&method, path, None);
        }
        if resolver.is_backend_down() {
            return self.short_circuit(path);
        }

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.inner.timeout;
        let base = match with_deadline(resolver.resolve(false), self.inner.timeout, cancel.as_ref()).await {
            Ok(base) => base,
            Err(Interruption::Cancelled) => return self.aborted(&method, path, Some(start)),
            Err(Interruption::TimedOut(_)) => {
                let err = ClientError::RequestTimeout(self.inner.timeout.as_millis() as u64);
                tracing::warn!(method = %method, path = %path, error = %err, "Timed out resolving backend");
                metrics::record_request("timeout", Some(start));
                return ApiResponse::synthetic(FailureReason::Timeout);
            }
        };
        if resolver.is_backend_down() {
            return self.short_circuit(path);
        }

        let mut sent_token = None;
        if !headers.contains_key(AUTHORIZATION) {
            if let Some(token) = self.inner.session.token() {
                match HeaderValue::from_str(&format!("Bearer {}", token)) {
                    Ok(mut value) => {
                        value.set_sensitive(true);
                        headers.insert(AUTHORIZATION, value);
                        sent_token = Some(token);
                    }
                    Err(_) => tracing::warn!("Stored bearer token is not a valid header value, sending without it"),
                }
            }
        }
        if !headers.contains_key(X_REQUEST_ID) {
            headers.insert(X_REQUEST_ID, new_request_id());
        }

        let request = TransportRequest {
            method: method.clone(),
            url: join_url(&base, path),
            headers,
            body,
        };

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let outcome = with_deadline(self.inner.transport.send(request), remaining, cancel.as_ref()).await;

        match outcome {
            Ok(Ok(response)) => {
                resolver.record_success(&base);
                let response = ApiResponse::from(response);
                if response.is_unauthorized() {
                    if let Some(token) = sent_token {
                        tracing::warn!(method = %method, path = %path, status = %response.status, "Authenticated call rejected");
                        self.inner.session.invalidate(&token);
                    }
                }
                metrics::record_request("response", Some(start));
                response
            }
            Ok(Err(TransportError::Timeout)) | Err(Interruption::TimedOut(_)) => {
                let err = ClientError::RequestTimeout(self.inner.timeout.as_millis() as u64);
                tracing::warn!(method = %method, path = %path, address = %base, error = %err, "Request failed");
                resolver.record_failure(&base);
                metrics::record_request("timeout", Some(start));
                ApiResponse::synthetic(FailureReason::Timeout)
            }
            Ok(Err(e)) => {
                let err = ClientError::RequestRefused(e.to_string());
                tracing::warn!(method = %method, path = %path, address = %base, error = %err, "Request failed");
                resolver.record_failure(&base);
                metrics::record_request("offline", Some(start));
                ApiResponse::synthetic(FailureReason::Offline)
            }
            Err(Interruption::Cancelled) => self.aborted(&method, path, Some(start)),
        }
    }

    /// `GET path`.
    pub async fn get(&self, path: &str) -> ApiResponse {
        self.request(path, RequestOptions::get()).await
    }

    /// `POST path` with a JSON body.
    pub async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, serde_json::Error> {
        let options = RequestOptions::method(reqwest::Method::POST).json(body)?;
        Ok(self.request(path, options).await)
    }

    /// Caller cancellation. Not a backend failure, so counters are untouched.
    fn aborted(&self, method: &Method, path: &str, start: Option<Instant>) -> ApiResponse {
        tracing::debug!(method = %method, path = %path, error = %ClientError::RequestAborted, "Request cancelled");
        metrics::record_request("aborted", start);
        ApiResponse::synthetic(FailureReason::Aborted)
    }

    fn short_circuit(&self, path: &str) -> ApiResponse {
        tracing::debug!(
            path = %path,
            retry_in_ms = self.inner.resolver.backoff_remaining().as_millis() as u64,
            "Backend down, short-circuiting request"
        );
        metrics::record_request("circuit_open", None);
        ApiResponse::synthetic(FailureReason::CircuitOpen)
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("resolver", &self.inner.resolver)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserIdentity;
    use crate::config::ResolverConfig;
    use crate::http::transport::fake::{FakeTransport, Reply};
    use crate::schedule::ManualClock;
    use crate::storage::{KeyValueStore, MemoryStore, KEY_TOKEN};
    use reqwest::StatusCode;
    use tokio_util::sync::CancellationToken;

    const BASE: &str = "http://api.test";

    struct Fixture {
        client: RequestClient,
        transport: Arc<FakeTransport>,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
    }

    /// Health checks pass; application paths are answered by `app`.
    fn fixture<F>(app: F) -> Fixture
    where
        F: Fn(&TransportRequest) -> Reply + Send + Sync + 'static,
    {
        let transport = Arc::new(FakeTransport::new(move |req| {
            if req.url.ends_with("/health") {
                Reply::status(200)
            } else {
                app(req)
            }
        }));
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let resolver_config = ResolverConfig {
            fallback_addresses: vec![BASE.into()],
            ..ResolverConfig::default()
        };
        let resolver = EndpointResolver::new(&resolver_config, transport.clone(), store.clone(), clock.clone());
        let session = Session::restore(store.clone());
        let client = RequestClient::new(&RequestConfig::default(), resolver, transport.clone(), session);
        Fixture {
            client,
            transport,
            clock,
            store,
        }
    }

    fn app_requests(f: &Fixture) -> Vec<TransportRequest> {
        f.transport
            .requests()
            .into_iter()
            .filter(|r| !r.url.ends_with("/health"))
            .collect()
    }

    #[tokio::test]
    async fn test_injects_bearer_and_request_id() {
        let f = fixture(|_| Reply::json(200, "{}"));
        f.client.session().login("s3cret", UserIdentity::new("u1"));

        let resp = f.client.get("/api/me").await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.failure().is_none());

        let sent = app_requests(&f);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://api.test/api/me");
        assert_eq!(sent[0].headers[AUTHORIZATION], "Bearer s3cret");
        assert!(sent[0].headers.contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_explicit_authorization_wins() {
        let f = fixture(|_| Reply::json(200, "{}"));
        f.client.session().login("s3cret", UserIdentity::new("u1"));

        let options = RequestOptions::get().header(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        f.client.request("/api/me", options).await;

        assert_eq!(app_requests(&f)[0].headers[AUTHORIZATION], "Basic Zm9v");
    }

    #[tokio::test]
    async fn test_status_passed_through() {
        let f = fixture(|_| Reply::json(404, r#"{"error":"not_found"}"#));
        let resp = f.client.get("/api/missing").await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(resp.failure().is_none());
        assert_eq!(resp.text(), r#"{"error":"not_found"}"#);
    }

    #[tokio::test]
    async fn test_backoff_issues_zero_network_attempts() {
        let f = fixture(|_| Reply::refused());

        let first = f.client.get("/api/a").await;
        assert_eq!(first.failure(), Some(FailureReason::Offline));
        assert_eq!(first.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!f.client.resolver().is_backend_down());

        f.client.get("/api/a").await;
        assert!(f.client.resolver().is_backend_down());

        let calls = f.transport.calls();
        for _ in 0..10 {
            let resp = f.client.get("/api/a").await;
            assert_eq!(resp.failure(), Some(FailureReason::CircuitOpen));
            assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        }
        assert_eq!(f.transport.calls(), calls);

        f.clock.advance(Duration::from_secs(5));
        f.client.get("/api/a").await;
        assert!(f.transport.calls() > calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_504() {
        let f = fixture(|_| Reply::json(200, "{}").after(Duration::from_secs(10)));
        let resp = f.client.get("/api/slow").await;
        assert_eq!(resp.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(resp.failure(), Some(FailureReason::Timeout));
        assert_eq!(f.client.resolver().state().candidates[0].failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancel_yields_504_aborted() {
        let f = fixture(|_| Reply::refused().after(Duration::from_secs(10)));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let resp = f
            .client
            .request("/api/slow", RequestOptions::get().cancel_with(token))
            .await;
        assert_eq!(resp.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(resp.failure(), Some(FailureReason::Aborted));
        assert_eq!(f.client.resolver().state().candidates[0].failures, 0);
    }

    /// Every call, health checks included, takes a minute to answer.
    fn slow_backend() -> (RequestClient, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new(|_| Reply::status(200).after(Duration::from_secs(60))));
        let store = Arc::new(MemoryStore::new());
        let resolver = EndpointResolver::new(
            &ResolverConfig::default(),
            transport.clone(),
            store.clone(),
            Arc::new(ManualClock::new(0)),
        );
        let session = Session::restore(store);
        let client = RequestClient::new(&RequestConfig::default(), resolver, transport.clone(), session);
        (client, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_resolution_yields_504_aborted() {
        let (client, _) = slow_backend();
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let resp = client
            .request("/api/me", RequestOptions::get().cancel_with(token))
            .await;
        assert_eq!(resp.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(resp.failure(), Some(FailureReason::Aborted));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_resolution_is_bounded_by_request_timeout() {
        let (client, _) = slow_backend();

        let start = tokio::time::Instant::now();
        let resp = client.get("/api/me").await;
        assert_eq!(resp.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(resp.failure(), Some(FailureReason::Timeout));
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_during_backoff_yields_aborted() {
        let f = fixture(|_| Reply::refused());
        f.client.get("/api/a").await;
        f.client.get("/api/a").await;
        assert!(f.client.resolver().is_backend_down());

        let calls = f.transport.calls();
        let token = CancellationToken::new();
        token.cancel();
        let resp = f
            .client
            .request("/api/a", RequestOptions::get().cancel_with(token))
            .await;
        assert_eq!(resp.failure(), Some(FailureReason::Aborted));
        assert_eq!(resp.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(f.transport.calls(), calls);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session() {
        let f = fixture(|_| Reply::status(401));
        f.client.session().login("expired", UserIdentity::new("u1"));

        let resp = f.client.get("/api/me").await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert!(!f.client.session().is_authenticated());
        assert!(f.client.session().user().is_none());
        assert!(f.store.get(KEY_TOKEN).is_none());
    }

    #[tokio::test]
    async fn test_forbidden_on_anonymous_call_keeps_session_untouched() {
        let f = fixture(|_| Reply::status(403));
        let resp = f.client.get("/api/public").await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);

        f.client.session().login("fresh", UserIdentity::new("u1"));
        let options = RequestOptions::get().header(AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        f.client.request("/api/admin", options).await;
        assert!(f.client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_post_json() {
        let f = fixture(|req| {
            assert_eq!(req.method, reqwest::Method::POST);
            Reply::json(201, r#"{"id":"9"}"#)
        });
        let resp = f
            .client
            .post_json("/api/organizations", &serde_json::json!({"name": "Acme"}))
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::CREATED);
        let body: serde_json::Value = resp.json().unwrap();
        assert_eq!(body["id"], "9");
    }
}
