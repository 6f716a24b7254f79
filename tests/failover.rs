//! Endpoint discovery and request dispatch against real local backends.

use std::sync::Arc;

use serde_json::Value;
use tenant_gateway::auth::UserIdentity;
use tenant_gateway::config::{GatewayConfig, ResolverConfig};
use tenant_gateway::http::{FailureReason, ReqwestTransport};
use tenant_gateway::schedule::SystemClock;
use tenant_gateway::storage::{FileStore, KeyValueStore, MemoryStore, KEY_BASE_URL};
use tenant_gateway::Gateway;

mod common;

fn transport() -> Arc<ReqwestTransport> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    Arc::new(ReqwestTransport::with_client(client))
}

fn config(addresses: Vec<String>) -> GatewayConfig {
    GatewayConfig {
        resolver: ResolverConfig {
            fallback_addresses: addresses,
            backoff_ms: 60_000,
            ..ResolverConfig::default()
        },
        ..GatewayConfig::default()
    }
}

fn gateway(config: &GatewayConfig, store: Arc<dyn KeyValueStore>) -> Gateway {
    Gateway::with_parts(config, store, transport(), Arc::new(SystemClock))
}

#[tokio::test]
async fn test_resolves_past_dead_candidate() {
    let dead = common::dead_address().await;
    let live = common::start_healthy_backend("live").await;
    let store = Arc::new(MemoryStore::new());
    let gw = gateway(&config(vec![dead.clone(), live.url()]), store.clone());

    let address = gw.resolver.resolve(false).await;
    assert_eq!(address, live.url());
    assert_eq!(store.get(KEY_BASE_URL), Some(live.url()));

    let state = gw.resolver.state();
    let dead_state = state.candidates.iter().find(|c| c.address == dead).unwrap();
    assert_eq!(dead_state.failures, 1);
    assert!(!gw.resolver.is_backend_down());
}

#[tokio::test]
async fn test_requests_carry_token_and_request_id() {
    let backend = common::start_programmable_backend(|req| {
        if req.path == "/api/health" {
            return (200, "{}".to_string());
        }
        let echo = serde_json::json!({
            "path": req.path,
            "authorization": req.headers.get("authorization"),
            "request_id": req.headers.get("x-request-id"),
        });
        (200, echo.to_string())
    })
    .await;
    let gw = gateway(&config(vec![backend.url()]), Arc::new(MemoryStore::new()));
    gw.session.login("secret-token", UserIdentity::new("u1"));

    let response = gw.client.get("/api/me").await;
    assert!(response.is_success());
    let echo: Value = response.json().unwrap();
    assert_eq!(echo["path"], "/api/me");
    assert_eq!(echo["authorization"], "Bearer secret-token");
    assert!(echo["request_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_backend_death_engages_backoff() {
    let mut backend = common::start_healthy_backend("solo").await;
    let gw = gateway(&config(vec![backend.url()]), Arc::new(MemoryStore::new()));

    let response = gw.client.get("/api/anything").await;
    assert_eq!(response.status.as_u16(), 404);
    assert!(response.failure().is_none());

    backend.stop().await;
    let hits = backend.hits();

    let first = gw.client.get("/api/anything").await;
    assert_eq!(first.failure(), Some(FailureReason::Offline));
    assert_eq!(first.status.as_u16(), 503);
    assert!(!gw.resolver.is_backend_down());

    let second = gw.client.get("/api/anything").await;
    assert_eq!(second.failure(), Some(FailureReason::Offline));
    assert!(gw.resolver.is_backend_down());

    let third = gw.client.get("/api/anything").await;
    assert_eq!(third.failure(), Some(FailureReason::CircuitOpen));
    assert_eq!(backend.hits(), hits);
}

#[tokio::test]
async fn test_forced_resolve_moves_to_next_backend() {
    let mut primary = common::start_healthy_backend("primary").await;
    let secondary = common::start_healthy_backend("secondary").await;
    let gw = gateway(
        &config(vec![primary.url(), secondary.url()]),
        Arc::new(MemoryStore::new()),
    );

    assert_eq!(gw.resolver.resolve(false).await, primary.url());
    let mut changes = gw.resolver.subscribe();

    primary.stop().await;
    assert_eq!(gw.resolver.resolve(true).await, secondary.url());
    assert_eq!(changes.recv().await.unwrap(), secondary.url());
    assert_eq!(gw.resolver.current_address(), Some(secondary.url()));
}

#[tokio::test]
async fn test_persisted_address_is_tried_first() {
    let path = std::env::temp_dir().join(format!("gateway-state-{}.json", uuid::Uuid::new_v4()));
    let dead = common::dead_address().await;
    let live = common::start_healthy_backend("live").await;
    let cfg = config(vec![dead, live.url()]);

    {
        let gw = gateway(&cfg, Arc::new(FileStore::open(&path).unwrap()));
        assert_eq!(gw.resolver.resolve(false).await, live.url());
    }

    let gw = gateway(&cfg, Arc::new(FileStore::open(&path).unwrap()));
    assert_eq!(gw.resolver.state().candidates[0].address, live.url());

    std::fs::remove_file(&path).unwrap_or_default();
}

#[tokio::test]
async fn test_trusted_profile_skips_probing() {
    let backend = common::start_healthy_backend("trusted").await;
    let mut cfg = config(vec![]);
    cfg.resolver.configured_address = Some(backend.url());
    cfg.resolver.trusted = true;
    let gw = gateway(&cfg, Arc::new(MemoryStore::new()));

    assert_eq!(gw.resolver.resolve(true).await, backend.url());
    assert_eq!(backend.hits(), 0);
}
