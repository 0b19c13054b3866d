//! Integration tests for modelmux
//!
//! These tests run the coordinator against real HTTP collaborators served
//! from local axum stubs:
//! - modelmux-llm: OpenAI-compatible provider client
//! - modelmux-memory: HTTP context store
//! - modelmux-core: routing, fallback, cache, write-back
//! - modelmux-tools: tool surface through the coordinator

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use modelmux_core::{
    ChatRequest, ContextBackend, Coordinator, CoordinatorConfig, Error, PriorityMode,
    ProviderDescriptor,
};
use modelmux_llm::FailureKind;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// OpenAI-compatible stub answering with `reply`, counting calls
async fn provider_stub(reply: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(move |State(calls): State<Arc<AtomicU32>>, Json(body): Json<Value>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "model": body["model"],
                    "choices": [{"message": {"role": "assistant", "content": reply}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
                }))
            }),
        )
        .with_state(Arc::clone(&calls));
    (spawn_stub(router).await, calls)
}

/// Stub that always fails with 500
async fn failing_provider_stub() -> SocketAddr {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
    );
    spawn_stub(router).await
}

fn provider(name: &str, addr: SocketAddr, latency_ms: u64) -> ProviderDescriptor {
    ProviderDescriptor::new(name, format!("http://{addr}/v1"), format!("{name}-model"), latency_ms)
}

fn config(providers: Vec<ProviderDescriptor>) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::default();
    config.providers = providers;
    config.context.backend = ContextBackend::None;
    config.cache.sweep_interval_secs = 0;
    config
}

#[test]
fn test_default_config_is_valid() {
    let config: CoordinatorConfig = toml::from_str(include_str!("../config/default.toml")).unwrap();
    assert_ok!(config.validate());
    assert_eq!(config.providers.len(), 4);
    assert_eq!(config.routing.baseline_provider.as_deref(), Some("claude"));
    assert_eq!(config.routing.rules.len(), 3);
    assert_eq!(config.context.backend, ContextBackend::Memory);
    assert_eq!(config.providers[0].rate_limit_per_minute, Some(30));
    assert_eq!(config.providers[0].max_concurrent_requests, Some(10));
}

#[tokio::test]
async fn test_http_provider_round_trip() {
    let (addr, calls) = provider_stub("served over http").await;
    let coordinator = assert_ok!(Coordinator::builder(config(vec![provider("groq", addr, 350)])).build());

    let response = assert_ok!(coordinator.handle(ChatRequest::new("hello")).await);
    assert_eq!(response.content, "served over http");
    assert_eq!(response.provider, "groq");
    assert!(!response.cache_hit);

    let cached = assert_ok!(coordinator.handle(ChatRequest::new("hello")).await);
    assert!(cached.cache_hit);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_http_error_falls_back() {
    let bad = failing_provider_stub().await;
    let (good, _) = provider_stub("from fallback").await;
    let coordinator = assert_ok!(Coordinator::builder(config(vec![
        provider("fast", bad, 200),
        provider("steady", good, 900),
    ]))
    .build());

    let response = assert_ok!(coordinator.handle(ChatRequest::new("hello")).await);
    assert_eq!(response.provider, "steady");

    let stats = coordinator.get_stats();
    assert_eq!(stats.per_provider["fast"].failures, 1);
    assert_eq!(stats.routing.distribution_by_provider["steady"], 1);
}

#[tokio::test]
async fn test_unreachable_and_missing_credentials() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);

    let (addr, _) = provider_stub("unused").await;
    let missing_key = provider("keyed", addr, 500).with_credential_ref("MODELMUX_TEST_KEY_THAT_IS_NEVER_SET");

    let coordinator = assert_ok!(Coordinator::builder(config(vec![
        provider("down", closed, 100),
        missing_key,
    ]))
    .build());

    let err = assert_err!(coordinator.handle(ChatRequest::new("hello")).await);
    match err {
        Error::AllProvidersFailed { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts.iter().all(|a| a.kind == FailureKind::Unreachable));
        }
        other => panic!("expected AllProvidersFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_context_store_round_trip() {
    let stored: Arc<Mutex<Vec<Value>>> = Arc::default();
    let memory = Router::new()
        .route(
            "/query",
            post(|| async {
                Json(json!({"snippets": [{"id": "m1", "text": "Q: tokio?\nA: an async runtime", "score": 0.9}]}))
            }),
        )
        .route(
            "/store",
            post(|State(stored): State<Arc<Mutex<Vec<Value>>>>, Json(exchange): Json<Value>| async move {
                stored.lock().unwrap().push(exchange);
                Json(json!({"id": "rec-1"}))
            }),
        )
        .with_state(Arc::clone(&stored));
    let memory_addr = spawn_stub(memory).await;
    let (addr, _) = provider_stub("tokio is a runtime").await;

    let mut config = config(vec![provider("groq", addr, 350)]);
    config.context.backend = ContextBackend::Http;
    config.context.endpoint = Some(format!("http://{memory_addr}"));
    config.context.query_timeout_ms = 2000;
    let coordinator = assert_ok!(Coordinator::builder(config).build());
    coordinator.start();

    let response = assert_ok!(coordinator.handle(ChatRequest::new("what is tokio")).await);
    assert_eq!(response.context_snippets, 1);

    coordinator.shutdown().await;
    let stored = stored.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["message"], "what is tokio");
    assert_eq!(stored[0]["provider"], "groq");

    let context = coordinator.get_stats().context.unwrap();
    assert_eq!(context.stored, 1);
}

#[tokio::test]
async fn test_routing_rules_from_config() {
    let (groq, _) = provider_stub("groq answer").await;
    let (moonshot, moonshot_calls) = provider_stub("moonshot answer").await;
    let coordinator = assert_ok!(Coordinator::builder(config(vec![
        provider("groq", groq, 350),
        provider("moonshot", moonshot, 1500).with_modes(vec![PriorityMode::Cost, PriorityMode::Balanced]),
    ]))
    .build());

    let response = assert_ok!(
        coordinator
            .handle(ChatRequest::new("Refactor this function to avoid clones"))
            .await
    );
    assert_eq!(response.provider, "moonshot");
    assert_eq!(moonshot_calls.load(Ordering::SeqCst), 1);

    // latency mode excludes moonshot, so the rule cannot promote it
    let decision = coordinator
        .preview_route(&ChatRequest::new("Refactor again").with_mode(PriorityMode::Latency))
        .unwrap();
    assert_eq!(decision.chosen_provider, "groq");
    assert_eq!(decision.matched_rule.as_deref(), Some("complex_analysis"));
}

#[tokio::test]
async fn test_list_providers_tool() {
    let (addr, _) = provider_stub("unused").await;
    let coordinator = assert_ok!(Coordinator::builder(config(vec![provider("groq", addr, 350)])).build());

    let result = assert_ok!(coordinator.call_tool("list_providers", json!({})).await);
    let providers = result.output["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0]["name"], "groq");
    assert_eq!(providers[0]["expected_latency_ms"], 350);

    let waited = tokio::time::timeout(Duration::from_secs(1), coordinator.shutdown()).await;
    assert_ok!(waited);
}
