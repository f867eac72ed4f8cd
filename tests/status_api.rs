//! Status and operator endpoint tests.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use companion_guard::config::GuardConfig;
use companion_guard::http::{HttpServer, X_REQUEST_ID};
use companion_guard::load::Outcome;
use companion_guard::lifecycle::Shutdown;
use companion_guard::resilience::ManualClock;
use companion_guard::GuardContext;

fn setup(config: GuardConfig) -> (Arc<ManualClock>, Arc<GuardContext>, axum::Router) {
    let clock = Arc::new(ManualClock::new());
    let ctx = Arc::new(GuardContext::with_clock(&config, clock.clone()).unwrap());
    let router = HttpServer::new(ctx.clone(), &config.server).router();
    (clock, ctx, router)
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn reset(name: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/system/breakers/{name}/reset"));
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn trip(ctx: &GuardContext, name: &str) {
    let breaker = ctx.breakers.get(name).unwrap();
    for _ in 0..5 {
        let _ = breaker
            .execute(|| async { Err::<(), _>(io::Error::other("down")) })
            .await;
    }
}

#[tokio::test]
async fn test_status_document_shape() {
    let (_, _, router) = setup(GuardConfig::default());
    let (status, json) = send(&router, get("/api/system/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "operational");
    assert_eq!(json["load"]["aiLatencyHigh"], false);
    assert_eq!(json["load"]["errorRateHigh"], false);
    assert_eq!(json["load"]["mode"], "normal");
    assert_eq!(json["limits"]["councilParticipantLimit"], 5);
    assert_eq!(json["limits"]["maxResponseLength"], 4000);
    assert_eq!(json["limits"]["memorySummarizationEnabled"], true);
    assert_eq!(json["circuitBreakers"]["groq"], "closed");
    assert_eq!(json["circuitBreakers"]["gateway"], "closed");
    assert_eq!(json["circuitBreakers"]["supabase"], "closed");
    assert!(json["metrics"]["counters"].is_object());
}

#[tokio::test]
async fn test_open_breaker_degrades_status() {
    let (clock, ctx, router) = setup(GuardConfig::default());
    trip(&ctx, "groq").await;

    let (_, json) = send(&router, get("/api/system/status")).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["circuitBreakers"]["groq"], "open");
    assert_eq!(json["circuitBreakers"]["supabase"], "closed");

    clock.advance(Duration::from_secs(61));
    let (_, json) = send(&router, get("/api/system/status")).await;
    assert_eq!(json["circuitBreakers"]["groq"], "half-open");
    assert_eq!(json["status"], "operational");
}

#[tokio::test]
async fn test_load_signals_shrink_limits() {
    let (_, ctx, router) = setup(GuardConfig::default());
    for _ in 0..10 {
        ctx.monitor.record(Duration::from_secs(8), Outcome::Error);
    }

    let (_, json) = send(&router, get("/api/system/status")).await;
    assert_eq!(json["status"], "critical");
    assert_eq!(json["load"]["aiLatencyHigh"], true);
    assert_eq!(json["load"]["errorRateHigh"], true);
    assert_eq!(json["limits"]["councilParticipantLimit"], 1);
    assert_eq!(json["limits"]["memorySummarizationEnabled"], false);
}

#[tokio::test]
async fn test_breakers_endpoint_lists_snapshots() {
    let (_, ctx, router) = setup(GuardConfig::default());
    trip(&ctx, "supabase").await;

    let (status, json) = send(&router, get("/api/system/breakers")).await;
    assert_eq!(status, StatusCode::OK);
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[2]["name"], "supabase");
    assert_eq!(list[2]["state"], "open");
    assert_eq!(list[2]["failureCount"], 5);
    assert_eq!(list[2]["retryAfterMs"], 60000);
}

#[tokio::test]
async fn test_reset_requires_enabled_admin() {
    let (_, ctx, router) = setup(GuardConfig::default());
    trip(&ctx, "groq").await;

    let (status, _) = send(&router, reset("groq", Some("CHANGE_ME_IN_PRODUCTION"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.breakers.states()["groq"].as_str(), "open");
}

#[tokio::test]
async fn test_reset_with_valid_key() {
    let mut config = GuardConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = "s3cret".into();
    let (_, ctx, router) = setup(config);
    trip(&ctx, "groq").await;

    let (status, _) = send(&router, reset("groq", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&router, reset("groq", Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(&router, reset("groq", Some("s3cret"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "closed");
    assert_eq!(json["failureCount"], 0);

    let (status, _) = send(&router, reset("spotify", Some("s3cret"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_and_counter() {
    let (_, ctx, router) = setup(GuardConfig::default());
    let response = router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(X_REQUEST_ID));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(X_REQUEST_ID, "fixed-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()[X_REQUEST_ID], "fixed-id");
    assert_eq!(ctx.metrics.counter("http.requests"), 2);
}

#[tokio::test]
async fn test_live_server_and_graceful_shutdown() {
    let config = GuardConfig::default();
    let ctx = Arc::new(GuardContext::new(&config).unwrap());
    let server = HttpServer::new(ctx, &config.server);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{addr}/api/system/status"))
        .send()
        .await
        .expect("status server unreachable");
    assert_eq!(res.status(), 200);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["status"], "operational");

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
