//! Failure injection against guarded upstream calls.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use companion_guard::config::{DependencyConfig, GuardConfig};
use companion_guard::load::LoadMode;
use companion_guard::resilience::{CircuitState, ManualClock};
use companion_guard::upstream::{DependencyProber, UpstreamError};
use companion_guard::GuardContext;

mod common;

fn context_for(addr: SocketAddr) -> (Arc<ManualClock>, GuardContext) {
    let mut dep = DependencyConfig::named("groq");
    dep.base_url = Some(format!("http://{addr}"));
    dep.timeout_ms = 2_000;

    let mut config = GuardConfig::default();
    config.dependencies = vec![dep, DependencyConfig::named("supabase")];

    let clock = Arc::new(ManualClock::new());
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let ctx = GuardContext::build(&config, clock.clone(), client).unwrap();
    (clock, ctx)
}

#[tokio::test]
async fn test_failing_dependency_opens_breaker_and_recovers() {
    let healthy = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicU32::new(0));
    let (h, c) = (healthy.clone(), calls.clone());
    let addr = common::start_programmable_backend(move || {
        let (h, c) = (h.clone(), c.clone());
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            if h.load(Ordering::SeqCst) {
                (200, r#"{"reply":"hello"}"#.to_string())
            } else {
                (503, "overloaded".to_string())
            }
        }
    })
    .await;

    let (clock, ctx) = context_for(addr);
    let groq = ctx.upstream("groq").unwrap();

    for _ in 0..5 {
        let err = groq.get_json::<Value>("/v1/chat").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(s) if s.as_u16() == 503));
    }
    assert_eq!(groq.breaker().state(), CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    // Open: fail fast, the dependency is not contacted.
    let err = groq.get_json::<Value>("/v1/chat").await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(ctx.metrics.counter("upstream.groq.short_circuited"), 1);
    assert_eq!(ctx.metrics.counter("upstream.groq.failures"), 5);

    let status = ctx.monitor.get_status();
    assert_eq!(status.sample_count, 5);
    assert!(status.error_rate_high);
    assert_eq!(status.mode, LoadMode::Degraded);

    healthy.store(true, Ordering::SeqCst);
    clock.advance(Duration::from_secs(61));
    assert_eq!(groq.breaker().state(), CircuitState::HalfOpen);

    for _ in 0..2 {
        let body: Value = groq.get_json("/v1/chat").await.unwrap();
        assert_eq!(body["reply"], "hello");
    }
    assert_eq!(groq.breaker().state(), CircuitState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn test_client_errors_do_not_trip_breaker() {
    let addr = common::start_programmable_backend(|| async { (404, "{}".to_string()) }).await;
    let (_, ctx) = context_for(addr);
    let groq = ctx.upstream("groq").unwrap();

    for _ in 0..8 {
        let err = groq.get_json::<Value>("/missing").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(s) if s.as_u16() == 404));
    }
    assert_eq!(groq.breaker().state(), CircuitState::Closed);
    assert_eq!(ctx.monitor.get_status().error_rate, 0.0);
}

#[tokio::test]
async fn test_mock_status_codes_reach_the_client() {
    for code in [401u16, 418, 504] {
        let addr =
            common::start_programmable_backend(move || async move { (code, "{}".to_string()) })
                .await;
        let (_, ctx) = context_for(addr);
        let groq = ctx.upstream("groq").unwrap();

        let err = groq.get_json::<Value>("/v1/chat").await.unwrap_err();
        assert!(
            matches!(err, UpstreamError::Status(s) if s.as_u16() == code),
            "expected {code}, got {err}"
        );
    }
}

#[tokio::test]
async fn test_unreachable_dependency_counts_as_failure() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (_, ctx) = context_for(addr);
    let groq = ctx.upstream("groq").unwrap();

    let err = groq.probe().await.unwrap_err();
    assert!(matches!(err, UpstreamError::Transport(_) | UpstreamError::Timeout));
    assert_eq!(groq.breaker().snapshot().failure_count, 1);
}

#[tokio::test]
async fn test_prober_skips_unconfigured_and_feeds_monitor() {
    let addr = common::start_programmable_backend(|| async { (200, "{}".to_string()) }).await;
    let (_, ctx) = context_for(addr);

    let prober = DependencyProber::new(ctx.upstreams.values().cloned(), Duration::from_secs(1));
    assert_eq!(prober.len(), 1, "supabase has no base_url");

    prober.probe_all().await;
    prober.probe_all().await;

    let status = ctx.monitor.get_status();
    assert_eq!(status.sample_count, 2);
    assert_eq!(status.error_rate, 0.0);
    assert_eq!(ctx.metrics.counter("upstream.groq.requests"), 2);
    assert_eq!(ctx.metrics.timer("upstream.groq.latency").unwrap().count, 2);
}
