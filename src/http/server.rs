//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with status and operator handlers
//! - Wire up middleware (request ID, tracing, timeout, request counter)
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ServerConfig;
use crate::context::GuardContext;
use crate::http::request::{make_span, UuidRequestId};
use crate::http::status::{get_breakers, get_status, health};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<GuardContext>,
}

/// HTTP server for the status API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(ctx: Arc<GuardContext>, config: &ServerConfig) -> Self {
        let state = AppState { ctx };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/api/system/status", get(get_status))
            .route("/api/system/breakers", get(get_breakers))
            .merge(setup_admin_router(state.clone()))
            .layer(middleware::from_fn_with_state(state.clone(), count_requests))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn count_requests(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    state.ctx.metrics.increment("http.requests");
    next.run(request).await
}
