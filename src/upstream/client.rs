//! Breaker-guarded HTTP client for one dependency.
//!
//! # Responsibilities
//! - Run every outbound call through the dependency's circuit breaker
//! - Enforce the per-request timeout (the breaker has none)
//! - Feed latency and outcome into the load monitor and metrics
//!
//! # Design Decisions
//! - Transport errors, timeouts, 5xx and 429 count as breaker failures
//! - Other 4xx are NOT breaker failures (client error, not provider)
//! - Body decoding happens after the breaker has recorded the outcome
//! - Rejected calls record no load sample; nothing was observed

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::DependencyConfig;
use crate::load::{LoadMonitor, Outcome};
use crate::observability::metrics::MetricsRegistry;
use crate::resilience::{BreakerError, CircuitBreaker};

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{dependency}: circuit open, retry in {}ms", .retry_after.as_millis())]
    CircuitOpen {
        dependency: String,
        retry_after: Duration,
    },

    #[error("{0}: no base_url configured")]
    NotConfigured(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned {0}")]
    Status(StatusCode),

    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl UpstreamError {
    /// True when the breaker rejected the call; callers should degrade
    /// (cached or default response) rather than surface a 500.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, UpstreamError::CircuitOpen { .. })
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(e)
        }
    }
}

fn counts_as_failure(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Debug)]
pub struct GuardedUpstream {
    name: String,
    base_url: Option<Url>,
    health_path: String,
    timeout: Duration,
    client: reqwest::Client,
    breaker: Arc<CircuitBreaker>,
    monitor: Arc<LoadMonitor>,
    metrics: Arc<MetricsRegistry>,
}

impl GuardedUpstream {
    pub fn new(
        config: &DependencyConfig,
        client: reqwest::Client,
        breaker: Arc<CircuitBreaker>,
        monitor: Arc<LoadMonitor>,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self, UpstreamError> {
        let base_url = config.base_url.as_deref().map(Url::parse).transpose()?;
        Ok(Self {
            name: config.name.clone(),
            base_url,
            health_path: config.health_path.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            client,
            breaker,
            monitor,
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// GET `path` and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = self.url(path)?;
        let response = self.dispatch(self.client.get(url)).await?;
        response.json().await.map_err(UpstreamError::Decode)
    }

    /// POST a JSON body to `path` and decode a JSON reply.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, UpstreamError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let response = self.dispatch(self.client.post(url).json(body)).await?;
        response.json().await.map_err(UpstreamError::Decode)
    }

    /// Hit the health path once.
    pub async fn probe(&self) -> Result<(), UpstreamError> {
        let url = self.url(&self.health_path)?;
        self.dispatch(self.client.get(url)).await.map(|_| ())
    }

    fn url(&self, path: &str) -> Result<Url, UpstreamError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| UpstreamError::NotConfigured(self.name.clone()))?;
        Ok(base.join(path)?)
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Response, UpstreamError> {
        let request = request.timeout(self.timeout);
        let started = Instant::now();

        let result = self
            .breaker
            .execute(|| async move {
                let response = request.send().await.map_err(UpstreamError::from_reqwest)?;
                let status = response.status();
                if counts_as_failure(status) {
                    Err(UpstreamError::Status(status))
                } else {
                    Ok(response)
                }
            })
            .await;

        match result {
            Ok(response) => {
                self.observe(started, Outcome::Success);
                let status = response.status();
                if status.is_success() {
                    Ok(response)
                } else {
                    tracing::debug!(dependency = %self.name, %status, "Upstream rejected request");
                    Err(UpstreamError::Status(status))
                }
            }
            Err(BreakerError::Open { retry_after, .. }) => {
                self.metrics
                    .increment(&format!("upstream.{}.short_circuited", self.name));
                Err(UpstreamError::CircuitOpen {
                    dependency: self.name.clone(),
                    retry_after,
                })
            }
            Err(BreakerError::Inner(e)) => {
                self.observe(started, Outcome::Error);
                self.metrics
                    .increment(&format!("upstream.{}.failures", self.name));
                tracing::warn!(dependency = %self.name, error = %e, "Upstream call failed");
                Err(e)
            }
        }
    }

    fn observe(&self, started: Instant, outcome: Outcome) {
        let elapsed = started.elapsed();
        self.monitor.record(elapsed, outcome);
        self.metrics
            .increment(&format!("upstream.{}.requests", self.name));
        self.metrics
            .record_duration(&format!("upstream.{}.latency", self.name), elapsed);
    }
}
