//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: calls pass through as probes
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= failure_threshold within window_ms
//! Open → Half-Open: now - last_failure > timeout_ms (checked on read)
//! Half-Open → Closed: success_threshold successes
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global)
//! - No background timer; open → half-open is evaluated lazily
//! - The breaker never retries and never wraps the caller's error
//! - The lock is never held across the guarded future

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::config::BreakerConfig;
use crate::observability::metrics::MetricsRegistry;
use crate::resilience::clock::Clock;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }

    fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without running it.
    #[error("circuit breaker '{name}' is open (retry in {}ms)", .retry_after.as_millis())]
    Open { name: String, retry_after: Duration },

    /// The guarded call ran and failed; the original error is preserved.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The caller's original error, if the call actually ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

/// Serializable view of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: u32,
    pub last_failure_ms: Option<u64>,
    /// Time left before an open breaker admits probes.
    pub retry_after_ms: Option<u64>,
}

/// Evaluate the time-based part of the state machine.
///
/// Pure function of its inputs: an open breaker whose timeout has elapsed
/// since the last failure reads as half-open; every other state is stable.
pub fn evaluate_state(
    state: CircuitState,
    now_ms: u64,
    last_failure_ms: Option<u64>,
    config: &BreakerConfig,
) -> CircuitState {
    match (state, last_failure_ms) {
        (CircuitState::Open, Some(last)) if now_ms.saturating_sub(last) > config.timeout_ms => {
            CircuitState::HalfOpen
        }
        _ => state,
    }
}

#[derive(Debug)]
struct BreakerInner {
    config: BreakerConfig,
    state: CircuitState,
    failures: VecDeque<u64>,
    success_count: u32,
    last_failure_ms: Option<u64>,
}

type Transition = (CircuitState, CircuitState);

impl BreakerInner {
    fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            success_count: 0,
            last_failure_ms: None,
        }
    }

    fn set_state(&mut self, next: CircuitState) -> Option<Transition> {
        let prev = self.state;
        self.state = next;
        (prev != next).then_some((prev, next))
    }

    fn refresh(&mut self, now_ms: u64) -> Option<Transition> {
        let next = evaluate_state(self.state, now_ms, self.last_failure_ms, &self.config);
        if next == CircuitState::HalfOpen && self.state == CircuitState::Open {
            self.success_count = 0;
        }
        self.set_state(next)
    }

    fn prune(&mut self, now_ms: u64) {
        let window = self.config.window_ms;
        while let Some(&oldest) = self.failures.front() {
            if now_ms.saturating_sub(oldest) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn retry_after(&self, now_ms: u64) -> Duration {
        let elapsed = self
            .last_failure_ms
            .map(|last| now_ms.saturating_sub(last))
            .unwrap_or(0);
        Duration::from_millis(self.config.timeout_ms.saturating_sub(elapsed))
    }

    fn trip(&mut self, now_ms: u64) -> Option<Transition> {
        self.last_failure_ms = Some(now_ms);
        self.success_count = 0;
        self.set_state(CircuitState::Open)
    }

    fn on_success(&mut self) -> Option<Transition> {
        match self.state {
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    self.clear();
                    self.set_state(CircuitState::Closed)
                } else {
                    None
                }
            }
            // Late results from calls admitted before the breaker opened,
            // and ordinary closed-state successes, change nothing.
            CircuitState::Closed | CircuitState::Open => None,
        }
    }

    fn on_failure(&mut self, now_ms: u64) -> Option<Transition> {
        self.failures.push_back(now_ms);
        self.prune(now_ms);
        match self.state {
            CircuitState::HalfOpen | CircuitState::Open => self.trip(now_ms),
            CircuitState::Closed => {
                if self.failures.len() >= self.config.failure_threshold as usize {
                    self.trip(now_ms)
                } else {
                    None
                }
            }
        }
    }

    fn clear(&mut self) {
        self.failures.clear();
        self.success_count = 0;
        self.last_failure_ms = None;
    }
}

/// Failure-counting gate around calls to one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsRegistry>>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
            metrics: None,
            inner: Mutex::new(BreakerInner::new(config)),
        }
    }

    /// Report transitions and rejections to a metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        metrics.set_gauge(
            &format!("breaker.{}.state", self.name),
            CircuitState::Closed.gauge_value(),
        );
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> BreakerConfig {
        self.lock().config
    }

    /// Current state, applying the lazy open → half-open transition.
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now_ms();
        let (state, transition) = {
            let mut inner = self.lock();
            let transition = inner.refresh(now);
            (inner.state, transition)
        };
        self.emit(transition);
        state
    }

    /// Run `f` through the breaker.
    ///
    /// An open breaker fails fast with [`BreakerError::Open`] and `f` is
    /// never called. Otherwise the outcome of `f` is recorded and its error,
    /// if any, is returned unchanged inside [`BreakerError::Inner`].
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(retry_after) = self.admit() {
            return Err(BreakerError::Open {
                name: self.name.clone(),
                retry_after,
            });
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Return to closed and forget all history.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.lock();
            inner.clear();
            inner.set_state(CircuitState::Closed)
        };
        tracing::info!(breaker = %self.name, "Circuit breaker reset");
        self.count("reset");
        self.emit(transition);
    }

    /// Swap thresholds; the current state and history are kept.
    pub fn reconfigure(&self, config: BreakerConfig) {
        let mut inner = self.lock();
        if inner.config != config {
            tracing::info!(breaker = %self.name, ?config, "Circuit breaker reconfigured");
            inner.config = config;
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now_ms();
        let (snapshot, transition) = {
            let mut inner = self.lock();
            let transition = inner.refresh(now);
            inner.prune(now);
            let retry_after_ms = (inner.state == CircuitState::Open)
                .then(|| inner.retry_after(now).as_millis() as u64);
            let snapshot = BreakerSnapshot {
                name: self.name.clone(),
                state: inner.state,
                failure_count: inner.failures.len(),
                success_count: inner.success_count,
                last_failure_ms: inner.last_failure_ms,
                retry_after_ms,
            };
            (snapshot, transition)
        };
        self.emit(transition);
        snapshot
    }

    fn admit(&self) -> Result<(), Duration> {
        let now = self.clock.now_ms();
        let (result, transition) = {
            let mut inner = self.lock();
            let transition = inner.refresh(now);
            let result = match inner.state {
                CircuitState::Open => Err(inner.retry_after(now)),
                CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            };
            (result, transition)
        };
        self.emit(transition);
        if let Err(retry_after) = result {
            tracing::debug!(breaker = %self.name, ?retry_after, "Call rejected by open circuit");
            self.count("rejected");
        }
        result
    }

    fn record_success(&self) {
        let now = self.clock.now_ms();
        let transition = {
            let mut inner = self.lock();
            let refreshed = inner.refresh(now);
            inner.on_success().or(refreshed)
        };
        self.emit(transition);
    }

    fn record_failure(&self) {
        let now = self.clock.now_ms();
        let transition = {
            let mut inner = self.lock();
            let refreshed = inner.refresh(now);
            inner.on_failure(now).or(refreshed)
        };
        self.emit(transition);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    fn count(&self, event: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.increment(&format!("breaker.{}.{}", self.name, event));
        }
    }

    fn emit(&self, transition: Option<Transition>) {
        let Some((from, to)) = transition else {
            return;
        };
        match to {
            CircuitState::Open => {
                tracing::warn!(breaker = %self.name, %from, "Circuit opened");
                self.count("opened");
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, %from, "Circuit half-open, probing");
                self.count("half_opened");
            }
            CircuitState::Closed => {
                tracing::info!(breaker = %self.name, %from, "Circuit closed");
                self.count("closed");
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_gauge(&format!("breaker.{}.state", self.name), to.gauge_value());
        }
    }
}
