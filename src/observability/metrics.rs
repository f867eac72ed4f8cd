//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Keep process-wide named counters, gauges and timers
//! - Produce an ad hoc JSON snapshot for the status endpoint
//! - Mirror every update into the `metrics` facade for Prometheus scrapes
//!
//! # Metrics
//! - `breaker.<name>.opened|half_opened|closed|rejected|reset` (counter)
//! - `breaker.<name>.state` (gauge): 0=closed, 1=half-open, 2=open
//! - `upstream.<name>.requests|failures` (counter)
//! - `upstream.<name>.latency` (timer)
//! - `http.requests` (counter)
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Registry is constructed explicitly and shared via `Arc`
//! - Nothing is persisted; state resets with the process

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

/// Running aggregate for a named timer.
#[derive(Debug, Clone, Copy, Default)]
struct TimerStats {
    count: u64,
    total_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

impl TimerStats {
    fn record(&mut self, ms: f64) {
        if self.count == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.count += 1;
        self.total_ms += ms;
    }

    fn summary(&self) -> TimerSummary {
        TimerSummary {
            count: self.count,
            total_ms: self.total_ms,
            min_ms: self.min_ms,
            max_ms: self.max_ms,
            avg_ms: if self.count == 0 {
                0.0
            } else {
                self.total_ms / self.count as f64
            },
        }
    }
}

/// Serialized view of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSummary {
    pub count: u64,
    pub total_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

/// Point-in-time copy of every registered metric, sorted by name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub timers: BTreeMap<String, TimerSummary>,
}

/// Process-wide registry of named metrics.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, AtomicU64>,
    gauges: DashMap<String, f64>,
    timers: DashMap<String, TimerStats>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Increment a counter, creating it on first use.
    pub fn increment_by(&self, name: &str, by: u64) {
        match self.counters.get(name) {
            Some(counter) => {
                counter.fetch_add(by, Ordering::Relaxed);
            }
            None => {
                self.counters
                    .entry(name.to_string())
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(by, Ordering::Relaxed);
            }
        }
        metrics::counter!(name.to_string()).increment(by);
    }

    /// Set a gauge to an absolute value.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
        metrics::gauge!(name.to_string()).set(value);
    }

    /// Record one timed observation.
    pub fn record_duration(&self, name: &str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.timers.entry(name.to_string()).or_default().record(ms);
        metrics::histogram!(name.to_string()).record(elapsed.as_secs_f64());
    }

    /// Current value of a counter (0 if never incremented).
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Current value of a gauge.
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).map(|g| *g)
    }

    /// Current aggregate of a timer.
    pub fn timer(&self, name: &str) -> Option<TimerSummary> {
        self.timers.get(name).map(|t| t.summary())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self
                .counters
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
            gauges: self
                .gauges
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            timers: self
                .timers
                .iter()
                .map(|e| (e.key().clone(), e.value().summary()))
                .collect(),
        }
    }
}

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}
