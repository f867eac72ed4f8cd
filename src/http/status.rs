//! Public status endpoints.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::load::{LoadMode, LoadStatus};
use crate::observability::metrics::MetricsSnapshot;
use crate::resilience::{BreakerSnapshot, CircuitState};

/// Overall health reported at the top of the status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Operational,
    Degraded,
    Critical,
}

impl OverallStatus {
    pub fn derive(mode: LoadMode, any_breaker_open: bool) -> Self {
        match (mode, any_breaker_open) {
            (LoadMode::Critical, _) => OverallStatus::Critical,
            (LoadMode::Degraded, _) | (LoadMode::Normal, true) => OverallStatus::Degraded,
            (LoadMode::Normal, false) => OverallStatus::Operational,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSignals {
    pub ai_latency_high: bool,
    pub error_rate_high: bool,
    pub mode: LoadMode,
    pub sample_count: usize,
    pub average_latency_ms: f64,
    pub error_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub council_participant_limit: u32,
    pub max_response_length: u32,
    pub memory_summarization_enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub status: OverallStatus,
    pub version: &'static str,
    pub load: LoadSignals,
    pub limits: Limits,
    pub circuit_breakers: BTreeMap<String, CircuitState>,
    pub metrics: MetricsSnapshot,
}

impl SystemStatus {
    fn assemble(
        load: LoadStatus,
        circuit_breakers: BTreeMap<String, CircuitState>,
        metrics: MetricsSnapshot,
    ) -> Self {
        let any_open = circuit_breakers.values().any(|s| *s == CircuitState::Open);
        Self {
            status: OverallStatus::derive(load.mode, any_open),
            version: env!("CARGO_PKG_VERSION"),
            limits: Limits {
                council_participant_limit: load.council_participant_limit,
                max_response_length: load.max_response_length,
                memory_summarization_enabled: load.memory_summarization_enabled,
            },
            load: LoadSignals {
                ai_latency_high: load.ai_latency_high,
                error_rate_high: load.error_rate_high,
                mode: load.mode,
                sample_count: load.sample_count,
                average_latency_ms: load.average_latency_ms,
                error_rate: load.error_rate,
            },
            circuit_breakers,
            metrics,
        }
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let ctx = &state.ctx;
    Json(SystemStatus::assemble(
        ctx.monitor.get_status(),
        ctx.breakers.states(),
        ctx.metrics.snapshot(),
    ))
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.ctx.breakers.snapshots())
}

pub async fn health() -> &'static str {
    "ok"
}
