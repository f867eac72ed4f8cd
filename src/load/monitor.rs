//! Advisory load monitor.
//!
//! # Responsibilities
//! - Keep a bounded, time-windowed buffer of latency/outcome samples
//! - Derive the operating mode and feature caps on every read
//!
//! # Mode Derivation
//! ```text
//! neither signal high  → normal
//! exactly one high     → degraded
//! both high            → critical
//! ```
//!
//! # Design Decisions
//! - Status is computed, never stored
//! - Too few samples means no signal is high
//! - Policy is swapped atomically on config reload

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::config::{FeatureLimits, LoadPolicy};
use crate::resilience::clock::Clock;

/// Discrete operating mode consumed by feature code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    Normal,
    Degraded,
    Critical,
}

impl LoadMode {
    fn from_signals(latency_high: bool, error_rate_high: bool) -> Self {
        match (latency_high, error_rate_high) {
            (false, false) => LoadMode::Normal,
            (true, true) => LoadMode::Critical,
            _ => LoadMode::Degraded,
        }
    }
}

/// Outcome of one observed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn from_ok(ok: bool) -> Self {
        if ok {
            Outcome::Success
        } else {
            Outcome::Error
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at_ms: u64,
    latency_ms: u64,
    outcome: Outcome,
}

/// Snapshot derived from the current sample window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatus {
    pub mode: LoadMode,
    pub ai_latency_high: bool,
    pub error_rate_high: bool,
    pub council_participant_limit: u32,
    pub max_response_length: u32,
    pub memory_summarization_enabled: bool,
    pub sample_count: usize,
    pub average_latency_ms: f64,
    pub error_rate: f64,
}

impl LoadStatus {
    pub fn limits(&self) -> FeatureLimits {
        FeatureLimits {
            council_participant_limit: self.council_participant_limit,
            max_response_length: self.max_response_length,
            memory_summarization_enabled: self.memory_summarization_enabled,
        }
    }
}

#[derive(Debug)]
pub struct LoadMonitor {
    policy: ArcSwap<LoadPolicy>,
    samples: Mutex<VecDeque<Sample>>,
    clock: Arc<dyn Clock>,
}

impl LoadMonitor {
    pub fn new(policy: LoadPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            samples: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    pub fn policy(&self) -> Arc<LoadPolicy> {
        self.policy.load_full()
    }

    pub fn set_policy(&self, policy: LoadPolicy) {
        tracing::info!(
            latency_high_ms = policy.latency_high_ms,
            error_rate_high = policy.error_rate_high,
            "Load policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    /// Record one observation at the current time.
    pub fn record(&self, latency: Duration, outcome: Outcome) {
        self.record_at(self.clock.now_ms(), latency, outcome);
    }

    /// Record one observation at an explicit time.
    ///
    /// The buffer stays ordered by `at_ms`, so late arrivals still age out.
    pub fn record_at(&self, at_ms: u64, latency: Duration, outcome: Outcome) {
        let policy = self.policy.load();
        let now = self.clock.now_ms();
        let mut samples = self.samples.lock().expect("load monitor mutex poisoned");
        let idx = samples.partition_point(|s| s.at_ms <= at_ms);
        samples.insert(
            idx,
            Sample {
                at_ms,
                latency_ms: latency.as_millis() as u64,
                outcome,
            },
        );
        while samples.len() > policy.max_samples {
            samples.pop_front();
        }
        let newest = samples.back().map_or(now, |s| s.at_ms.max(now));
        prune(&mut samples, newest, policy.sample_window_ms);
    }

    pub fn get_status(&self) -> LoadStatus {
        let now = self.clock.now_ms();
        let policy = self.policy.load();

        let (count, total_latency, errors) = {
            let mut samples = self.samples.lock().expect("load monitor mutex poisoned");
            prune(&mut samples, now, policy.sample_window_ms);
            samples.iter().fold((0usize, 0u64, 0usize), |(n, lat, err), s| {
                let err = err + usize::from(s.outcome == Outcome::Error);
                (n + 1, lat + s.latency_ms, err)
            })
        };

        let (average_latency_ms, error_rate) = if count == 0 {
            (0.0, 0.0)
        } else {
            (
                total_latency as f64 / count as f64,
                errors as f64 / count as f64,
            )
        };

        let enough = count >= policy.min_samples.max(1);
        let ai_latency_high = enough && average_latency_ms > policy.latency_high_ms as f64;
        let error_rate_high = enough && error_rate > policy.error_rate_high;
        let mode = LoadMode::from_signals(ai_latency_high, error_rate_high);

        let limits = match mode {
            LoadMode::Normal => policy.normal,
            LoadMode::Degraded => policy.degraded,
            LoadMode::Critical => policy.critical,
        };

        LoadStatus {
            mode,
            ai_latency_high,
            error_rate_high,
            council_participant_limit: limits.council_participant_limit,
            max_response_length: limits.max_response_length,
            memory_summarization_enabled: limits.memory_summarization_enabled,
            sample_count: count,
            average_latency_ms,
            error_rate,
        }
    }
}

fn prune(samples: &mut VecDeque<Sample>, now_ms: u64, window_ms: u64) {
    while let Some(front) = samples.front() {
        if now_ms.saturating_sub(front.at_ms) > window_ms {
            samples.pop_front();
        } else {
            break;
        }
    }
}
