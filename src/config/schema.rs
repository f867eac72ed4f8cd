//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard
//! service. All types derive Serde traits for deserialization from config
//! files, and every section falls back to defaults so a minimal file works.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the guard service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Status server settings (bind address, request timeout).
    pub server: ServerConfig,

    /// Load shedding policy.
    pub load: LoadPolicy,

    /// Guarded external dependencies, one breaker each.
    pub dependencies: Vec<DependencyConfig>,

    /// Periodic dependency probing.
    pub probe: ProbeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            load: LoadPolicy::default(),
            dependencies: default_dependencies(),
            probe: ProbeConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// The providers the companion app calls out to.
fn default_dependencies() -> Vec<DependencyConfig> {
    ["groq", "gateway", "supabase"]
        .into_iter()
        .map(DependencyConfig::named)
        .collect()
}

/// Status server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures inside the window that trip the breaker.
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close it again.
    pub success_threshold: u32,

    /// How long the breaker stays open after the last failure, in ms.
    pub timeout_ms: u64,

    /// Rolling failure window, in ms.
    pub window_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
            window_ms: 60_000,
        }
    }
}

/// An external dependency guarded by its own breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Unique dependency name (also the breaker name).
    pub name: String,

    /// Base URL for outbound calls. Without it the dependency is tracked
    /// but never probed.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path probed by the dependency prober.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_dependency_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub breaker: BreakerConfig,
}

impl DependencyConfig {
    /// A dependency with default settings and no base URL.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: None,
            health_path: default_health_path(),
            timeout_ms: default_dependency_timeout_ms(),
            breaker: BreakerConfig::default(),
        }
    }
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_dependency_timeout_ms() -> u64 {
    10_000
}

/// Feature caps applied in one load mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureLimits {
    /// Maximum AI participants in a council session.
    pub council_participant_limit: u32,

    /// Maximum generated response length, in characters.
    pub max_response_length: u32,

    /// Whether memory summarization may run.
    pub memory_summarization_enabled: bool,
}

impl FeatureLimits {
    pub const NORMAL: Self = Self {
        council_participant_limit: 5,
        max_response_length: 4_000,
        memory_summarization_enabled: true,
    };

    pub const DEGRADED: Self = Self {
        council_participant_limit: 3,
        max_response_length: 2_000,
        memory_summarization_enabled: false,
    };

    pub const CRITICAL: Self = Self {
        council_participant_limit: 1,
        max_response_length: 800,
        memory_summarization_enabled: false,
    };
}

/// A caps table as written in the file; missing keys keep the mode's defaults.
#[derive(Deserialize)]
struct FeatureLimitsOverride {
    council_participant_limit: Option<u32>,
    max_response_length: Option<u32>,
    memory_summarization_enabled: Option<bool>,
}

impl FeatureLimitsOverride {
    fn merge(self, base: FeatureLimits) -> FeatureLimits {
        FeatureLimits {
            council_participant_limit: self
                .council_participant_limit
                .unwrap_or(base.council_participant_limit),
            max_response_length: self.max_response_length.unwrap_or(base.max_response_length),
            memory_summarization_enabled: self
                .memory_summarization_enabled
                .unwrap_or(base.memory_summarization_enabled),
        }
    }
}

fn normal_limits<'de, D: Deserializer<'de>>(d: D) -> Result<FeatureLimits, D::Error> {
    FeatureLimitsOverride::deserialize(d).map(|o| o.merge(FeatureLimits::NORMAL))
}

fn degraded_limits<'de, D: Deserializer<'de>>(d: D) -> Result<FeatureLimits, D::Error> {
    FeatureLimitsOverride::deserialize(d).map(|o| o.merge(FeatureLimits::DEGRADED))
}

fn critical_limits<'de, D: Deserializer<'de>>(d: D) -> Result<FeatureLimits, D::Error> {
    FeatureLimitsOverride::deserialize(d).map(|o| o.merge(FeatureLimits::CRITICAL))
}

/// Load shedding policy: signal thresholds and per-mode caps.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadPolicy {
    /// Samples older than this are discarded, in ms.
    pub sample_window_ms: u64,

    /// Hard cap on retained samples.
    pub max_samples: usize,

    /// Below this many samples no signal is considered high.
    pub min_samples: usize,

    /// Average latency above this marks AI latency as high, in ms.
    pub latency_high_ms: u64,

    /// Error ratio above this marks the error rate as high.
    pub error_rate_high: f64,

    #[serde(deserialize_with = "normal_limits")]
    pub normal: FeatureLimits,
    #[serde(deserialize_with = "degraded_limits")]
    pub degraded: FeatureLimits,
    #[serde(deserialize_with = "critical_limits")]
    pub critical: FeatureLimits,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            sample_window_ms: 60_000,
            max_samples: 1_000,
            min_samples: 5,
            latency_high_ms: 5_000,
            error_rate_high: 0.2,
            normal: FeatureLimits::NORMAL,
            degraded: FeatureLimits::DEGRADED,
            critical: FeatureLimits::CRITICAL,
        }
    }
}

/// Periodic dependency probing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Enable the background prober.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Operator endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable operator endpoints (breaker reset).
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
