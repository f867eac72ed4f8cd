//! Shared guard state.
//!
//! Everything the status service and feature code share lives in one
//! explicitly constructed [`GuardContext`], handed around as an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::{AdminConfig, GuardConfig};
use crate::load::LoadMonitor;
use crate::observability::metrics::MetricsRegistry;
use crate::resilience::{BreakerRegistry, Clock, MonotonicClock};
use crate::upstream::{GuardedUpstream, UpstreamError};

#[derive(Debug)]
pub struct GuardContext {
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<MetricsRegistry>,
    pub breakers: Arc<BreakerRegistry>,
    pub monitor: Arc<LoadMonitor>,
    pub upstreams: BTreeMap<String, Arc<GuardedUpstream>>,
    admin: ArcSwap<AdminConfig>,
}

impl GuardContext {
    pub fn new(config: &GuardConfig) -> Result<Self, UpstreamError> {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: &GuardConfig, clock: Arc<dyn Clock>) -> Result<Self, UpstreamError> {
        Self::build(config, clock, reqwest::Client::new())
    }

    /// Full constructor; `client` is shared by every upstream.
    pub fn build(
        config: &GuardConfig,
        clock: Arc<dyn Clock>,
        client: reqwest::Client,
    ) -> Result<Self, UpstreamError> {
        let metrics = Arc::new(MetricsRegistry::new());
        let breakers = Arc::new(BreakerRegistry::from_dependencies(
            &config.dependencies,
            clock.clone(),
            metrics.clone(),
        ));
        let monitor = Arc::new(LoadMonitor::new(config.load.clone(), clock.clone()));

        let mut upstreams = BTreeMap::new();
        for dep in &config.dependencies {
            let upstream = GuardedUpstream::new(
                dep,
                client.clone(),
                breakers.register(&dep.name, dep.breaker),
                monitor.clone(),
                metrics.clone(),
            )?;
            upstreams.insert(dep.name.clone(), Arc::new(upstream));
        }

        Ok(Self {
            clock,
            metrics,
            breakers,
            monitor,
            upstreams,
            admin: ArcSwap::from_pointee(config.admin.clone()),
        })
    }

    pub fn upstream(&self, name: &str) -> Option<Arc<GuardedUpstream>> {
        self.upstreams.get(name).cloned()
    }

    pub fn admin(&self) -> Arc<AdminConfig> {
        self.admin.load_full()
    }

    /// Apply a reloaded config: new load policy, breaker thresholds and
    /// admin settings. Upstream URLs and timeouts need a restart.
    pub fn apply(&self, config: &GuardConfig) {
        self.monitor.set_policy(config.load.clone());
        self.breakers.reconfigure(&config.dependencies);
        self.admin.store(Arc::new(config.admin.clone()));
        self.metrics.increment("config.reloads");
        tracing::info!(dependencies = config.dependencies.len(), "Configuration applied");
    }
}
