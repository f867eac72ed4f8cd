//! Named breaker registry.
//!
//! One breaker per dependency, created at startup and shared through
//! application state. The registry is an ordinary value so tests can build
//! as many isolated instances as they need.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{BreakerConfig, DependencyConfig};
use crate::observability::metrics::MetricsRegistry;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
use crate::resilience::clock::Clock;

#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
}

impl BreakerRegistry {
    pub fn new(clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            breakers: DashMap::new(),
            clock,
            metrics,
        }
    }

    /// Build a registry with one breaker per configured dependency.
    pub fn from_dependencies(
        dependencies: &[DependencyConfig],
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let registry = Self::new(clock, metrics);
        for dep in dependencies {
            registry.register(&dep.name, dep.breaker);
        }
        registry
    }

    /// Return the breaker for `name`, creating it with `config` if absent.
    pub fn register(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = %name, ?config, "Registering circuit breaker");
                Arc::new(
                    CircuitBreaker::new(name, config, self.clock.clone())
                        .with_metrics(self.metrics.clone()),
                )
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.value().clone())
    }

    /// Reset one breaker. Returns false if no such breaker exists.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Apply new thresholds after a config reload. Dependencies that are new
    /// get a breaker; removed ones keep theirs until restart.
    pub fn reconfigure(&self, dependencies: &[DependencyConfig]) {
        for dep in dependencies {
            match self.get(&dep.name) {
                Some(breaker) => breaker.reconfigure(dep.breaker),
                None => {
                    self.register(&dep.name, dep.breaker);
                }
            }
        }
    }

    /// Current state of every breaker, keyed by name.
    pub fn states(&self) -> BTreeMap<String, CircuitState> {
        self.all()
            .into_iter()
            .map(|b| (b.name().to_string(), b.state()))
            .collect()
    }

    /// Full snapshots sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snaps: Vec<_> = self.all().iter().map(|b| b.snapshot()).collect();
        snaps.sort_by(|a, b| a.name.cmp(&b.name));
        snaps
    }

    pub fn any_open(&self) -> bool {
        self.all().iter().any(|b| b.state() == CircuitState::Open)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    // Clone the Arcs out first so no shard lock is held while breakers
    // take their own locks.
    fn all(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers.iter().map(|e| e.value().clone()).collect()
    }
}
