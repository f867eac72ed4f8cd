//! Periodic dependency probing.
//!
//! # Responsibilities
//! - Periodically call each configured dependency's health path
//! - Route probes through the dependency's breaker so results feed the
//!   same failure accounting and load samples as real traffic

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::upstream::client::GuardedUpstream;

pub struct DependencyProber {
    upstreams: Vec<Arc<GuardedUpstream>>,
    interval: Duration,
}

impl DependencyProber {
    /// Only dependencies with a base URL are probed.
    pub fn new(upstreams: impl IntoIterator<Item = Arc<GuardedUpstream>>, interval: Duration) -> Self {
        Self {
            upstreams: upstreams.into_iter().filter(|u| u.is_configured()).collect(),
            interval,
        }
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.upstreams.is_empty() {
            tracing::info!("No dependency has a base_url, prober idle");
            return;
        }

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            dependencies = self.upstreams.len(),
            "Dependency prober starting"
        );

        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Dependency prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub async fn probe_all(&self) {
        for upstream in &self.upstreams {
            match upstream.probe().await {
                Ok(()) => tracing::debug!(dependency = %upstream.name(), "Probe succeeded"),
                Err(e) if e.is_circuit_open() => {
                    tracing::debug!(dependency = %upstream.name(), "Probe skipped, circuit open")
                }
                Err(e) => tracing::warn!(dependency = %upstream.name(), error = %e, "Probe failed"),
            }
        }
    }
}
