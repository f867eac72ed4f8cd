//! Startup orchestration.
//!
//! # Order
//! - Build shared context from the validated config
//! - Install the Prometheus exporter
//! - Start background tasks (signals, prober, config watcher)
//! - Bind the listener last, so traffic only arrives when ready
//!
//! Any startup error is fatal.

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use crate::config::watcher::ConfigWatcher;
use crate::config::GuardConfig;
use crate::context::GuardContext;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::metrics::init_metrics;
use crate::upstream::{DependencyProber, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to build upstream clients: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("failed to install Prometheus exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the service until a shutdown signal arrives.
pub async fn run(config: GuardConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    let ctx = Arc::new(GuardContext::new(&config)?);

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    if config.probe.enabled {
        let prober = DependencyProber::new(
            ctx.upstreams.values().cloned(),
            Duration::from_secs(config.probe.interval_secs),
        );
        tokio::spawn(prober.run(shutdown.subscribe()));
    }

    // Dropping the watcher handle stops it, so keep it until shutdown.
    let _watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            let handle = watcher.run()?;
            tokio::spawn(apply_updates(ctx.clone(), updates, shutdown.subscribe()));
            Some(handle)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(ctx, &config.server);
    let result = server.run(listener, shutdown.subscribe()).await;

    shutdown.trigger();
    result.map_err(StartupError::from)
}

/// Apply reloaded configs until shutdown.
pub async fn apply_updates(
    ctx: Arc<GuardContext>,
    mut updates: mpsc::UnboundedReceiver<GuardConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => ctx.apply(&config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config update loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ManualClock;

    #[tokio::test]
    async fn test_bad_metrics_address_is_fatal() {
        let mut config = GuardConfig::default();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "not-an-address".into();

        let err = run(config, None).await.unwrap_err();
        assert!(matches!(err, StartupError::MetricsAddress(_)));
    }

    #[tokio::test]
    async fn test_apply_updates_until_shutdown() {
        let ctx = Arc::new(
            GuardContext::with_clock(&GuardConfig::default(), Arc::new(ManualClock::new())).unwrap(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(apply_updates(ctx.clone(), rx, shutdown.subscribe()));

        let mut config = GuardConfig::default();
        config.load.min_samples = 42;
        tx.send(config).unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while ctx.monitor.policy().min_samples != 42 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        shutdown.trigger();
        task.await.unwrap();
    }
}
