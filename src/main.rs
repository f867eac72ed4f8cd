//! companion-guard service.
//!
//! # Architecture Overview
//!
//! ```text
//!   feature code ──▶ upstream (GuardedUpstream) ──▶ groq / gateway / supabase
//!                        │            │
//!                        ▼            ▼
//!                 resilience      load monitor ──▶ mode + feature caps
//!               (breakers)            │
//!                        │            │
//!                        ▼            ▼
//!                    observability (metrics registry, tracing)
//!                                 │
//!                                 ▼
//!                    GET /api/system/status
//! ```

use std::path::PathBuf;

use clap::Parser;

use companion_guard::config::{load_config, GuardConfig};
use companion_guard::lifecycle::startup;
use companion_guard::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "companion-guard")]
#[command(about = "Circuit breakers, load shedding and status API for the companion backend")]
struct Args {
    /// TOML config file; defaults are used when omitted.
    #[arg(short, long, env = "GUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address,
        dependencies = config.dependencies.len(),
        "companion-guard starting"
    );

    startup::run(config, args.config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
