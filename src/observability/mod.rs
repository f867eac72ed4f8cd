//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, timers)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → /api/system/status (JSON snapshot)
//!     → Prometheus scrape (optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every HTTP span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsRegistry, MetricsSnapshot};
