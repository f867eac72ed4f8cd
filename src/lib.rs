//! In-process self-regulation for an AI companion backend.
//!
//! Per-dependency circuit breakers, a load monitor that sheds feature
//! richness under pressure, a metrics registry, and the status API that
//! exposes all three.

pub mod admin;
pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod load;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::GuardConfig;
pub use context::GuardContext;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
