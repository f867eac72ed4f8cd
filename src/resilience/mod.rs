//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call to a dependency:
//!     → registry.rs (look up the dependency's breaker)
//!     → circuit_breaker.rs (fail fast if open, otherwise run and record)
//!     → caller decides fallback on BreakerError::Open
//! ```
//!
//! # Design Decisions
//! - Breakers never retry; retry policy lives above them
//! - Time comes from clock.rs so transitions are testable
//! - Registry is injected, never a global

pub mod circuit_breaker;
pub mod clock;
pub mod registry;

pub use circuit_breaker::{BreakerError, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use registry::BreakerRegistry;
