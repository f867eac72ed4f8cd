//! Outbound dependency calls.
//!
//! # Data Flow
//! ```text
//! Feature code / prober
//!     → client.rs (breaker gate, timeout, send)
//!     → load monitor sample + metrics
//!     → Ok(response) | UpstreamError (CircuitOpen → caller degrades)
//! ```

pub mod client;
pub mod prober;

pub use client::{GuardedUpstream, UpstreamError};
pub use prober::DependencyProber;
