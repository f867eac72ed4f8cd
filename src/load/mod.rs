//! Load shedding subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded upstream calls / dependency probes
//!     → monitor.rs (record latency + outcome)
//!
//! Feature code and the status endpoint
//!     → monitor.rs get_status() (mode + caps, computed on read)
//! ```

pub mod monitor;

pub use monitor::{LoadMode, LoadMonitor, LoadStatus, Outcome};
