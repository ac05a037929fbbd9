//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (decision counters)
//!     → audit.rs (bounded ring of security events)
//! ```
//!
//! # Design Decisions
//! - The sinks never raise and never block the decision path
//! - The audit ring keeps only the most recent entries (oldest dropped)
//! - Metric updates are facade calls, free until a recorder is installed

pub mod audit;
pub mod logging;
pub mod metrics;
