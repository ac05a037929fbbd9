//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → rate_limit.rs (per-key budget, per-source attack profile)
//!     → scanner.rs (pattern scan of every payload string)
//!     → session.rs (lifecycle check when a session is bound)
//!     → headers.rs + csrf.rs (hardened header block)
//!     → Dispatch
//! ```
//!
//! # Design Decisions
//! - Defense in depth: independent layers, each may reject alone
//! - Fail closed: a rejected payload never leaves the process
//! - Decisions are values, not exceptions: denial is routine
//! - No trust in caller-reported source identity beyond what the
//!   embedding chooses to supply

pub mod csrf;
pub mod headers;
pub mod rate_limit;
pub mod scanner;
pub mod session;
pub mod store;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
