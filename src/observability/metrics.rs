//! Metrics collection.
//!
//! Counter helpers named after gateway decisions. The `metrics` facade is a
//! no-op until the embedding application installs a recorder, so these calls
//! are always cheap and never fail.

use metrics::counter;

/// A key or source hit its rate budget. `reason` is the operation class or
/// `"source_block"`.
pub fn record_rate_limited(reason: &'static str) {
    counter!("gateway_rate_limited_total", "reason" => reason).increment(1);
}

/// A suspicious source was blocked across all of its keys.
pub fn record_source_blocked() {
    counter!("gateway_source_blocked_total").increment(1);
}

/// The scanner rejected a payload field at the given risk level.
pub fn record_threat(risk: &'static str) {
    counter!("gateway_threats_total", "risk" => risk).increment(1);
}

/// A session ended for a non-logout reason: `"expired"` or `"evicted"`.
pub fn record_session_closed(cause: &'static str) {
    counter!("gateway_sessions_closed_total", "cause" => cause).increment(1);
}

/// An outbound dispatch completed: `"ok"`, `"error_status"` or `"transport"`.
pub fn record_dispatch(outcome: &'static str) {
    counter!("gateway_dispatch_total", "outcome" => outcome).increment(1);
}
