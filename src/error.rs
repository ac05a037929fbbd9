//! Error surface for outbound dispatch.

use std::time::Duration;

use thiserror::Error;

/// Errors a dispatch can fail with. Each variant maps to one defense
/// layer, so callers can match on the layer that stopped the call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The target is over its rate budget or its source is blocked.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// How long the caller should wait, when the limiter knows.
        retry_after: Option<Duration>,
        reason: String,
    },

    /// The payload failed the threat scan.
    #[error("security rejection: {reason}")]
    SecurityRejected {
        reason: String,
        /// One entry per offending field, prefixed with its payload path.
        issues: Vec<String>,
    },

    /// The call was bound to a session that is missing or expired.
    #[error("invalid session: {reason}")]
    SessionInvalid { reason: String },

    /// The HTTP transport failed after all gates passed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
