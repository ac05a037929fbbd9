//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Every tunable the defense layer uses lives here; the modules themselves
//! carry no hard-coded limits.

use serde::{Deserialize, Serialize};

/// Root configuration for the abuse-prevention gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Rate limiting: per-class budgets and attack detection thresholds.
    pub rate_limit: RateLimitConfig,

    /// Session lifecycle limits.
    pub session: SessionConfig,

    /// Threat pattern scanner settings.
    pub scanner: ScannerConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Background sweep schedule.
    pub sweep: SweepConfig,

    /// Bounded audit log settings.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Budget for a single operation class.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationClassConfig {
    /// Attempts allowed inside one window before the key blocks.
    pub max_attempts: u32,

    /// Sliding window length in milliseconds, anchored at the first attempt.
    pub window_ms: u64,

    /// How long a blocked key (or source) stays blocked, in milliseconds.
    pub block_ms: u64,

    /// Suggest exponentially growing waits once past half the budget.
    pub progressive_delay: bool,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Authentication attempts: tight budget, long block.
    pub login: OperationClassConfig,

    /// General API traffic.
    pub api: OperationClassConfig,

    /// Sensitive operations (bid award, contract signing).
    pub sensitive: OperationClassConfig,

    /// Per-source attack-pattern detection thresholds.
    pub detection: AttackDetectionConfig,

    /// Idle records and source histories older than this are swept,
    /// in milliseconds.
    pub retention_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login: OperationClassConfig {
                max_attempts: 5,
                window_ms: 15 * 60 * 1000,
                block_ms: 30 * 60 * 1000,
                progressive_delay: true,
            },
            api: OperationClassConfig {
                max_attempts: 100,
                window_ms: 60 * 1000,
                block_ms: 5 * 60 * 1000,
                progressive_delay: false,
            },
            sensitive: OperationClassConfig {
                max_attempts: 3,
                window_ms: 60 * 1000,
                block_ms: 60 * 60 * 1000,
                progressive_delay: true,
            },
            detection: AttackDetectionConfig::default(),
            retention_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// Attack-pattern detection thresholds.
///
/// These are heuristics rather than validated contract values, which is why
/// they are configuration and not constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AttackDetectionConfig {
    /// How many recent attempt timestamps to keep per source.
    pub history_len: usize,

    /// More than this many attempts inside `burst_window_ms` marks the
    /// source suspicious.
    pub burst_threshold: usize,

    /// Trailing window for burst detection, in milliseconds.
    pub burst_window_ms: u64,

    /// Two consecutive attempts closer than this look automated,
    /// in milliseconds.
    pub min_attempt_gap_ms: u64,
}

impl Default for AttackDetectionConfig {
    fn default() -> Self {
        Self {
            history_len: 20,
            burst_threshold: 10,
            burst_window_ms: 60 * 1000,
            min_attempt_gap_ms: 100,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Live sessions allowed per user; the least-recently-active session is
    /// evicted on overflow.
    pub max_concurrent_sessions: usize,

    /// Idle expiry: sessions with no activity for this long are destroyed,
    /// in milliseconds.
    pub max_idle_ms: u64,

    /// Absolute expiry measured from login, in milliseconds.
    pub max_session_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 3,
            max_idle_ms: 30 * 60 * 1000,
            max_session_ms: 8 * 60 * 60 * 1000,
        }
    }
}

/// Threat scanner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Query inputs longer than this are flagged at least medium risk.
    pub max_query_len: usize,

    /// Sanitized output is truncated to this many characters.
    pub max_sanitized_len: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_query_len: 1000,
            max_sanitized_len: 1000,
        }
    }
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Token lifetime in milliseconds; a fresh token is issued once expired.
    pub token_lifetime_ms: u64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_lifetime_ms: 60 * 60 * 1000,
        }
    }
}

/// Background sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Interval between sweeps of rate-limit records and sessions.
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Most recent entries retained; oldest dropped first.
    pub capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_canonical_class_table() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.rate_limit.login.max_attempts, 5);
        assert_eq!(cfg.rate_limit.login.window_ms, 900_000);
        assert_eq!(cfg.rate_limit.login.block_ms, 1_800_000);
        assert!(cfg.rate_limit.login.progressive_delay);

        assert_eq!(cfg.rate_limit.api.max_attempts, 100);
        assert!(!cfg.rate_limit.api.progressive_delay);

        assert_eq!(cfg.rate_limit.sensitive.max_attempts, 3);
        assert_eq!(cfg.rate_limit.sensitive.block_ms, 3_600_000);
    }

    #[test]
    fn partial_toml_overrides_one_section_only() {
        let cfg: GatewayConfig = toml::from_str(
            r#"
            [session]
            max_concurrent_sessions = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.session.max_concurrent_sessions, 5);
        // untouched sections keep their defaults
        assert_eq!(cfg.session.max_idle_ms, 1_800_000);
        assert_eq!(cfg.rate_limit.detection.burst_threshold, 10);
        assert_eq!(cfg.audit.capacity, 100);
    }
}
