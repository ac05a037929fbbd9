//! Sliding-window rate limiting with attack-pattern detection.
//!
//! Two independent layers share this module:
//! - per-key counting: each `(identity, operation class)` key gets a
//!   sliding-window budget and a hard block once the budget is exceeded;
//! - per-source profiling: every attempt from a source identity lands in a
//!   bounded timestamp ring; bursty or machine-speed patterns mark the source
//!   suspicious, and a key block from a suspicious source escalates to a
//!   source-wide block overriding all of that source's keys.
//!
//! `attempt` never errors; it always returns a decision tuple. Callers
//! translate `allowed == false` into a retryable rejection.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::schema::{OperationClassConfig, RateLimitConfig};
use crate::observability::metrics;
use crate::security::store::{MemoryStore, RecordStore};
use crate::security::unix_millis;

/// Operation classes with distinct budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Login,
    Api,
    Sensitive,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Login => "login",
            OperationClass::Api => "api",
            OperationClass::Sensitive => "sensitive",
        }
    }
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Attempts left in the current window; 0 when blocked.
    pub remaining: u32,
    /// Advisory wait. Set on a block, and on an allowed call once the
    /// progressive-delay threshold is crossed.
    pub retry_after: Option<Duration>,
    /// Populated only for denials.
    pub reason: Option<String>,
}

impl RateLimitDecision {
    fn blocked(wait_ms: u64, reason: &str) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after: Some(Duration::from_millis(wait_ms)),
            reason: Some(reason.to_string()),
        }
    }
}

/// Per-key counter state.
#[derive(Debug, Clone)]
struct RateLimitRecord {
    count: u32,
    window_start: u64,
    blocked: bool,
    blocked_at: u64,
    last_seen: u64,
}

impl RateLimitRecord {
    fn new(now: u64) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked: false,
            blocked_at: 0,
            last_seen: now,
        }
    }
}

/// Per-source attempt history.
#[derive(Debug, Clone)]
struct AttackProfile {
    attempts: VecDeque<u64>,
    suspicious: bool,
    blocked_until: u64,
    last_seen: u64,
}

impl AttackProfile {
    fn new(now: u64) -> Self {
        Self {
            attempts: VecDeque::new(),
            suspicious: false,
            blocked_until: 0,
            last_seen: now,
        }
    }
}

enum KeyOutcome {
    Allowed { count: u32 },
    Blocked { newly: bool, wait_ms: u64 },
}

/// Process-local rate limiter. One instance per process, shared by reference;
/// state never leaves this instance.
pub struct RateLimiter {
    records: MemoryStore<String, RateLimitRecord>,
    profiles: MemoryStore<String, AttackProfile>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            records: MemoryStore::new(),
            profiles: MemoryStore::new(),
            config,
        }
    }

    fn class_config(&self, class: OperationClass) -> &OperationClassConfig {
        match class {
            OperationClass::Login => &self.config.login,
            OperationClass::Api => &self.config.api,
            OperationClass::Sensitive => &self.config.sensitive,
        }
    }

    /// Check and count one attempt.
    ///
    /// `source` is a caller-supplied identity (a server embedding should pass
    /// a connection-derived address, never client-reported input).
    pub fn attempt(
        &self,
        key: &str,
        class: OperationClass,
        source: Option<&str>,
    ) -> RateLimitDecision {
        self.attempt_at(key, class, source, unix_millis())
    }

    /// `attempt` with an explicit timestamp, for deterministic tests and the
    /// sweeper.
    pub fn attempt_at(
        &self,
        key: &str,
        class: OperationClass,
        source: Option<&str>,
        now: u64,
    ) -> RateLimitDecision {
        let cfg = self.class_config(class).clone();

        // A source-wide block overrides every key from that source.
        if let Some(src) = source {
            if let Some(until) = self.source_blocked_until(src, now) {
                metrics::record_rate_limited("source_block");
                return RateLimitDecision::blocked(until - now, "source identity blocked");
            }
        }

        // Profile the attempt regardless of the per-key outcome.
        let suspicious = match source {
            Some(src) => self.observe_source(src, now),
            None => false,
        };

        let stored_key = format!("{}:{}", class.as_str(), key);
        let outcome = self.records.update_or_insert(
            stored_key,
            || RateLimitRecord::new(now),
            |rec| Self::advance(rec, &cfg, now),
        );

        match outcome {
            KeyOutcome::Blocked { newly, wait_ms } => {
                if newly {
                    tracing::warn!(
                        key,
                        class = class.as_str(),
                        source,
                        "attempt budget exceeded, key blocked"
                    );
                    metrics::record_rate_limited(class.as_str());
                    if suspicious {
                        if let Some(src) = source {
                            self.block_source(src, now + cfg.block_ms);
                        }
                    }
                }
                RateLimitDecision::blocked(wait_ms, "too many attempts")
            }
            KeyOutcome::Allowed { count } => {
                let half = cfg.max_attempts / 2;
                let retry_after = if cfg.progressive_delay && count > half {
                    let exponent = (count - half).min(32);
                    Some(Duration::from_millis(1000u64.saturating_mul(
                        1u64 << exponent,
                    )))
                } else {
                    None
                };
                RateLimitDecision {
                    allowed: true,
                    remaining: cfg.max_attempts.saturating_sub(count),
                    retry_after,
                    reason: None,
                }
            }
        }
    }

    /// State machine for one key: blocked → (block served) → fresh window;
    /// expired window → count resets to 1; otherwise count increments; over
    /// budget → blocked.
    fn advance(rec: &mut RateLimitRecord, cfg: &OperationClassConfig, now: u64) -> KeyOutcome {
        rec.last_seen = now;

        if rec.blocked {
            let elapsed = now.saturating_sub(rec.blocked_at);
            if elapsed < cfg.block_ms {
                return KeyOutcome::Blocked {
                    newly: false,
                    wait_ms: cfg.block_ms - elapsed,
                };
            }
            rec.blocked = false;
            rec.count = 0;
            rec.window_start = now;
        }

        // Sliding restart anchored at the first attempt, not a clock boundary.
        if now.saturating_sub(rec.window_start) > cfg.window_ms {
            rec.count = 1;
            rec.window_start = now;
        } else {
            rec.count += 1;
        }

        if rec.count > cfg.max_attempts {
            rec.blocked = true;
            rec.blocked_at = now;
            KeyOutcome::Blocked {
                newly: true,
                wait_ms: cfg.block_ms,
            }
        } else {
            KeyOutcome::Allowed { count: rec.count }
        }
    }

    /// Push the attempt into the source ring and re-evaluate suspicion.
    /// The flag is sticky until the profile is swept.
    fn observe_source(&self, src: &str, now: u64) -> bool {
        let det = self.config.detection.clone();
        self.profiles.update_or_insert(
            src.to_string(),
            || AttackProfile::new(now),
            |p| {
                p.last_seen = now;
                let prev = p.attempts.back().copied();
                p.attempts.push_back(now);
                while p.attempts.len() > det.history_len {
                    p.attempts.pop_front();
                }

                if !p.suspicious {
                    let in_window = p
                        .attempts
                        .iter()
                        .filter(|&&t| now.saturating_sub(t) < det.burst_window_ms)
                        .count();
                    if in_window > det.burst_threshold {
                        p.suspicious = true;
                        tracing::warn!(source = src, attempts = in_window, "burst pattern, source marked suspicious");
                    } else if let Some(prev) = prev {
                        if now.saturating_sub(prev) < det.min_attempt_gap_ms {
                            p.suspicious = true;
                            tracing::warn!(source = src, gap_ms = now.saturating_sub(prev), "machine-speed attempts, source marked suspicious");
                        }
                    }
                }
                p.suspicious
            },
        )
    }

    fn source_blocked_until(&self, src: &str, now: u64) -> Option<u64> {
        self.profiles
            .get(&src.to_string())
            .filter(|p| p.blocked_until > now)
            .map(|p| p.blocked_until)
    }

    fn block_source(&self, src: &str, until: u64) {
        tracing::warn!(source = src, until, "suspicious source blocked across all keys");
        metrics::record_source_blocked();
        self.profiles.update_or_insert(
            src.to_string(),
            || AttackProfile::new(until),
            |p| p.blocked_until = until,
        );
    }

    /// Purge records and source histories idle past retention, and clear
    /// expired source blocks. Returns (records removed, profiles removed).
    pub fn sweep_at(&self, now: u64) -> (usize, usize) {
        let retention = self.config.retention_ms;

        let records_before = self.records.len();
        self.records
            .sweep(|_, r| now.saturating_sub(r.last_seen) <= retention);

        let profiles_before = self.profiles.len();
        self.profiles.sweep(|_, p| {
            if p.blocked_until != 0 && p.blocked_until <= now {
                p.blocked_until = 0;
            }
            now.saturating_sub(p.last_seen) <= retention
        });

        let removed = (
            records_before - self.records.len(),
            profiles_before - self.profiles.len(),
        );
        tracing::debug!(
            records_removed = removed.0,
            profiles_removed = removed.1,
            "rate limiter sweep complete"
        );
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RateLimitConfig;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn sensitive_budget_counts_down_then_blocks() {
        let rl = limiter();
        let t0 = 1_000_000;

        for expected_remaining in [2, 1, 0] {
            let d = rl.attempt_at("award:alice", OperationClass::Sensitive, None, t0);
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let d = rl.attempt_at("award:alice", OperationClass::Sensitive, None, t0 + 10);
        assert!(!d.allowed);
        assert_eq!(d.retry_after, Some(Duration::from_millis(3_600_000)));
    }

    #[test]
    fn window_restarts_relative_to_first_attempt() {
        let rl = limiter();
        let t0 = 1_000_000;

        rl.attempt_at("q", OperationClass::Sensitive, None, t0);
        rl.attempt_at("q", OperationClass::Sensitive, None, t0 + 100);

        // past the 60s window: count resets to 1, not cumulative
        let d = rl.attempt_at("q", OperationClass::Sensitive, None, t0 + 60_001);
        assert!(d.allowed);
        assert_eq!(d.remaining, 2);
    }

    #[test]
    fn progressive_delay_grows_while_still_allowed() {
        let rl = limiter();
        let t0 = 5_000;

        // sensitive: max 3, half 1
        let d1 = rl.attempt_at("s", OperationClass::Sensitive, None, t0);
        assert_eq!(d1.retry_after, None);
        let d2 = rl.attempt_at("s", OperationClass::Sensitive, None, t0 + 1);
        assert!(d2.allowed);
        assert_eq!(d2.retry_after, Some(Duration::from_millis(2_000)));
        let d3 = rl.attempt_at("s", OperationClass::Sensitive, None, t0 + 2);
        assert!(d3.allowed);
        assert_eq!(d3.retry_after, Some(Duration::from_millis(4_000)));
    }

    #[test]
    fn api_class_has_no_progressive_delay() {
        let rl = limiter();
        let t0 = 5_000;
        for i in 0..80 {
            let d = rl.attempt_at("list", OperationClass::Api, None, t0 + i);
            assert!(d.allowed);
            assert_eq!(d.retry_after, None);
        }
    }

    #[test]
    fn blocked_key_serves_its_block_then_resets() {
        let rl = limiter();
        let t0 = 1_000_000;
        for i in 0..4 {
            rl.attempt_at("b", OperationClass::Sensitive, None, t0 + i);
        }

        // mid-block: denied, retry_after shrinks
        let d = rl.attempt_at("b", OperationClass::Sensitive, None, t0 + 1_800_003);
        assert!(!d.allowed);
        assert!(d.retry_after.unwrap() < Duration::from_millis(3_600_000));

        // block duration served: fresh window
        let d = rl.attempt_at("b", OperationClass::Sensitive, None, t0 + 3_600_004);
        assert!(d.allowed);
        assert_eq!(d.remaining, 2);
    }

    #[test]
    fn burst_marks_source_and_block_escalates_sourcewide() {
        let rl = limiter();
        let t0 = 10_000_000;

        // 11 attempts inside 60s against one key: source turns suspicious
        // (gaps of 1s keep the machine-speed heuristic out of the picture)
        for i in 0..11u64 {
            rl.attempt_at("probe", OperationClass::Api, Some("10.0.0.9"), t0 + i * 1_000);
        }

        // drive a second key to its block from the same source
        for i in 0..4u64 {
            rl.attempt_at("award:x", OperationClass::Sensitive, Some("10.0.0.9"), t0 + 20_000 + i);
        }

        // an unrelated key from the same source is now also blocked
        let d = rl.attempt_at("fresh-key", OperationClass::Api, Some("10.0.0.9"), t0 + 20_010);
        assert!(!d.allowed);
        assert_eq!(d.reason.as_deref(), Some("source identity blocked"));

        // a different source is unaffected
        let d = rl.attempt_at("fresh-key", OperationClass::Api, Some("10.0.0.7"), t0 + 20_011);
        assert!(d.allowed);
    }

    #[test]
    fn machine_speed_gap_marks_source_suspicious() {
        let rl = limiter();
        let t0 = 2_000_000;

        rl.attempt_at("k", OperationClass::Login, Some("src"), t0);
        rl.attempt_at("k", OperationClass::Login, Some("src"), t0 + 50);

        // exceed the login budget; the suspicious source escalates
        for i in 0..5u64 {
            rl.attempt_at("k", OperationClass::Login, Some("src"), t0 + 1_000 + i * 200);
        }
        let d = rl.attempt_at("other", OperationClass::Api, Some("src"), t0 + 3_000);
        assert!(!d.allowed);
    }

    #[test]
    fn unblocked_key_from_clean_source_never_escalates() {
        let rl = limiter();
        let t0 = 3_000_000;

        // block a key with well-spaced attempts from a calm source
        for i in 0..4u64 {
            rl.attempt_at("k", OperationClass::Sensitive, Some("calm"), t0 + i * 10_000);
        }
        // same source, other keys still fine
        let d = rl.attempt_at("elsewhere", OperationClass::Api, Some("calm"), t0 + 50_000);
        assert!(d.allowed);
    }

    #[test]
    fn sweep_purges_idle_state_and_expired_source_blocks() {
        let rl = limiter();
        let t0 = 1_000_000;
        rl.attempt_at("old", OperationClass::Api, Some("src"), t0);

        let day = 24 * 60 * 60 * 1000;
        let (records, profiles) = rl.sweep_at(t0 + day + 1);
        assert_eq!(records, 1);
        assert_eq!(profiles, 1);

        // swept state means a fresh budget
        let d = rl.attempt_at("old", OperationClass::Api, Some("src"), t0 + day + 2);
        assert_eq!(d.remaining, 99);
    }
}
