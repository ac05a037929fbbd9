//! Cross-field configuration checks.

use crate::config::schema::{GatewayConfig, OperationClassConfig};

/// A single failed configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_class(field: &str, class: &OperationClassConfig, errors: &mut Vec<ValidationError>) {
    if class.max_attempts == 0 {
        errors.push(ValidationError {
            field: format!("rate_limit.{field}.max_attempts"),
            message: "must be at least 1".to_string(),
        });
    }
    if class.window_ms == 0 {
        errors.push(ValidationError {
            field: format!("rate_limit.{field}.window_ms"),
            message: "must be non-zero".to_string(),
        });
    }
    if class.block_ms == 0 {
        errors.push(ValidationError {
            field: format!("rate_limit.{field}.block_ms"),
            message: "must be non-zero".to_string(),
        });
    }
}

/// Validate a loaded configuration, collecting every failure rather than
/// stopping at the first.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_class("login", &config.rate_limit.login, &mut errors);
    check_class("api", &config.rate_limit.api, &mut errors);
    check_class("sensitive", &config.rate_limit.sensitive, &mut errors);

    let det = &config.rate_limit.detection;
    if det.history_len < 2 {
        errors.push(ValidationError {
            field: "rate_limit.detection.history_len".to_string(),
            message: "needs at least 2 timestamps to measure attempt gaps".to_string(),
        });
    }
    if det.burst_threshold > det.history_len {
        errors.push(ValidationError {
            field: "rate_limit.detection.burst_threshold".to_string(),
            message: "cannot exceed history_len; the threshold would be unreachable".to_string(),
        });
    }

    if config.session.max_concurrent_sessions == 0 {
        errors.push(ValidationError {
            field: "session.max_concurrent_sessions".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.session.max_idle_ms > config.session.max_session_ms {
        errors.push(ValidationError {
            field: "session.max_idle_ms".to_string(),
            message: "idle timeout cannot exceed the absolute session lifetime".to_string(),
        });
    }

    if config.csrf.token_lifetime_ms == 0 {
        errors.push(ValidationError {
            field: "csrf.token_lifetime_ms".to_string(),
            message: "must be non-zero".to_string(),
        });
    }
    if config.sweep.interval_secs == 0 {
        errors.push(ValidationError {
            field: "sweep.interval_secs".to_string(),
            message: "must be non-zero".to_string(),
        });
    }
    if config.audit.capacity == 0 {
        errors.push(ValidationError {
            field: "audit.capacity".to_string(),
            message: "must retain at least one entry".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let mut cfg = GatewayConfig::default();
        cfg.rate_limit.login.max_attempts = 0;
        cfg.session.max_concurrent_sessions = 0;
        cfg.sweep.interval_secs = 0;

        let errors = validate_config(&cfg).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "rate_limit.login.max_attempts"));
    }

    #[test]
    fn idle_longer_than_absolute_is_rejected() {
        let mut cfg = GatewayConfig::default();
        cfg.session.max_idle_ms = cfg.session.max_session_ms + 1;
        assert!(validate_config(&cfg).is_err());
    }
}
