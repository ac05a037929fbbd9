//! Secure request gateway.
//!
//! Composes the defense layers around each outbound call:
//!
//! ```text
//! send():
//!     → rate limiter  (deny fast with retry_after)
//!     → threat scan   (every string field of the payload; fail closed)
//!     → session gate  (only when the request is bound to a session)
//!     → headers       (hardened block + bearer + anti-forgery token)
//!     → dispatch      (reqwest; the only await point)
//!     → audit         (outcome recorded; can never fail the call)
//! ```
//!
//! Services are constructed once at process start and shared by reference;
//! there are no module-level singletons, so tests get fresh instances.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::config::schema::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::audit::AuditLog;
use crate::observability::metrics;
use crate::security::csrf::AntiForgeryToken;
use crate::security::headers::hardened_headers;
use crate::security::rate_limit::{OperationClass, RateLimiter};
use crate::security::scanner::{RiskLevel, ScanContext, ThreatScanner};
use crate::security::session::SessionManager;

/// Payload for an outbound call.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Parsed JSON; every string leaf is scanned individually.
    Json(Value),
    /// Opaque body scanned as one input.
    Raw(String),
}

/// One outbound call through the gateway.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub class: OperationClass,
    /// Source identity for attack-pattern detection. A server embedding
    /// should derive this from a trusted connection property.
    pub source: Option<String>,
    /// When set, the session must validate before dispatch.
    pub session_id: Option<String>,
    /// Bearer credential bound to the hardened header block.
    pub bearer: Option<String>,
    pub body: Option<RequestBody>,
}

impl OutboundRequest {
    pub fn new(method: reqwest::Method, url: impl Into<String>, class: OperationClass) -> Self {
        Self {
            method,
            url: url.into(),
            class,
            source: None,
            session_id: None,
            bearer: None,
            body: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_json(mut self, value: Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    pub fn with_raw_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self
    }
}

/// Response surfaced to the caller after a successful dispatch.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

/// The composed secure gateway.
pub struct SecureGateway {
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionManager>,
    audit: Arc<AuditLog>,
    scanner: ThreatScanner,
    csrf: AntiForgeryToken,
    client: reqwest::Client,
}

impl SecureGateway {
    /// Compose from already-constructed services, for embeddings that also
    /// use the limiter or session manager directly.
    pub fn new(
        limiter: Arc<RateLimiter>,
        sessions: Arc<SessionManager>,
        audit: Arc<AuditLog>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            limiter,
            sessions,
            audit,
            scanner: ThreatScanner::new(config.scanner.clone()),
            csrf: AntiForgeryToken::new(config.csrf.clone()),
            client: reqwest::Client::new(),
        }
    }

    /// Construct every service from one configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            Arc::new(RateLimiter::new(config.rate_limit.clone())),
            Arc::new(SessionManager::new(config.session.clone())),
            Arc::new(AuditLog::new(config.audit.capacity)),
            config,
        )
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    pub fn audit(&self) -> Arc<AuditLog> {
        self.audit.clone()
    }

    /// The live anti-forgery token, for callers rendering forms.
    pub fn anti_forgery_token(&self) -> String {
        self.csrf.current()
    }

    /// Equality check of a submitted anti-forgery token against the live,
    /// unexpired one.
    pub fn verify_anti_forgery(&self, presented: &str) -> bool {
        self.csrf.verify(presented)
    }

    /// Dispatch one outbound call through the defense layers.
    pub async fn send(&self, request: OutboundRequest) -> GatewayResult<GatewayResponse> {
        let request_id = Uuid::new_v4().to_string();

        // 1. rate budget for the target under its operation class
        let decision = self.limiter.attempt(
            &request.url,
            request.class,
            request.source.as_deref(),
        );
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "rate limited".to_string());
            self.audit
                .record("rate_limited", &reason, "medium", &request_id);
            return Err(GatewayError::RateLimited {
                retry_after: decision.retry_after,
                reason,
            });
        }

        // 2. threat scan of the payload; fail closed before dispatch
        if let Some(body) = &request.body {
            let mut issues = Vec::new();
            for (path, value) in string_fields(body) {
                let assessment = self.scanner.validate(&value, ScanContext::UserInput);
                if assessment.risk >= RiskLevel::Medium {
                    metrics::record_threat(assessment.risk.as_str());
                    for issue in assessment.issues {
                        issues.push(format!("{path}: {issue}"));
                    }
                }
            }
            if !issues.is_empty() {
                tracing::warn!(
                    request_id,
                    url = %request.url,
                    issue_count = issues.len(),
                    "payload rejected by threat scan"
                );
                self.audit.record(
                    "payload_rejected",
                    &issues.join("; "),
                    "high",
                    &request_id,
                );
                return Err(GatewayError::SecurityRejected {
                    reason: "payload failed threat scan".to_string(),
                    issues,
                });
            }
        }

        // 3. session gate, only when the call is bound to a session
        if let Some(session_id) = &request.session_id {
            let check = self.sessions.validate_session(session_id, None);
            if let Some(reason) = check.reason() {
                self.audit
                    .record("session_rejected", reason, "medium", &request_id);
                return Err(GatewayError::SessionInvalid {
                    reason: reason.to_string(),
                });
            }
        }

        // 4. hardened header block + anti-forgery token
        let headers = hardened_headers(request.bearer.as_deref(), Some(&self.csrf.current()));

        // 5. dispatch; the transport owns timeout/cancellation
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(headers);
        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Raw(raw)) => builder.body(raw.clone()),
            None => builder,
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_dispatch("transport");
                self.audit
                    .record("dispatch_failed", &e.to_string(), "medium", &request_id);
                return Err(GatewayError::Transport(e));
            }
        };

        // 6. outcome to the sinks; neither can fail the call
        let status = response.status().as_u16();
        let outcome = if response.status().is_success() {
            "ok"
        } else {
            "error_status"
        };
        metrics::record_dispatch(outcome);
        self.audit
            .record("dispatch", &format!("{} {}", status, request.url), "low", &request_id);
        tracing::debug!(request_id, status, url = %request.url, "dispatch complete");

        let body = response.text().await.map_err(GatewayError::Transport)?;
        Ok(GatewayResponse { status, body })
    }
}

/// Flatten a payload into (path, string value) pairs for scanning.
fn string_fields(body: &RequestBody) -> Vec<(String, String)> {
    match body {
        RequestBody::Raw(raw) => vec![("body".to_string(), raw.clone())],
        RequestBody::Json(value) => {
            let mut fields = Vec::new();
            walk_strings(value, "$", &mut fields);
            fields
        }
    }
}

fn walk_strings(value: &Value, path: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(s) => out.push((path.to_string(), s.clone())),
        Value::Object(map) => {
            for (key, child) in map {
                walk_strings(child, &format!("{path}.{key}"), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk_strings(child, &format!("{path}[{i}]"), out);
            }
        }
        _ => {}
    }
}
