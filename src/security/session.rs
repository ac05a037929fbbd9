//! Session lifecycle management.
//!
//! Sessions are created for identities the external provider has already
//! authenticated; this module only manages their lifetime. One session id
//! maps to exactly one user, each user holds at most a configured number of
//! live sessions, and the least-recently-active session is evicted when a
//! new one would overflow the cap. Expiry (idle and absolute) is evaluated
//! on every validation; the background sweep catches sessions nobody
//! validates anymore.

use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::schema::SessionConfig;
use crate::observability::metrics;
use crate::security::store::{MemoryStore, RecordStore};
use crate::security::unix_millis;

/// Network/device facts observed when the session was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub address: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<String>,
}

/// One live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub roles: Vec<String>,
    /// Creation time, milliseconds since epoch.
    pub login_at: u64,
    /// Slides forward on every successful validate/refresh.
    pub last_activity: u64,
    pub metadata: SessionMetadata,
}

/// Tagged validation outcome; routine failures are values, not errors.
#[derive(Debug, Clone)]
pub enum SessionCheck {
    Valid(Session),
    Invalid { reason: String },
}

impl SessionCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionCheck::Valid(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SessionCheck::Valid(_) => None,
            SessionCheck::Invalid { reason } => Some(reason),
        }
    }
}

/// Draw a 256-bit session identifier from the OS entropy source.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Process-local session store with a per-user index for eviction and bulk
/// revocation.
pub struct SessionManager {
    sessions: MemoryStore<String, Session>,
    by_user: DashMap<String, Vec<String>>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: MemoryStore::new(),
            by_user: DashMap::new(),
            config,
        }
    }

    /// Create a session for an already-authenticated identity, evicting the
    /// user's least-recently-active session if the cap would be exceeded.
    pub fn create_session(
        &self,
        user_id: &str,
        roles: Vec<String>,
        metadata: SessionMetadata,
    ) -> String {
        self.create_session_at(user_id, roles, metadata, unix_millis())
    }

    pub fn create_session_at(
        &self,
        user_id: &str,
        roles: Vec<String>,
        metadata: SessionMetadata,
        now: u64,
    ) -> String {
        // Snapshot the user's session ids first; holding the index entry
        // while touching the session map invites lock inversion.
        let existing: Vec<String> = self
            .by_user
            .get(user_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        if existing.len() >= self.config.max_concurrent_sessions {
            if let Some(oldest) = existing
                .iter()
                .filter_map(|id| self.sessions.get(id))
                .min_by_key(|s| s.last_activity)
            {
                tracing::info!(
                    user_id,
                    evicted = %oldest.id,
                    "concurrent session cap reached, evicting least-recently-active"
                );
                metrics::record_session_closed("evicted");
                self.destroy_session(&oldest.id);
            }
        }

        let id = generate_session_id();
        let session = Session {
            id: id.clone(),
            user_id: user_id.to_string(),
            roles,
            login_at: now,
            last_activity: now,
            metadata,
        };
        self.sessions.set(id.clone(), session);
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .push(id.clone());
        id
    }

    /// Validate a session and slide its activity window forward.
    ///
    /// Presented metadata that differs from what was recorded at creation is
    /// logged as a non-fatal signal only; legitimate clients change networks.
    pub fn validate_session(
        &self,
        session_id: &str,
        metadata: Option<&SessionMetadata>,
    ) -> SessionCheck {
        self.validate_session_at(session_id, metadata, unix_millis())
    }

    pub fn validate_session_at(
        &self,
        session_id: &str,
        metadata: Option<&SessionMetadata>,
        now: u64,
    ) -> SessionCheck {
        let Some(session) = self.sessions.get(&session_id.to_string()) else {
            return SessionCheck::Invalid {
                reason: "session not found".to_string(),
            };
        };

        if let Some(reason) = self.expiry_reason(&session, now) {
            self.destroy_session(session_id);
            metrics::record_session_closed("expired");
            return SessionCheck::Invalid { reason };
        }

        if let Some(presented) = metadata {
            if presented.address != session.metadata.address {
                tracing::warn!(
                    session_id,
                    user_id = %session.user_id,
                    recorded = ?session.metadata.address,
                    presented = ?presented.address,
                    "session metadata drift observed"
                );
            }
        }

        // update-only write-back: a destroy or sweep may have removed the
        // entry since the read above, and it must stay removed
        let refreshed = self.sessions.update(&session_id.to_string(), |s| {
            s.last_activity = now;
            s.clone()
        });
        match refreshed {
            Some(session) => SessionCheck::Valid(session),
            None => SessionCheck::Invalid {
                reason: "session not found".to_string(),
            },
        }
    }

    /// Slide the activity window without returning the session. False once
    /// the session is missing or expired.
    pub fn refresh_session(&self, session_id: &str) -> bool {
        self.refresh_session_at(session_id, unix_millis())
    }

    pub fn refresh_session_at(&self, session_id: &str, now: u64) -> bool {
        self.validate_session_at(session_id, None, now).is_valid()
    }

    /// Destroy one session. Idempotent: true only for the call that removed
    /// it.
    pub fn destroy_session(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions.get(&session_id.to_string()) else {
            return false;
        };
        let removed = self.sessions.delete(&session_id.to_string());
        if removed {
            if let Some(mut ids) = self.by_user.get_mut(&session.user_id) {
                ids.retain(|id| id != session_id);
            }
            self.by_user
                .remove_if(&session.user_id, |_, ids| ids.is_empty());
        }
        removed
    }

    /// Revoke every session the user holds. Idempotent; returns the number
    /// destroyed.
    pub fn destroy_user_sessions(&self, user_id: &str) -> usize {
        let ids = match self.by_user.remove(user_id) {
            Some((_, ids)) => ids,
            None => return 0,
        };
        let mut destroyed = 0;
        for id in ids {
            if self.sessions.delete(&id) {
                destroyed += 1;
            }
        }
        tracing::info!(user_id, destroyed, "bulk session revocation");
        destroyed
    }

    /// Destroy every session past idle or absolute expiry. Returns the count.
    pub fn sweep_at(&self, now: u64) -> usize {
        let mut expired: Vec<String> = Vec::new();
        self.sessions.sweep(|id, session| {
            if self.expiry_reason(session, now).is_some() {
                expired.push(id.clone());
            }
            // removal goes through destroy_session to keep the index straight
            true
        });

        let mut swept = 0;
        for id in &expired {
            if self.destroy_session(id) {
                metrics::record_session_closed("expired");
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::debug!(swept, "session sweep complete");
        }
        swept
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn expiry_reason(&self, session: &Session, now: u64) -> Option<String> {
        if now.saturating_sub(session.last_activity) > self.config.max_idle_ms {
            return Some("session expired due to inactivity".to_string());
        }
        if now.saturating_sub(session.login_at) > self.config.max_session_ms {
            return Some("session exceeded maximum lifetime".to_string());
        }
        None
    }
}
