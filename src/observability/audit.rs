//! Bounded security audit log.
//!
//! Retains the most recent entries only, oldest dropped first. Recording can
//! never fail or block the decision path: a poisoned lock means the entry is
//! silently dropped, which is the contract for the logging sink.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::security::unix_millis;

/// One audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub event: String,
    pub detail: String,
    /// Risk label: "low", "medium", "high".
    pub risk: String,
    /// Milliseconds since epoch.
    pub timestamp: u64,
    /// Correlation context, e.g. the request id.
    pub context: String,
}

pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an entry, dropping the oldest once over capacity.
    pub fn record(&self, event: &str, detail: &str, risk: &str, context: &str) {
        let entry = AuditEntry {
            event: event.to_string(),
            detail: detail.to_string(),
            risk: risk.to_string(),
            timestamp: unix_millis(),
            context: context.to_string(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry);
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
    }

    /// Snapshot of retained entries, oldest first.
    pub fn recent(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
