//! Audit sink over the shared store
//!
//! Events append to a store-backed list, newest first. Writes are
//! best-effort relative to the response path: a failure is logged and
//! absorbed, never surfaced to the client. The read side returns the most
//! recent events and degrades to an empty list on storage failure.

use std::sync::Arc;

use stockgate_core::AuditEvent;

use crate::store::SharedStore;

const AUDIT_LIST_KEY: &str = "audit:events";

/// Append-only recorder for security- and business-relevant actions.
#[derive(Clone)]
pub struct AuditSink {
    store: Arc<dyn SharedStore>,
    environment: String,
}

impl AuditSink {
    pub fn new(store: Arc<dyn SharedStore>, environment: &str) -> Self {
        Self {
            store,
            environment: environment.to_string(),
        }
    }

    /// Stamp the environment tag and append. Returns whether the write
    /// landed; callers never propagate a `false`.
    pub async fn record(&self, event: AuditEvent) -> bool {
        let event = event.with_environment(&self.environment);
        let raw = match serde_json::to_string(&event) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(%err, "Failed to serialize audit event");
                return false;
            }
        };
        match self.store.lpush(AUDIT_LIST_KEY, &raw).await {
            Ok(()) => {
                tracing::debug!(action = ?event.action, actor = %event.actor, "Audit event recorded");
                true
            }
            Err(err) => {
                tracing::error!(%err, action = ?event.action, "Audit write failed");
                false
            }
        }
    }

    /// Most recent events, newest first. Unreadable entries are skipped;
    /// a storage failure yields an empty list rather than an error.
    pub async fn recent_events(&self, limit: usize) -> Vec<AuditEvent> {
        if limit == 0 {
            return Vec::new();
        }
        let stop = limit as isize - 1;
        match self.store.lrange(AUDIT_LIST_KEY, 0, stop).await {
            Ok(entries) => entries
                .iter()
                .filter_map(|raw| serde_json::from_str(raw).ok())
                .collect(),
            Err(err) => {
                tracing::warn!(%err, "Audit read failed, returning empty list");
                Vec::new()
            }
        }
    }
}
