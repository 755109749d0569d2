//! Abuse gating: IP denylist and fixed-window rate counters
//!
//! Both live in the shared store so every gateway instance sees the same
//! counters and blocks. The denylist is consulted before any window
//! counting; a denylisted client is rejected regardless of remaining quota.
//!
//! Denylist entries are explicit administrative writes. Repeated rate-limit
//! violations do not promote automatically; they only surface through the
//! attack-logging hook.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{SharedStore, StoreError, StoreResult};

// ============================================================================
// TYPES
// ============================================================================

/// Which fixed window a request counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    /// All non-exempt traffic (health endpoints are exempt).
    Broad,
    /// Stock-query routes only.
    Stock,
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateScope::Broad => write!(f, "broad"),
            RateScope::Stock => write!(f, "stock"),
        }
    }
}

/// Per-scope window configuration.
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    pub window: Duration,
    pub max_requests: i64,
}

/// Outcome of one window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Count observed in the current window, including this request.
    pub count: i64,
    pub limit: i64,
    /// Seconds until the window rolls over.
    pub retry_after_secs: u64,
}

/// Stored denylist entry: `blacklist:{ip}` with TTL self-expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenylistEntry {
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// RATE GATE
// ============================================================================

/// Denylist checks plus fixed-window counting against the shared store.
#[derive(Clone)]
pub struct RateGate {
    store: Arc<dyn SharedStore>,
    broad: WindowConfig,
    stock: WindowConfig,
}

impl RateGate {
    pub fn new(store: Arc<dyn SharedStore>, broad: WindowConfig, stock: WindowConfig) -> Self {
        Self { store, broad, stock }
    }

    fn window_config(&self, scope: RateScope) -> WindowConfig {
        match scope {
            RateScope::Broad => self.broad,
            RateScope::Stock => self.stock,
        }
    }

    // ========================================================================
    // Denylist
    // ========================================================================

    /// Pure existence check against the shared store. Fails open: if the
    /// store is unreachable the anomaly is logged and the client is treated
    /// as not blocked rather than refusing all traffic.
    pub async fn is_blocked(&self, ip: &str) -> bool {
        match self.store.get(&denylist_key(ip)).await {
            Ok(entry) => entry.is_some(),
            Err(err) => {
                tracing::warn!(ip, %err, "Denylist check failed, failing open");
                false
            }
        }
    }

    /// Explicit administrative block with a reason and a bounded duration.
    pub async fn block_ip(
        &self,
        ip: &str,
        reason: &str,
        minutes: u64,
    ) -> StoreResult<DenylistEntry> {
        let now = Utc::now();
        let entry = DenylistEntry {
            reason: reason.to_string(),
            blocked_at: now,
            expires_at: now + ChronoDuration::minutes(minutes as i64),
        };
        let raw = serde_json::to_string(&entry).map_err(|err| StoreError::Corrupt {
            key: denylist_key(ip),
            reason: err.to_string(),
        })?;
        self.store
            .set_ex(&denylist_key(ip), &raw, Duration::from_secs(minutes * 60))
            .await?;
        tracing::info!(ip, reason, minutes, "IP denylisted");
        Ok(entry)
    }

    pub async fn unblock_ip(&self, ip: &str) -> StoreResult<()> {
        self.store.delete(&denylist_key(ip)).await?;
        tracing::info!(ip, "IP removed from denylist");
        Ok(())
    }

    /// Read a denylist entry (admin inspection).
    pub async fn get_block(&self, ip: &str) -> StoreResult<Option<DenylistEntry>> {
        match self.store.get(&denylist_key(ip)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw).ok()),
            None => Ok(None),
        }
    }

    /// Whether a blocked client's access attempt should be written to the
    /// audit trail. At most one record per client per interval: a blocked
    /// client hammering the gateway must not grow the audit list without
    /// bound. Stays quiet on store outage (the denylist check has already
    /// failed open by then).
    pub async fn should_log_blocked_access(&self, ip: &str) -> bool {
        let key = blocked_log_key(ip);
        match self.store.get(&key).await {
            Ok(Some(_)) => false,
            Ok(None) => {
                if let Err(err) = self.store.set_ex(&key, "1", BLOCKED_LOG_INTERVAL).await {
                    tracing::warn!(ip, %err, "Failed to mark blocked-access log interval");
                }
                true
            }
            Err(err) => {
                tracing::warn!(ip, %err, "Blocked-access log check failed, staying quiet");
                false
            }
        }
    }

    // ========================================================================
    // Fixed windows
    // ========================================================================

    /// Count this request against the scope's window and decide.
    ///
    /// INCR is the atomic increment-and-compare primitive; the first hit in
    /// a window arms the key's TTL, so the window resets by expiry. A store
    /// failure fails open with a logged anomaly, mirroring the denylist
    /// policy: degraded infrastructure must not refuse all traffic.
    pub async fn check_window(&self, scope: RateScope, client_key: &str) -> RateDecision {
        let config = self.window_config(scope);
        let key = window_key(scope, client_key);

        let count = match self.store.incr(&key).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(%scope, client_key, %err, "Rate window check failed, failing open");
                return RateDecision {
                    allowed: true,
                    count: 0,
                    limit: config.max_requests,
                    retry_after_secs: 0,
                };
            }
        };

        if count == 1 {
            if let Err(err) = self.store.expire(&key, config.window).await {
                tracing::warn!(%scope, client_key, %err, "Failed to arm rate window expiry");
            }
        }

        // A counter without a TTL never rolls over and would lock the
        // client out permanently. If the arming EXPIRE failed on the first
        // hit, whichever request notices the missing TTL re-arms it.
        let retry_after_secs = match self.store.ttl(&key).await {
            Ok(ttl) if ttl > 0 => ttl as u64,
            Ok(-1) => {
                if let Err(err) = self.store.expire(&key, config.window).await {
                    tracing::warn!(%scope, client_key, %err, "Failed to re-arm rate window expiry");
                }
                config.window.as_secs()
            }
            _ => config.window.as_secs(),
        };

        RateDecision {
            allowed: count <= config.max_requests,
            count,
            limit: config.max_requests,
            retry_after_secs,
        }
    }
}

/// Minimum spacing between attack-attempt records for one blocked client.
const BLOCKED_LOG_INTERVAL: Duration = Duration::from_secs(300);

fn denylist_key(ip: &str) -> String {
    format!("blacklist:{}", ip)
}

fn blocked_log_key(ip: &str) -> String {
    format!("blacklist:logged:{}", ip)
}

fn window_key(scope: RateScope, client_key: &str) -> String {
    format!("ratelimit:{}:{}", scope, client_key)
}
