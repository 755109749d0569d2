//! Audit event types
//!
//! Append-only records of security- and business-relevant actions. Events
//! are never mutated once written; ordering across concurrent writers is by
//! timestamp only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recorded action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    LoginSuccess,
    LoginFailed,
    StockQuery,
    AttackAttempt,
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    /// Actor identifier (username, or `system` for infrastructure events).
    pub actor: String,
    pub client_ip: String,
    /// Resource descriptor, e.g. `product:CASCO-001` or `security`.
    pub resource: String,
    /// Action-specific free-form payload.
    pub details: serde_json::Value,
    /// Deployment environment tag, stamped by the sink.
    pub environment: String,
}

impl AuditEvent {
    fn new(
        action: AuditAction,
        actor: impl Into<String>,
        client_ip: impl Into<String>,
        resource: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            actor: actor.into(),
            client_ip: client_ip.into(),
            resource: resource.into(),
            details,
            environment: String::new(),
        }
    }

    /// Successful authentication.
    pub fn login_success(username: &str, ip: &str) -> Self {
        Self::new(
            AuditAction::LoginSuccess,
            username,
            ip,
            "auth",
            serde_json::json!({ "type": "token" }),
        )
    }

    /// Rejected authentication attempt.
    pub fn login_failed(username: &str, ip: &str, reason: &str) -> Self {
        Self::new(
            AuditAction::LoginFailed,
            username,
            ip,
            "auth",
            serde_json::json!({ "reason": reason }),
        )
    }

    /// Completed stock query, cached or not.
    pub fn stock_query(
        actor: &str,
        product_id: &str,
        ip: &str,
        cached: bool,
        response_time_ms: u64,
        meets_asr: bool,
    ) -> Self {
        Self::new(
            AuditAction::StockQuery,
            actor,
            ip,
            format!("product:{}", product_id),
            serde_json::json!({
                "cached": cached,
                "response_time_ms": response_time_ms,
                "meets_asr": meets_asr,
            }),
        )
    }

    /// Generic security event (repeated rate-limit abuse, probing, ...).
    pub fn attack_attempt(ip: &str, attack_type: &str, details: serde_json::Value) -> Self {
        let mut payload = serde_json::json!({ "attack_type": attack_type });
        if let (Some(obj), Some(extra)) = (payload.as_object_mut(), details.as_object()) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        Self::new(AuditAction::AttackAttempt, "system", ip, "security", payload)
    }

    /// Stamp the deployment environment tag.
    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_string();
        self
    }
}
