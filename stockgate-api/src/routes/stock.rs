//! Stock query endpoints
//!
//! - `POST /stock-query` - the main proxied query
//! - `GET /stock-query/test/{product_id}` - canned data, no backend call
//! - `POST /stock-query/admin/cache` - cache administration (admin role)
//! - `POST /stock-query/admin/denylist` - denylist administration (admin role)
//!
//! All routes sit behind the auth middleware and the full gating stack.

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use stockgate_core::{Principal, QueryMetadata, QuerySource, SlaStatus, StockQueryRequest};

use crate::error::{ApiError, ApiResult};
use crate::middleware::{BearerToken, ClientIp, PrincipalExtractor};
use crate::pipeline::QueryOutcome;
use crate::state::AppState;

// ============================================================================
// QUERY
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StockQueryBody {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
}

/// POST /stock-query - run one query through the pipeline.
pub async fn query_stock(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    ClientIp(ip): ClientIp,
    bearer: Option<BearerToken>,
    Json(body): Json<StockQueryBody>,
) -> ApiResult<Response> {
    let request = StockQueryRequest {
        product_id: body.product_id.unwrap_or_default(),
        warehouse_id: body.warehouse_id,
        requester_ip: ip,
        principal,
    };

    let outcome = state
        .pipeline
        .execute(&request, bearer.as_ref().map(|b| b.0.as_str()))
        .await?;

    Ok(match outcome {
        QueryOutcome::Success { payload, metadata } => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": payload,
                "metadata": metadata,
            })),
        )
            .into_response(),
        QueryOutcome::Degraded {
            code,
            fallback_data,
            metadata,
        } => (
            code.status_code(),
            Json(serde_json::json!({
                "code": code,
                "message": code.default_message(),
                "fallback_data": fallback_data,
                "metadata": metadata,
            })),
        )
            .into_response(),
    })
}

/// GET /stock-query/test/{product_id} - canned catalog data for smoke
/// testing the full middleware stack without touching the backend.
pub async fn test_stock(
    State(state): State<AppState>,
    PrincipalExtractor(_principal): PrincipalExtractor,
    Path(product_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if product_id.trim().is_empty() {
        return Err(ApiError::missing_field("product_id"));
    }

    let start = Instant::now();
    let record = state.pipeline.fallback_catalog().lookup(&product_id, None);
    let metadata = QueryMetadata {
        source: QuerySource::Test,
        response_time_ms: start.elapsed().as_millis() as u64,
        cached: false,
        meets_asr: true,
        asr_status: SlaStatus::Meets,
    };

    Ok(Json(serde_json::json!({
        "data": record,
        "metadata": metadata,
    })))
}

// ============================================================================
// ADMIN: CACHE
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum CacheAdminBody {
    /// Drop every cached stock entry.
    Clear,
    /// Aggregate key counts and connectivity.
    Stats,
    /// Inspect one cache entry.
    Get { key: String },
}

/// POST /stock-query/admin/cache - admin-only cache operations.
pub async fn admin_cache(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Json(body): Json<CacheAdminBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&principal)?;

    match body {
        CacheAdminBody::Clear => {
            let cleared = state.cache.delete_by_prefix("stock:").await;
            tracing::info!(admin = %principal.username, cleared, "Stock cache cleared");
            Ok(Json(serde_json::json!({ "cleared": cleared })))
        }
        CacheAdminBody::Stats => {
            let stats = state.cache.stats().await;
            Ok(Json(serde_json::to_value(stats).map_err(|err| {
                tracing::error!(%err, "Failed to serialize cache stats");
                ApiError::internal_error()
            })?))
        }
        CacheAdminBody::Get { key } => {
            let value = state.cache.get(&key).await;
            Ok(Json(serde_json::json!({ "key": key, "value": value })))
        }
    }
}

// ============================================================================
// ADMIN: DENYLIST
// ============================================================================

fn default_block_minutes() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DenylistAdminBody {
    Block {
        ip: String,
        reason: String,
        #[serde(default = "default_block_minutes")]
        minutes: u64,
    },
    Unblock {
        ip: String,
    },
    Get {
        ip: String,
    },
}

/// POST /stock-query/admin/denylist - admin-only denylist operations.
/// Blocking is always an explicit administrative act.
pub async fn admin_denylist(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Json(body): Json<DenylistAdminBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&principal)?;

    match body {
        DenylistAdminBody::Block {
            ip,
            reason,
            minutes,
        } => {
            if ip.trim().is_empty() {
                return Err(ApiError::missing_field("ip"));
            }
            let entry = state
                .rate_gate
                .block_ip(&ip, &reason, minutes)
                .await
                .map_err(store_failed)?;
            tracing::info!(admin = %principal.username, ip = %ip, "Denylist entry added");
            Ok(Json(serde_json::json!({ "ip": ip, "blocked": entry })))
        }
        DenylistAdminBody::Unblock { ip } => {
            state
                .rate_gate
                .unblock_ip(&ip)
                .await
                .map_err(store_failed)?;
            tracing::info!(admin = %principal.username, ip = %ip, "Denylist entry removed");
            Ok(Json(serde_json::json!({ "ip": ip, "unblocked": true })))
        }
        DenylistAdminBody::Get { ip } => {
            let entry = state.rate_gate.get_block(&ip).await.map_err(store_failed)?;
            Ok(Json(serde_json::json!({ "ip": ip, "blocked": entry })))
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn require_admin(principal: &Principal) -> ApiResult<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator role required"))
    }
}

/// Admin operations, unlike the query path, surface store failures: a
/// block that did not land must not look like one that did.
fn store_failed(err: crate::store::StoreError) -> ApiError {
    tracing::error!(%err, "Admin store operation failed");
    ApiError::internal_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockgate_core::Role;

    #[test]
    fn test_require_admin() {
        let admin = Principal::new("admin", Role::Admin, "Admin", "IT");
        let user = Principal::new("logistica", Role::User, "Logistics", "Logistics");
        assert!(require_admin(&admin).is_ok());
        assert!(require_admin(&user).is_err());
    }

    #[test]
    fn test_cache_admin_body_parses() -> Result<(), serde_json::Error> {
        let body: CacheAdminBody = serde_json::from_str(r#"{ "action": "clear" }"#)?;
        assert!(matches!(body, CacheAdminBody::Clear));

        let body: CacheAdminBody =
            serde_json::from_str(r#"{ "action": "get", "key": "stock:CASCO-001:all" }"#)?;
        assert!(matches!(body, CacheAdminBody::Get { key } if key == "stock:CASCO-001:all"));
        Ok(())
    }

    #[test]
    fn test_denylist_body_defaults_minutes() -> Result<(), serde_json::Error> {
        let body: DenylistAdminBody =
            serde_json::from_str(r#"{ "action": "block", "ip": "10.0.0.9", "reason": "abuse" }"#)?;
        assert!(matches!(body, DenylistAdminBody::Block { minutes: 60, .. }));
        Ok(())
    }
}
