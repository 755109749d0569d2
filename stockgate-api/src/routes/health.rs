//! Health check endpoints
//!
//! - `/health` - simple liveness check
//! - `/health/ready` - shared store and inventory backend connectivity
//!
//! No authentication and no rate gating: these must answer even when the
//! rest of the gateway is rejecting traffic. The gateway fails open on
//! store outages and degrades to fallback data on backend outages, so a
//! single unhealthy dependency reports `degraded` with 200; only when both
//! are down is the instance reported not ready.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::proxy::BackendHealth;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub store: ComponentHealth,
    pub backend: BackendHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health - liveness.
pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

/// GET /health/ready - dependency connectivity.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let start = std::time::Instant::now();
    let store = match state.store.ping().await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(err) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some(err.to_string()),
        },
    };

    let backend = state.backend.health_check().await;

    let status = match (store.status == HealthStatus::Healthy, backend.healthy) {
        (true, true) => HealthStatus::Healthy,
        (false, false) => HealthStatus::Unhealthy,
        _ => HealthStatus::Degraded,
    };

    let status_code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = ReadinessResponse {
        status,
        store,
        backend,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    (status_code, Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Health router, mounted outside the auth and gating stack.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/ready", get(readiness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&HealthStatus::Healthy)?, "\"healthy\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded)?, "\"degraded\"");
        Ok(())
    }

    #[test]
    fn test_component_health_hides_empty_fields() -> Result<(), serde_json::Error> {
        let component = ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(2),
            error: None,
        };
        let json = serde_json::to_string(&component)?;
        assert!(json.contains("\"latency_ms\":2"));
        assert!(!json.contains("error"));
        Ok(())
    }
}
