//! Axum middleware for abuse gating
//!
//! Three layers run in order on every gated route:
//! 1. Denylist check: blocked clients are rejected before any counting
//! 2. Broad window: all non-health traffic
//! 3. Stock window: stock-query routes only
//!
//! A rejected request still increments its window, so a client hammering
//! past the limit keeps pushing its own rollover estimate out and
//! eventually trips the attack-logging hook. Rejections carry a
//! `Retry-After` header with the seconds until the window resets.

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use stockgate_core::AuditEvent;

use crate::audit::AuditSink;
use crate::error::ApiError;
use crate::middleware::auth::{resolve_client_ip, ClientIp};
use crate::rate_gate::{RateGate, RateScope};

/// Shared state for the gating middleware stack.
#[derive(Clone)]
pub struct RateLimitState {
    pub gate: RateGate,
    pub audit: AuditSink,
}

// ============================================================================
// DENYLIST
// ============================================================================

/// Reject denylisted clients outright, regardless of remaining quota.
/// Denylist rejections share the quota error category: both are
/// infrastructure protection, not authorization.
pub async fn denylist_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = ip_of(&request);

    if state.gate.is_blocked(&ip).await {
        tracing::warn!(ip = %ip, "Rejected denylisted client");
        // A blocked client retrying in a loop must not flood the audit
        // trail; one record per client per interval.
        if state.gate.should_log_blocked_access(&ip).await {
            state
                .audit
                .record(AuditEvent::attack_attempt(
                    &ip,
                    "blocked_ip_access",
                    serde_json::json!({ "path": request.uri().path() }),
                ))
                .await;
        }
        return Err(ApiError::rate_limited(None).with_details(serde_json::json!({
            "reason": "client address is denylisted",
        })));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// FIXED WINDOWS
// ============================================================================

/// Broad fixed window over all gated traffic.
pub async fn broad_window_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    enforce_window(&state, RateScope::Broad, request, next).await
}

/// Tighter fixed window over the stock-query routes.
pub async fn stock_window_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    enforce_window(&state, RateScope::Stock, request, next).await
}

async fn enforce_window(
    state: &RateLimitState,
    scope: RateScope,
    request: Request,
    next: Next,
) -> Response {
    let ip = ip_of(&request);
    let decision = state.gate.check_window(scope, &ip).await;

    if decision.allowed {
        return next.run(request).await;
    }

    tracing::warn!(
        ip = %ip,
        %scope,
        count = decision.count,
        limit = decision.limit,
        "Rate limit exceeded"
    );

    // A client that keeps pushing well past the limit after rejections is
    // treated as hostile, not a burst. One event per window, at 2x.
    if decision.count == decision.limit * 2 {
        state
            .audit
            .record(AuditEvent::attack_attempt(
                &ip,
                "rate_limit_abuse",
                serde_json::json!({
                    "window": scope.to_string(),
                    "count": decision.count,
                    "limit": decision.limit,
                }),
            ))
            .await;
    }

    let mut response =
        ApiError::rate_limited(Some(decision.retry_after_secs)).into_response();
    if let Ok(value) = HeaderValue::from_str(&decision.retry_after_secs.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}

/// Prefer the IP resolved by the auth middleware; recompute when the route
/// is gated without authentication.
fn ip_of(request: &Request) -> String {
    request
        .extensions()
        .get::<ClientIp>()
        .map(|ip| ip.0.clone())
        .unwrap_or_else(|| resolve_client_ip(request))
}
