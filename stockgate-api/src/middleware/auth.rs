//! Axum middleware for authentication
//!
//! Identity is established upstream of this gateway; the middleware only
//! verifies the presented bearer token through the [`IdentityVerifier`]
//! seam and injects the resolved [`Principal`] into request extensions.
//! The raw token is kept alongside so the proxy can forward it to the
//! inventory backend verbatim.
//!
//! - Returns 401 for missing, malformed or unknown tokens
//! - Records a `LOGIN_FAILED` audit event for rejected tokens
//! - Health endpoints are mounted outside this middleware

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use stockgate_core::{AuditEvent, Principal};

use crate::audit::AuditSink;
use crate::config::ApiToken;
use crate::error::ApiError;

// ============================================================================
// VERIFIER SEAM
// ============================================================================

/// Maps a bearer token to a principal, or rejects it.
///
/// The shipped implementation is a static token table; deployments with a
/// real identity provider plug in their own verifier here.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<Principal>;
}

/// Static token table loaded from configuration.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: &[ApiToken]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|t| (t.token.clone(), t.principal.clone()))
                .collect(),
        }
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).cloned()
    }
}

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub audit: AuditSink,
}

/// Raw bearer token, stashed for forwarding to the inventory backend.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Client IP resolved from proxy headers or the connection.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Authenticate the request and inject `Principal`, `BearerToken` and
/// `ClientIp` into request extensions.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = resolve_client_ip(&request);
    request.extensions_mut().insert(ClientIp(ip.clone()));

    let token = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    let Some(token) = token else {
        return Err(ApiError::unauthorized(
            "Authentication required: provide an Authorization: Bearer token",
        ));
    };

    match state.verifier.verify(&token) {
        Some(principal) => {
            tracing::debug!(username = %principal.username, role = %principal.role, "Authenticated");
            request.extensions_mut().insert(principal);
            request.extensions_mut().insert(BearerToken(token));
            Ok(next.run(request).await)
        }
        None => {
            state
                .audit
                .record(AuditEvent::login_failed("unknown", &ip, "invalid token"))
                .await;
            Err(ApiError::unauthorized("Invalid or expired token"))
        }
    }
}

/// Extract the client IP, preferring proxy headers over the socket address.
/// `X-Forwarded-For` may carry a chain; the first hop is the client.
pub fn resolve_client_ip(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
    {
        let forwarded = forwarded.trim();
        if !forwarded.is_empty() {
            return forwarded.to_string();
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// TYPED EXTRACTORS
// ============================================================================

/// Typed extractor for the authenticated principal.
///
/// Requires `auth_middleware` on the route; without it the extractor
/// rejects with 401.
#[derive(Debug, Clone)]
pub struct PrincipalExtractor(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for PrincipalExtractor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(PrincipalExtractor)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl std::ops::Deref for PrincipalExtractor {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BearerToken>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ClientIp>()
            .cloned()
            .unwrap_or_else(|| ClientIp("unknown".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use stockgate_core::{AuditAction, Role};
    use tower::ServiceExt; // for `oneshot`

    fn test_state(store: Arc<MemoryStore>) -> AuthState {
        let tokens = vec![ApiToken {
            token: "valid-token".to_string(),
            principal: Principal::new("logistica", Role::User, "Logistics Lead", "Logistics"),
        }];
        AuthState {
            verifier: Arc::new(StaticTokenVerifier::new(&tokens)),
            audit: AuditSink::new(store, "test"),
        }
    }

    fn test_app(state: AuthState) -> Router {
        async fn handler(PrincipalExtractor(principal): PrincipalExtractor) -> String {
            principal.username
        }

        Router::new()
            .route("/protected", get(handler))
            .layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    #[tokio::test]
    async fn test_valid_token_passes_and_injects_principal() -> Result<(), String> {
        let app = test_app(test_state(MemoryStore::new()));
        let request = HttpRequest::builder()
            .uri("/protected")
            .header("authorization", "Bearer valid-token")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| format!("Failed to read body: {:?}", e))?;
        assert_eq!(&body[..], b"logistica");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_token_rejected() -> Result<(), String> {
        let app = test_app(test_state(MemoryStore::new()));
        let request = HttpRequest::builder()
            .uri("/protected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_and_audited() -> Result<(), String> {
        let store = MemoryStore::new();
        let state = test_state(store.clone());
        let audit = state.audit.clone();
        let app = test_app(state);

        let request = HttpRequest::builder()
            .uri("/protected")
            .header("authorization", "Bearer wrong-token")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let events = audit.recent_events(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::LoginFailed);
        assert_eq!(events[0].client_ip, "203.0.113.7");
        Ok(())
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() -> Result<(), String> {
        let app = test_app(test_state(MemoryStore::new()));
        let request = HttpRequest::builder()
            .uri("/protected")
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_forwarded_for_chain_takes_first_hop() {
        let request = HttpRequest::builder()
            .uri("/")
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.2")
            .body(Body::empty())
            .expect("request");
        assert_eq!(resolve_client_ip(&request), "198.51.100.4");
    }

    #[tokio::test]
    async fn test_client_ip_falls_back_to_unknown() {
        let request = HttpRequest::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");
        assert_eq!(resolve_client_ip(&request), "unknown");
    }
}
