//! HTTP routing
//!
//! The stock-query routes sit behind the full middleware stack, applied
//! outermost-first: authentication, then the denylist, then the broad
//! window, then the stock window. Health endpoints bypass all of it.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    auth_middleware, broad_window_middleware, denylist_middleware, stock_window_middleware,
    AuthState, IdentityVerifier, RateLimitState,
};
use crate::state::AppState;

pub mod health;
pub mod stock;

/// Build the complete gateway router.
pub fn create_api_router(state: AppState, verifier: Arc<dyn IdentityVerifier>) -> Router {
    let auth_state = AuthState {
        verifier,
        audit: state.audit.clone(),
    };
    let rate_state = RateLimitState {
        gate: state.rate_gate.clone(),
        audit: state.audit.clone(),
    };

    // Layers run bottom-up: the last `.layer()` call is outermost.
    let stock_routes = Router::new()
        .route("/stock-query", post(stock::query_stock))
        .route("/stock-query/test/:product_id", get(stock::test_stock))
        .route("/stock-query/admin/cache", post(stock::admin_cache))
        .route("/stock-query/admin/denylist", post(stock::admin_denylist))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            rate_state.clone(),
            stock_window_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            rate_state.clone(),
            broad_window_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            rate_state,
            denylist_middleware,
        ))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .merge(stock_routes)
        .merge(health::create_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
