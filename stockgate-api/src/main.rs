//! STOCKGATE API server entry point
//!
//! Bootstraps configuration, connects the shared store and the inventory
//! backend client, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use stockgate_api::{
    create_api_router, ApiError, ApiResult, AppState, GatewayConfig, HttpInventoryBackend,
    RedisStore, StaticTokenVerifier,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockgate_api=info,tower_http=info".into()),
        )
        .init();

    let config = GatewayConfig::from_env();
    if config.api_tokens.is_empty() {
        tracing::warn!("No API tokens configured; every request will be rejected with 401");
    }

    let store = RedisStore::connect(&config.redis_url).await.map_err(|err| {
        tracing::error!(%err, url = %config.redis_url, "Failed to connect shared store");
        ApiError::internal_error()
    })?;

    let backend =
        HttpInventoryBackend::new(&config.inventory_url, config.backend_timeout).map_err(
            |err| {
                tracing::error!(%err, "Failed to build inventory backend client");
                ApiError::internal_error()
            },
        )?;

    let verifier = Arc::new(StaticTokenVerifier::new(&config.api_tokens));
    let state = AppState::build(&config, Arc::new(store), Arc::new(backend));
    let app = create_api_router(state, verifier);

    let addr: SocketAddr = config.bind_addr().parse().map_err(|err| {
        tracing::error!(%err, addr = %config.bind_addr(), "Invalid bind address");
        ApiError::internal_error()
    })?;
    tracing::info!(%addr, inventory_url = %config.inventory_url, "Starting stock query gateway");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        tracing::error!(%err, %addr, "Failed to bind");
        ApiError::internal_error()
    })?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result.map_err(|err| {
                tracing::error!(%err, "Server error");
                ApiError::internal_error()
            })?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
