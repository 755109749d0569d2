//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use crate::audit::AuditSink;
use crate::cache::CacheLayer;
use crate::config::GatewayConfig;
use crate::pipeline::StockQueryPipeline;
use crate::proxy::InventoryBackend;
use crate::rate_gate::{RateGate, WindowConfig};
use crate::store::SharedStore;

/// Application-wide state shared across all routes.
///
/// Every component takes its collaborators by injection here, at the
/// composition root. Tests build the same graph over [`MemoryStore`] and a
/// fake backend; nothing reaches for a global.
///
/// [`MemoryStore`]: crate::store::MemoryStore
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<StockQueryPipeline>,
    pub cache: CacheLayer,
    pub rate_gate: RateGate,
    pub audit: AuditSink,
    pub backend: Arc<dyn InventoryBackend>,
    pub store: Arc<dyn SharedStore>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the full component graph from configuration plus the two
    /// injected edges (shared store and inventory backend).
    pub fn build(
        config: &GatewayConfig,
        store: Arc<dyn SharedStore>,
        backend: Arc<dyn InventoryBackend>,
    ) -> Self {
        let cache = CacheLayer::new(store.clone());
        let audit = AuditSink::new(store.clone(), &config.environment);
        let rate_gate = RateGate::new(
            store.clone(),
            WindowConfig {
                window: config.broad_window,
                max_requests: config.broad_max_requests,
            },
            WindowConfig {
                window: config.stock_window,
                max_requests: config.stock_max_requests,
            },
        );
        let pipeline = Arc::new(StockQueryPipeline::new(
            cache.clone(),
            backend.clone(),
            audit.clone(),
            config.sla_thresholds(),
            config.cache_ttl_secs,
        ));

        Self {
            pipeline,
            cache,
            rate_gate,
            audit,
            backend,
            store,
            start_time: Instant::now(),
        }
    }
}
