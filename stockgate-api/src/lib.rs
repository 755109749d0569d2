//! STOCKGATE API - stock query gateway
//!
//! An authenticated HTTP gateway in front of an inventory backend. Adds a
//! short-TTL shared cache, IP denylisting, two fixed-window rate limits,
//! an append-only audit trail and static fallback data when the backend is
//! unreachable, with per-query latency SLA classification.
//!
//! Cache entries, rate counters, denylist entries and audit events all
//! live in one shared store (Redis in production) so every gateway
//! instance sees the same state.

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod proxy;
pub mod rate_gate;
pub mod routes;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use audit::AuditSink;
pub use cache::{CacheLayer, CacheStats};
pub use config::{ApiToken, GatewayConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{IdentityVerifier, StaticTokenVerifier};
pub use pipeline::{QueryOutcome, StockQueryPipeline};
pub use proxy::{BackendFailure, BackendHealth, HttpInventoryBackend, InventoryBackend};
pub use rate_gate::{DenylistEntry, RateDecision, RateGate, RateScope, WindowConfig};
pub use routes::create_api_router;
pub use state::AppState;
pub use store::{MemoryStore, RedisStore, SharedStore, StoreError, StoreResult};
