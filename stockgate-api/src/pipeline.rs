//! Stock query pipeline
//!
//! Orchestrates one query end to end: validation, cache-aside read,
//! backend proxying with failure classification, fallback substitution,
//! audit recording and SLA classification. Rate gating runs earlier, in
//! middleware; by the time a request reaches the pipeline it has already
//! passed the denylist and both windows.
//!
//! Every successful or degraded query produces exactly one audit event
//! whose `cached` flag matches the actual source. Hard errors (upstream
//! application errors, validation failures) produce none.

use std::sync::Arc;
use std::time::Instant;

use stockgate_core::{
    AuditEvent, FallbackCatalog, QueryMetadata, QuerySource, SlaStatus, SlaThresholds,
    StockQueryRequest, StockRecord, ValidationError,
};

use crate::audit::AuditSink;
use crate::cache::CacheLayer;
use crate::error::{ApiError, ErrorCode};
use crate::proxy::InventoryBackend;

// ============================================================================
// OUTCOME
// ============================================================================

/// Statically distinguishable pipeline result. Handlers branch on the
/// variant, never on response shape.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Authoritative data, from cache or fresh from the backend.
    Success {
        payload: serde_json::Value,
        metadata: QueryMetadata,
    },
    /// Backend unreachable or timed out; static substitute data, explicitly
    /// non-authoritative.
    Degraded {
        code: ErrorCode,
        fallback_data: StockRecord,
        metadata: QueryMetadata,
    },
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Per-request orchestrator composed once at startup and shared.
pub struct StockQueryPipeline {
    cache: CacheLayer,
    backend: Arc<dyn InventoryBackend>,
    audit: AuditSink,
    fallback: FallbackCatalog,
    sla: SlaThresholds,
    cache_ttl_secs: u64,
}

impl StockQueryPipeline {
    pub fn new(
        cache: CacheLayer,
        backend: Arc<dyn InventoryBackend>,
        audit: AuditSink,
        sla: SlaThresholds,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            cache,
            backend,
            audit,
            fallback: FallbackCatalog::new(),
            sla,
            cache_ttl_secs,
        }
    }

    pub fn fallback_catalog(&self) -> &FallbackCatalog {
        &self.fallback
    }

    /// Run one query through the pipeline.
    ///
    /// `bearer` is the caller's upstream credential, forwarded verbatim to
    /// the backend on a cache miss.
    pub async fn execute(
        &self,
        request: &StockQueryRequest,
        bearer: Option<&str>,
    ) -> Result<QueryOutcome, ApiError> {
        if request.product_id.trim().is_empty() {
            // Nothing meaningful to audit yet.
            return Err(ValidationError::required("product_id").into());
        }

        let start = Instant::now();
        match self.run(request, bearer, start).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.code == ErrorCode::InternalError => {
                // Even unexpected failures still attempt the fallback path
                // before emitting a generic error; latency beats purity.
                let record = self
                    .fallback
                    .lookup(&request.product_id, request.warehouse_id.as_deref());
                let elapsed = elapsed_ms(start);
                Err(err.with_details(serde_json::json!({
                    "fallback_data": record,
                    "metadata": {
                        "source": QuerySource::ErrorFallback,
                        "response_time_ms": elapsed,
                    },
                })))
            }
            Err(err) => Err(err),
        }
    }

    async fn run(
        &self,
        request: &StockQueryRequest,
        bearer: Option<&str>,
        start: Instant,
    ) -> Result<QueryOutcome, ApiError> {
        let cache_key = request.cache_key();

        // 1. Cache first.
        if let Some(payload) = self.cache.get(&cache_key).await {
            let elapsed = elapsed_ms(start);
            tracing::debug!(product_id = %request.product_id, elapsed, "Cache hit");
            let metadata = self.metadata(QuerySource::Cache, true, elapsed);
            self.audit_query(request, true, elapsed).await;
            return Ok(QueryOutcome::Success { payload, metadata });
        }

        tracing::debug!(product_id = %request.product_id, "Cache miss, querying backend");

        // 2. Backend, fail fast.
        match self
            .backend
            .query_stock(
                &request.product_id,
                request.warehouse_id.as_deref(),
                bearer,
            )
            .await
        {
            Ok(payload) => {
                // 3. Populate the cache; a failed write is already logged
                //    and does not affect this response.
                self.cache
                    .set(&cache_key, &payload, self.cache_ttl_secs)
                    .await;

                let elapsed = elapsed_ms(start);
                let metadata = self.metadata(QuerySource::Database, false, elapsed);
                self.log_sla(&request.product_id, elapsed, metadata.asr_status);
                self.audit_query(request, false, elapsed).await;
                Ok(QueryOutcome::Success { payload, metadata })
            }
            Err(failure) if failure.is_degradable() => {
                let record = self
                    .fallback
                    .lookup(&request.product_id, request.warehouse_id.as_deref());
                let elapsed = elapsed_ms(start);
                tracing::warn!(
                    product_id = %request.product_id,
                    %failure,
                    "Backend degraded, serving fallback data"
                );
                let metadata = self.metadata(QuerySource::Fallback, false, elapsed);
                self.audit_query(request, false, elapsed).await;

                let code = match failure {
                    crate::proxy::BackendFailure::ServiceTimeout => ErrorCode::UpstreamTimeout,
                    _ => ErrorCode::UpstreamUnavailable,
                };
                Ok(QueryOutcome::Degraded {
                    code,
                    fallback_data: record,
                    metadata,
                })
            }
            Err(crate::proxy::BackendFailure::Http { status, body }) => {
                // A responsive-but-erroring backend is trusted over stale
                // static data: surface, do not substitute.
                Err(ApiError::upstream_error(status, body))
            }
            Err(failure) => {
                tracing::error!(product_id = %request.product_id, %failure, "Unclassified backend failure");
                Err(ApiError::internal_error())
            }
        }
    }

    fn metadata(&self, source: QuerySource, cached: bool, elapsed_ms: u64) -> QueryMetadata {
        QueryMetadata {
            source,
            response_time_ms: elapsed_ms,
            cached,
            meets_asr: self.sla.meets_objective(elapsed_ms),
            asr_status: self.sla.classify(elapsed_ms),
        }
    }

    /// Best-effort audit write; the sink absorbs failures.
    async fn audit_query(&self, request: &StockQueryRequest, cached: bool, elapsed_ms: u64) {
        self.audit
            .record(AuditEvent::stock_query(
                &request.principal.username,
                &request.product_id,
                &request.requester_ip,
                cached,
                elapsed_ms,
                self.sla.meets_objective(elapsed_ms),
            ))
            .await;
    }

    fn log_sla(&self, product_id: &str, elapsed_ms: u64, status: SlaStatus) {
        match status {
            SlaStatus::Violates => tracing::warn!(
                product_id,
                elapsed_ms,
                limit_ms = self.sla.violation_ms,
                "Latency SLA violated"
            ),
            SlaStatus::Warning => tracing::warn!(
                product_id,
                elapsed_ms,
                "Latency SLA warning"
            ),
            SlaStatus::Meets => {}
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::BackendFailure;
    use crate::store::{MemoryStore, SharedStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use stockgate_core::{AuditAction, Principal, Role};

    enum Behavior {
        Success(serde_json::Value),
        Fail(BackendFailure),
    }

    struct FakeBackend {
        behavior: Mutex<Behavior>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn succeeding(payload: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                behavior: Mutex::new(Behavior::Success(payload)),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(failure: BackendFailure) -> Arc<Self> {
            Arc::new(Self {
                behavior: Mutex::new(Behavior::Fail(failure)),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InventoryBackend for FakeBackend {
        async fn query_stock(
            &self,
            _product_id: &str,
            _warehouse_id: Option<&str>,
            _bearer: Option<&str>,
        ) -> Result<serde_json::Value, BackendFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &*self.behavior.lock().unwrap() {
                Behavior::Success(payload) => Ok(payload.clone()),
                Behavior::Fail(failure) => Err(failure.clone()),
            }
        }

        async fn health_check(&self) -> crate::proxy::BackendHealth {
            crate::proxy::BackendHealth {
                healthy: true,
                status: "healthy".to_string(),
                error: None,
            }
        }
    }

    fn request(product_id: &str) -> StockQueryRequest {
        StockQueryRequest {
            product_id: product_id.to_string(),
            warehouse_id: None,
            requester_ip: "10.0.0.1".to_string(),
            principal: Principal::new("logistica", Role::User, "Logistics Lead", "Logistics"),
        }
    }

    fn pipeline(
        store: Arc<MemoryStore>,
        backend: Arc<FakeBackend>,
    ) -> (StockQueryPipeline, AuditSink) {
        let audit = AuditSink::new(store.clone(), "test");
        let pipeline = StockQueryPipeline::new(
            CacheLayer::new(store),
            backend,
            audit.clone(),
            SlaThresholds::default(),
            30,
        );
        (pipeline, audit)
    }

    fn stock_payload() -> serde_json::Value {
        serde_json::json!({
            "product_id": "CASCO-001",
            "product_name": "Type II Safety Helmet",
            "current_stock": 250,
        })
    }

    #[tokio::test]
    async fn test_miss_then_hit_invokes_backend_once() {
        let store = MemoryStore::new();
        let backend = FakeBackend::succeeding(stock_payload());
        let (pipeline, _) = pipeline(store, backend.clone());

        let first = pipeline.execute(&request("CASCO-001"), None).await.unwrap();
        let second = pipeline.execute(&request("CASCO-001"), None).await.unwrap();

        assert_eq!(backend.calls(), 1);
        match first {
            QueryOutcome::Success { metadata, .. } => {
                assert_eq!(metadata.source, QuerySource::Database);
                assert!(!metadata.cached);
            }
            other => panic!("expected success, got {:?}", other),
        }
        match second {
            QueryOutcome::Success { metadata, payload } => {
                assert_eq!(metadata.source, QuerySource::Cache);
                assert!(metadata.cached);
                assert_eq!(payload, stock_payload());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_entry_refetches_exactly_once() {
        let store = MemoryStore::new();
        let backend = FakeBackend::succeeding(stock_payload());
        let (pipeline, _) = pipeline(store.clone(), backend.clone());

        pipeline.execute(&request("CASCO-001"), None).await.unwrap();
        store.advance(Duration::from_secs(31));
        pipeline.execute(&request("CASCO-001"), None).await.unwrap();
        pipeline.execute(&request("CASCO-001"), None).await.unwrap();

        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_backend_serves_exact_fallback_record() {
        let store = MemoryStore::new();
        let backend = FakeBackend::failing(BackendFailure::ServiceUnavailable {
            reason: "connection refused".to_string(),
        });
        let (pipeline, _) = pipeline(store, backend);

        let expected = FallbackCatalog::new().lookup("CASCO-001", None);
        for _ in 0..3 {
            match pipeline.execute(&request("CASCO-001"), None).await.unwrap() {
                QueryOutcome::Degraded {
                    code,
                    fallback_data,
                    metadata,
                } => {
                    assert_eq!(code, ErrorCode::UpstreamUnavailable);
                    assert_eq!(fallback_data, expected);
                    assert_eq!(fallback_data.current_stock, 0);
                    assert!(fallback_data.note.is_some());
                    assert_eq!(metadata.source, QuerySource::Fallback);
                    assert!(!metadata.cached);
                }
                other => panic!("expected degraded, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_timeout_degrades_with_timeout_code() {
        let store = MemoryStore::new();
        let backend = FakeBackend::failing(BackendFailure::ServiceTimeout);
        let (pipeline, _) = pipeline(store, backend);

        match pipeline.execute(&request("RESP-001"), None).await.unwrap() {
            QueryOutcome::Degraded { code, .. } => assert_eq!(code, ErrorCode::UpstreamTimeout),
            other => panic!("expected degraded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_is_hard_no_fallback() {
        let store = MemoryStore::new();
        let backend = FakeBackend::failing(BackendFailure::Http {
            status: 422,
            body: serde_json::json!({ "error": "unknown sku" }),
        });
        let (pipeline, audit) = pipeline(store, backend);

        let err = pipeline
            .execute(&request("CASCO-001"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamError);
        let details = err.details.unwrap();
        assert_eq!(details["upstream_status"], 422);
        assert!(details.get("fallback_data").is_none());
        assert!(audit.recent_events(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_failure_attaches_fallback_to_generic_error() {
        let store = MemoryStore::new();
        let backend = FakeBackend::failing(BackendFailure::Unknown {
            reason: "tls handshake exploded".to_string(),
        });
        let (pipeline, _) = pipeline(store, backend);

        let err = pipeline
            .execute(&request("RESP-001"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.message, "Internal server error");
        let details = err.details.unwrap();
        assert_eq!(details["fallback_data"]["product_id"], "RESP-001");
        assert_eq!(details["metadata"]["source"], "error_fallback");
    }

    #[tokio::test]
    async fn test_exactly_one_audit_event_with_matching_cached_flag() {
        let store = MemoryStore::new();
        let backend = FakeBackend::succeeding(stock_payload());
        let (pipeline, audit) = pipeline(store, backend);

        pipeline.execute(&request("CASCO-001"), None).await.unwrap();
        let events = audit.recent_events(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::StockQuery);
        assert_eq!(events[0].details["cached"], serde_json::json!(false));

        pipeline.execute(&request("CASCO-001"), None).await.unwrap();
        let events = audit.recent_events(10).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].details["cached"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_degraded_query_audits_uncached() {
        let store = MemoryStore::new();
        let backend = FakeBackend::failing(BackendFailure::ServiceTimeout);
        let (pipeline, audit) = pipeline(store, backend);

        pipeline.execute(&request("CASCO-001"), None).await.unwrap();
        let events = audit.recent_events(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["cached"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn test_missing_product_id_touches_nothing() {
        let store = MemoryStore::new();
        let backend = FakeBackend::succeeding(stock_payload());
        let (pipeline, audit) = pipeline(store.clone(), backend.clone());

        let err = pipeline.execute(&request("  "), None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert_eq!(backend.calls(), 0);
        assert!(audit.recent_events(10).await.is_empty());
        assert!(store.keys("stock:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_cache_still_answers_from_backend() {
        let store = MemoryStore::new();
        let backend = FakeBackend::succeeding(stock_payload());
        let (pipeline, _) = pipeline(store.clone(), backend.clone());

        store.set_failing(true);
        // Cache get/set and the audit write all fail; the query still works.
        let outcome = pipeline.execute(&request("CASCO-001"), None).await.unwrap();
        match outcome {
            QueryOutcome::Success { metadata, .. } => {
                assert_eq!(metadata.source, QuerySource::Database)
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(backend.calls(), 1);
    }
}
