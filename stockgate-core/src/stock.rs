//! Stock query and stock record types
//!
//! A [`StockRecord`] is either served from cache, fetched fresh from the
//! inventory backend, or synthesized by the fallback catalog. Quantity
//! fields are trusted verbatim from whichever source produced them; the
//! gateway never recomputes `available_stock`.

use crate::principal::Principal;
use crate::sla::SlaStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// STOCK RECORD
// ============================================================================

/// Stock level snapshot for one product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub warehouse_id: String,
    pub current_stock: u64,
    pub reserved_stock: u64,
    pub available_stock: u64,
    pub reorder_point: u64,
    pub safety_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certification: Option<String>,
    /// Provenance note. Set on fallback records to mark them
    /// non-authoritative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ============================================================================
// QUERY REQUEST
// ============================================================================

/// One inbound stock query, discarded after the response is built.
#[derive(Debug, Clone)]
pub struct StockQueryRequest {
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub requester_ip: String,
    pub principal: Principal,
}

impl StockQueryRequest {
    /// Cache key for this query: `stock:{product_id}:{warehouse_id|"all"}`.
    pub fn cache_key(&self) -> String {
        format!(
            "stock:{}:{}",
            self.product_id,
            self.warehouse_id.as_deref().unwrap_or("all")
        )
    }
}

// ============================================================================
// RESPONSE METADATA
// ============================================================================

/// Origin of the record carried in a stock-query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    Cache,
    /// Fresh from the origin of record (the inventory backend).
    Database,
    /// Static substitute data; the backend was unreachable.
    Fallback,
    /// Static substitute data attached to an unexpected internal failure.
    ErrorFallback,
    /// Test endpoint; no real lookup performed.
    Test,
}

impl fmt::Display for QuerySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuerySource::Cache => "cache",
            QuerySource::Database => "database",
            QuerySource::Fallback => "fallback",
            QuerySource::ErrorFallback => "error_fallback",
            QuerySource::Test => "test",
        };
        write!(f, "{}", s)
    }
}

/// Latency and provenance metadata attached to every stock-query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub source: QuerySource,
    pub response_time_ms: u64,
    pub cached: bool,
    /// Whether the latency objective (< violation threshold) was honored.
    pub meets_asr: bool,
    pub asr_status: SlaStatus,
}
