//! Outbound proxy to the inventory backend
//!
//! The proxy applies a fixed request timeout shorter than the end-to-end
//! latency budget and classifies every failure into a closed set. That
//! classification is the contract the pipeline depends on: only
//! `ServiceUnavailable` and `ServiceTimeout` trigger fallback-data
//! substitution; `Http` and `Unknown` surface as hard errors. No retries:
//! the policy is fail fast and fall back, a retry would risk blowing the
//! SLA window.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// FAILURE CLASSIFICATION
// ============================================================================

/// Closed set of backend failure classes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendFailure {
    #[error("inventory service unreachable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("inventory service timed out")]
    ServiceTimeout,

    /// Backend answered with an error status; the body rides along.
    #[error("inventory service responded with HTTP {status}")]
    Http {
        status: u16,
        body: serde_json::Value,
    },

    #[error("inventory request failed: {reason}")]
    Unknown { reason: String },
}

impl BackendFailure {
    /// Whether this failure degrades to fallback data. A responsive but
    /// erroring backend is trusted over stale static data, so `Http` and
    /// `Unknown` are hard errors.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            BackendFailure::ServiceUnavailable { .. } | BackendFailure::ServiceTimeout
        )
    }
}

/// Backend health probe result, consumed by the readiness endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub healthy: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// TRAIT
// ============================================================================

/// Seam for the inventory backend so tests substitute a programmable fake.
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    /// Query stock for one product. Success returns the raw upstream
    /// payload unmodified.
    async fn query_stock(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
        bearer: Option<&str>,
    ) -> Result<serde_json::Value, BackendFailure>;

    async fn health_check(&self) -> BackendHealth;
}

// ============================================================================
// HTTP IMPLEMENTATION
// ============================================================================

/// Reqwest-based backend client with a fixed timeout.
pub struct HttpInventoryBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendFailure::Unknown {
                reason: format!("failed to build HTTP client: {}", err),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn classify(err: reqwest::Error) -> BackendFailure {
        if err.is_timeout() {
            BackendFailure::ServiceTimeout
        } else if err.is_connect() {
            BackendFailure::ServiceUnavailable {
                reason: err.to_string(),
            }
        } else {
            BackendFailure::Unknown {
                reason: err.to_string(),
            }
        }
    }
}

#[derive(Serialize)]
struct StockQueryBody<'a> {
    product_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse_id: Option<&'a str>,
}

#[async_trait]
impl InventoryBackend for HttpInventoryBackend {
    async fn query_stock(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
        bearer: Option<&str>,
    ) -> Result<serde_json::Value, BackendFailure> {
        let url = format!("{}/api/v1/stock", self.base_url);
        tracing::debug!(%url, product_id, "Querying inventory backend");

        let mut request = self.client.post(&url).json(&StockQueryBody {
            product_id,
            warehouse_id,
        });
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(Self::classify)?;
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(Self::classify)
        } else {
            let body = response
                .json()
                .await
                .unwrap_or(serde_json::Value::Null);
            Err(BackendFailure::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn health_check(&self) -> BackendHealth {
        let url = format!("{}/health", self.base_url);
        let result = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(3))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                let status = response
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("status").and_then(|s| s.as_str().map(String::from)))
                    .unwrap_or_else(|| "unknown".to_string());
                BackendHealth {
                    healthy: true,
                    status,
                    error: None,
                }
            }
            Ok(response) => BackendHealth {
                healthy: false,
                status: "unhealthy".to_string(),
                error: Some(format!("HTTP {}", response.status())),
            },
            Err(err) => BackendHealth {
                healthy: false,
                status: "unreachable".to_string(),
                error: Some(err.to_string()),
            },
        }
    }
}
