//! Cache-aside layer over the shared store
//!
//! Every operation is best-effort: a store failure is absorbed (returning
//! `None`/`false`) and logged, so a degraded cache never blocks the query
//! pipeline. The failure stays observable through `stats().connected`.
//!
//! There is no stampede protection: two concurrent misses for the same key
//! may both hit the backend and both write the cache, last writer wins.
//! Responses stay individually correct, so the inefficiency is accepted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::store::SharedStore;

/// Aggregate cache statistics for the admin surface and health checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_keys: usize,
    /// Keys under the `stock:` prefix.
    pub stock_keys: usize,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Key/value cache wrapper. Values are JSON payloads serialized wholesale;
/// entries are overwritten, never updated in place.
#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<dyn SharedStore>,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Fetch and deserialize a cached payload. Absent, expired, unreadable
    /// and unreachable all collapse to `None`.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(key, %err, "Discarding unparseable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, %err, "Cache get failed");
                None
            }
        }
    }

    /// Store a payload with a fresh TTL. Returns whether the write landed.
    pub async fn set(&self, key: &str, value: &serde_json::Value, ttl_secs: u64) -> bool {
        let raw = value.to_string();
        match self
            .store
            .set_ex(key, &raw, Duration::from_secs(ttl_secs))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, %err, "Cache set failed");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, %err, "Cache delete failed");
                false
            }
        }
    }

    /// Delete every key under a prefix (admin cache clear).
    pub async fn delete_by_prefix(&self, prefix: &str) -> bool {
        let pattern = format!("{}*", prefix);
        let keys = match self.store.keys(&pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(prefix, %err, "Cache prefix scan failed");
                return false;
            }
        };
        let mut ok = true;
        for key in keys {
            ok &= self.delete(&key).await;
        }
        ok
    }

    pub async fn stats(&self) -> CacheStats {
        match self.store.keys("*").await {
            Ok(keys) => CacheStats {
                total_keys: keys.len(),
                stock_keys: keys.iter().filter(|k| k.starts_with("stock:")).count(),
                connected: true,
                error: None,
            },
            Err(err) => CacheStats {
                total_keys: 0,
                stock_keys: 0,
                connected: false,
                error: Some(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        let cache = CacheLayer::new(store);
        let value = serde_json::json!({ "product_id": "CASCO-001", "current_stock": 250 });

        assert!(cache.set("stock:CASCO-001:all", &value, 30).await);
        assert_eq!(cache.get("stock:CASCO-001:all").await, Some(value));
        assert!(cache.delete("stock:CASCO-001:all").await);
        assert_eq!(cache.get("stock:CASCO-001:all").await, None);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = MemoryStore::new();
        let cache = CacheLayer::new(store.clone());
        let value = serde_json::json!({ "x": 1 });

        cache.set("stock:A:all", &value, 30).await;
        store.advance(Duration::from_secs(31));
        assert_eq!(cache.get("stock:A:all").await, None);
    }

    #[tokio::test]
    async fn test_store_outage_is_absorbed() {
        let store = MemoryStore::new();
        let cache = CacheLayer::new(store.clone());
        store.set_failing(true);

        assert_eq!(cache.get("stock:A:all").await, None);
        assert!(!cache.set("stock:A:all", &serde_json::json!(1), 30).await);
        assert!(!cache.delete("stock:A:all").await);

        let stats = cache.stats().await;
        assert!(!stats.connected);
        assert!(stats.error.is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefix_spares_other_keys() {
        let store = MemoryStore::new();
        let cache = CacheLayer::new(store.clone());
        let v = serde_json::json!(1);
        cache.set("stock:A:all", &v, 30).await;
        cache.set("stock:B:all", &v, 30).await;
        cache.set("blacklist:1.2.3.4", &v, 30).await;

        assert!(cache.delete_by_prefix("stock:").await);

        let stats = cache.stats().await;
        assert_eq!(stats.stock_keys, 0);
        assert_eq!(stats.total_keys, 1);
    }

    #[tokio::test]
    async fn test_unparseable_entry_reads_as_miss() {
        let store = MemoryStore::new();
        store
            .set_ex("stock:A:all", "not-json{", Duration::from_secs(30))
            .await
            .unwrap();
        let cache = CacheLayer::new(store);
        assert_eq!(cache.get("stock:A:all").await, None);
    }

    #[tokio::test]
    async fn test_set_overwrites_wholesale() {
        let store = MemoryStore::new();
        let cache = CacheLayer::new(store);
        cache.set("k", &serde_json::json!({ "a": 1, "b": 2 }), 30).await;
        cache.set("k", &serde_json::json!({ "a": 9 }), 30).await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!({ "a": 9 })));
    }
}
