//! Shared key-value store abstraction
//!
//! Cache entries, rate windows, denylist entries and the audit log all live
//! in one shared store visible to every gateway instance. The store is
//! seamed behind the [`SharedStore`] trait so components receive it by
//! injection and tests substitute [`MemoryStore`]; production uses
//! [`RedisStore`] over a `redis` connection manager.
//!
//! The store serializes individual key operations (GET/SET/INCR are atomic
//! at the key level) but provides no cross-request coordination.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Store transport and protocol errors.
///
/// Callers in the request path absorb these; they never escalate to an
/// internal failure on their own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("shared store unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected value in store at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// TRAIT
// ============================================================================

/// Minimal key-value contract the gateway needs from its shared store.
///
/// `incr` is the atomic increment-and-read primitive rate windows rely on;
/// `lpush`/`lrange` back the append-only audit log (newest first).
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set `key` with a fresh TTL, overwriting wholesale.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List keys matching a glob pattern (`prefix*` or `*`).
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Atomically increment `key` and return the new value. A missing or
    /// expired key counts from zero.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;

    /// Remaining TTL in seconds; negative when the key has no expiry or
    /// does not exist (Redis TTL semantics).
    async fn ttl(&self, key: &str) -> StoreResult<i64>;

    /// Push to the head of a list.
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Inclusive range from a list; `-1` means the last element.
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    async fn ping(&self) -> StoreResult<()>;
}

// ============================================================================
// REDIS IMPLEMENTATION
// ============================================================================

/// Redis-backed store with automatic reconnection.
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis. Supports both `redis://` and `rediss://` URLs.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(StoreError::from)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(StoreError::from)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        Ok(conn.set_ex(key, value, ttl.as_secs().max(1)).await?)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, 1).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: bool = conn.expire(key, ttl.as_secs().max(1) as i64).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.ttl(key).await?)
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(key, value).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start, stop).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory store with real TTL semantics, used as the test substitute.
///
/// Time can be moved forward with [`MemoryStore::advance`] so expiry-driven
/// behavior (cache TTL, rate-window rollover, denylist self-expiry) is
/// testable without sleeping, and [`MemoryStore::set_failing`] simulates a
/// store outage to exercise absorb/fail-open paths.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    lists: Mutex<HashMap<String, Vec<String>>>,
    clock_offset: Mutex<Duration>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Move the store's clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.clock_offset.lock().expect("clock lock");
        *offset += by;
    }

    /// Make every subsequent operation fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn now(&self) -> Instant {
        Instant::now() + *self.clock_offset.lock().expect("clock lock")
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    /// Fetch an entry, evicting it lazily if its TTL elapsed.
    fn live_entry(&self, key: &str) -> Option<Entry> {
        let now = self.now();
        let mut entries = self.entries.lock().expect("entries lock");
        match entries.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|at| at <= now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    fn matches(pattern: &str, key: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        Ok(self.live_entry(key).map(|e| e.value))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check_available()?;
        let expires_at = Some(self.now() + ttl);
        self.entries.lock().expect("entries lock").insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.entries.lock().expect("entries lock").remove(key);
        self.lists.lock().expect("lists lock").remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let now = self.now();
        let entries = self.entries.lock().expect("entries lock");
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.expires_at.is_some_and(|at| at <= now))
            .map(|(k, _)| k.clone())
            .filter(|k| Self::matches(pattern, k))
            .collect();
        let lists = self.lists.lock().expect("lists lock");
        keys.extend(lists.keys().filter(|k| Self::matches(pattern, k)).cloned());
        keys.sort();
        Ok(keys)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.check_available()?;
        let now = self.now();
        // Read-modify-write under one lock acquisition; releasing between
        // the read and the write would let concurrent increments collide.
        let mut entries = self.entries.lock().expect("entries lock");
        let live = entries
            .get(key)
            .filter(|e| !e.expires_at.is_some_and(|at| at <= now));
        let (current, expires_at) = match live {
            Some(entry) => {
                let count = entry
                    .value
                    .parse::<i64>()
                    .map_err(|_| StoreError::Corrupt {
                        key: key.to_string(),
                        reason: "counter is not an integer".to_string(),
                    })?;
                (count, entry.expires_at)
            }
            None => (0, None),
        };
        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        self.check_available()?;
        let at = self.now() + ttl;
        if let Some(entry) = self.entries.lock().expect("entries lock").get_mut(key) {
            entry.expires_at = Some(at);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        self.check_available()?;
        let now = self.now();
        match self.live_entry(key) {
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => Ok(at.saturating_duration_since(now).as_secs() as i64),
            Some(_) => Ok(-1),
            None => Ok(-2),
        }
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_available()?;
        self.lists
            .lock()
            .expect("lists lock")
            .entry(key.to_string())
            .or_default()
            .insert(0, value.to_string());
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let lists = self.lists.lock().expect("lists lock");
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as isize;
        let resolve = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i
            }
        };
        let from = resolve(start).min(len) as usize;
        let to = (resolve(stop) + 1).clamp(0, len) as usize;
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(list[from..to].to_vec())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}
