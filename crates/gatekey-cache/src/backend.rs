//! Cache backend implementations.
//!
//! Two modes behind one type: a Redis-backed cache for shared deployments
//! and a local in-process map for single-instance setups and tests. Both
//! satisfy the [`LookupCache`] contract: absence on read is identical
//! whether the key was never written, expired, evicted, or the backend
//! read failed; only writes report failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use gatekey_auth::{CacheError, LookupCache};

/// A locally cached entry with its expiry bookkeeping.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Vec<u8>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    #[must_use]
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Lookup cache backend.
///
/// - **Local**: in-process DashMap with passive TTL expiry
/// - **Redis**: shared cache, TTL enforced by Redis `SETEX`
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Shared across instances
    Redis(Pool),
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    #[must_use]
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    #[must_use]
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis(redis_pool)
    }

    /// Backend mode label for diagnostics and readiness reporting.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis(_) => "redis",
        }
    }

    /// Number of live entries in local mode (expired entries included
    /// until their next read).
    #[must_use]
    pub fn local_entries(&self) -> Option<usize> {
        match self {
            CacheBackend::Local(map) => Some(map.len()),
            CacheBackend::Redis(_) => None,
        }
    }

    /// Check whether the Redis backend can hand out a connection.
    pub async fn is_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => true,
            CacheBackend::Redis(pool) => pool.get().await.is_ok(),
        }
    }
}

#[async_trait]
impl LookupCache for CacheBackend {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self {
            CacheBackend::Local(map) => {
                if let Some(entry) = map.get(key) {
                    if !entry.is_expired() {
                        return Some(entry.data.clone());
                    }
                    // Expired: remove on read, expiry is otherwise passive
                    drop(entry);
                    map.remove(key);
                }
                None
            }
            CacheBackend::Redis(pool) => match pool.get().await {
                Ok(mut conn) => match conn.get::<_, Option<Vec<u8>>>(key).await {
                    Ok(Some(data)) => Some(data),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Redis GET error, treating as miss");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get Redis connection, treating as miss");
                    None
                }
            },
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
                Ok(())
            }
            CacheBackend::Redis(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| CacheError(e.to_string()))?;
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
                    .await
                    .map_err(|e| CacheError(e.to_string()))
            }
        }
    }
}
