//! Lookup cache backends for gatekey.
//!
//! Provides the [`CacheBackend`] implementation of the
//! `gatekey_auth::LookupCache` contract, in two modes:
//!
//! - **Redis**: shared cache via a deadpool connection pool, TTL enforced
//!   server-side with `SETEX`
//! - **Local**: in-process DashMap, for single-instance deployments and
//!   tests
//!
//! ## Graceful Degradation
//!
//! [`create_cache_backend`] falls back to local mode when Redis is
//! disabled or unreachable, so the service starts and keeps answering
//! even without its cache tier.

pub mod backend;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use backend::{CacheBackend, CachedEntry};

// =============================================================================
// Configuration
// =============================================================================

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades without it)
    /// Default: false (disabled for single-instance deployments)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

// =============================================================================
// Backend Construction
// =============================================================================

/// Create a cache backend based on configuration.
///
/// - Redis disabled: local-only backend
/// - Redis enabled: connect via deadpool; fall back to local mode if the
///   pool cannot be created or no connection can be established
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    if let Some(ref mut pool_config) = redis_config.pool {
        pool_config.max_size = config.pool_size;
        pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
        pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
        pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    }

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool, falling back to local cache");
            return CacheBackend::new_local();
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            CacheBackend::new_redis(pool)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable, falling back to local cache");
            CacheBackend::new_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_defaults() {
        let cfg = RedisConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.url, "redis://localhost:6379");
        assert_eq!(cfg.pool_size, 10);
        assert_eq!(cfg.timeout_ms, 5000);
    }

    #[tokio::test]
    async fn test_disabled_redis_yields_local_backend() {
        let backend = create_cache_backend(&RedisConfig::default()).await;
        assert_eq!(backend.mode(), "local");
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back_to_local() {
        let config = RedisConfig {
            enabled: true,
            // Nothing listens here; connection creation must fail fast
            url: "redis://127.0.0.1:1".to_string(),
            timeout_ms: 200,
            ..RedisConfig::default()
        };
        let backend = create_cache_backend(&config).await;
        assert_eq!(backend.mode(), "local");
    }
}
