pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;

pub use cache::{
    CacheMode, CacheStats, CachedValue, KeySpace, MemoryRemoteStore, MultiLevelCache,
    RedisRemoteStore, RemoteStore,
};
pub use config::{CacheConfig, RemoteConfig};
pub use error::{CacheError, RemoteError};
pub use observability::{init_tracing, init_tracing_with_level};

use std::sync::Arc;

/// Create a cache based on configuration.
///
/// ## Cache Modes
///
/// - **Remote disabled**: Returns a local-only cache
/// - **Remote enabled**: Connects to Redis, falls back to local-only on failure
///
/// ## Graceful Degradation
///
/// If the Redis connection fails, the cache starts in local-only mode so the
/// application can run without the shared tier.
pub async fn create_cache(config: &CacheConfig) -> MultiLevelCache {
    match connect_redis(config).await {
        Some(store) => MultiLevelCache::new_remote(config, store).await,
        None => MultiLevelCache::new_local(config),
    }
}

/// Build a Redis store from configuration, probing one connection.
///
/// Returns `None` (after logging why) when the remote tier is disabled or
/// cannot be reached.
pub async fn connect_redis(config: &CacheConfig) -> Option<Arc<dyn RemoteStore>> {
    let remote = &config.remote;
    if !remote.enabled {
        tracing::info!("Remote cache disabled, using local cache only");
        return None;
    }

    tracing::info!(url = %remote.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&remote.url);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| deadpool_redis::PoolConfig::new(remote.pool_size));
    pool_config.max_size = remote.pool_size;
    pool_config.timeouts.wait = Some(remote.timeout());
    pool_config.timeouts.create = Some(remote.timeout());
    pool_config.timeouts.recycle = Some(remote.timeout());

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return None;
        }
    };

    if let Err(e) = pool.get().await {
        tracing::warn!(
            error = %e,
            "Failed to connect to Redis. Falling back to local cache."
        );
        return None;
    }

    match RedisRemoteStore::new(pool, &remote.url) {
        Ok(store) => {
            tracing::info!("Connected to Redis successfully");
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Invalid Redis URL. Falling back to local cache."
            );
            None
        }
    }
}
