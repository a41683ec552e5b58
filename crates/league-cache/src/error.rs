//! Error types for the multi-level cache.
//!
//! Only two kinds of failure ever leave this crate: loader errors (returned
//! unchanged by [`MultiLevelCache::get`](crate::MultiLevelCache::get)) and
//! [`CacheError`] for values that cannot be serialized or configuration that
//! does not validate. Remote failures are represented by [`RemoteError`] and
//! stop at the [`RemoteTier`](crate::cache::remote::RemoteTier) boundary.

use std::time::Duration;
use thiserror::Error;

/// Result type for remote store operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors surfaced to callers of the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Value could not be converted to or from its JSON form
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration failed validation or could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of a shared remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No pooled connection could be acquired
    #[error("failed to get Redis connection: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Command failed on the wire or returned an unexpected reply
    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// Store is switched off or unreachable
    #[error("remote store unavailable")]
    Unavailable,

    /// Store did not answer within the configured timeout
    #[error("remote operation timed out after {0:?}")]
    Timeout(Duration),

    /// Stored data did not have the expected shape
    #[error("malformed remote data: {0}")]
    Malformed(String),
}
