//! Typed views over a shared cache.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use super::facade::{CachedValue, MultiLevelCache};
use crate::error::CacheError;

/// A namespace of keys that all hold values of type `T`.
///
/// Keys are stored as `"<namespace>:<key>"`, so `KeySpace::new(cache, "season")`
/// with key `"5:table"` addresses `"season:5:table"`.
pub struct KeySpace<T> {
    cache: Arc<MultiLevelCache>,
    namespace: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for KeySpace<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            namespace: self.namespace.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> KeySpace<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(cache: Arc<MultiLevelCache>, namespace: impl Into<String>) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
            _marker: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full cache key for `key`.
    pub fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub async fn get<F, Fut, E>(&self, key: &str, loader: F, ttl: Option<Duration>) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cache.get(&self.key(key), loader, ttl).await
    }

    pub async fn get_with_meta<F, Fut, E>(
        &self,
        key: &str,
        loader: F,
        ttl: Option<Duration>,
    ) -> Result<CachedValue<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cache.get_with_meta(&self.key(key), loader, ttl).await
    }

    pub async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<u64, CacheError> {
        self.cache.set(&self.key(key), value, ttl).await
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(&self.key(key)).await
    }
}
