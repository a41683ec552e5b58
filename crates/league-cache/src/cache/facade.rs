//! Read-through / write-through orchestration of the cache tiers.

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::envelope::{self, CacheEntry, DecodeError, Decoded};
use super::fingerprint::fingerprint;
use super::local::LocalTier;
use super::pubsub::{InvalidationBus, InvalidationListener, ListenerHandle};
use super::remote::{RemoteStore, RemoteTier};
use super::version::VersionTracker;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics;

/// A value read through the cache together with its tracked version.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    pub value: T,
    pub version: u64,
}

/// Whether the cache has a shared remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Single instance: local tier and process-local versions only
    Local,
    /// Local tier in front of a shared remote store
    Remote,
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Local => write!(f, "local"),
            CacheMode::Remote => write!(f, "remote"),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub mode: CacheMode,
    /// Backend name of the remote tier ("redis", "memory")
    pub remote: Option<&'static str>,
    pub local_entries: usize,
    pub local_capacity: usize,
    pub tracked_versions: usize,
}

/// Multi-level cache: bounded local LRU, optional shared remote store,
/// fingerprint-driven versions and pub/sub invalidation.
///
/// ## Lookup Order
///
/// ```text
/// get(key) → local tier → remote tier → loader
/// ```
///
/// Every store (load or `set`) writes both tiers and bumps the version only
/// if the fingerprint changed. `set` and `invalidate` additionally tell peer
/// instances to drop their local copy; a load does not.
///
/// Remote failures never reach the caller: the cache quietly becomes
/// slower (more loader calls) instead. Concurrent misses on the same key each
/// run the loader.
pub struct MultiLevelCache {
    instance_id: String,
    local: Arc<LocalTier>,
    versions: Arc<VersionTracker>,
    remote: Option<RemoteTier>,
    bus: Option<InvalidationBus>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
    default_ttl: Option<Duration>,
    _listener: Option<ListenerHandle>,
}

impl MultiLevelCache {
    /// Create a cache with no remote tier.
    pub fn new_local(config: &CacheConfig) -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            local: Arc::new(LocalTier::new(config.local_capacity)),
            versions: Arc::new(VersionTracker::new(config.version_prefix.clone(), None)),
            remote: None,
            bus: None,
            write_locks: DashMap::new(),
            default_ttl: config.default_ttl(),
            _listener: None,
        }
    }

    /// Create a cache backed by `store`, subscribing to the invalidation
    /// channel before returning.
    pub async fn new_remote(config: &CacheConfig, store: Arc<dyn RemoteStore>) -> Self {
        let instance_id = uuid::Uuid::new_v4().to_string();
        let remote = RemoteTier::new(store, config.remote.timeout());
        let local = Arc::new(LocalTier::new(config.local_capacity));
        let versions = Arc::new(VersionTracker::new(
            config.version_prefix.clone(),
            Some(remote.clone()),
        ));

        let listener = InvalidationListener {
            remote: remote.clone(),
            channel: config.channel.clone(),
            origin: instance_id.clone(),
            local: local.clone(),
            versions: versions.clone(),
        }
        .start()
        .await;

        let bus = InvalidationBus::new(remote.clone(), config.channel.clone(), instance_id.clone());

        Self {
            instance_id,
            local,
            versions,
            remote: Some(remote),
            bus: Some(bus),
            write_locks: DashMap::new(),
            default_ttl: config.default_ttl(),
            _listener: Some(listener),
        }
    }

    /// Read `key`, running `loader` on a miss.
    ///
    /// Loader errors are returned unchanged; nothing else fails.
    pub async fn get<T, F, Fut, E>(
        &self,
        key: &str,
        loader: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Ok(self.get_with_meta(key, loader, ttl).await?.value)
    }

    /// Like [`get`](Self::get), also returning the tracked version (usable as
    /// an ETag by downstream clients).
    pub async fn get_with_meta<T, F, Fut, E>(
        &self,
        key: &str,
        loader: F,
        ttl: Option<Duration>,
    ) -> Result<CachedValue<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // 1. Local tier
        if let Some(entry) = self.local.get(key) {
            match T::deserialize(&*entry.value) {
                Ok(value) => {
                    tracing::debug!(key = %key, "cache hit (local)");
                    metrics::record_cache_hit("local");
                    let version = self.versions.ensure_version(key).await;
                    return Ok(CachedValue { value, version });
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "local entry has unexpected shape, dropping");
                    self.local.delete(key);
                }
            }
        }

        // 2. Remote tier
        if let Some(entry) = self.fetch_remote(key).await {
            match T::deserialize(&*entry.value) {
                Ok(value) => {
                    tracing::debug!(key = %key, "cache hit (remote)");
                    metrics::record_cache_hit("remote");
                    self.local.set(key, entry);
                    metrics::set_local_entries(self.local.len());
                    let version = self.versions.ensure_version(key).await;
                    return Ok(CachedValue { value, version });
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "remote entry has unexpected shape, reloading");
                }
            }
        }

        // 3. Loader
        tracing::debug!(key = %key, "cache miss");
        metrics::record_cache_miss();
        metrics::record_loader_call();
        let value = loader().await?;

        let version = match fingerprint(&value) {
            Ok((json, fp)) => self.store(key, json, fp, ttl).await,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "loaded value is not serializable, not caching");
                self.versions.ensure_version(key).await
            }
        };

        Ok(CachedValue { value, version })
    }

    /// Write `value` to every tier and tell peers their copy is stale.
    ///
    /// Returns the version after the write. Fails only if `value` cannot be
    /// serialized, in which case no tier is touched.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<u64, CacheError>
    where
        T: Serialize + ?Sized,
    {
        let (json, fp) = fingerprint(value)?;
        let version = self.store(key, json, fp, ttl).await;

        if let Some(bus) = &self.bus {
            bus.publish(key).await;
        }
        Ok(version)
    }

    /// Remove `key` and its version everywhere and tell peers.
    pub async fn invalidate(&self, key: &str) {
        let lock = self.write_lock(key);
        {
            let _guard = lock.lock().await;

            self.local.delete(key);
            if let Some(remote) = &self.remote {
                remote.del(key).await;
            }
            self.versions.delete(key).await;
            metrics::set_local_entries(self.local.len());

            if let Some(bus) = &self.bus {
                bus.publish(key).await;
            }
        }
        self.release_write_lock(key, lock);
        tracing::debug!(key = %key, "cache invalidated");
    }

    /// Local-only probe; does not touch recency.
    pub fn contains_local(&self, key: &str) -> bool {
        self.local.has(key)
    }

    /// Locally cached version of `key`, without consulting the remote tier.
    pub fn tracked_version(&self, key: &str) -> Option<u64> {
        self.versions.cached(key)
    }

    /// Drop all local entries and cached versions. The remote tier is untouched.
    pub fn clear_local(&self) {
        self.local.clear();
        self.versions.clear();
        metrics::set_local_entries(0);
    }

    pub fn mode(&self) -> CacheMode {
        if self.remote.is_some() {
            CacheMode::Remote
        } else {
            CacheMode::Local
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            mode: self.mode(),
            remote: self.remote.as_ref().map(RemoteTier::name),
            local_entries: self.local.len(),
            local_capacity: self.local.capacity(),
            tracked_versions: self.versions.len(),
        }
    }

    /// Check if the remote tier answers (for health checks).
    pub async fn is_remote_available(&self) -> bool {
        match &self.remote {
            Some(remote) => remote.is_available().await,
            None => false,
        }
    }

    async fn fetch_remote(&self, key: &str) -> Option<CacheEntry> {
        let bytes = self.remote.as_ref()?.get(key).await?;
        match envelope::decode(&bytes) {
            Ok(Decoded::Envelope(entry)) => Some(entry),
            Ok(Decoded::Legacy(entry)) => {
                tracing::debug!(key = %key, "read legacy value without envelope");
                Some(entry)
            }
            Err(DecodeError::Malformed(reason)) => {
                tracing::warn!(key = %key, reason = %reason, "malformed remote value, treating as miss");
                None
            }
            Err(DecodeError::UnknownSchema(schema)) => {
                tracing::warn!(key = %key, schema = %schema, "unknown envelope schema, treating as miss");
                None
            }
        }
    }

    /// Shared write path of loads and `set`.
    async fn store(
        &self,
        key: &str,
        value: serde_json::Value,
        fingerprint: String,
        ttl: Option<Duration>,
    ) -> u64 {
        let ttl = ttl.or(self.default_ttl);
        let lock = self.write_lock(key);
        let version = {
            let _guard = lock.lock().await;

            let previous = self.local.peek(key).map(|entry| entry.fingerprint);
            let entry = CacheEntry::new(value, fingerprint);
            self.local.set(key, entry.clone());
            metrics::set_local_entries(self.local.len());

            if let Some(remote) = &self.remote {
                match envelope::encode(&entry) {
                    Ok(bytes) => {
                        remote.set(key, &bytes, ttl).await;
                    }
                    Err(e) => tracing::warn!(key = %key, error = %e, "failed to encode envelope"),
                }
            }

            self.versions
                .bump_version(key, &entry.fingerprint, previous.as_deref())
                .await
        };
        self.release_write_lock(key, lock);
        version
    }

    fn write_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.write_locks.entry(key.to_string()).or_default().clone()
    }

    fn release_write_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.write_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
