//! Shared remote tier.
//!
//! [`RemoteStore`] is the seam for concrete backends (Redis, in-memory).
//! [`RemoteTier`] wraps a store and turns every failure into "remote
//! unavailable for this call": the error is logged and counted, and the
//! caller sees `None`/`false`. Nothing above this module handles
//! [`RemoteError`].

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RemoteError, RemoteResult};
use crate::metrics;

/// Stream of raw pub/sub payloads.
pub type MessageStream = BoxStream<'static, RemoteResult<String>>;

/// Operations a shared key/value store must offer.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend name for logs and stats.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Store `value`, expiring after `ttl` when one is given.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> RemoteResult<()>;

    async fn del(&self, key: &str) -> RemoteResult<()>;

    /// Atomically increment an integer key (missing keys count as 0).
    async fn increment(&self, key: &str) -> RemoteResult<i64>;

    /// Set `key` to `value` unless it already exists. Returns whether it was set.
    async fn set_if_absent(&self, key: &str, value: &str) -> RemoteResult<bool>;

    async fn publish(&self, channel: &str, message: &str) -> RemoteResult<()>;

    /// Subscribe to `channel`. The returned stream ends or yields an error
    /// when the subscription is lost.
    async fn subscribe(&self, channel: &str) -> RemoteResult<MessageStream>;

    /// Health probe.
    async fn ping(&self) -> RemoteResult<()>;
}

/// Best-effort facade over a [`RemoteStore`].
///
/// Every call is bounded by `timeout`; a store that does not answer in time
/// counts as unavailable for that call.
#[derive(Clone)]
pub struct RemoteTier {
    store: Arc<dyn RemoteStore>,
    timeout: Duration,
}

impl RemoteTier {
    pub fn new(store: Arc<dyn RemoteStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.call("get", key, self.store.get(key)).await.flatten()
    }

    /// Returns `false` if the write did not reach the store.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> bool {
        self.call("set", key, self.store.set(key, value, ttl))
            .await
            .is_some()
    }

    pub async fn del(&self, key: &str) -> bool {
        self.call("del", key, self.store.del(key)).await.is_some()
    }

    pub async fn increment(&self, key: &str) -> Option<i64> {
        self.call("increment", key, self.store.increment(key)).await
    }

    pub async fn set_if_absent(&self, key: &str, value: &str) -> Option<bool> {
        self.call("set_if_absent", key, self.store.set_if_absent(key, value))
            .await
    }

    pub async fn publish(&self, channel: &str, message: &str) -> bool {
        self.call("publish", channel, self.store.publish(channel, message))
            .await
            .is_some()
    }

    pub async fn subscribe(&self, channel: &str) -> Option<MessageStream> {
        self.call("subscribe", channel, self.store.subscribe(channel))
            .await
    }

    pub async fn is_available(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.store.ping()).await,
            Ok(Ok(()))
        )
    }

    async fn call<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = RemoteResult<T>>,
    ) -> Option<T> {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.timeout)),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                failed(op, key, &e);
                None
            }
        }
    }
}

fn failed(op: &'static str, key: &str, error: &RemoteError) {
    tracing::warn!(op, key = %key, error = %error, "remote cache operation failed");
    metrics::record_remote_error(op);
}
