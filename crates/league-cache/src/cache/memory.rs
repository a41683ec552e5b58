//! In-process remote store.
//!
//! Several cache instances sharing one `MemoryRemoteStore` behave like
//! servers sharing a Redis: values, versions and invalidation messages are
//! visible to all of them. Useful for single-binary deployments with several
//! logical caches, and for exercising cross-instance behaviour in tests.

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::remote::{MessageStream, RemoteStore};
use crate::error::{RemoteError, RemoteResult};

const CHANNEL_BUFFER: usize = 1024;

struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Shared in-memory key/value store with pub/sub.
pub struct MemoryRemoteStore {
    data: Mutex<HashMap<String, StoredValue>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    available: AtomicBool,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Switch the store on or off. While off, every operation fails with
    /// [`RemoteError::Unavailable`]; stored data is kept.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Read a raw value, bypassing availability (test inspection).
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        self.data
            .lock()
            .get(key)
            .filter(|v| !v.is_expired(now))
            .map(|v| v.data.clone())
    }

    /// Write a raw value, bypassing availability (seeding legacy data).
    pub fn put_raw(&self, key: &str, data: Vec<u8>) {
        self.data.lock().insert(
            key.to_string(),
            StoredValue {
                data,
                expires_at: None,
            },
        );
    }

    fn check(&self) -> RemoteResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable)
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER).0)
            .clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.check()?;
        let now = Instant::now();
        let mut data = self.data.lock();
        if data.get(key).is_some_and(|v| v.is_expired(now)) {
            data.remove(key);
            return Ok(None);
        }
        Ok(data.get(key).map(|v| v.data.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> RemoteResult<()> {
        self.check()?;
        self.data.lock().insert(
            key.to_string(),
            StoredValue {
                data: value.to_vec(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> RemoteResult<()> {
        self.check()?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str) -> RemoteResult<i64> {
        self.check()?;
        let now = Instant::now();
        let mut data = self.data.lock();
        let current = match data.get(key).filter(|v| !v.is_expired(now)) {
            Some(stored) => std::str::from_utf8(&stored.data)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| {
                    RemoteError::Malformed(format!("value at {key} is not an integer"))
                })?,
            None => 0,
        };
        let next = current + 1;
        data.insert(
            key.to_string(),
            StoredValue {
                data: next.to_string().into_bytes(),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> RemoteResult<bool> {
        self.check()?;
        let now = Instant::now();
        let mut data = self.data.lock();
        if data.get(key).is_some_and(|v| !v.is_expired(now)) {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            StoredValue {
                data: value.as_bytes().to_vec(),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn publish(&self, channel: &str, message: &str) -> RemoteResult<()> {
        self.check()?;
        // No receivers is not an error, same as PUBLISH to an empty channel
        let _ = self.sender(channel).send(message.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> RemoteResult<MessageStream> {
        self.check()?;
        let rx = self.sender(channel).subscribe();
        let stream = BroadcastStream::new(rx).map(|item| match item {
            Ok(message) => Ok(message),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => Err(RemoteError::Malformed(
                format!("subscriber lagged, {skipped} messages dropped"),
            )),
        });
        Ok(stream.boxed())
    }

    async fn ping(&self) -> RemoteResult<()> {
        self.check()
    }
}
