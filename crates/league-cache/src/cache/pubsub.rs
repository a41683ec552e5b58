//! Cross-instance invalidation over a single pub/sub channel.
//!
//! Notify-only: a message names a stale key and nothing else. Receivers drop
//! their local copy and cached version, and refetch on next access.
//!
//! ```text
//! Instance 1: cache.set("season:5:table", ..)
//!   ↓
//! PUBLISH multilevel-cache:invalidate {"key":"season:5:table","origin":"<id-1>"}
//!   ↓
//! Instance 2: listener evicts "season:5:table" from its local tier
//! Instance 1: listener sees its own origin and keeps its fresh copy
//! ```

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::local::LocalTier;
use super::remote::{MessageStream, RemoteTier};
use super::version::VersionTracker;
use crate::metrics;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Payload published on the invalidation channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    pub key: String,
    /// Instance id of the publisher. Absent in messages from older writers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// Publishing side of the channel.
#[derive(Clone)]
pub struct InvalidationBus {
    remote: RemoteTier,
    channel: String,
    origin: String,
}

impl InvalidationBus {
    pub fn new(remote: RemoteTier, channel: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            remote,
            channel: channel.into(),
            origin: origin.into(),
        }
    }

    /// Announce that `key` is stale. Returns `false` if the message was not sent.
    pub async fn publish(&self, key: &str) -> bool {
        let message = InvalidationMessage {
            key: key.to_string(),
            origin: Some(self.origin.clone()),
        };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode invalidation");
                return false;
            }
        };

        let sent = self.remote.publish(&self.channel, &payload).await;
        if sent {
            metrics::record_invalidation_published();
            tracing::debug!(key = %key, channel = %self.channel, "published cache invalidation");
        }
        sent
    }
}

/// Subscribing side: evicts keys named by peers.
pub struct InvalidationListener {
    pub remote: RemoteTier,
    pub channel: String,
    pub origin: String,
    pub local: Arc<LocalTier>,
    pub versions: Arc<VersionTracker>,
}

/// Keeps the listener task alive; aborts it on drop.
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl InvalidationListener {
    /// Subscribe and start processing messages in the background.
    ///
    /// The first subscription is made before returning, so every message
    /// published afterwards reaches this instance (transport permitting). If
    /// it fails, the background task keeps retrying with exponential backoff.
    pub async fn start(self) -> ListenerHandle {
        let first = self.remote.subscribe(&self.channel).await;
        if first.is_some() {
            tracing::info!(channel = %self.channel, "cache invalidation listener started");
        }
        let task = tokio::spawn(async move { self.run(first).await });
        ListenerHandle { task }
    }

    async fn run(self, first: Option<MessageStream>) {
        let mut backoff = INITIAL_BACKOFF;
        let mut stream = first;

        loop {
            if let Some(mut messages) = stream.take() {
                backoff = INITIAL_BACKOFF;
                while let Some(item) = messages.next().await {
                    match item {
                        Ok(payload) => {
                            self.handle(&payload);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to read invalidation message");
                        }
                    }
                }
                tracing::error!(
                    channel = %self.channel,
                    "invalidation subscription closed, reconnecting..."
                );
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
            stream = self.remote.subscribe(&self.channel).await;
        }
    }

    /// Apply one raw payload. Returns the evicted key, if any.
    pub fn handle(&self, payload: &str) -> Option<String> {
        let message: InvalidationMessage = match serde_json::from_str(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(payload = %payload, error = %e, "malformed invalidation message");
                return None;
            }
        };

        if message.origin.as_deref() == Some(self.origin.as_str()) {
            return None;
        }

        tracing::debug!(key = %message.key, "received cache invalidation");
        metrics::record_invalidation_received();
        self.local.delete(&message.key);
        self.versions.forget(&message.key);
        Some(message.key)
    }
}
