//! Redis-backed remote store.
//!
//! Commands go through a `deadpool-redis` pool; subscriptions open a
//! dedicated pub/sub connection from a plain `redis::Client`, since pooled
//! connections cannot enter subscriber mode.

use async_trait::async_trait;
use deadpool_redis::Pool;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::time::Duration;

use super::remote::{MessageStream, RemoteStore};
use crate::error::{RemoteError, RemoteResult};

pub struct RedisRemoteStore {
    pool: Pool,
    client: redis::Client,
}

impl RedisRemoteStore {
    pub fn new(pool: Pool, url: &str) -> RemoteResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { pool, client })
    }

    async fn conn(&self) -> RemoteResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> RemoteResult<()> {
        let mut conn = self.conn().await?;
        match ttl.map(|ttl| ttl.as_secs().max(1)) {
            Some(secs) => conn.set_ex::<_, _, ()>(key, value, secs).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        tracing::debug!(key = %key, ttl = ?ttl, "redis SET");
        Ok(())
    }

    async fn del(&self, key: &str) -> RemoteResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> RemoteResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.incr::<_, _, i64>(key, 1).await?)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> RemoteResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.set_nx::<_, _, bool>(key, value).await?)
    }

    async fn publish(&self, channel: &str, message: &str) -> RemoteResult<()> {
        let mut conn = self.conn().await?;
        conn.publish::<_, _, ()>(channel, message).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> RemoteResult<MessageStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        tracing::info!(channel = %channel, "subscribed to invalidation channel");

        let stream = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload::<String>().map_err(RemoteError::from));
        Ok(stream.boxed())
    }

    async fn ping(&self) -> RemoteResult<()> {
        // The pool pings on recycle, so acquiring a connection is the probe
        self.conn().await.map(|_| ())
    }
}
