//! Publish and key-write effects against the external store.
//!
//! The trait is the seam: the dispatcher only sees these three
//! operations, so tests substitute a recording double and the
//! bridge hands in the Redis-backed implementation.

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;

/// The publish/key-write side could not be reached.
#[derive(Debug, Clone, Error)]
#[error("transport unavailable: {0}")]
pub struct TransportError(pub String);

impl From<redis::RedisError> for TransportError {
    fn from(err: redis::RedisError) -> Self {
        TransportError(err.to_string())
    }
}

/// Outbound effects a route can have against the channel/key space.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish text on a pub/sub channel. Fire-and-forget.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError>;

    /// Overwrite a key's value.
    async fn set_value(&self, key: &str, value: &str) -> Result<(), TransportError>;

    /// Overwrite one field of a hash, leaving sibling fields untouched.
    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), TransportError>;
}

/// Redis-backed transport shared by the dispatcher and the broker
/// mirror path.
#[derive(Clone)]
pub struct RedisTransport {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisTransport {
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let client = redis::Client::open(format!("redis://{host}:{port}/"))?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), TransportError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), TransportError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }
}
