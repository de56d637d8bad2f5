//! Route store over an external key/value service.
//!
//! # Responsibilities
//! - Persist route text keyed by its content hash
//! - Namespace entries by store connection identity
//! - Expose add/remove/list behind a seam for test doubles
//!
//! # Design Decisions
//! - Hash is hex SHA-224 of the route text, so re-adding identical
//!   text overwrites the same entry (idempotent add)
//! - Removing an absent entry is a no-op, not an error
//! - Every failure maps to `StoreError::Unavailable`; callers treat
//!   it as "routing skipped this cycle", never fatal

use async_trait::async_trait;
use redis::AsyncCommands;
use sha2::{Digest, Sha224};
use thiserror::Error;

/// Marker prefix selecting deletion-by-text for `remove`.
pub const REMOVAL_MARKER: char = '-';

/// The store cannot be reached or refused the operation.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("route store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Persisted form of one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    /// Hex SHA-224 of `text`.
    pub hash: String,
    /// Route source text, exactly as added.
    pub text: String,
}

/// Deterministic digest of route text, used as its storage key.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha224::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve a `remove` argument to the hash to delete: a leading `-`
/// selects deletion-by-text (marker stripped, hash recomputed), any
/// other argument is taken as a hash already.
pub fn removal_hash(text_or_hash: &str) -> String {
    match text_or_hash.strip_prefix(REMOVAL_MARKER) {
        Some(text) => content_hash(text),
        None => text_or_hash.to_string(),
    }
}

/// Interactive add skips blank lines and `#` comments.
pub fn is_disabled_line(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Durable mapping from content hash to route text.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Store a route line. Returns the entry hash, or `None` when the
    /// line is blank/commented and was ignored.
    async fn add(&self, text: &str) -> Result<Option<String>, StoreError>;

    /// Delete an entry by `-text` or hash. Absent entries are a no-op.
    async fn remove(&self, text_or_hash: &str) -> Result<(), StoreError>;

    /// Snapshot of current entries. Order is unspecified.
    async fn list(&self) -> Result<Vec<RouteRecord>, StoreError>;
}

/// Route store backed by a Redis hash at `routes:<host>:<port>`.
pub struct RedisRouteStore {
    conn: redis::aio::MultiplexedConnection,
    namespace: String,
}

impl RedisRouteStore {
    /// Connect and derive the namespace key from the endpoint.
    ///
    /// Connection failure here is the one fatal store error: a bridge
    /// that cannot reach its store at startup has nothing to do.
    pub async fn connect(host: &str, port: u16) -> Result<Self, StoreError> {
        let client = redis::Client::open(format!("redis://{host}:{port}/"))?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            namespace: format!("routes:{host}:{port}"),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl RouteStore for RedisRouteStore {
    async fn add(&self, text: &str) -> Result<Option<String>, StoreError> {
        if is_disabled_line(text) {
            return Ok(None);
        }
        let text = text.trim();
        let hash = content_hash(text);
        let mut conn = self.conn.clone();
        let _: () = conn.hset(&self.namespace, &hash, text).await?;
        Ok(Some(hash))
    }

    async fn remove(&self, text_or_hash: &str) -> Result<(), StoreError> {
        let hash = removal_hash(text_or_hash);
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(&self.namespace, &hash).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RouteRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let entries: std::collections::HashMap<String, String> =
            conn.hgetall(&self.namespace).await?;
        Ok(entries
            .into_iter()
            .map(|(hash, text)| RouteRecord { hash, text })
            .collect())
    }
}
