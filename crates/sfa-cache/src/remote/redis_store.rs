//! # Redis Store
//!
//! `ConnectionManager`-backed [`RemoteStore`] with key namespacing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo};
use tracing::debug;

use super::{RemoteConnector, RemoteStore};
use crate::config::{RedisSettings, clamp_ttl};
use crate::error::Result;

/// Keys scanned per `SCAN` round trip during pattern deletes
const SCAN_BATCH: usize = 100;

/// Redis store with connection pooling
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("conn", &"ConnectionManager")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisStore {
    /// Connect using the given settings
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the first
    /// connection fails.
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        let mut info = (settings.host.as_str(), settings.port).into_connection_info()?;
        info.redis.db = settings.db;
        info.redis.password.clone_from(&settings.password);

        let client = Client::open(info)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            key_prefix: settings.key_prefix.clone(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        debug!(key = key, hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero or out-of-range expiry
        let ttl_seconds = clamp_ttl(ttl).as_secs();
        let _: () = conn.set_ex(self.namespaced(key), value, ttl_seconds).await?;
        debug!(key = key, ttl_seconds, "Redis SETEX");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let namespaced: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();
        let deleted: u64 = conn.del(namespaced).await?;
        debug!(requested = keys.len(), deleted, "Redis DEL");
        Ok(deleted)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let namespaced = self.namespaced(pattern);
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;

        // SCAN returns fully-qualified keys, so they are deleted as-is
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&namespaced)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let count: u64 = conn.del(&keys).await?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = pattern, deleted, "Redis pattern DEL");
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(crate::error::CacheError::Backend(format!(
                "unexpected PING reply: {pong}"
            )))
        }
    }
}

/// Opens [`RedisStore`] connections from settings
#[derive(Debug, Clone)]
pub struct RedisConnector {
    settings: RedisSettings,
}

impl RedisConnector {
    #[must_use]
    pub const fn new(settings: RedisSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl RemoteConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>> {
        let store = RedisStore::connect(&self.settings).await?;
        Ok(Arc::new(store))
    }

    fn target(&self) -> String {
        self.settings.display_target()
    }
}
