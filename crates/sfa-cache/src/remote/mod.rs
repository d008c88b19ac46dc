//! # Remote Tier
//!
//! Networked cache service behind a small async seam. [`RemoteBackend`]
//! owns the connection lifecycle and health; [`RemoteStore`] is the raw
//! command surface it drives.

pub mod backend;
pub mod health;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use backend::RemoteBackend;
pub use health::BackendHealth;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryConnector, MemoryRemote};
#[cfg(feature = "redis")]
pub use redis_store::{RedisConnector, RedisStore};

/// Raw key/value commands against a connected remote cache
///
/// Values are JSON text. Implementations report every failure as an error;
/// turning failures into misses is the backend's job.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Delete every key matching a `*`-wildcard pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    /// Liveness probe
    async fn ping(&self) -> Result<()>;
}

/// Opens connections to the remote cache
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>>;

    /// Human-readable target for logs, credentials redacted
    fn target(&self) -> String;
}
