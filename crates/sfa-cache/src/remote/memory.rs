//! In-process stand-in for the remote tier.
//!
//! Behaves like a shared Redis instance (per-key expiry, `*` pattern
//! deletes) and can be switched into failure at any time, which makes the
//! backend's health transitions observable without a live server. Only
//! built for tests and with the `test-utils` feature.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{RemoteConnector, RemoteStore};
use crate::config::clamp_ttl;
use crate::error::{CacheError, Result};
use crate::invalidation::matches_pattern;

/// Shared in-memory remote store
#[derive(Debug, Default)]
pub struct MemoryRemote {
    entries: DashMap<String, (String, Instant)>,
    failing: AtomicBool,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent command fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| Instant::now() < entry.1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Connection("connection reset by peer".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        let now = Instant::now();
        self.entries.remove_if(key, |_, (_, expires_at)| now >= *expires_at);
        Ok(self.entries.get(key).map(|entry| entry.0.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check()?;
        let ttl = clamp_ttl(ttl);
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        self.check()?;
        let removed = keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        self.check()?;
        let mut removed = 0_u64;
        self.entries.retain(|key, _| {
            let matched = matches_pattern(pattern, key);
            removed += u64::from(matched);
            !matched
        });
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

/// Connector handing out a shared [`MemoryRemote`]
#[derive(Debug, Default)]
pub struct MemoryConnector {
    store: Arc<MemoryRemote>,
    refusing: AtomicBool,
    attempts: AtomicU32,
}

impl MemoryConnector {
    #[must_use]
    pub fn new(store: Arc<MemoryRemote>) -> Self {
        Self {
            store,
            refusing: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    /// A connector whose every connection attempt is refused
    #[must_use]
    pub fn unreachable() -> Self {
        let connector = Self::default();
        connector.set_refusing(true);
        connector
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Connection attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> Arc<MemoryRemote> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("connection refused".into()));
        }
        Ok(self.store())
    }

    fn target(&self) -> String {
        "memory://".to_string()
    }
}
