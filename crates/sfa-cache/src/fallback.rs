//! # Fallback Store
//!
//! In-process cache used while the remote tier is unavailable.
//!
//! Expired entries are evicted lazily: every read, write and pattern
//! operation sweeps the map first. There is no background task. Data held
//! here is local to this process and lost on restart.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{DEFAULT_TTL, clamp_ttl};
use crate::invalidation::matches_pattern;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local key/value store with per-entry expiry
#[derive(Debug)]
pub struct FallbackStore {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FallbackStore {
    /// Create a store applying `default_ttl` to writes without a TTL
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.sweep_expired_at(now);

        let value = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        debug!(key = key, hit = value.is_some(), "Fallback GET");
        value
    }

    /// Store `value`, replacing any existing entry for `key`.
    /// The TTL is clamped to [`crate::config::MAX_TTL`].
    pub fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = clamp_ttl(ttl.unwrap_or(self.default_ttl));
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
        self.sweep_expired_at(now);
        debug!(key = key, ttl_seconds = ttl.as_secs(), "Fallback SET");
    }

    /// Delete keys; missing keys are ignored. Returns the number removed.
    pub fn delete<S: AsRef<str>>(&self, keys: &[S]) -> u64 {
        let removed = keys
            .iter()
            .filter(|key| {
                let key: &str = key.as_ref();
                self.entries.remove(key).is_some()
            })
            .count() as u64;
        debug!(requested = keys.len(), removed, "Fallback DEL");
        removed
    }

    /// Delete every key matching a `*`-wildcard pattern
    pub fn delete_by_pattern(&self, pattern: &str) -> u64 {
        self.sweep_expired_at(Instant::now());

        let mut removed = 0_u64;
        self.entries.retain(|key, _| {
            let matched = matches_pattern(pattern, key);
            removed += u64::from(matched);
            !matched
        });

        debug!(pattern = pattern, removed, "Fallback pattern DEL");
        removed
    }

    /// Drop every expired entry
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut swept = 0;
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(now);
            swept += usize::from(expired);
            !expired
        });
        swept
    }

    /// Live keys, for diagnostics
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Option<Duration> {
        Some(Duration::from_secs(n))
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get() {
        let store = FallbackStore::default();
        store.set("dashboard:kpi", r#"{"sales":100}"#.into(), secs(300));
        assert_eq!(store.get("dashboard:kpi").as_deref(), Some(r#"{"sales":100}"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let store = FallbackStore::default();
        store.set("k", "v".into(), secs(300));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.get("k").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies_when_omitted() {
        let store = FallbackStore::new(Duration::from_secs(60));
        store.set("k", "v".into(), None);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("k").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_value_and_expiry() {
        let store = FallbackStore::default();
        store.set("k", "old".into(), secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        store.set("k", "new".into(), secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(store.get("k").as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_other_expired_entries() {
        let store = FallbackStore::default();
        store.set("short", "a".into(), secs(5));
        store.set("long", "b".into(), secs(500));
        assert_eq!(store.len(), 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        store.set("another", "c".into(), secs(500));

        assert_eq!(store.len(), 2);
        assert!(!store.keys().contains(&"short".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_ttl_is_clamped() {
        let store = FallbackStore::default();
        store.set("k", "v".into(), Some(Duration::MAX));
        store.set("j", "v".into(), secs(u64::MAX));

        tokio::time::advance(crate::config::MAX_TTL - Duration::from_secs(1)).await;
        assert!(store.get("k").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").is_none());
        assert!(store.get("j").is_none());
    }

    #[test]
    fn test_delete_ignores_missing_keys() {
        let store = FallbackStore::default();
        store.set("a", "1".into(), None);
        store.set("b", "2".into(), None);

        assert_eq!(store.delete(&["a", "missing"]), 1);
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_some());
    }

    #[test]
    fn test_delete_by_pattern() {
        let store = FallbackStore::default();
        store.set("sales:trend:7", "1".into(), None);
        store.set("sales:trend:30", "2".into(), None);
        store.set("customers:top:10", "3".into(), None);

        assert_eq!(store.delete_by_pattern("sales:trend:*"), 2);
        assert!(store.get("sales:trend:7").is_none());
        assert!(store.get("customers:top:10").is_some());
    }

    #[test]
    fn test_clear() {
        let store = FallbackStore::default();
        store.set("a", "1".into(), None);
        store.clear();
        assert!(store.is_empty());
    }
}
