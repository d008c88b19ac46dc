//! Cache warming: populate a batch of report keys ahead of traffic.

use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, join_all};
use serde::Serialize;
use tracing::{info, warn};

use super::ReportCache;

/// Value produced by a warm-up fetcher
pub type WarmResult = Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>>;

type Fetcher = Box<dyn FnOnce() -> BoxFuture<'static, WarmResult> + Send>;

/// One key to warm: where to store it, for how long, and how to fetch it
pub struct WarmEntry {
    key: String,
    ttl: Option<Duration>,
    fetch: Fetcher,
}

impl std::fmt::Debug for WarmEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmEntry")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl WarmEntry {
    pub fn new<F, Fut>(key: impl Into<String>, ttl: Option<Duration>, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = WarmResult> + Send + 'static,
    {
        Self {
            key: key.into(),
            ttl,
            fetch: Box::new(move || fetch().boxed()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Outcome counts of a warm-up run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmSummary {
    pub populated: usize,
    pub already_cached: usize,
    pub failed: usize,
}

enum Warmed {
    Populated,
    AlreadyCached,
    Failed,
}

impl ReportCache {
    /// Populate every absent key concurrently.
    ///
    /// A fetcher error, or a value the cache could not store, counts as
    /// failed and does not affect the other entries.
    pub async fn warm(&self, entries: Vec<WarmEntry>) -> WarmSummary {
        let results = join_all(entries.into_iter().map(|entry| self.warm_one(entry))).await;

        let summary = results.into_iter().fold(WarmSummary::default(), |mut acc, warmed| {
            match warmed {
                Warmed::Populated => acc.populated += 1,
                Warmed::AlreadyCached => acc.already_cached += 1,
                Warmed::Failed => acc.failed += 1,
            }
            acc
        });
        info!(
            populated = summary.populated,
            already_cached = summary.already_cached,
            failed = summary.failed,
            "Cache warm-up finished"
        );
        summary
    }

    async fn warm_one(&self, entry: WarmEntry) -> Warmed {
        let WarmEntry { key, ttl, fetch } = entry;
        if self.lookup_raw(&key).await.is_hit() {
            return Warmed::AlreadyCached;
        }

        match fetch().await {
            Ok(value) => {
                let outcome = self.set(&key, &value, ttl).await;
                if outcome.is_applied() {
                    Warmed::Populated
                } else {
                    Warmed::Failed
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache warm-up fetch failed");
                Warmed::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[tokio::test]
    async fn test_warm_is_settled() {
        let cache = ReportCache::fallback_only(CacheConfig::default());
        cache.initialize().await;
        cache.set("dashboard:kpi", &1, None).await;

        let summary = cache
            .warm(vec![
                WarmEntry::new("dashboard:kpi", None, || async { Ok(serde_json::json!(2)) }),
                WarmEntry::new("sales:trend:7", None, || async { Ok(serde_json::json!([1, 2])) }),
                WarmEntry::new("customers:top:10", None, || async {
                    Err("query timed out".into())
                }),
            ])
            .await;

        assert_eq!(
            summary,
            WarmSummary {
                populated: 1,
                already_cached: 1,
                failed: 1,
            }
        );
        assert_eq!(cache.get::<u32>("dashboard:kpi").await, Some(1));
        assert_eq!(cache.get::<Vec<u32>>("sales:trend:7").await, Some(vec![1, 2]));
        assert_eq!(cache.get::<serde_json::Value>("customers:top:10").await, None);
    }
}
