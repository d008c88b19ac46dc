//! Operation counters and the stats snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ReportCache;
use crate::outcome::{Lookup, WriteOutcome};
use crate::remote::{BackendHealth, RemoteBackend};

#[derive(Debug, Default)]
pub(super) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    writes: AtomicU64,
}

impl Counters {
    pub(super) fn record_read<T>(&self, lookup: &Lookup<T>) {
        let counter = match lookup {
            Lookup::Hit(..) => &self.hits,
            Lookup::Miss(_) => &self.misses,
            Lookup::Failed(_) => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_write(&self, outcome: &WriteOutcome) {
        let counter = if outcome.is_applied() {
            &self.writes
        } else {
            &self.errors
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of cache activity
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Failed reads and dropped writes
    pub errors: u64,
    pub writes: u64,
    pub fallback_entries: usize,
    /// `None` when the remote tier is disabled
    pub remote_health: Option<BackendHealth>,
    pub remote_changed_at: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Share of reads that were hits, `0.0` before any read
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses + self.errors;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}

impl ReportCache {
    pub fn stats(&self) -> CacheStats {
        let counters = &self.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            errors: counters.errors.load(Ordering::Relaxed),
            writes: counters.writes.load(Ordering::Relaxed),
            fallback_entries: self.fallback.len(),
            remote_health: self.backend_health(),
            remote_changed_at: self.remote.as_ref().map(RemoteBackend::health_changed_at),
        }
    }
}
