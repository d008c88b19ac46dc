//! Per-key in-flight locks for coalescing concurrent cache misses.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table of keys with a population in progress
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InFlight {
    /// Wait until no other caller is populating `key`, then claim it
    pub(crate) async fn acquire(&self, key: &str) -> InFlightGuard<'_> {
        let lock = Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = lock.lock_owned().await;
        InFlightGuard {
            table: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Releases the key on drop and forgets it once nobody else is waiting
pub(crate) struct InFlightGuard<'a> {
    table: &'a InFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the table's own reference left: no waiters
        self.table
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let table = InFlight::default();
        {
            let _guard = table.acquire("k").await;
            assert_eq!(table.len(), 1);
        }
        assert_eq!(table.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_is_serialized() {
        let table = Arc::new(InFlight::default());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let (table, active, peak) = (table.clone(), active.clone(), peak.clone());
                tokio::spawn(async move {
                    let _guard = table.acquire("report").await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(table.len(), 0);
    }
}
