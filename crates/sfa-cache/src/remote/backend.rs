//! # Remote Cache Backend
//!
//! Wraps a [`RemoteConnector`] with connection lifecycle, bounded connect
//! retries, per-command timeouts and health tracking.
//!
//! Every failure is returned as a [`CacheError`] and also moves the backend
//! to [`BackendHealth::Degraded`]. Nothing here panics or blocks for longer
//! than the configured timeouts. A degraded backend is re-probed lazily by
//! [`RemoteBackend::ensure_ready`], at most once per reprobe interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use super::health::{BackendHealth, HealthCell};
use super::{RemoteConnector, RemoteStore};
use crate::config::RedisSettings;
use crate::error::{CacheError, Result};

/// Remote tier with connection health tracking
pub struct RemoteBackend {
    connector: Arc<dyn RemoteConnector>,
    store: RwLock<Option<Arc<dyn RemoteStore>>>,
    health: HealthCell,
    /// Time of the last liveness probe; held while a probe is in flight
    last_probe: Mutex<Option<Instant>>,
    retry_delay: Duration,
    max_retries: u32,
    connect_timeout: Duration,
    command_timeout: Duration,
    reprobe_interval: Duration,
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("target", &self.connector.target())
            .field("health", &self.health.get())
            .finish_non_exhaustive()
    }
}

impl RemoteBackend {
    pub fn new(
        connector: Arc<dyn RemoteConnector>,
        settings: &RedisSettings,
        reprobe_interval: Duration,
    ) -> Self {
        Self {
            connector,
            store: RwLock::new(None),
            health: HealthCell::new(),
            last_probe: Mutex::new(None),
            retry_delay: settings.retry_delay,
            max_retries: settings.max_retries,
            connect_timeout: settings.connect_timeout,
            command_timeout: settings.command_timeout,
            reprobe_interval,
        }
    }

    pub fn health(&self) -> BackendHealth {
        self.health.get()
    }

    pub fn health_changed_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.health.changed_at()
    }

    pub fn target(&self) -> String {
        self.connector.target()
    }

    /// Connect with bounded retries, then probe liveness.
    ///
    /// Returns the resulting health: `Ready` on success, `Degraded` once all
    /// attempts are exhausted. Calling this while `Ready` is a no-op.
    pub async fn initialize(&self) -> BackendHealth {
        if self.health.get() == BackendHealth::Ready {
            return BackendHealth::Ready;
        }

        self.health.set(BackendHealth::Connecting);
        let attempts = self.max_retries.saturating_add(1);
        let target = self.connector.target();

        for attempt in 1..=attempts {
            match self.connect_and_probe().await {
                Ok(store) => {
                    *self.store.write() = Some(store);
                    self.health.set(BackendHealth::Ready);
                    info!(remote = %target, attempt, "Remote cache ready");
                    return BackendHealth::Ready;
                }
                Err(e) => {
                    warn!(remote = %target, attempt, attempts, error = %e, "Remote cache connection failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry_delay.saturating_mul(attempt)).await;
            }
        }

        warn!(remote = %target, attempts, "Giving up on remote cache, serving from fallback");
        *self.last_probe.lock().await = Some(Instant::now());
        self.health.set(BackendHealth::Degraded);
        BackendHealth::Degraded
    }

    /// Drop the connection and move to `Disconnected`
    pub async fn close(&self) {
        // Wait out an in-flight probe so it cannot reinstall a connection
        let mut last_probe = self.last_probe.lock().await;
        *last_probe = None;
        self.store.write().take();
        let prev = self.health.set(BackendHealth::Disconnected);
        info!(previous = %prev, "Remote cache connection closed");
    }

    /// Whether the remote tier should serve the next operation.
    ///
    /// `Ready` answers immediately. `Degraded` triggers a liveness probe if
    /// none ran within the reprobe interval and no other caller is already
    /// probing; otherwise the caller is told to use the fallback tier.
    pub async fn ensure_ready(&self) -> bool {
        match self.health.get() {
            BackendHealth::Ready => true,
            BackendHealth::Degraded => self.reprobe().await,
            BackendHealth::Disconnected | BackendHealth::Connecting => false,
        }
    }

    async fn reprobe(&self) -> bool {
        let Ok(mut last_probe) = self.last_probe.try_lock() else {
            return false;
        };
        if last_probe.is_some_and(|at| at.elapsed() < self.reprobe_interval) {
            return false;
        }
        *last_probe = Some(Instant::now());

        let existing = self.store.read().clone();
        let probed = match existing {
            Some(store) => self.probe(&store).await.map(|()| store),
            None => self.connect_and_probe().await,
        };

        match probed {
            Ok(store) => {
                *self.store.write() = Some(store);
                let recovered = self.health.transition(BackendHealth::Degraded, BackendHealth::Ready);
                if recovered {
                    info!(remote = %self.connector.target(), "Remote cache recovered");
                }
                recovered
            }
            Err(e) => {
                debug!(error = %e, "Remote cache still unavailable");
                false
            }
        }
    }

    async fn connect_and_probe(&self) -> Result<Arc<dyn RemoteStore>> {
        let store = timeout(self.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| CacheError::Timeout {
                timeout_ms: millis(self.connect_timeout),
            })??;
        self.probe(&store).await?;
        Ok(store)
    }

    async fn probe(&self, store: &Arc<dyn RemoteStore>) -> Result<()> {
        timeout(self.command_timeout, store.ping())
            .await
            .map_err(|_| CacheError::Timeout {
                timeout_ms: millis(self.command_timeout),
            })?
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.call("GET", |store| async move { store.get(key).await })
            .await
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.call("SET", |store| async move { store.set(key, value, ttl).await })
            .await
    }

    pub async fn delete(&self, keys: &[String]) -> Result<u64> {
        self.call("DEL", |store| async move { store.delete(keys).await })
            .await
    }

    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        self.call("SCAN/DEL", |store| async move {
            store.delete_pattern(pattern).await
        })
        .await
    }

    /// Run one command against the current connection under the command
    /// timeout. No lock is held across the await.
    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn RemoteStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let current = self.store.read().clone();
        let Some(store) = current else {
            return Err(CacheError::Connection("no remote connection".into()));
        };

        let result = match timeout(self.command_timeout, f(store)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                timeout_ms: millis(self.command_timeout),
            }),
        };

        if let Err(e) = &result {
            self.mark_degraded(op, e);
        }
        result
    }

    fn mark_degraded(&self, op: &'static str, error: &CacheError) {
        if self.health.transition(BackendHealth::Ready, BackendHealth::Degraded) {
            warn!(op, error = %error, "Remote cache degraded, falling back to memory");
            // Start the reprobe interval from the failure
            if let Ok(mut last_probe) = self.last_probe.try_lock() {
                *last_probe = Some(Instant::now());
            }
        } else {
            debug!(op, error = %error, "Remote cache command failed");
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
