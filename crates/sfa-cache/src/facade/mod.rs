//! # Report Cache Facade
//!
//! The single cache entry point for the reporting layer.
//!
//! Each call picks exactly one tier: the remote backend while it is
//! [`BackendHealth::Ready`], the in-process [`FallbackStore`] otherwise.
//! The tiers are never merged on read. Failures are reported through
//! [`Lookup`] and [`WriteOutcome`] and never propagate to the caller.

mod reports;
mod stats;
mod warm;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::fallback::FallbackStore;
use crate::invalidation::{DomainEvent, InvalidationGroup};
use crate::outcome::{InvalidationReport, Lookup, Tier, WriteOutcome};
use crate::remote::{BackendHealth, RemoteBackend, RemoteConnector};
use crate::singleflight::InFlight;

pub use stats::CacheStats;
pub use warm::{WarmEntry, WarmResult, WarmSummary};

use stats::Counters;

const UNINITIALIZED: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

/// Tier chosen for one operation
enum Route<'a> {
    Remote(&'a RemoteBackend),
    Fallback,
}

impl Route<'_> {
    const fn tier(&self) -> Tier {
        match self {
            Self::Remote(_) => Tier::Remote,
            Self::Fallback => Tier::Fallback,
        }
    }
}

/// Two-tier cache with explicit lifecycle
///
/// Construct once in the composition root, call [`ReportCache::initialize`],
/// and hand out [`SharedReportCache`] clones to collaborators.
#[derive(Debug)]
pub struct ReportCache {
    config: CacheConfig,
    remote: Option<RemoteBackend>,
    fallback: FallbackStore,
    state: AtomicU8,
    lifecycle: Mutex<()>,
    /// Shared by fallback inserts, exclusive while `close` clears the store
    fallback_gate: RwLock<()>,
    in_flight: InFlight,
    counters: Counters,
}

/// Shared report cache handle
pub type SharedReportCache = Arc<ReportCache>;

impl ReportCache {
    /// Build a cache whose remote tier is Redis, per `config`
    #[cfg(feature = "redis")]
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        if config.redis_enabled {
            let connector = Arc::new(crate::remote::RedisConnector::new(config.redis.clone()));
            Self::with_connector(config, connector)
        } else {
            Self::fallback_only(config)
        }
    }

    /// Build a cache with a custom remote connector
    #[must_use]
    pub fn with_connector(config: CacheConfig, connector: Arc<dyn RemoteConnector>) -> Self {
        let remote = RemoteBackend::new(connector, &config.redis, config.reprobe_interval);
        Self::build(config, Some(remote))
    }

    /// Build a cache that only ever uses the in-process tier
    #[must_use]
    pub fn fallback_only(config: CacheConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: CacheConfig, remote: Option<RemoteBackend>) -> Self {
        Self {
            fallback: FallbackStore::new(config.default_ttl),
            config,
            remote,
            state: AtomicU8::new(UNINITIALIZED),
            lifecycle: Mutex::new(()),
            fallback_gate: RwLock::new(()),
            in_flight: InFlight::default(),
            counters: Counters::default(),
        }
    }

    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Remote tier health, `None` when the remote tier is disabled
    pub fn backend_health(&self) -> Option<BackendHealth> {
        self.remote.as_ref().map(RemoteBackend::health)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Connect the remote tier and open the cache for use.
    ///
    /// Idempotent: a second call on an open cache does nothing. Never fails;
    /// an unreachable remote leaves the cache open on the fallback tier.
    /// A closed cache may be initialized again.
    pub async fn initialize(&self) -> Option<BackendHealth> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_initialized() {
            return self.backend_health();
        }

        let health = match &self.remote {
            Some(remote) => Some(remote.initialize().await),
            None => None,
        };
        self.state.store(OPEN, Ordering::Release);

        info!(
            remote = health.map_or("disabled", |h| h.as_str()),
            "Report cache initialized"
        );
        health
    }

    /// Release the remote connection and clear the fallback tier.
    ///
    /// Afterwards every operation reports [`CacheError::Closed`] until the
    /// cache is initialized again.
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some(remote) = &self.remote {
            remote.close().await;
        }
        {
            let _gate = self.fallback_gate.write();
            self.state.store(CLOSED, Ordering::Release);
            self.fallback.clear();
        }
        info!("Report cache closed");
    }

    async fn route(&self) -> Result<Route<'_>, CacheError> {
        match self.state.load(Ordering::Acquire) {
            OPEN => {}
            CLOSED => return Err(CacheError::Closed),
            _ => return Err(CacheError::NotInitialized),
        }

        let Some(remote) = &self.remote else {
            return Ok(Route::Fallback);
        };
        if remote.ensure_ready().await {
            Ok(Route::Remote(remote))
        } else {
            Ok(Route::Fallback)
        }
    }

    // =========================================================================
    // CORE OPERATIONS
    // =========================================================================

    /// Read and decode a value
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let lookup = self.lookup_raw(key).await;
        let decoded = match lookup {
            Lookup::Hit(raw, tier) => match serde_json::from_str(&raw) {
                Ok(value) => Lookup::Hit(value, tier),
                Err(e) => {
                    warn!(key = key, tier = %tier, error = %e, "Undecodable cache entry, treating as miss");
                    Lookup::Failed(e.into())
                }
            },
            Lookup::Miss(tier) => Lookup::Miss(tier),
            Lookup::Failed(e) => Lookup::Failed(e),
        };
        self.counters.record_read(&decoded);
        decoded
    }

    async fn lookup_raw(&self, key: &str) -> Lookup<String> {
        let route = match self.route().await {
            Ok(route) => route,
            Err(e) => return Lookup::Failed(e),
        };
        let tier = route.tier();

        let result = match route {
            Route::Remote(remote) => remote.get(key).await,
            Route::Fallback => Ok(self.fallback.get(key)),
        };

        match result {
            Ok(Some(raw)) => {
                debug!(key = key, tier = %tier, "Cache HIT");
                Lookup::Hit(raw, tier)
            }
            Ok(None) => {
                debug!(key = key, tier = %tier, "Cache MISS");
                Lookup::Miss(tier)
            }
            Err(e) => {
                log_failure("read", key, &e);
                Lookup::Failed(e)
            }
        }
    }

    /// Read a value; any failure reads as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.into_option()
    }

    /// Store a value. `ttl` of `None` applies the configured default TTL.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> WriteOutcome {
        let outcome = match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl).await,
            Err(e) => {
                warn!(key = key, error = %e, "Unserializable cache value, write dropped");
                WriteOutcome::Failed(e.into())
            }
        };
        self.counters.record_write(&outcome);
        outcome
    }

    async fn set_raw(&self, key: &str, raw: String, ttl: Option<Duration>) -> WriteOutcome {
        let route = match self.route().await {
            Ok(route) => route,
            Err(e) => return WriteOutcome::Failed(e),
        };
        let tier = route.tier();

        match route {
            Route::Remote(remote) => {
                let ttl = ttl.unwrap_or(self.config.default_ttl);
                match remote.set(key, &raw, ttl).await {
                    Ok(()) => WriteOutcome::Applied { tier, affected: 1 },
                    Err(e) => {
                        log_failure("write", key, &e);
                        WriteOutcome::Failed(e)
                    }
                }
            }
            Route::Fallback => {
                // A concurrent close must not be outlived by this entry
                let _gate = self.fallback_gate.read();
                if self.state.load(Ordering::Acquire) != OPEN {
                    return WriteOutcome::Failed(CacheError::Closed);
                }
                self.fallback.set(key, raw, ttl);
                WriteOutcome::Applied { tier, affected: 1 }
            }
        }
    }

    pub async fn delete(&self, key: &str) -> WriteOutcome {
        self.delete_many(&[key]).await
    }

    /// Delete several keys; missing keys are not an error
    pub async fn delete_many<S: AsRef<str>>(&self, keys: &[S]) -> WriteOutcome {
        let route = match self.route().await {
            Ok(route) => route,
            Err(e) => return WriteOutcome::Failed(e),
        };
        let tier = route.tier();

        let result = match route {
            Route::Remote(remote) => {
                let owned: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
                remote.delete(&owned).await
            }
            Route::Fallback => Ok(self.fallback.delete(keys)),
        };

        match result {
            Ok(affected) => WriteOutcome::Applied { tier, affected },
            Err(e) => {
                log_failure("delete", &format!("{} key(s)", keys.len()), &e);
                WriteOutcome::Failed(e)
            }
        }
    }

    /// Delete every key matching a `*`-wildcard pattern in the active tier
    pub async fn invalidate_pattern(&self, pattern: &str) -> WriteOutcome {
        let route = match self.route().await {
            Ok(route) => route,
            Err(e) => return WriteOutcome::Failed(e),
        };
        let tier = route.tier();

        let result = match route {
            Route::Remote(remote) => remote.delete_pattern(pattern).await,
            Route::Fallback => Ok(self.fallback.delete_by_pattern(pattern)),
        };

        match result {
            Ok(affected) => {
                debug!(pattern = pattern, tier = %tier, affected, "Cache pattern invalidated");
                WriteOutcome::Applied { tier, affected }
            }
            Err(e) => {
                log_failure("invalidate", pattern, &e);
                WriteOutcome::Failed(e)
            }
        }
    }

    // =========================================================================
    // READ-THROUGH
    // =========================================================================

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// Concurrent misses on the same key each run `compute` unless
    /// `coalesce_misses` is enabled. Dropping the returned future drops
    /// `compute` with it; see [`ReportCache::get_or_set_detached`].
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let result: Result<T, std::convert::Infallible> = self
            .try_get_or_set(key, ttl, || async move { Ok(compute().await) })
            .await;
        match result {
            Ok(value) => value,
        }
    }

    /// Like [`ReportCache::get_or_set`] for fallible computations.
    ///
    /// On `Err` nothing is stored and the error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn try_get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.coalesce_misses {
            return self.populate(key, ttl, compute).await;
        }

        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        // Re-checked under the key's lock: a previous holder may have populated it
        let _in_flight = self.in_flight.acquire(key).await;
        self.populate(key, ttl, compute).await
    }

    async fn populate<T, E, F, Fut>(&self, key: &str, ttl: Option<Duration>, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// [`ReportCache::get_or_set`] with `compute` and the write on a spawned
    /// task, so the result is still cached if the caller is cancelled.
    ///
    /// # Errors
    ///
    /// Returns a [`JoinError`] if `compute` panicked or the runtime shut down.
    pub async fn get_or_set_detached<T, F, Fut>(
        self: &Arc<Self>,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, JoinError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let cache = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            let value = compute().await;
            cache.set(&key, &value, ttl).await;
            value
        })
        .await
    }

    // =========================================================================
    // INVALIDATION GROUPS
    // =========================================================================

    /// Fire the invalidation group for a domain event
    pub async fn invalidate_event(&self, event: DomainEvent) -> InvalidationReport {
        self.fire(event.group()).await
    }

    /// Fire an invalidation group by name; unknown names clear nothing
    pub async fn invalidate_group(&self, name: &str) -> InvalidationReport {
        match InvalidationGroup::find(name) {
            Some(group) => self.fire(group).await,
            None => {
                warn!(group = name, error = %CacheError::UnknownGroup(name.to_string()), "Invalidation skipped");
                InvalidationReport {
                    group: name.to_string(),
                    outcomes: Vec::new(),
                }
            }
        }
    }

    /// Patterns run in order; a failed pattern does not stop the rest
    async fn fire(&self, group: &'static InvalidationGroup) -> InvalidationReport {
        let mut outcomes = Vec::with_capacity(group.patterns.len());
        for pattern in group.patterns {
            outcomes.push((*pattern, self.invalidate_pattern(pattern).await));
        }

        let report = InvalidationReport {
            group: group.name.to_string(),
            outcomes,
        };
        info!(
            group = group.name,
            removed = report.removed(),
            complete = report.is_complete(),
            "Invalidation group fired"
        );
        report
    }
}

/// Connectivity failures are already reported by the backend when it degrades
fn log_failure(op: &'static str, subject: &str, error: &CacheError) {
    if error.is_connectivity() {
        debug!(op, subject, error = %error, "Remote cache call failed");
    } else {
        warn!(op, subject, error = %error, "Cache operation failed");
    }
}
