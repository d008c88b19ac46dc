//! # SFA Report Cache
//!
//! Two-tier cache for the sales-force reporting backend. Aggregation
//! queries behind the dashboard are expensive; this crate keeps their
//! results in Redis and keeps serving when Redis is not there.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Report handlers / background jobs               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ReportCache                             │
//! │  get · set · delete · invalidate_pattern · get_or_set        │
//! │  invalidation groups · warm · stats                          │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!          Ready     ▼                   ▼   otherwise
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │     RemoteBackend       │   │       FallbackStore          │
//! │  (Redis, health state)  │   │  (in-process, lazy expiry)   │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! Exactly one tier serves each operation. Backend failures surface as
//! [`Lookup::Failed`] / [`WriteOutcome::Failed`] and never as errors to
//! the caller.
//!
//! ## Features
//!
//! - `redis`: Redis remote tier via `ConnectionManager` (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sfa_cache::{CacheConfig, ReportCache, DomainEvent};
//!
//! let cache = Arc::new(ReportCache::new(CacheConfig::from_env()?));
//! cache.initialize().await;
//!
//! let kpi: Kpi = cache
//!     .get_or_set("dashboard:kpi", Some(cache.config().ttl.dashboard_kpi), || load_kpi(&db))
//!     .await;
//!
//! // After recording a sale
//! cache.invalidate_event(DomainEvent::NewTransaction).await;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod invalidation;
pub mod keys;
pub mod outcome;
pub mod remote;
mod singleflight;
pub mod ttl;

// Re-export commonly used types
pub use config::{CacheConfig, RedisSettings};
pub use error::{CacheError, Result};
pub use facade::{CacheStats, ReportCache, SharedReportCache, WarmEntry, WarmSummary};
pub use fallback::FallbackStore;
pub use invalidation::{DomainEvent, InvalidationGroup, matches_pattern};
pub use outcome::{InvalidationReport, Lookup, Tier, WriteOutcome};
pub use remote::{BackendHealth, RemoteBackend, RemoteConnector, RemoteStore};
pub use ttl::{CacheTtl, TtlPolicy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
