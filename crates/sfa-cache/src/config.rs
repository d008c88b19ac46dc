//! # Cache Configuration
//!
//! Environment-based configuration for the report cache.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::ttl::CacheTtl;

/// Default lifetime for entries written without an explicit TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Longest lifetime any tier stores; longer TTLs are clamped to it
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Clamp a caller TTL into the range both tiers accept
#[must_use]
pub fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.clamp(Duration::from_secs(1), MAX_TTL)
}

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Namespace prepended to every key, e.g. `sfa:`
    pub key_prefix: String,
    /// Base delay between connection attempts (grows linearly per attempt)
    pub retry_delay: Duration,
    /// Connection attempts made by `initialize` before giving up
    pub max_retries: u32,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl RedisSettings {
    /// Connection target with the password redacted, for logging
    #[must_use]
    pub fn display_target(&self) -> String {
        let auth = if self.password.is_some() { ":***@" } else { "" };
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.db)
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: "sfa:".to_string(),
            retry_delay: Duration::from_millis(100),
            max_retries: 3,
            connect_timeout: Duration::from_millis(2000),
            command_timeout: Duration::from_millis(1000),
        }
    }
}

/// Report cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis: RedisSettings,

    /// Use the remote tier at all; when false the facade is fallback-only
    pub redis_enabled: bool,

    /// Minimum gap between lazy liveness re-probes while degraded
    pub reprobe_interval: Duration,

    /// TTL applied when a caller omits one
    pub default_ttl: Duration,

    /// Coalesce concurrent `get_or_set` misses on the same key
    pub coalesce_misses: bool,

    /// Per-domain TTL policy consulted by callers
    pub ttl: CacheTtl,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis: RedisSettings::default(),
            redis_enabled: true,
            reprobe_interval: Duration::from_secs(30),
            default_ttl: DEFAULT_TTL,
            coalesce_misses: false,
            ttl: CacheTtl::default(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] when a variable is present but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] when a variable is present but malformed,
    /// or the resulting configuration fails [`CacheConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let redis = RedisSettings {
            host: get("REDIS_HOST").unwrap_or(defaults.redis.host),
            port: parse_var(&get, "REDIS_PORT")?.unwrap_or(defaults.redis.port),
            password: get("REDIS_PASSWORD"),
            db: parse_var(&get, "REDIS_DB")?.unwrap_or(defaults.redis.db),
            key_prefix: get("REDIS_KEY_PREFIX").unwrap_or(defaults.redis.key_prefix),
            retry_delay: parse_var(&get, "REDIS_RETRY_DELAY")?
                .map_or(defaults.redis.retry_delay, Duration::from_millis),
            max_retries: parse_var(&get, "REDIS_MAX_RETRIES")?
                .unwrap_or(defaults.redis.max_retries),
            connect_timeout: parse_var(&get, "REDIS_CONNECT_TIMEOUT_MS")?
                .map_or(defaults.redis.connect_timeout, Duration::from_millis),
            command_timeout: parse_var(&get, "REDIS_COMMAND_TIMEOUT_MS")?
                .map_or(defaults.redis.command_timeout, Duration::from_millis),
        };

        let config = Self {
            redis,
            redis_enabled: parse_bool(&get, "CACHE_REDIS_ENABLED")?
                .unwrap_or(defaults.redis_enabled),
            reprobe_interval: parse_var(&get, "CACHE_REPROBE_INTERVAL_SECS")?
                .map_or(defaults.reprobe_interval, Duration::from_secs),
            default_ttl: parse_var(&get, "CACHE_DEFAULT_TTL_SECS")?
                .map_or(defaults.default_ttl, Duration::from_secs),
            coalesce_misses: parse_bool(&get, "CACHE_COALESCE_MISSES")?
                .unwrap_or(defaults.coalesce_misses),
            ttl: defaults.ttl,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the cache misbehave
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.redis.host.is_empty() {
            return Err(CacheError::Config("REDIS_HOST must not be empty".into()));
        }
        if self.redis.port == 0 {
            return Err(CacheError::Config("REDIS_PORT must be non-zero".into()));
        }
        if self.redis.db < 0 {
            return Err(CacheError::Config("REDIS_DB must not be negative".into()));
        }
        if self.redis.connect_timeout.is_zero() || self.redis.command_timeout.is_zero() {
            return Err(CacheError::Config("Redis timeouts must be non-zero".into()));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::Config(
                "CACHE_DEFAULT_TTL_SECS must be non-zero".into(),
            ));
        }
        if self.default_ttl > MAX_TTL {
            return Err(CacheError::Config(format!(
                "CACHE_DEFAULT_TTL_SECS must be at most {}",
                MAX_TTL.as_secs()
            )));
        }
        Ok(())
    }
}

fn parse_var<T, G>(get: &G, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| CacheError::Config(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}

fn parse_bool<G>(get: &G, name: &str) -> Result<Option<bool>>
where
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(CacheError::Config(format!("{name}={raw:?}: expected a boolean"))),
        })
        .transpose()
}
