//! Cache layer error types

use thiserror::Error;

/// Cache layer errors
///
/// None of these ever escape the facade's data operations; they are carried
/// inside [`crate::Lookup`] and [`crate::WriteOutcome`] so callers and tests
/// can see why a read missed or a write was dropped.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Redis error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache not initialized")]
    NotInitialized,

    #[error("Cache closed")]
    Closed,

    #[error("Unknown invalidation group: {0}")]
    UnknownGroup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Whether this error reflects the remote tier being unreachable
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. } | Self::Backend(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else if err.is_timeout() {
            Self::Timeout { timeout_ms: 0 }
        } else {
            Self::Backend(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(CacheError::Connection("refused".into()).is_connectivity());
        assert!(CacheError::Timeout { timeout_ms: 10 }.is_connectivity());
        assert!(!CacheError::Serialization("bad".into()).is_connectivity());
        assert!(!CacheError::Closed.is_connectivity());
    }

    #[test]
    fn test_serde_error_converts() {
        let err: CacheError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
