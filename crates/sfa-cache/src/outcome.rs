//! Typed results of facade operations.
//!
//! Cache failures never propagate to callers, but they are not silently
//! erased either: every operation reports which tier served it and whether
//! the backend failed, so degraded-mode behaviour can be asserted on.

use std::fmt;

use crate::error::CacheError;

/// The store that served an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Remote,
    Fallback,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Fallback => "fallback",
        })
    }
}

/// Result of a cache read
#[derive(Debug)]
pub enum Lookup<T> {
    Hit(T, Tier),
    Miss(Tier),
    /// The active tier failed or the stored value could not be decoded.
    /// Callers treat this exactly like a miss.
    Failed(CacheError),
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Hit(value, _) => Some(value),
            Self::Miss(_) | Self::Failed(_) => None,
        }
    }

    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(..))
    }

    pub const fn tier(&self) -> Option<Tier> {
        match self {
            Self::Hit(_, tier) | Self::Miss(tier) => Some(*tier),
            Self::Failed(_) => None,
        }
    }
}

/// Result of a cache write, delete or invalidation
#[derive(Debug)]
pub enum WriteOutcome {
    /// `affected` is the number of keys written or removed
    Applied { tier: Tier, affected: u64 },
    /// The write was dropped; the cache may still hold an older value
    Failed(CacheError),
}

impl WriteOutcome {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub const fn affected(&self) -> u64 {
        match self {
            Self::Applied { affected, .. } => *affected,
            Self::Failed(_) => 0,
        }
    }

    pub const fn tier(&self) -> Option<Tier> {
        match self {
            Self::Applied { tier, .. } => Some(*tier),
            Self::Failed(_) => None,
        }
    }
}

/// Per-pattern outcome of firing an invalidation group
#[derive(Debug)]
pub struct InvalidationReport {
    pub group: String,
    pub outcomes: Vec<(&'static str, WriteOutcome)>,
}

impl InvalidationReport {
    /// True when every pattern was applied (vacuously true for no patterns)
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_applied())
    }

    pub fn removed(&self) -> u64 {
        self.outcomes.iter().map(|(_, outcome)| outcome.affected()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_collapses_to_option() {
        assert_eq!(Lookup::Hit(7, Tier::Remote).into_option(), Some(7));
        assert_eq!(Lookup::<i32>::Miss(Tier::Fallback).into_option(), None);
        assert_eq!(Lookup::<i32>::Failed(CacheError::Closed).into_option(), None);
    }

    #[test]
    fn test_report_completeness() {
        let report = InvalidationReport {
            group: "product-update".into(),
            outcomes: vec![
                ("products:*", WriteOutcome::Applied { tier: Tier::Remote, affected: 3 }),
                ("x:*", WriteOutcome::Failed(CacheError::Timeout { timeout_ms: 5 })),
            ],
        };
        assert!(!report.is_complete());
        assert_eq!(report.removed(), 3);
    }
}
