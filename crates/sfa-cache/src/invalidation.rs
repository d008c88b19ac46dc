//! # Invalidation Groups
//!
//! Fixed table of key patterns cleared together when a domain event occurs,
//! plus the star-pattern matcher used by the in-process fallback store.
//!
//! Patterns use `*` as the only wildcard so they stay valid Redis `MATCH`
//! expressions. The in-process matcher does not implement the
//! rest of the Redis glob syntax: `?`, `[...]` and `\` are matched literally.

use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

/// Domain events that invalidate cached reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainEvent {
    NewTransaction,
    CustomerUpdate,
    ProductUpdate,
    JourneyComplete,
    TargetUpdate,
}

impl DomainEvent {
    pub const ALL: [Self; 5] = [
        Self::NewTransaction,
        Self::CustomerUpdate,
        Self::ProductUpdate,
        Self::JourneyComplete,
        Self::TargetUpdate,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewTransaction => "new-transaction",
            Self::CustomerUpdate => "customer-update",
            Self::ProductUpdate => "product-update",
            Self::JourneyComplete => "journey-complete",
            Self::TargetUpdate => "target-update",
        }
    }

    /// The invalidation group fired by this event
    #[must_use]
    pub fn group(self) -> &'static InvalidationGroup {
        // GROUPS is ordered like ALL
        &GROUPS[self as usize]
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainEvent {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| CacheError::UnknownGroup(s.to_string()))
    }
}

/// A named, immutable set of key patterns
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidationGroup {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
}

impl InvalidationGroup {
    /// Look up a group by name
    #[must_use]
    pub fn find(name: &str) -> Option<&'static Self> {
        GROUPS.iter().find(|group| group.name == name)
    }

    pub fn all() -> &'static [Self] {
        &GROUPS
    }
}

static GROUPS: [InvalidationGroup; 5] = [
    InvalidationGroup {
        name: "new-transaction",
        patterns: &["dashboard:kpi*", "sales:trend:*", "transactions:*"],
    },
    InvalidationGroup {
        name: "customer-update",
        patterns: &["customers:*", "dashboard:kpi*"],
    },
    InvalidationGroup {
        name: "product-update",
        patterns: &["products:*"],
    },
    InvalidationGroup {
        name: "journey-complete",
        patterns: &["journeys:*", "visits:*", "dashboard:kpi*"],
    },
    InvalidationGroup {
        name: "target-update",
        patterns: &["targets:*", "dashboard:kpi*"],
    },
];

/// Match `key` against a `*`-wildcard pattern.
///
/// Literal segments between stars must appear in order; a pattern without
/// a leading star is anchored at the start of the key and one without a
/// trailing star at the end.
#[must_use]
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = segments.as_slice() else {
        // no star at all
        return pattern == key;
    };

    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    for segment in middle {
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}
