//! Connection health of the remote tier.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Remote backend connection state
///
/// ```text
/// Disconnected ──initialize──▶ Connecting ──ping ok──▶ Ready
///       ▲                          │                    │
///       │                     gave up│          runtime error
///     close                        ▼                    ▼
///       └──────────────────────── Degraded ◀────────────┘
///                                    │  lazy re-probe ok
///                                    └──────────▶ Ready
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BackendHealth {
    Disconnected = 0,
    Connecting = 1,
    Ready = 2,
    Degraded = 3,
}

impl BackendHealth {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::Degraded,
            _ => Self::Disconnected,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for BackendHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically updated health state plus the time of the last transition
#[derive(Debug)]
pub(crate) struct HealthCell {
    state: AtomicU8,
    changed_at_ms: AtomicI64,
}

impl HealthCell {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(BackendHealth::Disconnected as u8),
            changed_at_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub(crate) fn get(&self) -> BackendHealth {
        BackendHealth::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, next: BackendHealth) -> BackendHealth {
        let prev = BackendHealth::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        if prev != next {
            self.touch();
        }
        prev
    }

    /// Move `from -> to` only if the state is still `from`
    pub(crate) fn transition(&self, from: BackendHealth, to: BackendHealth) -> bool {
        let swapped = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            self.touch();
        }
        swapped
    }

    pub(crate) fn changed_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.changed_at_ms.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    fn touch(&self) {
        self.changed_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        assert_eq!(HealthCell::new().get(), BackendHealth::Disconnected);
    }

    #[test]
    fn test_transition_only_from_expected_state() {
        let cell = HealthCell::new();
        cell.set(BackendHealth::Ready);

        assert!(cell.transition(BackendHealth::Ready, BackendHealth::Degraded));
        assert!(!cell.transition(BackendHealth::Ready, BackendHealth::Degraded));
        assert_eq!(cell.get(), BackendHealth::Degraded);
    }

    #[test]
    fn test_round_trips_through_u8() {
        for health in [
            BackendHealth::Disconnected,
            BackendHealth::Connecting,
            BackendHealth::Ready,
            BackendHealth::Degraded,
        ] {
            assert_eq!(BackendHealth::from_u8(health as u8), health);
        }
    }
}
