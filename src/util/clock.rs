//! Wall-clock helpers.
//!
//! Due dates are wall-clock milliseconds since the Unix epoch. The queue
//! reads time through an injectable [`Clock`] so tests can drive quiet
//! periods deterministically; `now_ms` is the system implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// A time source handed to the queue at construction.
#[derive(Clone)]
pub struct Clock(ClockKind);

#[derive(Clone)]
enum ClockKind {
    System,
    Manual(Arc<AtomicU64>),
}

impl Clock {
    /// The system wall clock.
    #[must_use]
    pub fn system() -> Self {
        Self(ClockKind::System)
    }

    /// A manually driven clock starting at `start_ms`. Returns the clock and
    /// the handle that advances it.
    #[must_use]
    pub fn manual(start_ms: u64) -> (Self, ManualClock) {
        let instant = Arc::new(AtomicU64::new(start_ms));
        (
            Self(ClockKind::Manual(Arc::clone(&instant))),
            ManualClock(instant),
        )
    }

    /// Current time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        match &self.0 {
            ClockKind::System => now_ms(),
            ClockKind::Manual(instant) => instant.load(Ordering::Acquire),
        }
    }
}

/// Advances a [`Clock::manual`] clock; cloneable across test threads.
#[derive(Clone)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(
            u64::try_from(by.as_millis()).unwrap_or(u64::MAX),
            Ordering::AcqRel,
        );
    }

    /// Sets the clock to an absolute instant.
    pub fn set_ms(&self, instant_ms: u64) {
        self.0.store(instant_ms, Ordering::Release);
    }

    /// Current reading.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
