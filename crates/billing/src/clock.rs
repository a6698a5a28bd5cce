//! Time source capability.
//!
//! The lifecycle engine never reads the wall clock directly; it is handed a
//! `Clock` so sweeps can be tested against an arbitrary fixed "now".

use time::OffsetDateTime;

/// Source of the current instant, always UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
