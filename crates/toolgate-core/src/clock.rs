//! Wall-clock abstraction.
//!
//! Session start/end times and log timestamps come from a [`Clock`] so the
//! workflow can be driven deterministically in tests with [`FakeClock`].

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local};

/// Source of wall-clock time for the kiosk workflow.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually advanced clock for tests.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// pass another into the workflow.
///
/// # Examples
///
/// ```
/// use toolgate_core::{Clock, FakeClock};
/// use chrono::Duration;
///
/// let clock = FakeClock::new();
/// let before = clock.now();
/// clock.advance(Duration::seconds(65));
/// assert_eq!((clock.now() - before).num_seconds(), 65);
/// ```
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl FakeClock {
    /// Create a fake clock starting at the current local time.
    pub fn new() -> Self {
        Self::at(Local::now())
    }

    /// Create a fake clock frozen at the given instant.
    pub fn at(start: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_clock_is_frozen() {
        let clock = FakeClock::new();
        let a = clock.now();
        let b = clock.now();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fake_clock_clones_share_time() {
        let clock = FakeClock::new();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::seconds(10));

        assert_eq!(clock.now() - start, Duration::seconds(10));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
