//! Time source abstraction for window and timeout logic.
//!
//! Production code injects [`SystemClock`]; tests inject a manual clock so
//! the transition dedupe window can be exercised without sleeping.

use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Abstraction over time sources.
///
/// `now_ms` is wall-clock time for logging correlation; `monotonic_now` is
/// the only time source used for comparisons (dedupe windows, elapsed).
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current wall-clock time in milliseconds since UNIX epoch.
    fn now_ms(&self) -> u64;

    /// Returns a monotonic instant for elapsed/window comparisons.
    fn monotonic_now(&self) -> Instant;
}

/// Production clock using `SystemTime` for timestamps and `Instant` for
/// monotonic comparisons.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::Clock;

    /// Manually advanced clock for deterministic window tests.
    #[derive(Debug)]
    pub struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut offset = self.offset.lock().unwrap();
            *offset += by;
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            u64::try_from(self.offset.lock().unwrap().as_millis()).unwrap_or(u64::MAX)
        }

        fn monotonic_now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }
}
