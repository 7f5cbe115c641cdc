//! Monotonic time source for the monitor.
//!
//! Idle and inactivity decisions compare `Instant`s, so the monitor never
//! reads the system clock directly. Production uses [`SystemClock`]; tests
//! and replay drive a [`ManualClock`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = match self.offset.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *offset += by;
    }

    /// Jump to `origin + offset`. Moving backwards is ignored so the clock
    /// stays monotonic.
    pub fn set_offset(&self, offset: Duration) {
        let mut current = match self.offset.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if offset > *current {
            *current = offset;
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self.offset.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_never_goes_back() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.now() - start, Duration::from_secs(3));

        clock.set_offset(Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));

        clock.set_offset(Duration::from_secs(21));
        assert_eq!(clock.now() - start, Duration::from_secs(21));
    }
}
