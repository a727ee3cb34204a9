//! Controllable clock for testing.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can hand one clone to a store and
/// advance it from the outside.
///
/// # Example
///
/// ```
/// use api_tokens::Clock;
/// use api_tokens::mocks::test_clock;
/// use chrono::Duration;
///
/// let clock = test_clock();
/// let before = clock.now();
/// clock.advance(Duration::minutes(5));
/// assert_eq!(clock.now() - before, Duration::minutes(5));
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Create a new fixed clock at the given time
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Jump to `time`.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    /// Move forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_clones_share_time() {
        let clock = test_clock();
        let shared = clock.clone();

        clock.advance(Duration::hours(2));

        assert_eq!(shared.now(), clock.now());
    }
}
