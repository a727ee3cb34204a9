//! Time source abstraction.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
///
/// Stores use it to stamp `created_at` and to decide which tokens are still
/// active. Tests substitute [`FixedClock`](crate::mocks::FixedClock).
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
