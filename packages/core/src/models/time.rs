//! Time Provider Abstraction
//!
//! Stats timestamps and the reindex watermark are taken from a
//! [`TimeProvider`] so tests can pin "now" instead of sleeping.
//!
//! # Examples
//!
//! ```rust
//! use nodedex_core::models::time::{MockTimeProvider, SystemTimeProvider, TimeProvider};
//! use chrono::{Duration, Utc};
//!
//! let provider = SystemTimeProvider;
//! assert!(provider.now() <= Utc::now());
//!
//! let mock = MockTimeProvider::new();
//! let before = mock.now();
//! mock.advance(Duration::hours(1));
//! assert_eq!(mock.now() - before, Duration::hours(1));
//! ```

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Trait for providing current time
pub trait TimeProvider: Send + Sync {
    /// Get the current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// System time provider using the actual clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests
///
/// Uses interior mutability so it can be shared as `Arc<dyn TimeProvider>`
/// and still be moved forward from the test body.
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: Mutex<DateTime<Utc>>,
}

impl MockTimeProvider {
    /// Create a mock clock starting at the current time
    pub fn new() -> Self {
        Self::with_time(Utc::now())
    }

    /// Create a mock clock starting at a specific time
    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self {
            current_time: Mutex::new(time),
        }
    }

    /// Set the current time to a specific value
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.current() = time;
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: chrono::Duration) {
        *self.current() += duration;
    }

    fn current(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.current()
    }
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_system_time_provider() {
        let provider = SystemTimeProvider;
        let now1 = provider.now();
        let now2 = Utc::now();

        // Should be very close (within 1 second)
        assert!((now2 - now1).num_milliseconds().abs() < 1000);
    }

    #[test]
    fn test_mock_time_provider_set_and_advance() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let provider = MockTimeProvider::with_time(start);
        assert_eq!(provider.now(), start);

        provider.advance(Duration::minutes(30));
        assert_eq!(provider.now(), start + Duration::minutes(30));

        let later = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
        provider.set_time(later);
        assert_eq!(provider.now(), later);
    }
}
