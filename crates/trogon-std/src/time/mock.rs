#[cfg(any(test, feature = "test-support"))]
use std::sync::{Arc, Mutex};

#[cfg(any(test, feature = "test-support"))]
use chrono::{DateTime, Duration, Utc};

#[cfg(any(test, feature = "test-support"))]
use super::GetNow;

/// Time only moves when you call [`advance`](MockClock::advance) or
/// [`set`](MockClock::set). Clones share the same time, and the clock is
/// `Send + Sync` so it can sit in shared server state.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MockClock {
    /// Starts at the Unix epoch.
    pub fn new() -> Self {
        Self::at(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn at(when: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(when)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += by;
    }

    pub fn set(&self, when: DateTime<Utc>) {
        *self.current.lock().unwrap() = when;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl GetNow for MockClock {
    type Instant = DateTime<Utc>;

    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn starts_at_epoch() {
        let clock = MockClock::new();
        assert_eq!(clock.now().timestamp(), 0);
    }

    #[test]
    fn frozen_until_advanced() {
        let clock = MockClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.advance(Duration::milliseconds(1500));
        assert_eq!(clock.now() - t0, Duration::milliseconds(1500));
    }

    #[test]
    fn set_is_absolute() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = MockClock::new();
        clock.set(when);
        assert_eq!(clock.now(), when);
    }

    #[test]
    fn clones_share_time() {
        let clock = MockClock::new();
        let clone = clock.clone();

        clock.advance(Duration::seconds(5));
        assert_eq!(clone.now().timestamp(), 5);
    }
}
