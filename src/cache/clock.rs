//! Time source for cache freshness checks

use chrono::{DateTime, Duration, Utc};
use std::fmt::Debug;
use std::sync::Mutex;

/// Supplies the current time to the cache
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Lets TTL scenarios ("three hours later") run without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Converts a time into fractional Unix seconds, the store's timestamp format
pub fn to_unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1_000_000.0
}

/// Converts fractional Unix seconds back into a UTC time
///
/// Out-of-range values collapse to the epoch.
pub fn from_unix_seconds(seconds: f64) -> DateTime<Utc> {
    if !seconds.is_finite() {
        return DateTime::default();
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = ManualClock::new(start);

        clock.advance(Duration::hours(3));

        assert_eq!(clock.now(), start + Duration::hours(3));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::new(DateTime::default());
        let later = DateTime::from_timestamp(1_800_000_000, 0).unwrap();

        clock.set(later);

        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_unix_seconds_conversion_keeps_subsecond_precision() {
        let time = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();

        let seconds = to_unix_seconds(time);

        assert!((seconds - 1_700_000_000.25).abs() < 1e-6);
        assert_eq!(from_unix_seconds(seconds), time);
    }

    #[test]
    fn test_from_unix_seconds_handles_garbage() {
        assert_eq!(from_unix_seconds(f64::NAN), DateTime::<Utc>::default());
        assert_eq!(from_unix_seconds(f64::INFINITY), DateTime::<Utc>::default());
    }
}
