//! Injectable time source.
//!
//! Every sync decision that compares "now" against a watermark or a dirty
//! timestamp goes through [`Clock`], so tests can pin the clock and exercise
//! window edges deterministically.

use chrono::{DateTime, Utc};

/// Time source trait.
///
/// Abstracts system time so the sync engine never reads the wall clock
/// directly.
pub trait Clock: Send + Sync {
    /// Get current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in milliseconds.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using actual system time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant, for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        assert!(clock.now_millis() > 0);
    }

    #[test]
    fn fixed_clock_is_pinned() {
        let clock = FixedClock::at_millis(1_700_000_000_000);
        assert_eq!(clock.now_millis(), 1_700_000_000_000);
        assert_eq!(clock.now_millis(), clock.now().timestamp_millis());
    }
}
