//! Wall clock timestamps.
//!
//! Timestamps are recorded facts about when a call happened. They are
//! carried as evidence and never used to order graph nodes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Wall clock timestamp (UTC, since the Unix epoch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds
    pub seconds: u64,
    /// Sub-second nanoseconds, always below one second
    pub nanos: u32,
}

impl Timestamp {
    /// Maximum nanoseconds per second
    pub const NANOS_PER_SEC: u32 = 1_000_000_000;

    /// Create a new timestamp, carrying excess nanoseconds into seconds
    #[must_use]
    pub fn new(seconds: u64, nanos: u32) -> Self {
        Self {
            seconds: seconds.saturating_add(u64::from(nanos / Self::NANOS_PER_SEC)),
            nanos: nanos % Self::NANOS_PER_SEC,
        }
    }

    /// Current wall clock time
    #[must_use]
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Create from milliseconds since the epoch
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(millis / 1_000, ((millis % 1_000) as u32) * 1_000_000)
    }

    /// Convert to milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> u128 {
        self.seconds as u128 * 1_000 + self.nanos as u128 / 1_000_000
    }

    /// RFC 3339 rendering, `None` if out of chrono's range
    #[must_use]
    pub fn to_rfc3339(&self) -> Option<String> {
        let seconds = i64::try_from(self.seconds).ok()?;
        DateTime::<Utc>::from_timestamp(seconds, self.nanos)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: u64::try_from(dt.timestamp()).unwrap_or(0),
            nanos: dt.timestamp_subsec_nanos() % Self::NANOS_PER_SEC,
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_rfc3339() {
            Some(s) => f.write_str(&s),
            None => write!(f, "{}.{:09}", self.seconds, self.nanos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_nanos() {
        let ts = Timestamp::new(1, 1_500_000_000);
        assert_eq!(ts.seconds, 2);
        assert_eq!(ts.nanos, 500_000_000);
    }

    #[test]
    fn test_new_saturates_at_max_seconds() {
        let ts = Timestamp::new(u64::MAX, 2_000_000_000);
        assert_eq!(ts.seconds, u64::MAX);
        assert_eq!(ts.nanos, 0);
    }

    #[test]
    fn test_millis_round_trip() {
        let ts = Timestamp::from_millis(1_700_000_000_123);
        assert_eq!(ts.as_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_display_is_rfc3339() {
        let ts = Timestamp::from_millis(0);
        assert_eq!(ts.to_string(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_ordering() {
        assert!(Timestamp::new(1, 0) < Timestamp::new(1, 1));
        assert!(Timestamp::new(1, 999) < Timestamp::new(2, 0));
    }
}
