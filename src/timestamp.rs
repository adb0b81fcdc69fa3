//! Item timestamps.
//!
//! The engine reports times as Windows FILETIME values: 100-nanosecond
//! intervals since January 1, 1601 (UTC).
//!
//! # Example
//!
//! ```rust
//! use zesven_native::Timestamp;
//!
//! let ts = Timestamp::from_filetime(116444736000000000);
//! assert_eq!(ts.as_unix_secs(), 0);
//! assert_eq!(ts.as_system_time(), std::time::SystemTime::UNIX_EPOCH);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Difference between the FILETIME and Unix epochs in 100-ns intervals.
const FILETIME_UNIX_DIFF: u64 = 116444736000000000;

/// Number of 100-nanosecond intervals per second.
const INTERVALS_PER_SECOND: u64 = 10_000_000;

/// A FILETIME timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    filetime: u64,
}

impl Timestamp {
    /// Creates a timestamp from a raw FILETIME value.
    #[inline]
    pub const fn from_filetime(filetime: u64) -> Self {
        Self { filetime }
    }

    /// Creates a timestamp from a `SystemTime`.
    ///
    /// Returns `None` for times before 1601 or beyond the FILETIME range.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let filetime = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => FILETIME_UNIX_DIFF.checked_add(intervals(after)?)?,
            Err(e) => FILETIME_UNIX_DIFF.checked_sub(intervals(e.duration())?)?,
        };
        Some(Self { filetime })
    }

    /// Returns the raw FILETIME value.
    #[inline]
    pub const fn as_filetime(&self) -> u64 {
        self.filetime
    }

    /// Returns whole seconds since the Unix epoch, rounding towards
    /// negative infinity.
    pub fn as_unix_secs(&self) -> i64 {
        let diff = self.filetime as i128 - FILETIME_UNIX_DIFF as i128;
        diff.div_euclid(INTERVALS_PER_SECOND as i128) as i64
    }

    /// Returns the 100-ns remainder within the current second.
    pub fn sub_second_100ns(&self) -> u32 {
        let diff = self.filetime as i128 - FILETIME_UNIX_DIFF as i128;
        diff.rem_euclid(INTERVALS_PER_SECOND as i128) as u32
    }

    /// Converts to a `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        let to_duration = |intervals: u64| {
            Duration::new(
                intervals / INTERVALS_PER_SECOND,
                ((intervals % INTERVALS_PER_SECOND) * 100) as u32,
            )
        };
        if self.filetime >= FILETIME_UNIX_DIFF {
            UNIX_EPOCH + to_duration(self.filetime - FILETIME_UNIX_DIFF)
        } else {
            UNIX_EPOCH - to_duration(FILETIME_UNIX_DIFF - self.filetime)
        }
    }
}

fn intervals(duration: Duration) -> Option<u64> {
    let secs = duration.as_secs().checked_mul(INTERVALS_PER_SECOND)?;
    secs.checked_add(u64::from(duration.subsec_nanos() / 100))
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        ts.as_system_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let ts = Timestamp::from_filetime(FILETIME_UNIX_DIFF);
        assert_eq!(ts.as_unix_secs(), 0);
        assert_eq!(ts.sub_second_100ns(), 0);
        assert_eq!(ts.as_system_time(), UNIX_EPOCH);
    }

    #[test]
    fn test_sub_second_precision() {
        let ts = Timestamp::from_filetime(FILETIME_UNIX_DIFF + 15 * INTERVALS_PER_SECOND + 1234);
        assert_eq!(ts.as_unix_secs(), 15);
        assert_eq!(ts.sub_second_100ns(), 1234);
        assert_eq!(
            ts.as_system_time(),
            UNIX_EPOCH + Duration::new(15, 123_400)
        );
    }

    #[test]
    fn test_before_unix_epoch() {
        let ts = Timestamp::from_filetime(FILETIME_UNIX_DIFF - 5);
        assert_eq!(ts.as_unix_secs(), -1);
        assert_eq!(ts.sub_second_100ns(), 9_999_995);
    }

    #[test]
    fn test_system_time_roundtrip() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 500_000_000);
        let ts = Timestamp::from_system_time(time).unwrap();
        assert_eq!(ts.as_system_time(), time);

        let before = UNIX_EPOCH - Duration::from_secs(3600);
        assert_eq!(Timestamp::from_system_time(before).unwrap().as_unix_secs(), -3600);
    }
}
