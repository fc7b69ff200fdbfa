//! Clock Time
//!
//! Nanosecond time base shared by both input streams. An unknown time
//! is expressed as `Option::None`, never as a sentinel value.

use std::fmt;

/// Time in nanoseconds
pub type ClockTime = u64;

/// One nanosecond
pub const NSECOND: ClockTime = 1;
/// One microsecond
pub const USECOND: ClockTime = 1_000;
/// One millisecond
pub const MSECOND: ClockTime = 1_000_000;
/// One second
pub const SECOND: ClockTime = 1_000_000_000;

/// Compute `value * num / denom` without intermediate overflow.
///
/// Returns `None` when `denom` is zero or the result does not fit.
pub fn scale(value: ClockTime, num: u64, denom: u64) -> Option<ClockTime> {
    if denom == 0 {
        return None;
    }
    let wide = (value as u128) * (num as u128) / (denom as u128);
    u64::try_from(wide).ok()
}

/// Display adapter printing an optional clock time as `H:MM:SS.nnnnnnnnn`
/// (or `--:--:--` when unknown).
#[derive(Debug, Clone, Copy)]
pub struct TimeDisplay(pub Option<ClockTime>);

impl fmt::Display for TimeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(
                f,
                "{}:{:02}:{:02}.{:09}",
                t / (3600 * SECOND),
                (t / (60 * SECOND)) % 60,
                (t / SECOND) % 60,
                t % SECOND
            ),
            None => write!(f, "--:--:--.---------"),
        }
    }
}

/// Shorthand for `TimeDisplay(Some(t))`
pub fn display(t: ClockTime) -> TimeDisplay {
    TimeDisplay(Some(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_frame_duration() {
        // 25 fps
        assert_eq!(scale(SECOND, 1, 25), Some(40 * MSECOND));
        // NTSC 30000/1001
        assert_eq!(scale(SECOND, 1001, 30000), Some(33_366_666));
        assert_eq!(scale(SECOND, 1, 0), None);
    }

    #[test]
    fn test_scale_large_values() {
        assert_eq!(scale(u64::MAX, 2, 2), Some(u64::MAX));
        assert_eq!(scale(u64::MAX, 2, 1), None);
    }

    #[test]
    fn test_time_display() {
        let t = 3600 * SECOND + 2 * 60 * SECOND + 3 * SECOND + 4 * MSECOND;
        assert_eq!(display(t).to_string(), "1:02:03.004000000");
        assert_eq!(TimeDisplay(None).to_string(), "--:--:--.---------");
    }
}
