//! Stream Segments
//!
//! A segment describes the playable sub-range of a stream together with
//! its current position. Each input stream owns one [`SegmentTracker`];
//! timestamps of both streams are mapped to *running time* through their
//! own segment so they can be compared with each other.

use crate::time::{ClockTime, TimeDisplay};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of the segment boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentFormat {
    /// No usable segment (e.g. input detached)
    #[default]
    Undefined,
    /// Boundaries are [`ClockTime`] values
    Time,
}

/// Playable interval and position of a stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    /// Boundary unit
    pub format: SegmentFormat,
    /// First playable timestamp
    pub start: ClockTime,
    /// Last playable timestamp, `None` when open ended
    pub stop: Option<ClockTime>,
    /// Last known position inside the segment
    pub position: ClockTime,
    /// Playback rate, never zero
    pub rate: f64,
    /// Running time accumulated before `start`
    pub base: ClockTime,
}

impl Default for Segment {
    fn default() -> Self {
        Self::time()
    }
}

impl Segment {
    /// Open-ended time segment starting at zero
    pub fn time() -> Self {
        Segment {
            format: SegmentFormat::Time,
            start: 0,
            stop: None,
            position: 0,
            rate: 1.0,
            base: 0,
        }
    }

    /// Segment in undefined format
    pub fn undefined() -> Self {
        Segment {
            format: SegmentFormat::Undefined,
            ..Self::time()
        }
    }

    /// Time segment covering `[start, stop]`
    pub fn new(start: ClockTime, stop: Option<ClockTime>) -> Self {
        Segment {
            start,
            stop,
            position: start,
            ..Self::time()
        }
    }

    /// Set the playback rate
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Set the accumulated base running time
    pub fn with_base(mut self, base: ClockTime) -> Self {
        self.base = base;
        self
    }

    /// Whether boundaries are expressed in time
    pub fn is_time(&self) -> bool {
        self.format == SegmentFormat::Time
    }

    /// Check the segment invariants: non-zero finite rate and `start <= stop`
    pub fn is_valid(&self) -> bool {
        let rate_ok = self.rate.is_finite() && self.rate != 0.0;
        let bounds_ok = self.stop.map_or(true, |stop| self.start <= stop);
        let reverse_ok = self.rate > 0.0 || self.stop.is_some();
        rate_ok && bounds_ok && reverse_ok
    }

    /// Clip the interval `[start, stop)` to the segment.
    ///
    /// Returns `None` when the interval lies completely outside. Unknown
    /// boundaries stay unknown on the start side; an unknown stop becomes
    /// the segment stop.
    pub fn clip(
        &self,
        start: Option<ClockTime>,
        stop: Option<ClockTime>,
    ) -> Option<(Option<ClockTime>, Option<ClockTime>)> {
        if !self.is_time() {
            return None;
        }

        // A zero length segment still contains its single instant.
        if let (Some(seg_stop), Some(start)) = (self.stop, start) {
            if start > seg_stop || (self.start != seg_stop && start == seg_stop) {
                return None;
            }
        }

        if let Some(stop) = stop {
            if stop < self.start || (start != Some(stop) && stop == self.start) {
                return None;
            }
        }

        let clip_start = start.map(|s| s.max(self.start));
        let clip_stop = match (stop, self.stop) {
            (None, seg_stop) => seg_stop,
            (Some(stop), None) => Some(stop),
            (Some(stop), Some(seg_stop)) => Some(stop.min(seg_stop)),
        };

        Some((clip_start, clip_stop))
    }

    /// Convert a stream timestamp to running time.
    ///
    /// Returns `None` for non-time segments and for timestamps outside the
    /// segment boundaries.
    pub fn to_running_time(&self, t: ClockTime) -> Option<ClockTime> {
        if !self.is_time() || t < self.start {
            return None;
        }
        if let Some(stop) = self.stop {
            if t > stop {
                return None;
            }
        }

        let offset = if self.rate > 0.0 {
            t - self.start
        } else {
            self.stop? - t
        };

        let abs_rate = self.rate.abs();
        let scaled = if abs_rate == 1.0 {
            offset
        } else {
            (offset as f64 / abs_rate) as ClockTime
        };

        scaled.checked_add(self.base)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment({:?} start={} stop={} position={} rate={} base={})",
            self.format,
            TimeDisplay(Some(self.start)),
            TimeDisplay(self.stop),
            TimeDisplay(Some(self.position)),
            self.rate,
            TimeDisplay(Some(self.base)),
        )
    }
}

/// Owner of a stream's active segment
///
/// Only the control-event handler of the owning stream mutates it. The
/// position only moves forward while the stream is active and returns to
/// `start` on [`SegmentTracker::reset`].
#[derive(Debug, Clone)]
pub struct SegmentTracker {
    /// Stream name used in log output
    name: &'static str,
    segment: Segment,
}

impl SegmentTracker {
    /// Create a tracker with a default time segment
    pub fn new(name: &'static str) -> Self {
        SegmentTracker {
            name,
            segment: Segment::time(),
        }
    }

    /// Current segment
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Replace the segment.
    ///
    /// Non-time or inconsistent segments are rejected with a warning and
    /// the previous segment is kept. Returns whether the segment was taken.
    pub fn apply(&mut self, segment: Segment) -> bool {
        if !segment.is_time() {
            log::warn!("{}: received non-time segment, ignoring", self.name);
            return false;
        }
        if !segment.is_valid() {
            log::warn!("{}: received invalid {}, ignoring", self.name, segment);
            return false;
        }
        log::debug!("{}: {} now active", self.name, segment);
        self.segment = segment;
        true
    }

    /// Move the position forward to `position` (never backwards)
    pub fn advance_to(&mut self, position: ClockTime) {
        if position > self.segment.position {
            self.segment.position = position;
        }
    }

    /// Force the position, used after scheduling a primary item
    pub fn set_position(&mut self, position: ClockTime) {
        self.segment.position = position;
    }

    /// Back to a default time segment
    pub fn reset(&mut self) {
        self.segment = Segment::time();
    }

    /// Mark the segment unusable (input detached)
    pub fn invalidate(&mut self) {
        self.segment = Segment::undefined();
    }

    /// Clip an interval, see [`Segment::clip`]
    pub fn clip(
        &self,
        start: Option<ClockTime>,
        stop: Option<ClockTime>,
    ) -> Option<(Option<ClockTime>, Option<ClockTime>)> {
        self.segment.clip(start, stop)
    }

    /// Running time of a timestamp, see [`Segment::to_running_time`]
    pub fn running_time(&self, t: ClockTime) -> Option<ClockTime> {
        self.segment.to_running_time(t)
    }

    /// Running time of the segment start
    pub fn start_running_time(&self) -> Option<ClockTime> {
        self.segment.to_running_time(self.segment.start)
    }

    /// Running time of the current position
    pub fn position_running_time(&self) -> Option<ClockTime> {
        self.segment.to_running_time(self.segment.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MSECOND;

    #[test]
    fn test_clip_inside() {
        let seg = Segment::new(1000, Some(5000));
        assert_eq!(
            seg.clip(Some(2000), Some(3000)),
            Some((Some(2000), Some(3000)))
        );
    }

    #[test]
    fn test_clip_partial() {
        let seg = Segment::new(1000, Some(5000));
        assert_eq!(seg.clip(Some(500), Some(1500)), Some((Some(1000), Some(1500))));
        assert_eq!(seg.clip(Some(4500), Some(6000)), Some((Some(4500), Some(5000))));
    }

    #[test]
    fn test_clip_outside() {
        let seg = Segment::new(1000, Some(5000));
        assert_eq!(seg.clip(Some(6000), Some(7000)), None);
        assert_eq!(seg.clip(Some(0), Some(500)), None);
        // Touching boundaries are outside
        assert_eq!(seg.clip(Some(5000), Some(6000)), None);
        assert_eq!(seg.clip(Some(0), Some(1000)), None);
    }

    #[test]
    fn test_clip_open_ended() {
        let seg = Segment::new(1000, None);
        assert_eq!(seg.clip(Some(2000), None), Some((Some(2000), None)));

        let closed = Segment::new(1000, Some(5000));
        assert_eq!(closed.clip(Some(2000), None), Some((Some(2000), Some(5000))));
        assert_eq!(closed.clip(None, None), Some((None, Some(5000))));
    }

    #[test]
    fn test_clip_zero_length_segment() {
        let seg = Segment::new(1000, Some(1000));
        assert_eq!(
            seg.clip(Some(1000), Some(1000)),
            Some((Some(1000), Some(1000)))
        );
    }

    #[test]
    fn test_clip_undefined_format() {
        assert_eq!(Segment::undefined().clip(Some(0), Some(10)), None);
    }

    #[test]
    fn test_running_time_forward() {
        let seg = Segment::new(10 * MSECOND, None).with_base(100 * MSECOND);
        assert_eq!(seg.to_running_time(10 * MSECOND), Some(100 * MSECOND));
        assert_eq!(seg.to_running_time(30 * MSECOND), Some(120 * MSECOND));
        assert_eq!(seg.to_running_time(5 * MSECOND), None);
    }

    #[test]
    fn test_running_time_rate() {
        let seg = Segment::new(0, None).with_rate(2.0);
        assert_eq!(seg.to_running_time(100 * MSECOND), Some(50 * MSECOND));
    }

    #[test]
    fn test_running_time_reverse() {
        let seg = Segment::new(0, Some(1000 * MSECOND)).with_rate(-1.0);
        assert_eq!(seg.to_running_time(1000 * MSECOND), Some(0));
        assert_eq!(seg.to_running_time(400 * MSECOND), Some(600 * MSECOND));
    }

    #[test]
    fn test_running_time_past_stop() {
        let seg = Segment::new(0, Some(1000));
        assert_eq!(seg.to_running_time(1001), None);
        assert_eq!(Segment::undefined().to_running_time(0), None);
    }

    #[test]
    fn test_segment_validity() {
        assert!(Segment::time().is_valid());
        assert!(!Segment::new(10, Some(5)).is_valid());
        assert!(!Segment::time().with_rate(0.0).is_valid());
        assert!(!Segment::new(0, None).with_rate(-1.0).is_valid());
    }

    #[test]
    fn test_tracker_rejects_non_time() {
        let mut tracker = SegmentTracker::new("text");
        let applied = tracker.apply(Segment::new(500, None));
        assert!(applied);
        assert!(!tracker.apply(Segment::undefined()));
        assert_eq!(tracker.segment().start, 500);
    }

    #[test]
    fn test_tracker_position_monotonic() {
        let mut tracker = SegmentTracker::new("text");
        tracker.advance_to(100);
        tracker.advance_to(50);
        assert_eq!(tracker.segment().position, 100);
        assert_eq!(tracker.position_running_time(), Some(100));

        tracker.reset();
        assert_eq!(tracker.segment().position, 0);
    }

    #[test]
    fn test_tracker_invalidate() {
        let mut tracker = SegmentTracker::new("text");
        tracker.invalidate();
        assert!(!tracker.segment().is_time());
        assert_eq!(tracker.start_running_time(), None);
    }
}
