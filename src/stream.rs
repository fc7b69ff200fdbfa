//! Stream Items and Control Events
//!
//! Item and control signal shapes shared by the primary (video) and the
//! secondary (text) input.

use crate::segment::Segment;
use crate::time::{ClockTime, TimeDisplay};
use crate::video::VideoFrame;
use std::fmt;

/// A timestamped unit of data travelling through one of the inputs
///
/// Items are moved, never shared: the producer hands ownership to the
/// engine, which hands it on to the consumer exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamItem<T> {
    /// Presentation timestamp
    pub pts: Option<ClockTime>,
    /// Duration of the item
    pub duration: Option<ClockTime>,
    /// Item data
    pub payload: T,
}

impl<T> StreamItem<T> {
    /// Create an item with both timestamp and duration
    pub fn new(pts: ClockTime, duration: ClockTime, payload: T) -> Self {
        StreamItem {
            pts: Some(pts),
            duration: Some(duration),
            payload,
        }
    }

    /// Create an item without timing information
    pub fn untimed(payload: T) -> Self {
        StreamItem {
            pts: None,
            duration: None,
            payload,
        }
    }

    /// End timestamp when both `pts` and `duration` are known
    pub fn end(&self) -> Option<ClockTime> {
        match (self.pts, self.duration) {
            (Some(pts), Some(duration)) => pts.checked_add(duration),
            _ => None,
        }
    }

    /// Whether the item carries both a timestamp and a duration
    pub fn has_valid_time(&self) -> bool {
        self.end().is_some()
    }

    /// Map the payload, keeping the timing
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StreamItem<U> {
        StreamItem {
            pts: self.pts,
            duration: self.duration,
            payload: f(self.payload),
        }
    }
}

/// How the bytes of a [`TextPayload`] are to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    /// Plain UTF-8, escaped before rendering
    #[default]
    Utf8,
    /// Already marked up, rendered as is
    Markup,
}

/// Payload of the secondary stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextPayload {
    /// Raw text bytes, expected to be UTF-8
    pub bytes: Vec<u8>,
    /// Interpretation of the bytes
    pub format: TextFormat,
}

impl TextPayload {
    /// Plain text payload
    pub fn plain(text: impl Into<String>) -> Self {
        TextPayload {
            bytes: text.into().into_bytes(),
            format: TextFormat::Utf8,
        }
    }

    /// Pre-marked-up payload
    pub fn markup(text: impl Into<String>) -> Self {
        TextPayload {
            bytes: text.into().into_bytes(),
            format: TextFormat::Markup,
        }
    }

    /// Payload from raw bytes of unknown validity
    pub fn from_bytes(bytes: Vec<u8>, format: TextFormat) -> Self {
        TextPayload { bytes, format }
    }
}

/// Item of the secondary stream
pub type TextItem = StreamItem<TextPayload>;

/// Item of the primary stream
pub type VideoItem = StreamItem<VideoFrame>;

/// Control signal delivered in-band on either input
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// New active segment
    Segment(Segment),
    /// No data until `start + duration`; only meaningful on the text input
    Gap {
        /// Start of the gap
        start: ClockTime,
        /// Length of the gap, if known
        duration: Option<ClockTime>,
    },
    /// Stream is being reset, abort blocking operations
    FlushStart,
    /// Reset finished
    FlushStop,
    /// No more data will arrive
    Eos,
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEvent::Segment(segment) => write!(f, "{segment}"),
            StreamEvent::Gap { start, duration } => write!(
                f,
                "gap(start={} duration={})",
                TimeDisplay(Some(*start)),
                TimeDisplay(*duration)
            ),
            StreamEvent::FlushStart => write!(f, "flush-start"),
            StreamEvent::FlushStop => write!(f, "flush-stop"),
            StreamEvent::Eos => write!(f, "eos"),
        }
    }
}
