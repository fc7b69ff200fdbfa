//! Text Overlay Synchronization Engine
//!
//! Merges a continuous primary (video) stream with an optional, sparser
//! secondary (text) stream. For every video frame the engine decides
//! whether pending text applies to it, renders that text through a
//! [`Rasterizer`](render::Rasterizer) and composites the result onto the
//! frame, or attaches it as an overlay descriptor for a downstream
//! compositor.
//!
//! # Features
//! - Single-slot rendezvous between the text producer and the video
//!   consumer with blocking backpressure
//! - Interval overlap matching on running time, independent segments per
//!   input
//! - Flush / end-of-stream / state-change protocol that wakes blocked
//!   threads without losing or duplicating data
//! - Cached rendering with a dirty flag, deterministic placement, shaded
//!   background box and software blending for common raw formats
//!
//! # Crate feature flags
//! - `block-rasterizer` (default): deterministic block-glyph reference
//!   rasterizer (`render::block`)
//! - `simulator` (default): JSON scenario loader and two-thread driver
//!   used by the `textoverlay-sim` binary
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "block-rasterizer")]
//! # {
//! use std::sync::Arc;
//! use textoverlay::render::{block::BlockRasterizer, SharedRasterizer};
//! use textoverlay::stream::{StreamItem, TextPayload};
//! use textoverlay::time::MSECOND;
//! use textoverlay::video::{VideoFormat, VideoFrame, VideoInfo};
//! use textoverlay::TextOverlay;
//!
//! let overlay = Arc::new(TextOverlay::new(SharedRasterizer::new(BlockRasterizer::new())));
//! overlay.set_text_connected(true);
//!
//! let text = Arc::clone(&overlay);
//! std::thread::spawn(move || {
//!     let cue = StreamItem::new(0, 2000 * MSECOND, TextPayload::plain("Hello"));
//!     text.text_buffer(cue).ok();
//! });
//!
//! let info = VideoInfo::new(VideoFormat::Rgba, 320, 240).unwrap();
//! let frame = StreamItem::new(0, 40 * MSECOND, VideoFrame::black(info));
//! let out = overlay.video_frame(frame).unwrap();
//! # }
//! ```

#![warn(missing_docs)]

pub mod compositor; // Placement, Shading, Blending
pub mod config; // Typed Configuration
pub mod overlay; // Public Facade
pub mod render; // Rasterizer Interface & Render Cache
pub mod segment; // Stream Segments & Running Time
#[cfg(feature = "simulator")]
pub mod sim; // Scenario Driver
pub mod stream; // Items & Control Events
pub mod sync; // Rendezvous, Scheduler, Lifecycle
pub mod text; // Text Preparation & Providers
pub mod time; // Clock Time
pub mod video; // Raw Video Frames

/// Error types for text overlay operations
#[derive(thiserror::Error, Debug)]
pub enum TextOverlayError {
    /// The stream is being flushed; stop pushing until flush-stop
    #[error("Stream is flushing")]
    Flushing,

    /// The stream has ended
    #[error("End of stream")]
    EndOfStream,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frame data does not match its description
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The rasterizer could not produce an image
    #[error("Rasterizer error: {0}")]
    Rasterizer(String),

    /// Simulator scenario could not be used
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl TextOverlayError {
    /// Whether the error is an expected flow signal (flushing or end of
    /// stream) rather than a fault
    pub fn is_flow_signal(&self) -> bool {
        matches!(
            self,
            TextOverlayError::Flushing | TextOverlayError::EndOfStream
        )
    }
}

impl From<String> for TextOverlayError {
    /// Converts a String into `TextOverlayError::Other`.
    ///
    /// Prefer the specific variants (`InvalidConfig`, `InvalidFrame`,
    /// `Rasterizer`) where the failure kind is known.
    fn from(msg: String) -> Self {
        TextOverlayError::Other(msg)
    }
}

impl From<&str> for TextOverlayError {
    /// Converts a string slice into `TextOverlayError::Other`.
    fn from(msg: &str) -> Self {
        TextOverlayError::Other(msg.to_string())
    }
}

/// Result type for text overlay operations
pub type Result<T> = std::result::Result<T, TextOverlayError>;

// Public API exports
pub use compositor::{place, Composition, OverlayOutcome};
pub use config::{HAlign, LineAlign, OverlayConfig, VAlign, WrapMode};
pub use overlay::{OverlayState, ScheduledFrame, StateChange, TextOverlay};
pub use render::{Rasterizer, RenderedImage, SharedRasterizer, TextStyle};
pub use segment::{Segment, SegmentFormat, SegmentTracker};
pub use stream::{StreamEvent, StreamItem, TextFormat, TextItem, TextPayload, VideoItem};
pub use sync::SyncFlags;
pub use text::{RunningTimeText, StaticText, TextProvider};
pub use time::ClockTime;
pub use video::{VideoFormat, VideoFrame, VideoInfo};
