//! Text Overlay
//!
//! Public entry point tying the synchronization core, the render cache and
//! the compositor together. One [`TextOverlay`] is shared (usually through
//! an `Arc`) between the thread delivering video and the thread delivering
//! text.

use crate::compositor::OverlayOutcome;
use crate::config::OverlayConfig;
use crate::render::SharedRasterizer;
use crate::stream::{StreamEvent, TextItem, VideoItem};
use crate::sync::{Shared, SyncFlags};
use crate::text::TextProvider;
use crate::video::VideoFrame;
use crate::Result;
use std::fmt;
use std::sync::Arc;

/// Element state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayState {
    /// Stopped. A new overlay starts here and accepts data; after
    /// `PausedToReady`, pushes are refused until the next `ReadyToPaused`
    #[default]
    Ready,
    /// Running
    Paused,
}

/// Element state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// Start streaming: clear flow flags and reset both segments
    ReadyToPaused,
    /// Stop streaming: flush both inputs and release the pending text
    PausedToReady,
}

/// Result of scheduling one primary item
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledFrame {
    /// The (possibly clipped, possibly modified) video item
    pub item: VideoItem,
    /// How the overlay was applied
    pub outcome: OverlayOutcome,
}

impl ScheduledFrame {
    pub(crate) fn passthrough(item: VideoItem) -> Self {
        ScheduledFrame {
            item,
            outcome: OverlayOutcome::Passthrough,
        }
    }

    /// Whether text was attached or blended
    pub fn is_overlaid(&self) -> bool {
        self.outcome != OverlayOutcome::Passthrough
    }

    /// Consume, returning the frame
    pub fn into_frame(self) -> VideoFrame {
        self.item.payload
    }
}

/// Two-input text overlay
///
/// Starts in [`OverlayState::Ready`] with all flow flags clear, so it
/// accepts data right away; [`StateChange::PausedToReady`] drains it.
pub struct TextOverlay {
    shared: Shared,
}

impl TextOverlay {
    /// Create an overlay rendering through `rasterizer`
    pub fn new(rasterizer: SharedRasterizer) -> Self {
        TextOverlay {
            shared: Shared::new(rasterizer),
        }
    }

    /// Create an overlay with an initial configuration
    pub fn with_config(rasterizer: SharedRasterizer, config: OverlayConfig) -> Result<Self> {
        let overlay = Self::new(rasterizer);
        overlay.set_config(config)?;
        Ok(overlay)
    }

    /// Schedule a video frame.
    ///
    /// Blocks while the text input is connected, text waiting is enabled
    /// and no text for the frame is known yet. Returns `Ok(None)` when the
    /// frame is dropped, `Err(Flushing)` / `Err(EndOfStream)` as flow
    /// signals.
    pub fn video_frame(&self, item: VideoItem) -> Result<Option<ScheduledFrame>> {
        self.shared.video_frame(item)
    }

    /// Deliver a text item, blocking while another one is pending
    pub fn text_buffer(&self, item: TextItem) -> Result<()> {
        self.shared.push_text(item)
    }

    /// Control event on the video input
    pub fn video_event(&self, event: StreamEvent) {
        self.shared.video_event(event);
    }

    /// Control event on the text input
    pub fn text_event(&self, event: StreamEvent) {
        self.shared.text_event(event);
    }

    /// Perform a state transition
    pub fn change_state(&self, change: StateChange) {
        self.shared.change_state(change);
    }

    /// Current element state
    pub fn state(&self) -> OverlayState {
        self.shared.state.lock().state
    }

    /// Attach or detach the text input
    pub fn set_text_connected(&self, connected: bool) {
        self.shared.set_text_connected(connected);
    }

    /// Whether a text input is attached
    pub fn is_text_connected(&self) -> bool {
        self.flags().contains(SyncFlags::SECONDARY_CONNECTED)
    }

    /// Snapshot of the flow flags
    pub fn flags(&self) -> SyncFlags {
        self.shared.state.lock().flags
    }

    /// Whether a text item is waiting in the slot
    pub fn has_pending_text(&self) -> bool {
        self.shared.state.lock().slot.is_occupied()
    }

    /// Replace the configuration.
    ///
    /// The new value is validated first; an invalid configuration leaves
    /// the current one in place.
    pub fn set_config(&self, config: OverlayConfig) -> Result<()> {
        config.validate()?;
        let mut state = self.shared.state.lock();
        if *state.config != config {
            log::debug!("configuration changed, text must be re-rendered");
            state.config = Arc::new(config);
            state.cache.invalidate();
        }
        Ok(())
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<OverlayConfig> {
        Arc::clone(&self.shared.state.lock().config)
    }

    /// Attach overlays to frames instead of blending them, for a
    /// downstream that composites itself
    pub fn set_attach_composition(&self, attach: bool) {
        self.shared.state.lock().attach = attach;
    }

    /// Source of text while no text input is connected
    pub fn set_text_provider<P: TextProvider + 'static>(&self, provider: P) {
        let mut state = self.shared.state.lock();
        state.provider = Arc::new(provider);
        state.cache.invalidate();
    }

    /// Number of times the rasterizer was invoked
    pub fn render_count(&self) -> u64 {
        self.shared.state.lock().cache.render_count()
    }

    /// Rasterizer handle used by this overlay
    pub fn rasterizer(&self) -> &SharedRasterizer {
        &self.shared.rasterizer
    }
}

impl fmt::Debug for TextOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TextOverlay")
            .field("state", &state.state)
            .field("flags", &state.flags)
            .field("pending_text", &state.slot.is_occupied())
            .finish()
    }
}
