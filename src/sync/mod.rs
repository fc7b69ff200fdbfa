//! Synchronization Core
//!
//! Shared state of one overlay instance and the three pieces operating on
//! it: the single-item text rendezvous ([`slot`]), the per-frame decision
//! loop ([`scheduler`]) and the flush / end-of-stream / state protocol
//! ([`lifecycle`]).
//!
//! Everything lives behind one `parking_lot::Mutex` paired with one
//! `Condvar`. Wake-ups are always broadcast and every wait re-checks its
//! predicate in a loop.

pub mod lifecycle;
pub mod scheduler;
pub mod slot;

use crate::config::OverlayConfig;
use crate::overlay::OverlayState;
use crate::render::{RenderCache, SharedRasterizer};
use crate::segment::SegmentTracker;
use crate::text::{StaticText, TextProvider};
use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

pub use slot::PendingSlot;

bitflags! {
    /// Flow flags of both inputs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SyncFlags: u8 {
        /// Primary input is being flushed
        const PRIMARY_FLUSHING = 0x01;
        /// Secondary input is being flushed
        const SECONDARY_FLUSHING = 0x02;
        /// Primary input reached end of stream
        const PRIMARY_EOS = 0x04;
        /// Secondary input reached end of stream
        const SECONDARY_EOS = 0x08;
        /// A secondary input is attached
        const SECONDARY_CONNECTED = 0x10;
    }
}

/// State guarded by the overlay lock
pub(crate) struct SyncState {
    pub flags: SyncFlags,
    pub video_segment: SegmentTracker,
    pub text_segment: SegmentTracker,
    pub slot: PendingSlot,
    pub cache: RenderCache,
    pub config: Arc<OverlayConfig>,
    pub provider: Arc<dyn TextProvider>,
    /// Downstream composites attached overlays itself
    pub attach: bool,
    pub state: OverlayState,
}

impl SyncState {
    fn new() -> Self {
        SyncState {
            flags: SyncFlags::empty(),
            video_segment: SegmentTracker::new("video"),
            text_segment: SegmentTracker::new("text"),
            slot: PendingSlot::new(),
            cache: RenderCache::new(),
            config: Arc::new(OverlayConfig::default()),
            provider: Arc::new(StaticText),
            attach: false,
            state: OverlayState::Ready,
        }
    }
}

/// Lock, condition variable and rasterizer handle of one overlay
pub(crate) struct Shared {
    pub state: Mutex<SyncState>,
    pub cond: Condvar,
    pub rasterizer: SharedRasterizer,
}

impl Shared {
    pub fn new(rasterizer: SharedRasterizer) -> Self {
        Shared {
            state: Mutex::new(SyncState::new()),
            cond: Condvar::new(),
            rasterizer,
        }
    }

    /// Wake every thread waiting on the overlay
    pub fn broadcast(&self) {
        self.cond.notify_all();
    }
}
