//! Pending Text Slot
//!
//! Rendezvous of capacity one between the text producer and the frame
//! scheduler. A producer pushing while the slot is occupied waits until the
//! scheduler pops the current item or the text input starts flushing.

use super::{Shared, SyncFlags, SyncState};
use crate::stream::TextItem;
use crate::time::display;
use crate::{Result, TextOverlayError};

/// Holds at most one text item
#[derive(Debug, Default)]
pub struct PendingSlot {
    item: Option<TextItem>,
}

impl PendingSlot {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an item is pending
    pub fn is_occupied(&self) -> bool {
        self.item.is_some()
    }

    /// Pending item, if any
    pub fn peek(&self) -> Option<&TextItem> {
        self.item.as_ref()
    }

    /// Store `item`; the slot must be empty
    fn store(&mut self, item: TextItem) {
        debug_assert!(self.item.is_none(), "pending slot already occupied");
        self.item = Some(item);
    }

    /// Remove the pending item
    pub fn take(&mut self) -> Option<TextItem> {
        self.item.take()
    }
}

impl Shared {
    /// Hand a text item to the scheduler, waiting while the slot is full.
    ///
    /// Items entirely outside the text segment are dropped and reported as
    /// success.
    pub fn push_text(&self, mut item: TextItem) -> Result<()> {
        let mut state = self.state.lock();

        if state.flags.contains(SyncFlags::SECONDARY_FLUSHING) {
            log::debug!("text flushing, refusing buffer");
            return Err(TextOverlayError::Flushing);
        }
        if state.flags.contains(SyncFlags::SECONDARY_EOS) {
            log::debug!("text at end of stream, refusing buffer");
            return Err(TextOverlayError::EndOfStream);
        }

        if let Some(pts) = item.pts {
            match state.text_segment.clip(Some(pts), item.end()) {
                None => {
                    log::debug!(
                        "text buffer {} outside of {}, dropping",
                        display(pts),
                        state.text_segment.segment()
                    );
                    return Ok(());
                }
                Some((clip_start, clip_stop)) => {
                    let start = clip_start.unwrap_or(pts);
                    if item.duration.is_some() {
                        item.duration = clip_stop.map(|stop| stop.saturating_sub(start));
                    }
                    item.pts = Some(start);
                }
            }
        }

        while state.slot.is_occupied() {
            log::debug!("text slot occupied, waiting");
            self.cond.wait(&mut state);
            if state.flags.contains(SyncFlags::SECONDARY_FLUSHING) {
                log::debug!("text flushing while waiting, dropping buffer");
                return Err(TextOverlayError::Flushing);
            }
        }

        if let Some(pts) = item.pts {
            state.text_segment.advance_to(pts);
        }
        log::debug!(
            "queued text buffer {} + {}",
            display(item.pts.unwrap_or_default()),
            display(item.duration.unwrap_or_default())
        );
        state.slot.store(item);
        state.cache.invalidate();
        self.broadcast();
        Ok(())
    }

    /// Clear the slot and wake a waiting producer
    pub(crate) fn pop_text(&self, state: &mut SyncState) {
        if let Some(item) = state.slot.take() {
            log::debug!(
                "releasing text buffer {}",
                display(item.pts.unwrap_or_default())
            );
        }
        self.broadcast();
    }
}
