//! Lifecycle Control
//!
//! Control events of both inputs, the connected flag of the text input and
//! element state changes. Every transition that can unblock a waiting
//! thread ends with a broadcast.

use super::{Shared, SyncFlags};
use crate::overlay::{OverlayState, StateChange};
use crate::stream::StreamEvent;
use crate::time::display;

impl Shared {
    /// Handle a control event of the video input
    pub fn video_event(&self, event: StreamEvent) {
        log::debug!("video event: {event}");
        let mut state = self.state.lock();
        match event {
            StreamEvent::Segment(segment) => {
                state.video_segment.apply(segment);
            }
            StreamEvent::Gap { start, .. } => {
                log::debug!("ignoring video gap at {}", display(start));
            }
            StreamEvent::FlushStart => {
                log::info!("video flush start");
                state.flags.insert(SyncFlags::PRIMARY_FLUSHING);
                self.broadcast();
            }
            StreamEvent::FlushStop => {
                log::info!("video flush stop");
                state
                    .flags
                    .remove(SyncFlags::PRIMARY_FLUSHING | SyncFlags::PRIMARY_EOS);
                state.video_segment.reset();
                self.pop_text(&mut state);
            }
            StreamEvent::Eos => {
                log::info!("video end of stream");
                state.flags.insert(SyncFlags::PRIMARY_EOS);
                self.broadcast();
            }
        }
    }

    /// Handle a control event of the text input
    pub fn text_event(&self, event: StreamEvent) {
        log::debug!("text event: {event}");
        let mut state = self.state.lock();
        match event {
            StreamEvent::Segment(segment) => {
                state.text_segment.apply(segment);
                state.flags.remove(SyncFlags::SECONDARY_EOS);
                // The scheduler may be waiting for a segment update
                self.broadcast();
            }
            StreamEvent::Gap { start, duration } => {
                let position = duration.map_or(start, |d| start.saturating_add(d));
                log::debug!("text gap until {}", display(position));
                state.text_segment.advance_to(position);
                self.broadcast();
            }
            StreamEvent::FlushStart => {
                log::info!("text flush start");
                state.flags.insert(SyncFlags::SECONDARY_FLUSHING);
                self.broadcast();
            }
            StreamEvent::FlushStop => {
                log::info!("text flush stop");
                state
                    .flags
                    .remove(SyncFlags::SECONDARY_FLUSHING | SyncFlags::SECONDARY_EOS);
                state.text_segment.reset();
                self.pop_text(&mut state);
            }
            StreamEvent::Eos => {
                log::info!("text end of stream");
                state.flags.insert(SyncFlags::SECONDARY_EOS);
                self.broadcast();
            }
        }
    }

    /// Attach or detach the text input
    pub fn set_text_connected(&self, connected: bool) {
        let mut state = self.state.lock();
        if connected {
            log::info!("text input connected");
            state.flags.insert(SyncFlags::SECONDARY_CONNECTED);
            if !state.text_segment.segment().is_time() {
                state.text_segment.reset();
            }
        } else {
            log::info!("text input disconnected");
            state.flags.remove(SyncFlags::SECONDARY_CONNECTED);
            state.text_segment.invalidate();
        }
        state.cache.invalidate();
        self.broadcast();
    }

    /// Perform an element state change
    pub fn change_state(&self, change: StateChange) {
        let mut state = self.state.lock();
        match change {
            StateChange::PausedToReady => {
                log::info!("paused -> ready, draining waiting threads");
                state
                    .flags
                    .insert(SyncFlags::PRIMARY_FLUSHING | SyncFlags::SECONDARY_FLUSHING);
                self.pop_text(&mut state);
                state.state = OverlayState::Ready;
            }
            StateChange::ReadyToPaused => {
                log::info!("ready -> paused");
                state.flags.remove(
                    SyncFlags::PRIMARY_FLUSHING
                        | SyncFlags::SECONDARY_FLUSHING
                        | SyncFlags::PRIMARY_EOS
                        | SyncFlags::SECONDARY_EOS,
                );
                state.video_segment.reset();
                state.text_segment.reset();
                state.state = OverlayState::Paused;
            }
        }
    }
}
