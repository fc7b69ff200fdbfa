//! Frame Scheduler
//!
//! Per primary item decision loop: pass the frame through, wait for text,
//! or pair it with the pending text item. The loop is an explicit state
//! machine over [`Phase`]; every wake from the condition variable re-enters
//! it at the flow check.

use super::{Shared, SyncFlags, SyncState};
use crate::compositor::{self, place, CompositeMode, Composition, OverlayOutcome};
use crate::overlay::ScheduledFrame;
use crate::segment::SegmentTracker;
use crate::stream::{TextItem, VideoItem};
use crate::text::prepare_payload;
use crate::time::{display, ClockTime};
use crate::video::VideoInfo;
use crate::{Result, TextOverlayError};
use parking_lot::MutexGuard;
use std::sync::Arc;

/// Position of a text interval `[ts, te)` relative to a frame `[vs, ve)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Text timing unknown, the item applies to this frame only
    Untimed,
    /// `te <= vs`: the text ended before the frame
    Stale,
    /// `ve <= ts`: the text starts after the frame
    Future,
    /// The intervals overlap; `consumed` when the text ends within the frame
    Current {
        /// `te <= ve`
        consumed: bool,
    },
}

/// Classify a text running-time interval against a frame interval.
///
/// Stale is checked before future so an empty overlap is never counted
/// twice.
pub fn classify(text: Option<(ClockTime, ClockTime)>, vs: ClockTime, ve: ClockTime) -> Overlap {
    let Some((ts, te)) = text else {
        return Overlap::Untimed;
    };
    if te <= vs {
        Overlap::Stale
    } else if ve <= ts {
        Overlap::Future
    } else {
        Overlap::Current { consumed: te <= ve }
    }
}

/// What to do with the frame
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Passthrough,
    Overlay { text: String, consume: bool },
}

/// Step of the wait loop
#[derive(Debug)]
enum Phase {
    CheckFlow,
    Inspect,
    Wait,
    Done(Decision),
}

fn check_flow(flags: SyncFlags) -> Result<()> {
    if flags.contains(SyncFlags::PRIMARY_FLUSHING) {
        log::debug!("video flushing");
        return Err(TextOverlayError::Flushing);
    }
    if flags.contains(SyncFlags::PRIMARY_EOS) {
        log::debug!("video at end of stream");
        return Err(TextOverlayError::EndOfStream);
    }
    Ok(())
}

/// Running-time interval of a timed text item
fn text_interval(segment: &SegmentTracker, item: &TextItem) -> Option<(ClockTime, ClockTime)> {
    let ts = segment.running_time(item.pts?)?;
    let te = segment.running_time(item.end()?)?;
    Some((ts.min(te), ts.max(te)))
}

impl Shared {
    /// Schedule one primary item.
    ///
    /// Returns `Ok(None)` when the item is dropped (no timestamp or outside
    /// the video segment).
    pub fn video_frame(&self, mut item: VideoItem) -> Result<Option<ScheduledFrame>> {
        let Some(pts) = item.pts else {
            log::warn!("video buffer without a valid timestamp, dropping");
            return Ok(None);
        };

        let mut state = self.state.lock();
        check_flow(state.flags)?;

        let segment = *state.video_segment.segment();
        if item.duration.is_none() && pts < segment.start {
            log::debug!("video buffer {} before segment start, dropping", display(pts));
            return Ok(None);
        }
        let Some((clip_start, clip_stop)) = segment.clip(Some(pts), item.end()) else {
            log::debug!("video buffer {} outside of {}, dropping", display(pts), segment);
            return Ok(None);
        };

        let start = clip_start.unwrap_or(pts);
        if item.duration.is_some() {
            if let Some(stop) = clip_stop {
                item.duration = Some(stop.saturating_sub(start));
            }
        }
        item.pts = Some(start);

        let stop = item.end().unwrap_or_else(|| {
            start + item.payload.info().frame_duration().unwrap_or(1)
        });
        let stop = segment.stop.map_or(stop, |seg_stop| stop.min(seg_stop));

        let (Some(vs), Some(ve)) = (segment.to_running_time(start), segment.to_running_time(stop))
        else {
            log::debug!("no running time for video buffer {}", display(start));
            state.video_segment.set_position(start);
            return Ok(Some(ScheduledFrame::passthrough(item)));
        };
        let (vs, ve) = (vs.min(ve), vs.max(ve));
        log::trace!("video running time {} - {}", display(vs), display(ve));

        let config = Arc::clone(&state.config);
        let decision = if config.silent {
            Decision::Passthrough
        } else if !state.flags.contains(SyncFlags::SECONDARY_CONNECTED) {
            let text = state.provider.text_for(start, Some(vs), &config);
            if text.is_empty() {
                Decision::Passthrough
            } else {
                Decision::Overlay {
                    text,
                    consume: false,
                }
            }
        } else {
            self.wait_for_text(&mut state, vs, ve)?
        };

        let composition = match decision {
            Decision::Passthrough => None,
            Decision::Overlay { text, consume } => {
                let composition = self.render_locked(&mut state, &text, item.payload.info());
                if consume {
                    self.pop_text(&mut state);
                }
                composition
            }
        };

        let mode = CompositeMode {
            attach: state.attach,
            shading: config
                .shaded_background
                .then_some(config.shading_value),
        };
        state.video_segment.set_position(start);
        drop(state);

        let outcome = match composition {
            Some(composition) => compositor::composite(&mut item.payload, composition, mode),
            None => OverlayOutcome::Passthrough,
        };
        Ok(Some(ScheduledFrame { item, outcome }))
    }

    /// Run the wait loop for a frame covering `[vs, ve)`
    fn wait_for_text(
        &self,
        state: &mut MutexGuard<'_, SyncState>,
        vs: ClockTime,
        ve: ClockTime,
    ) -> Result<Decision> {
        let mut phase = Phase::CheckFlow;
        loop {
            phase = match phase {
                Phase::CheckFlow => {
                    check_flow(state.flags)?;
                    Phase::Inspect
                }
                Phase::Inspect => self.inspect(state, vs, ve),
                Phase::Wait => {
                    log::debug!("no text buffer, waiting for one");
                    self.cond.wait(state);
                    Phase::CheckFlow
                }
                Phase::Done(decision) => return Ok(decision),
            };
        }
    }

    fn inspect(&self, state: &mut SyncState, vs: ClockTime, ve: ClockTime) -> Phase {
        let overlap = state
            .slot
            .peek()
            .map(|item| classify(text_interval(&state.text_segment, item), vs, ve));

        let Some(overlap) = overlap else {
            return if self.text_is_ahead(state, ve) {
                Phase::Done(Decision::Passthrough)
            } else {
                Phase::Wait
            };
        };

        log::trace!("text vs video [{} - {}): {:?}", display(vs), display(ve), overlap);
        match overlap {
            Overlap::Stale => {
                log::debug!("text buffer too old, popping");
                self.pop_text(state);
                Phase::CheckFlow
            }
            Overlap::Future => Phase::Done(Decision::Passthrough),
            Overlap::Untimed => {
                log::warn!("text buffer without valid timing, showing it for one frame");
                Phase::Done(self.overlay_pending(state, true))
            }
            Overlap::Current { consumed } => Phase::Done(self.overlay_pending(state, consumed)),
        }
    }

    /// Whether the scheduler should stop waiting on an empty slot
    fn text_is_ahead(&self, state: &SyncState, ve: ClockTime) -> bool {
        if state.flags.contains(SyncFlags::SECONDARY_EOS) {
            log::debug!("text at end of stream, passing video through");
            return true;
        }
        if !state.flags.contains(SyncFlags::SECONDARY_CONNECTED) {
            return true;
        }
        if !state.config.wait_text {
            return true;
        }
        let start = state.text_segment.start_running_time();
        let position = state.text_segment.position_running_time();
        start.is_some_and(|t| t >= ve) || position.is_some_and(|t| t >= ve)
    }

    fn overlay_pending(&self, state: &SyncState, consume: bool) -> Decision {
        match state.slot.peek() {
            Some(item) => Decision::Overlay {
                text: prepare_payload(&item.payload),
                consume,
            },
            None => Decision::Passthrough,
        }
    }

    /// Render `text` through the cache and place it for `info`
    fn render_locked(
        &self,
        state: &mut SyncState,
        text: &str,
        info: &VideoInfo,
    ) -> Option<Composition> {
        let config = Arc::clone(&state.config);
        let style = config.text_style(info.width, info.height, true);
        match state.cache.render(text, &style, &self.rasterizer) {
            Ok(image) => {
                let (x, y) = place(
                    &config.layout(),
                    image.width,
                    image.height,
                    image.baseline_offset,
                    info.width,
                    info.height,
                );
                Some(Composition { image, x, y })
            }
            Err(e) => {
                log::warn!("could not render text, passing frame through: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayConfig;
    use crate::render::tests::counting;
    use crate::render::{RasterizedText, Rasterizer, SharedRasterizer, TextStyle};
    use crate::segment::Segment;
    use crate::stream::{StreamItem, TextPayload};
    use crate::time::MSECOND;
    use crate::video::{VideoFormat, VideoFrame, VideoInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn overlay() -> (Arc<Shared>, Arc<AtomicUsize>) {
        let (rasterizer, calls) = counting();
        let shared = Arc::new(Shared::new(rasterizer));
        shared
            .state
            .lock()
            .flags
            .insert(SyncFlags::SECONDARY_CONNECTED);
        (shared, calls)
    }

    fn frame(start_ms: u64, dur_ms: u64) -> VideoItem {
        let info = VideoInfo::new(VideoFormat::Rgba, 64, 48).unwrap();
        StreamItem::new(start_ms * MSECOND, dur_ms * MSECOND, VideoFrame::black(info))
    }

    fn cue(start_ms: u64, dur_ms: u64, text: &str) -> TextItem {
        StreamItem::new(start_ms * MSECOND, dur_ms * MSECOND, TextPayload::plain(text))
    }

    fn set_config(shared: &Shared, config: OverlayConfig) {
        let mut state = shared.state.lock();
        state.config = Arc::new(config);
        state.cache.invalidate();
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(None, 0, 10), Overlap::Untimed);
        assert_eq!(classify(Some((0, 5)), 5, 10), Overlap::Stale);
        assert_eq!(classify(Some((10, 20)), 0, 10), Overlap::Future);
        assert_eq!(
            classify(Some((2, 8)), 0, 10),
            Overlap::Current { consumed: true }
        );
        assert_eq!(
            classify(Some((2, 18)), 0, 10),
            Overlap::Current { consumed: false }
        );
        // Zero length text on the frame boundary is stale, not future
        assert_eq!(classify(Some((10, 10)), 10, 20), Overlap::Stale);
    }

    #[test]
    fn test_overlap_composites_and_consumes() {
        let (shared, calls) = overlay();
        shared.push_text(cue(500, 200, "hello")).unwrap();

        let out = shared.video_frame(frame(0, 1000)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Blended);
        assert!(!shared.state.lock().slot.is_occupied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_future_text_passes_frame() {
        let (shared, calls) = overlay();
        shared.push_text(cue(2000, 1000, "later")).unwrap();

        let out = shared.video_frame(frame(0, 1000)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Passthrough);
        assert!(shared.state.lock().slot.is_occupied());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_long_text_retained_and_reused() {
        let (shared, calls) = overlay();
        shared.state.lock().attach = true;
        shared.push_text(cue(0, 3000, "long")).unwrap();

        let first = shared.video_frame(frame(0, 1000)).unwrap().unwrap();
        let second = shared.video_frame(frame(1000, 1000)).unwrap().unwrap();
        assert_eq!(first.outcome, OverlayOutcome::Attached);
        assert_eq!(second.outcome, OverlayOutcome::Attached);
        assert!(shared.state.lock().slot.is_occupied());

        let a = first.item.payload.composition.unwrap();
        let b = second.item.payload.composition.unwrap();
        assert!(Arc::ptr_eq(&a.image, &b.image));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_text_popped_then_waits() {
        let (shared, _) = overlay();
        shared.push_text(cue(0, 100, "old")).unwrap();

        let consumer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.video_frame(frame(1000, 1000)))
        };

        // The stale item is dropped and the scheduler waits for new text
        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());
        assert!(!shared.state.lock().slot.is_occupied());

        shared.push_text(cue(1200, 100, "new")).unwrap();
        let out = consumer.join().unwrap().unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Blended);
        assert!(!shared.state.lock().slot.is_occupied());
    }

    #[test]
    fn test_untimed_text_shown_once() {
        let (shared, calls) = overlay();
        shared
            .push_text(StreamItem::untimed(TextPayload::plain("once")))
            .unwrap();

        let out = shared.video_frame(frame(0, 40)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Blended);
        assert!(!shared.state.lock().slot.is_occupied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unconnected_uses_default_text() {
        let (shared, calls) = overlay();
        shared
            .state
            .lock()
            .flags
            .remove(SyncFlags::SECONDARY_CONNECTED);
        set_config(
            &shared,
            OverlayConfig {
                text: "default".into(),
                ..OverlayConfig::default()
            },
        );

        for i in 0..3 {
            let out = shared.video_frame(frame(i * 40, 40)).unwrap().unwrap();
            assert_eq!(out.outcome, OverlayOutcome::Blended);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unconnected_empty_text_passes() {
        let (shared, calls) = overlay();
        shared.state.lock().flags = SyncFlags::empty();
        let out = shared.video_frame(frame(0, 40)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Passthrough);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_silent_leaves_slot_alone() {
        let (shared, calls) = overlay();
        set_config(
            &shared,
            OverlayConfig {
                silent: true,
                ..OverlayConfig::default()
            },
        );
        shared.push_text(cue(0, 1000, "quiet")).unwrap();

        let out = shared.video_frame(frame(0, 1000)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Passthrough);
        assert!(shared.state.lock().slot.is_occupied());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_wait_when_disabled() {
        let (shared, _) = overlay();
        set_config(
            &shared,
            OverlayConfig {
                wait_text: false,
                ..OverlayConfig::default()
            },
        );
        let out = shared.video_frame(frame(0, 40)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Passthrough);
    }

    #[test]
    fn test_no_wait_after_text_eos() {
        let (shared, _) = overlay();
        shared.state.lock().flags.insert(SyncFlags::SECONDARY_EOS);
        let out = shared.video_frame(frame(0, 40)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Passthrough);
    }

    #[test]
    fn test_no_wait_when_text_position_ahead() {
        let (shared, _) = overlay();
        shared.state.lock().text_segment.advance_to(500 * MSECOND);
        let out = shared.video_frame(frame(0, 40)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Passthrough);
    }

    #[test]
    fn test_flush_unblocks_waiting_scheduler() {
        let (shared, _) = overlay();
        let consumer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.video_frame(frame(0, 40)))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());

        shared
            .state
            .lock()
            .flags
            .insert(SyncFlags::PRIMARY_FLUSHING);
        shared.broadcast();
        assert!(matches!(
            consumer.join().unwrap(),
            Err(TextOverlayError::Flushing)
        ));
    }

    #[test]
    fn test_flow_errors() {
        let (shared, _) = overlay();
        shared.state.lock().flags.insert(SyncFlags::PRIMARY_EOS);
        assert!(matches!(
            shared.video_frame(frame(0, 40)),
            Err(TextOverlayError::EndOfStream)
        ));
    }

    #[test]
    fn test_primary_without_timestamp_dropped() {
        let (shared, _) = overlay();
        let info = VideoInfo::new(VideoFormat::Rgba, 8, 8).unwrap();
        let item = StreamItem::untimed(VideoFrame::black(info));
        assert!(shared.video_frame(item).unwrap().is_none());
    }

    #[test]
    fn test_primary_outside_segment_dropped() {
        let (shared, _) = overlay();
        shared
            .state
            .lock()
            .video_segment
            .apply(Segment::new(1000 * MSECOND, Some(2000 * MSECOND)));

        assert!(shared.video_frame(frame(0, 500)).unwrap().is_none());
        assert!(shared.video_frame(frame(2500, 40)).unwrap().is_none());
    }

    #[test]
    fn test_primary_clipped_and_position_updated() {
        let (shared, _) = overlay();
        set_config(
            &shared,
            OverlayConfig {
                wait_text: false,
                ..OverlayConfig::default()
            },
        );
        shared
            .state
            .lock()
            .video_segment
            .apply(Segment::new(1000 * MSECOND, Some(2000 * MSECOND)));

        let out = shared.video_frame(frame(900, 200)).unwrap().unwrap();
        assert_eq!(out.item.pts, Some(1000 * MSECOND));
        assert_eq!(out.item.duration, Some(100 * MSECOND));
        assert_eq!(
            shared.state.lock().video_segment.segment().position,
            1000 * MSECOND
        );
    }

    #[test]
    fn test_missing_duration_uses_frame_rate() {
        let (shared, _) = overlay();
        // Text in [45, 60) overlaps the estimated [40, 80) frame only
        shared.push_text(cue(45, 15, "x")).unwrap();
        let info = VideoInfo::new(VideoFormat::Rgba, 8, 8)
            .unwrap()
            .with_framerate(25, 1);
        let item = StreamItem {
            pts: Some(40 * MSECOND),
            duration: None,
            payload: VideoFrame::black(info),
        };
        let out = shared.video_frame(item).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Blended);
        assert_eq!(out.item.duration, None);
    }

    #[test]
    fn test_rasterizer_failure_passes_through() {
        struct Failing;
        impl Rasterizer for Failing {
            fn rasterize(&mut self, _: &str, _: &TextStyle) -> Result<RasterizedText> {
                Err(TextOverlayError::Rasterizer("no fonts".into()))
            }
        }
        let shared = Shared::new(SharedRasterizer::new(Failing));
        shared
            .state
            .lock()
            .flags
            .insert(SyncFlags::SECONDARY_CONNECTED);
        shared.push_text(cue(0, 40, "x")).unwrap();

        let out = shared.video_frame(frame(0, 40)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Passthrough);
        assert!(!shared.state.lock().slot.is_occupied());
    }

    #[test]
    fn test_shaded_background_darkens_frame() {
        let (shared, _) = overlay();
        set_config(
            &shared,
            OverlayConfig {
                shaded_background: true,
                shading_value: 40,
                ..OverlayConfig::default()
            },
        );
        shared.push_text(cue(0, 40, "x")).unwrap();
        let info = VideoInfo::new(VideoFormat::Rgba, 64, 48).unwrap();
        let item = StreamItem::new(0, 40 * MSECOND, VideoFrame::filled(info, [100, 100, 100]));

        let out = shared.video_frame(item).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Blended);
        assert!(out.item.payload.data().chunks(4).any(|px| px[0] == 60));
    }
}
