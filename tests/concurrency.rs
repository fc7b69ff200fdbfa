#![cfg(feature = "block-rasterizer")]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use textoverlay::render::block::BlockRasterizer;
use textoverlay::render::SharedRasterizer;
use textoverlay::stream::{StreamEvent, StreamItem, TextItem, TextPayload, VideoItem};
use textoverlay::time::MSECOND;
use textoverlay::video::{VideoFormat, VideoFrame, VideoInfo};
use textoverlay::{
    OverlayConfig, OverlayOutcome, OverlayState, StateChange, SyncFlags, TextOverlay,
    TextOverlayError,
};

fn overlay() -> Arc<TextOverlay> {
    let overlay = TextOverlay::new(SharedRasterizer::new(BlockRasterizer::new()));
    overlay.set_text_connected(true);
    Arc::new(overlay)
}

fn frame(start_ms: u64, dur_ms: u64) -> VideoItem {
    let info = VideoInfo::new(VideoFormat::Yuy2, 64, 48).unwrap();
    StreamItem::new(start_ms * MSECOND, dur_ms * MSECOND, VideoFrame::black(info))
}

fn cue(start_ms: u64, dur_ms: u64) -> TextItem {
    StreamItem::new(start_ms * MSECOND, dur_ms * MSECOND, TextPayload::plain("x"))
}

#[test]
fn test_slot_never_holds_more_than_one() {
    let overlay = overlay();
    let accepted = Arc::new(AtomicUsize::new(0));

    let producer = {
        let overlay = Arc::clone(&overlay);
        let accepted = Arc::clone(&accepted);
        thread::spawn(move || {
            for i in 0..200u64 {
                overlay.text_buffer(cue(i * 10, 10)).unwrap();
                accepted.fetch_add(1, Ordering::SeqCst);
            }
            overlay.text_event(StreamEvent::Eos);
        })
    };

    // Every frame consumes exactly the cue it covers; the producer can
    // never be more than one cue ahead of the frames consumed so far.
    for i in 0..200u64 {
        let out = overlay.video_frame(frame(i * 10, 10)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Blended, "frame {i}");
        let ahead = accepted.load(Ordering::SeqCst) as u64;
        assert!(ahead <= i + 2, "producer {ahead} cues ahead at frame {i}");
    }
    producer.join().unwrap();
    assert!(!overlay.has_pending_text());
}

#[test]
fn test_flush_start_unblocks_both_sides() {
    let overlay = overlay();
    overlay.text_buffer(cue(5000, 100)).unwrap();

    // Blocked on the occupied slot
    let producer = {
        let overlay = Arc::clone(&overlay);
        thread::spawn(move || overlay.text_buffer(cue(6000, 100)))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!producer.is_finished());

    overlay.text_event(StreamEvent::FlushStart);
    assert!(matches!(
        producer.join().unwrap(),
        Err(TextOverlayError::Flushing)
    ));

    overlay.text_event(StreamEvent::FlushStop);
    assert!(!overlay.has_pending_text());

    // Blocked waiting for text
    let consumer = {
        let overlay = Arc::clone(&overlay);
        thread::spawn(move || overlay.video_frame(frame(0, 40)))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!consumer.is_finished());

    overlay.video_event(StreamEvent::FlushStart);
    assert!(matches!(
        consumer.join().unwrap(),
        Err(TextOverlayError::Flushing)
    ));
    overlay.video_event(StreamEvent::FlushStop);
    assert!(overlay.flags().contains(SyncFlags::SECONDARY_CONNECTED));
    assert!(!overlay.flags().contains(SyncFlags::PRIMARY_FLUSHING));
}

#[test]
fn test_ready_transition_drains_threads() {
    let overlay = overlay();
    overlay.change_state(StateChange::ReadyToPaused);
    assert_eq!(overlay.state(), OverlayState::Paused);

    let waiting = Arc::new(AtomicBool::new(true));
    let consumer = {
        let overlay = Arc::clone(&overlay);
        let waiting = Arc::clone(&waiting);
        thread::spawn(move || {
            let result = overlay.video_frame(frame(0, 40));
            waiting.store(false, Ordering::SeqCst);
            result
        })
    };
    thread::sleep(Duration::from_millis(50));
    assert!(waiting.load(Ordering::SeqCst));

    overlay.change_state(StateChange::PausedToReady);
    assert!(matches!(
        consumer.join().unwrap(),
        Err(TextOverlayError::Flushing)
    ));
    assert_eq!(overlay.state(), OverlayState::Ready);
    assert!(matches!(
        overlay.text_buffer(cue(0, 10)),
        Err(TextOverlayError::Flushing)
    ));

    overlay.change_state(StateChange::ReadyToPaused);
    overlay.text_buffer(cue(0, 40)).unwrap();
    let out = overlay.video_frame(frame(0, 40)).unwrap().unwrap();
    assert_eq!(out.outcome, OverlayOutcome::Blended);
}

#[test]
fn test_config_changes_while_streaming() {
    let overlay = overlay();
    let producer = {
        let overlay = Arc::clone(&overlay);
        thread::spawn(move || {
            for i in 0..50u64 {
                if overlay.text_buffer(cue(i * 40, 40)).is_err() {
                    break;
                }
            }
            overlay.text_event(StreamEvent::Eos);
        })
    };

    for i in 0..50u64 {
        if i % 10 == 0 {
            overlay
                .set_config(OverlayConfig {
                    shaded_background: i % 20 == 0,
                    deltay: i as i32,
                    ..OverlayConfig::default()
                })
                .unwrap();
        }
        let out = overlay.video_frame(frame(i * 40, 40)).unwrap().unwrap();
        assert_eq!(out.outcome, OverlayOutcome::Blended);
    }
    producer.join().unwrap();
}
