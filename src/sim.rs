//! Scenario Simulator
//!
//! Drives an overlay from a JSON scenario with two threads: the calling
//! thread plays the video input at a fixed frame rate while a second
//! thread delivers the text cues, then reports what happened to every
//! frame.
//!
//! ```json
//! {
//!   "format": "RGBA", "width": 320, "height": 240,
//!   "fps-n": 25, "fps-d": 1, "frames": 50,
//!   "config": { "shaded-background": true },
//!   "cues": [ { "start-ms": 200, "duration-ms": 800, "text": "Hello" } ]
//! }
//! ```

use crate::compositor::OverlayOutcome;
use crate::config::OverlayConfig;
use crate::overlay::{StateChange, TextOverlay};
use crate::render::block::BlockRasterizer;
use crate::render::SharedRasterizer;
use crate::stream::{StreamEvent, StreamItem, TextItem, TextPayload};
use crate::text::RunningTimeText;
use crate::time::{display, ClockTime, MSECOND};
use crate::video::{VideoFormat, VideoFrame, VideoInfo};
use crate::{Result, TextOverlayError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// One text cue of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Cue {
    /// Start in milliseconds, `None` for an untimed cue
    #[serde(default)]
    pub start_ms: Option<u64>,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Cue text
    pub text: String,
    /// Text is already marked up
    #[serde(default)]
    pub markup: bool,
}

impl Cue {
    fn to_item(&self) -> TextItem {
        let payload = if self.markup {
            TextPayload::markup(self.text.clone())
        } else {
            TextPayload::plain(self.text.clone())
        };
        StreamItem {
            pts: self.start_ms.map(|ms| ms * MSECOND),
            duration: self.duration_ms.map(|ms| ms * MSECOND),
            payload,
        }
    }
}

/// A simulation run description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Scenario {
    /// Overlay configuration
    pub config: OverlayConfig,
    /// Video pixel format
    pub format: VideoFormat,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame rate numerator
    pub fps_n: u32,
    /// Frame rate denominator
    pub fps_d: u32,
    /// Number of video frames to play
    pub frames: u32,
    /// Whether a text input is attached (cues are ignored otherwise)
    pub connected: bool,
    /// Attach overlays instead of blending
    pub attach: bool,
    /// Show the running time when no text input is attached
    pub running_time: bool,
    /// Text cues in delivery order
    pub cues: Vec<Cue>,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            config: OverlayConfig::default(),
            format: VideoFormat::Rgba,
            width: 320,
            height: 240,
            fps_n: 25,
            fps_d: 1,
            frames: 25,
            connected: true,
            attach: false,
            running_time: false,
            cues: Vec::new(),
        }
    }
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame number
    pub index: u32,
    /// Frame timestamp
    pub pts: ClockTime,
    /// Overlay outcome, `None` when the frame was dropped
    pub outcome: Option<OverlayOutcome>,
}

/// Result of a simulation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimReport {
    /// Per-frame outcomes, in output order
    pub frames: Vec<FrameReport>,
    /// Number of cues the text thread handed over
    pub cues_delivered: usize,
    /// Rasterizer invocations
    pub renders: u64,
}

impl SimReport {
    /// Number of frames carrying text
    pub fn overlaid(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| {
                matches!(
                    f.outcome,
                    Some(OverlayOutcome::Attached | OverlayOutcome::Blended)
                )
            })
            .count()
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            let outcome = match frame.outcome {
                Some(OverlayOutcome::Passthrough) => "passthrough",
                Some(OverlayOutcome::Attached) => "attached",
                Some(OverlayOutcome::Blended) => "blended",
                None => "dropped",
            };
            writeln!(f, "{:>5}  {}  {}", frame.index, display(frame.pts), outcome)?;
        }
        write!(
            f,
            "{} frames, {} with text, {} cues delivered, {} renders",
            self.frames.len(),
            self.overlaid(),
            self.cues_delivered,
            self.renders
        )
    }
}

impl Scenario {
    /// Parse and check a JSON scenario
    pub fn from_json(json: &str) -> Result<Self> {
        let scenario: Scenario =
            serde_json::from_str(json).map_err(|e| TextOverlayError::Scenario(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the scenario can be played
    pub fn validate(&self) -> Result<()> {
        if self.fps_n == 0 || self.fps_d == 0 {
            return Err(TextOverlayError::Scenario(format!(
                "frame rate {}/{} is not playable",
                self.fps_n, self.fps_d
            )));
        }
        self.config.validate()?;
        self.video_info().map(|_| ())
    }

    fn video_info(&self) -> Result<VideoInfo> {
        Ok(VideoInfo::new(self.format, self.width, self.height)?
            .with_framerate(self.fps_n, self.fps_d))
    }

    /// Play the scenario with the block rasterizer
    pub fn run(&self) -> Result<SimReport> {
        self.run_with(SharedRasterizer::new(BlockRasterizer::new()))
    }

    /// Play the scenario with `rasterizer`
    pub fn run_with(&self, rasterizer: SharedRasterizer) -> Result<SimReport> {
        self.validate()?;
        let info = self.video_info()?;
        let frame_duration = info.frame_duration().unwrap_or(MSECOND);

        let overlay = Arc::new(TextOverlay::with_config(rasterizer, self.config.clone())?);
        overlay.set_attach_composition(self.attach);
        if self.running_time {
            overlay.set_text_provider(RunningTimeText);
        }
        overlay.change_state(StateChange::ReadyToPaused);
        overlay.set_text_connected(self.connected);

        let text_thread = self.connected.then(|| {
            let overlay = Arc::clone(&overlay);
            let cues = self.cues.clone();
            thread::spawn(move || deliver_cues(&overlay, &cues))
        });

        let mut report = SimReport::default();
        for index in 0..self.frames {
            let pts = index as ClockTime * frame_duration;
            let item = StreamItem::new(pts, frame_duration, VideoFrame::black(info.clone()));
            match overlay.video_frame(item) {
                Ok(out) => report.frames.push(FrameReport {
                    index,
                    pts,
                    outcome: out.map(|scheduled| scheduled.outcome),
                }),
                Err(e) if e.is_flow_signal() => {
                    log::info!("video stopped at frame {index}: {e}");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        overlay.video_event(StreamEvent::Eos);
        // Releases a text thread still waiting on a full slot
        overlay.change_state(StateChange::PausedToReady);

        if let Some(handle) = text_thread {
            report.cues_delivered = handle
                .join()
                .map_err(|_| TextOverlayError::Scenario("text thread panicked".into()))?;
        }
        report.renders = overlay.render_count();
        Ok(report)
    }
}

/// Push every cue, then end the text stream. Returns the number of cues
/// accepted.
fn deliver_cues(overlay: &TextOverlay, cues: &[Cue]) -> usize {
    let mut delivered = 0;
    for cue in cues {
        match overlay.text_buffer(cue.to_item()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                log::info!("text stopped after {delivered} cues: {e}");
                return delivered;
            }
        }
    }
    overlay.text_event(StreamEvent::Eos);
    delivered
}
