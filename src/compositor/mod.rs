//! Compositor
//!
//! Places a rendered text image on a video frame and either attaches it
//! as an overlay descriptor or draws it into the frame pixels.

pub mod blend;
pub mod shade;

use crate::config::{HAlign, LayoutParams, VAlign};
use crate::render::RenderedImage;
use crate::video::VideoFrame;
use std::sync::Arc;

/// Extra pixels around the text covered by the shaded box
pub const BOX_XPAD: i32 = 6;
/// Extra rows around the text covered by the shaded box
pub const BOX_YPAD: i32 = 6;

/// A rendered image anchored at a frame position
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    /// Image to draw
    pub image: Arc<RenderedImage>,
    /// Left edge in frame pixels, may be negative or beyond the frame
    pub x: i32,
    /// Top edge in frame pixels, may be negative or beyond the frame
    pub y: i32,
}

/// What happened to a scheduled primary item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayOutcome {
    /// Forwarded unchanged
    Passthrough,
    /// Overlay attached as a [`Composition`] for a downstream compositor
    Attached,
    /// Overlay blended into the frame pixels
    Blended,
}

/// How [`composite`] applies a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeMode {
    /// Attach the composition instead of touching pixels
    pub attach: bool,
    /// Shading amount for the background box, `None` for no box
    pub shading: Option<u8>,
}

/// Frame position of an `image_w` x `image_h` image.
///
/// Each coordinate is clamped so the image stays inside the frame where it
/// fits, then shifted by the unclamped deltas.
pub fn place(
    layout: &LayoutParams,
    image_w: u32,
    image_h: u32,
    baseline: i32,
    frame_w: u32,
    frame_h: u32,
) -> (i32, i32) {
    let (fw, fh) = (frame_w as i64, frame_h as i64);
    let (w, h) = (image_w as i64, image_h as i64);
    let (xpad, ypad) = (layout.xpad as i64, layout.ypad as i64);

    let x = match layout.halign {
        HAlign::Left => xpad,
        HAlign::Center => (fw - w) / 2,
        HAlign::Right => fw - w - xpad,
        HAlign::Position => (fw as f64 * layout.xpos) as i64 - w / 2,
    };
    let x = x.clamp(0, (fw - w).max(0)) + layout.deltax as i64;

    let y = match layout.valign {
        VAlign::Top => ypad,
        VAlign::Bottom => fh - h - ypad,
        VAlign::Baseline => fh - ypad - baseline as i64,
        VAlign::Center => (fh - h) / 2,
        VAlign::Position => (fh as f64 * layout.ypos) as i64 - h / 2,
    };
    let y = y.clamp(0, (fh - h).max(0)) + layout.deltay as i64;

    (saturate(x), saturate(y))
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Apply `composition` to `frame`
pub fn composite(
    frame: &mut VideoFrame,
    composition: Composition,
    mode: CompositeMode,
) -> OverlayOutcome {
    if composition.image.is_empty() {
        return OverlayOutcome::Passthrough;
    }

    if mode.attach {
        frame.composition = Some(composition);
        return OverlayOutcome::Attached;
    }

    log::trace!(
        "blending {}x{} text at {},{}",
        composition.image.width,
        composition.image.height,
        composition.x,
        composition.y
    );

    if let Some(value) = mode.shading {
        let image = &composition.image;
        shade::shade_box(
            frame,
            composition.x.saturating_sub(BOX_XPAD),
            composition.y.saturating_sub(BOX_YPAD),
            saturate(composition.x as i64 + image.width as i64 + BOX_XPAD as i64),
            saturate(composition.y as i64 + image.height as i64 + BOX_YPAD as i64),
            value,
        );
    }
    blend::blend(frame, &composition.image, composition.x, composition.y);
    OverlayOutcome::Blended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayConfig;
    use crate::video::{VideoFormat, VideoInfo};

    fn layout(halign: HAlign, valign: VAlign) -> LayoutParams {
        OverlayConfig {
            halignment: halign,
            valignment: valign,
            xpad: 10,
            ypad: 20,
            ..OverlayConfig::default()
        }
        .layout()
    }

    fn image(width: u32, height: u32) -> Arc<RenderedImage> {
        Arc::new(RenderedImage {
            pixels: vec![255; width as usize * height as usize * 4],
            width,
            height,
            baseline_offset: 0,
            source_key: 0,
        })
    }

    #[test]
    fn test_place_centered_baseline() {
        let params = layout(HAlign::Center, VAlign::Baseline);
        assert_eq!(place(&params, 100, 30, 24, 640, 480), (270, 480 - 20 - 24));
    }

    #[test]
    fn test_place_edges() {
        let params = layout(HAlign::Left, VAlign::Top);
        assert_eq!(place(&params, 100, 30, 0, 640, 480), (10, 20));

        let params = layout(HAlign::Right, VAlign::Bottom);
        assert_eq!(place(&params, 100, 30, 0, 640, 480), (530, 430));
    }

    #[test]
    fn test_place_position() {
        let mut params = layout(HAlign::Position, VAlign::Position);
        params.xpos = 0.25;
        params.ypos = 0.75;
        assert_eq!(place(&params, 100, 30, 0, 640, 480), (110, 345));
    }

    #[test]
    fn test_place_clamps_before_delta() {
        let mut params = layout(HAlign::Right, VAlign::Center);
        params.xpad = 700;
        assert_eq!(place(&params, 100, 30, 0, 640, 480).0, 0);

        params.deltax = -15;
        params.deltay = 5;
        assert_eq!(place(&params, 100, 30, 0, 640, 480), (-15, 225 + 5));
    }

    #[test]
    fn test_place_extreme_offsets_saturate() {
        let mut params = layout(HAlign::Right, VAlign::Bottom);
        params.xpad = i32::MAX;
        params.ypad = i32::MAX;
        assert_eq!(place(&params, 4, 4, 0, 8, 8), (0, 0));

        params.deltax = i32::MAX;
        params.deltay = i32::MIN;
        assert_eq!(place(&params, 4, 4, 0, 8, 8), (i32::MAX, i32::MIN));

        let params = layout(HAlign::Left, VAlign::Baseline);
        assert_eq!(place(&params, 4, 4, i32::MIN, 8, 8).1, 4);
    }

    #[test]
    fn test_composite_shaded_box_far_off_frame() {
        let info = VideoInfo::new(VideoFormat::Rgba, 8, 8).unwrap();
        let mut frame = VideoFrame::black(info);
        let before = frame.data().to_vec();
        let mode = CompositeMode {
            attach: false,
            shading: Some(80),
        };
        for (x, y) in [(i32::MAX, 0), (i32::MIN, i32::MAX), (0, i32::MIN)] {
            let composition = Composition {
                image: image(2, 2),
                x,
                y,
            };
            assert_eq!(composite(&mut frame, composition, mode), OverlayOutcome::Blended);
        }
        assert_eq!(frame.data(), &before[..]);
    }

    #[test]
    fn test_place_image_wider_than_frame() {
        let params = layout(HAlign::Center, VAlign::Top);
        assert_eq!(place(&params, 800, 30, 0, 640, 480).0, 0);
    }

    #[test]
    fn test_composite_attach_keeps_pixels() {
        let info = VideoInfo::new(VideoFormat::Rgba, 8, 8).unwrap();
        let mut frame = VideoFrame::black(info);
        let before = frame.data().to_vec();
        let composition = Composition {
            image: image(2, 2),
            x: 1,
            y: 1,
        };
        let mode = CompositeMode {
            attach: true,
            shading: Some(80),
        };

        let outcome = composite(&mut frame, composition.clone(), mode);
        assert_eq!(outcome, OverlayOutcome::Attached);
        assert_eq!(frame.data(), &before[..]);
        assert_eq!(frame.composition, Some(composition));
    }

    #[test]
    fn test_composite_blend_changes_pixels() {
        let info = VideoInfo::new(VideoFormat::Rgba, 8, 8).unwrap();
        let mut frame = VideoFrame::black(info);
        let composition = Composition {
            image: image(2, 2),
            x: 3,
            y: 3,
        };
        let mode = CompositeMode {
            attach: false,
            shading: None,
        };

        assert_eq!(composite(&mut frame, composition, mode), OverlayOutcome::Blended);
        let i = (3 * 8 + 3) * 4;
        assert_eq!(&frame.data()[i..i + 4], &[255, 255, 255, 255]);
        assert!(frame.composition.is_none());
    }

    #[test]
    fn test_composite_empty_image_passes_through() {
        let info = VideoInfo::new(VideoFormat::Rgba, 8, 8).unwrap();
        let mut frame = VideoFrame::black(info);
        let composition = Composition {
            image: image(0, 0),
            x: 0,
            y: 0,
        };
        let mode = CompositeMode {
            attach: true,
            shading: None,
        };
        assert_eq!(
            composite(&mut frame, composition, mode),
            OverlayOutcome::Passthrough
        );
    }
}
