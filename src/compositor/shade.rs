//! Background Shading
//!
//! Darkens a rectangle of the frame by subtracting a fixed amount from the
//! luma or color bytes, saturating at zero.

use crate::video::{VideoFormat, VideoFrame};

/// Shade the box `[x0, x1) x [y0, y1)`, clamped to the frame
pub fn shade_box(frame: &mut VideoFrame, x0: i32, y0: i32, x1: i32, y1: i32, value: u8) {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let x0 = x0.clamp(0, fw) as usize;
    let x1 = x1.clamp(0, fw) as usize;
    let y0 = y0.clamp(0, fh) as usize;
    let y1 = y1.clamp(0, fh) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let format = frame.info().format;
    let Some(plane) = frame.info().plane(0).copied() else {
        return;
    };

    // (first shaded byte, bytes shaded, bytes per pixel)
    let (first, count, pstride) = match format {
        VideoFormat::Gray8 | VideoFormat::I420 => (0, 1, 1),
        VideoFormat::Rgb | VideoFormat::Bgr => (0, 3, 3),
        VideoFormat::Xrgb | VideoFormat::Xbgr | VideoFormat::Rgbx | VideoFormat::Bgrx => {
            (0, 4, 4)
        }
        VideoFormat::Argb | VideoFormat::Abgr => (1, 3, 4),
        VideoFormat::Rgba | VideoFormat::Bgra => (0, 3, 4),
        VideoFormat::Ayuv | VideoFormat::Yuy2 | VideoFormat::Uyvy => match format.packed_luma() {
            Some((offset, pstride)) => (offset, 1, pstride),
            None => return,
        },
    };

    let data = frame.data_mut();
    for row in y0..y1 {
        let line = plane.offset + row * plane.stride;
        for col in x0..x1 {
            let px = line + col * pstride + first;
            for byte in &mut data[px..px + count] {
                *byte = byte.saturating_sub(value);
            }
        }
    }
}
