//! Raw Video Frames
//!
//! Format description, plane layout and pixel storage for the primary
//! stream. Only the formats the compositor can shade and blend are
//! represented.

use crate::compositor::Composition;
use crate::time::{self, ClockTime, SECOND};
use crate::{Result, TextOverlayError};
use serde::{Deserialize, Serialize};

/// Raw pixel formats accepted on the primary input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoFormat {
    /// 8-bit luma only
    Gray8,
    /// Planar 4:2:0 YUV (Y, U, V planes)
    I420,
    /// Packed 4:4:4 YUV with alpha (A Y U V)
    Ayuv,
    /// Packed 4:2:2 YUV (Y0 U Y1 V)
    Yuy2,
    /// Packed 4:2:2 YUV (U Y0 V Y1)
    Uyvy,
    /// Packed RGB with leading padding byte
    #[serde(rename = "xRGB")]
    Xrgb,
    /// Packed BGR with leading padding byte
    #[serde(rename = "xBGR")]
    Xbgr,
    /// Packed RGB with trailing padding byte
    #[serde(rename = "RGBx")]
    Rgbx,
    /// Packed BGR with trailing padding byte
    #[serde(rename = "BGRx")]
    Bgrx,
    /// Packed RGB with leading alpha
    Argb,
    /// Packed BGR with leading alpha
    Abgr,
    /// Packed RGB with trailing alpha
    Rgba,
    /// Packed BGR with trailing alpha
    Bgra,
    /// Packed 24-bit RGB
    Rgb,
    /// Packed 24-bit BGR
    Bgr,
}

/// Byte offsets of the color components of a 4-byte RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RgbOffsets {
    pub r: usize,
    pub g: usize,
    pub b: usize,
    /// Alpha byte, `None` for padded formats
    pub a: Option<usize>,
    /// Padding byte of the x-formats
    pub x: Option<usize>,
}

impl VideoFormat {
    /// Number of planes in a frame of this format
    pub fn n_planes(self) -> usize {
        match self {
            VideoFormat::I420 => 3,
            _ => 1,
        }
    }

    /// Whether the format stores YUV samples
    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            VideoFormat::Gray8
                | VideoFormat::I420
                | VideoFormat::Ayuv
                | VideoFormat::Yuy2
                | VideoFormat::Uyvy
        )
    }

    /// Component offsets of the 4-byte RGB formats
    pub(crate) fn rgb4_offsets(self) -> Option<RgbOffsets> {
        let (r, g, b, a, x) = match self {
            VideoFormat::Xrgb => (1, 2, 3, None, Some(0)),
            VideoFormat::Xbgr => (3, 2, 1, None, Some(0)),
            VideoFormat::Rgbx => (0, 1, 2, None, Some(3)),
            VideoFormat::Bgrx => (2, 1, 0, None, Some(3)),
            VideoFormat::Argb => (1, 2, 3, Some(0), None),
            VideoFormat::Abgr => (3, 2, 1, Some(0), None),
            VideoFormat::Rgba => (0, 1, 2, Some(3), None),
            VideoFormat::Bgra => (2, 1, 0, Some(3), None),
            _ => return None,
        };
        Some(RgbOffsets { r, g, b, a, x })
    }

    /// Component offsets of the 3-byte RGB formats as `(r, g, b)`
    pub(crate) fn rgb3_offsets(self) -> Option<(usize, usize, usize)> {
        match self {
            VideoFormat::Rgb => Some((0, 1, 2)),
            VideoFormat::Bgr => Some((2, 1, 0)),
            _ => None,
        }
    }

    /// Luma byte offset and pixel stride of the packed YUV formats
    pub(crate) fn packed_luma(self) -> Option<(usize, usize)> {
        match self {
            VideoFormat::Ayuv => Some((1, 4)),
            VideoFormat::Yuy2 => Some((0, 2)),
            VideoFormat::Uyvy => Some((1, 2)),
            _ => None,
        }
    }
}

/// Memory layout of one plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Byte offset of the plane inside the frame
    pub offset: usize,
    /// Bytes per row
    pub stride: usize,
    /// Number of rows
    pub rows: usize,
}

/// Description of raw frames on the primary input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    /// Pixel format
    pub format: VideoFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate numerator (0 when unknown)
    pub fps_n: u32,
    /// Frame rate denominator
    pub fps_d: u32,
    planes: Vec<PlaneLayout>,
}

fn round_up_4(n: usize) -> usize {
    (n + 3) & !3
}

impl VideoInfo {
    /// Describe frames of `format` with the given dimensions
    pub fn new(format: VideoFormat, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TextOverlayError::InvalidFrame(format!(
                "zero sized frame {width}x{height}"
            )));
        }

        let w = width as usize;
        let h = height as usize;
        let plane = |offset, stride, rows| PlaneLayout {
            offset,
            stride,
            rows,
        };

        let planes = match format {
            VideoFormat::Gray8 => vec![plane(0, round_up_4(w), h)],
            VideoFormat::I420 => {
                let y_stride = round_up_4(w);
                let c_stride = round_up_4(w.div_ceil(2));
                let c_rows = h.div_ceil(2);
                let u_offset = y_stride * h;
                let v_offset = u_offset + c_stride * c_rows;
                vec![
                    plane(0, y_stride, h),
                    plane(u_offset, c_stride, c_rows),
                    plane(v_offset, c_stride, c_rows),
                ]
            }
            VideoFormat::Ayuv => vec![plane(0, w * 4, h)],
            VideoFormat::Yuy2 | VideoFormat::Uyvy => {
                vec![plane(0, round_up_4(w.div_ceil(2) * 4), h)]
            }
            VideoFormat::Rgb | VideoFormat::Bgr => vec![plane(0, round_up_4(w * 3), h)],
            _ => vec![plane(0, w * 4, h)],
        };

        Ok(VideoInfo {
            format,
            width,
            height,
            fps_n: 0,
            fps_d: 1,
            planes,
        })
    }

    /// Set the frame rate
    pub fn with_framerate(mut self, fps_n: u32, fps_d: u32) -> Self {
        self.fps_n = fps_n;
        self.fps_d = fps_d;
        self
    }

    /// Duration of one frame derived from the frame rate
    pub fn frame_duration(&self) -> Option<ClockTime> {
        if self.fps_n == 0 || self.fps_d == 0 {
            return None;
        }
        time::scale(SECOND, self.fps_d as u64, self.fps_n as u64)
    }

    /// Layout of plane `index`
    pub fn plane(&self, index: usize) -> Option<&PlaneLayout> {
        self.planes.get(index)
    }

    /// Total bytes of one frame
    pub fn size(&self) -> usize {
        self.planes
            .last()
            .map(|p| p.offset + p.stride * p.rows)
            .unwrap_or(0)
    }
}

/// Convert RGB to BT.601 limited range YUV
pub(crate) fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

/// A raw video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    info: VideoInfo,
    data: Vec<u8>,
    /// Overlay attached for deferred compositing
    pub composition: Option<Composition>,
}

impl VideoFrame {
    /// Wrap frame data, checking it is large enough for `info`
    pub fn new(info: VideoInfo, data: Vec<u8>) -> Result<Self> {
        if data.len() < info.size() {
            return Err(TextOverlayError::InvalidFrame(format!(
                "{:?} {}x{} needs {} bytes, got {}",
                info.format,
                info.width,
                info.height,
                info.size(),
                data.len()
            )));
        }
        Ok(VideoFrame {
            info,
            data,
            composition: None,
        })
    }

    /// A frame filled with black
    pub fn black(info: VideoInfo) -> Self {
        Self::filled(info, [0, 0, 0])
    }

    /// A frame filled with a single RGB color (opaque)
    pub fn filled(info: VideoInfo, rgb: [u8; 3]) -> Self {
        let mut data = vec![0u8; info.size()];
        let [r, g, b] = rgb;
        let (y, u, v) = rgb_to_yuv(r, g, b);
        let w = info.width as usize;

        match info.format {
            VideoFormat::Gray8 => {
                let p = info.planes[0];
                for row in 0..p.rows {
                    data[row * p.stride..row * p.stride + w].fill(y);
                }
            }
            VideoFormat::I420 => {
                for (index, value) in [(0, y), (1, u), (2, v)] {
                    let p = info.planes[index];
                    let cols = if index == 0 { w } else { w.div_ceil(2) };
                    for row in 0..p.rows {
                        let start = p.offset + row * p.stride;
                        data[start..start + cols].fill(value);
                    }
                }
            }
            VideoFormat::Ayuv => fill_packed(&mut data, &info, 4, w, &[255, y, u, v]),
            VideoFormat::Yuy2 => fill_packed(&mut data, &info, 4, w.div_ceil(2), &[y, u, y, v]),
            VideoFormat::Uyvy => fill_packed(&mut data, &info, 4, w.div_ceil(2), &[u, y, v, y]),
            VideoFormat::Rgb => fill_packed(&mut data, &info, 3, w, &[r, g, b]),
            VideoFormat::Bgr => fill_packed(&mut data, &info, 3, w, &[b, g, r]),
            format => {
                if let Some(o) = format.rgb4_offsets() {
                    let mut px = [0u8; 4];
                    px[o.r] = r;
                    px[o.g] = g;
                    px[o.b] = b;
                    if let Some(a) = o.a {
                        px[a] = 255;
                    }
                    fill_packed(&mut data, &info, 4, w, &px);
                }
            }
        }

        VideoFrame {
            info,
            data,
            composition: None,
        }
    }

    /// Frame description
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Raw frame bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw frame bytes
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Consume the frame, returning its bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

fn fill_packed(data: &mut [u8], info: &VideoInfo, pstride: usize, units: usize, px: &[u8]) {
    let p = info.planes[0];
    for row in 0..p.rows {
        let line = &mut data[row * p.stride..row * p.stride + units * pstride];
        for chunk in line.chunks_exact_mut(pstride) {
            chunk.copy_from_slice(px);
        }
    }
}
