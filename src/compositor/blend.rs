//! Software Blending
//!
//! Draws a premultiplied RGBA image into a raw frame. RGB formats use the
//! premultiplied "over" operator; YUV formats convert the un-premultiplied
//! color to YUV and mix it with the frame samples by alpha. Chroma of
//! subsampled formats is written once per shared sample, from the average
//! of every image pixel covering that sample.

use crate::render::RenderedImage;
use crate::video::{rgb_to_yuv, PlaneLayout, VideoFormat, VideoFrame};
use std::ops::Range;

fn div255(v: u32) -> u8 {
    ((v + 127) / 255).min(255) as u8
}

/// `src` over `dst` where `src` is premultiplied by `alpha`
fn over(src: u8, dst: u8, alpha: u8) -> u8 {
    let v = src as u32 + div255(dst as u32 * (255 - alpha as u32)) as u32;
    v.min(255) as u8
}

/// Alpha-weighted mix of a straight `src` and `dst`
fn mix(src: u8, dst: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    div255(src as u32 * a + dst as u32 * (255 - a))
}

fn unpremultiply(px: &[u8]) -> (u8, u8, u8) {
    let a = px[3] as u32;
    let c = |v: u8| ((v as u32 * 255 + a / 2) / a).min(255) as u8;
    (c(px[0]), c(px[1]), c(px[2]))
}

/// Blend `image` with its top-left corner at (`x`, `y`), clipped to the
/// frame
pub fn blend(frame: &mut VideoFrame, image: &RenderedImage, x: i32, y: i32) {
    let (fw, fh) = (frame.width() as i64, frame.height() as i64);
    let (iw, ih) = (image.width as i64, image.height as i64);

    let col0 = (-(x as i64)).clamp(0, iw);
    let col1 = (fw - x as i64).clamp(0, iw);
    let row0 = (-(y as i64)).clamp(0, ih);
    let row1 = (fh - y as i64).clamp(0, ih);
    if col0 >= col1 || row0 >= row1 {
        return;
    }

    let format = frame.info().format;
    let planes: Vec<PlaneLayout> = (0..format.n_planes())
        .filter_map(|i| frame.info().plane(i).copied())
        .collect();
    let data = frame.data_mut();

    for row in row0..row1 {
        let fy = (y as i64 + row) as usize;
        for col in col0..col1 {
            let fx = (x as i64 + col) as usize;
            let i = ((row * iw + col) * 4) as usize;
            let px = &image.pixels[i..i + 4];
            if px[3] == 0 {
                continue;
            }
            blend_pixel(data, &planes, format, fx, fy, px);
        }
    }

    if let Some(block) = chroma_block(format) {
        let cols = x as i64 + col0..x as i64 + col1;
        let rows = y as i64 + row0..y as i64 + row1;
        blend_chroma(frame, image, (x as i64, y as i64), cols, rows, block);
    }
}

/// Luma pixels sharing one chroma sample, as (columns, rows)
fn chroma_block(format: VideoFormat) -> Option<(i64, i64)> {
    match format {
        VideoFormat::I420 => Some((2, 2)),
        VideoFormat::Yuy2 | VideoFormat::Uyvy => Some((2, 1)),
        _ => None,
    }
}

/// Mix the chroma of every block touched by the frame area `cols` x
/// `rows`. The image color is averaged over the block, transparent pixels
/// included, so partially covered blocks get proportionally less alpha.
fn blend_chroma(
    frame: &mut VideoFrame,
    image: &RenderedImage,
    origin: (i64, i64),
    cols: Range<i64>,
    rows: Range<i64>,
    (bw, bh): (i64, i64),
) {
    let (fw, fh) = (frame.width() as i64, frame.height() as i64);
    let format = frame.info().format;
    let planes: Vec<PlaneLayout> = (0..format.n_planes())
        .filter_map(|i| frame.info().plane(i).copied())
        .collect();
    let data = frame.data_mut();
    let iw = image.width as i64;

    for by in rows.start / bh..=(rows.end - 1) / bh {
        for bx in cols.start / bw..=(cols.end - 1) / bw {
            let mut sum = [0u32; 4];
            for fy in (by * bh).max(rows.start)..((by + 1) * bh).min(rows.end) {
                for fx in (bx * bw).max(cols.start)..((bx + 1) * bw).min(cols.end) {
                    let i = (((fy - origin.1) * iw + (fx - origin.0)) * 4) as usize;
                    for (acc, &v) in sum.iter_mut().zip(&image.pixels[i..i + 4]) {
                        *acc += v as u32;
                    }
                }
            }
            if sum[3] == 0 {
                continue;
            }

            // Frame pixels in this block, fewer on odd right/bottom edges
            let n = (bw.min(fw - bx * bw) * bh.min(fh - by * bh)) as u32;
            let alpha = ((sum[3] + n / 2) / n).min(255) as u8;
            let color = |v: u32| ((v * 255 + sum[3] / 2) / sum[3]).min(255) as u8;
            let (_, u, v) = rgb_to_yuv(color(sum[0]), color(sum[1]), color(sum[2]));

            let (bx, by) = (bx as usize, by as usize);
            let targets = match format {
                VideoFormat::I420 => [
                    planes[1].offset + by * planes[1].stride + bx,
                    planes[2].offset + by * planes[2].stride + bx,
                ],
                _ => {
                    let macro_at = planes[0].offset + by * planes[0].stride + bx * 4;
                    if format == VideoFormat::Yuy2 {
                        [macro_at + 1, macro_at + 3]
                    } else {
                        [macro_at, macro_at + 2]
                    }
                }
            };
            for (at, value) in targets.into_iter().zip([u, v]) {
                data[at] = mix(value, data[at], alpha);
            }
        }
    }
}

fn blend_pixel(
    data: &mut [u8],
    planes: &[PlaneLayout],
    format: VideoFormat,
    fx: usize,
    fy: usize,
    px: &[u8],
) {
    let alpha = px[3];
    let p = planes[0];

    if let Some(o) = format.rgb4_offsets() {
        let at = p.offset + fy * p.stride + fx * 4;
        let dst = &mut data[at..at + 4];
        dst[o.r] = over(px[0], dst[o.r], alpha);
        dst[o.g] = over(px[1], dst[o.g], alpha);
        dst[o.b] = over(px[2], dst[o.b], alpha);
        if let Some(a) = o.a {
            dst[a] = over(alpha, dst[a], alpha);
        }
        return;
    }

    if let Some((r, g, b)) = format.rgb3_offsets() {
        let at = p.offset + fy * p.stride + fx * 3;
        let dst = &mut data[at..at + 3];
        dst[r] = over(px[0], dst[r], alpha);
        dst[g] = over(px[1], dst[g], alpha);
        dst[b] = over(px[2], dst[b], alpha);
        return;
    }

    let (r, g, b) = unpremultiply(px);
    let (y, u, v) = rgb_to_yuv(r, g, b);

    match format {
        VideoFormat::Gray8 => {
            let at = p.offset + fy * p.stride + fx;
            data[at] = mix(y, data[at], alpha);
        }
        VideoFormat::I420 => {
            let at = p.offset + fy * p.stride + fx;
            data[at] = mix(y, data[at], alpha);
        }
        VideoFormat::Ayuv => {
            let at = p.offset + fy * p.stride + fx * 4;
            data[at] = over(alpha, data[at], alpha);
            data[at + 1] = mix(y, data[at + 1], alpha);
            data[at + 2] = mix(u, data[at + 2], alpha);
            data[at + 3] = mix(v, data[at + 3], alpha);
        }
        VideoFormat::Yuy2 | VideoFormat::Uyvy => {
            // Macro-pixel of two luma samples sharing one U and one V
            let macro_at = p.offset + fy * p.stride + (fx / 2) * 4;
            let y_offsets = if format == VideoFormat::Yuy2 {
                [0, 2]
            } else {
                [1, 3]
            };
            let ya = macro_at + y_offsets[fx % 2];
            data[ya] = mix(y, data[ya], alpha);
        }
        _ => {}
    }
}
