//! Block Glyph Rasterizer
//!
//! Deterministic reference rasterizer that draws every visible character
//! as a filled, outlined block on a fixed-width grid. It honors the font
//! size from the font description, scaling, wrapping, line alignment and
//! vertical rendering, which is all the engine needs to place and blend
//! text without a font stack.

use super::{RasterizedText, Rasterizer, TextStyle};
use crate::config::{LineAlign, WrapMode};
use crate::Result;

/// Font size used when the description does not name one
pub const DEFAULT_FONT_SIZE: f64 = 18.0;

/// Block glyph rasterizer
#[derive(Debug, Clone, Default)]
pub struct BlockRasterizer {
    rendered: u64,
}

/// Pixel metrics of one glyph cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Metrics {
    cell_width: u32,
    line_height: u32,
    ascent: u32,
    top: u32,
}

impl Metrics {
    fn for_style(style: &TextStyle) -> Self {
        let size = (font_size(&style.font_desc) * style.scale).round().max(1.0);
        let cell_width = (size * 0.6).round().max(1.0) as u32;
        let line_height = (size * 1.25).round().max(1.0) as u32;
        let ascent = (size * 0.8).round().max(1.0) as u32;
        Metrics {
            cell_width,
            line_height,
            ascent,
            top: line_height / 8,
        }
    }
}

/// Font size is the last token of the description, e.g. `"Sans Bold 24"`
fn font_size(font_desc: &str) -> f64 {
    font_desc
        .split_whitespace()
        .last()
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|size| *size > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE)
}

/// Strip tags and resolve the standard entities.
///
/// An unterminated tag is kept as literal text.
pub fn strip_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(pos) = rest.find(['<', '&']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with('<') {
            match tail.find('>') {
                Some(end) => rest = &tail[end + 1..],
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        } else {
            let entity = [
                ("&amp;", '&'),
                ("&lt;", '<'),
                ("&gt;", '>'),
                ("&apos;", '\''),
                ("&quot;", '"'),
            ]
            .into_iter()
            .find(|(name, _)| tail.starts_with(name));
            match entity {
                Some((name, c)) => {
                    out.push(c);
                    rest = &tail[name.len()..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            }
        }
    }
    out.push_str(rest);
    out
}

/// Break `line` into pieces of at most `max_chars` characters
fn wrap_line(line: &str, max_chars: usize, mode: WrapMode) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if mode == WrapMode::None || chars.len() <= max_chars {
        return vec![line.to_string()];
    }
    if mode == WrapMode::Char {
        return chars
            .chunks(max_chars)
            .map(|chunk| chunk.iter().collect())
            .collect();
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split(' ') {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if needed <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if word_len > max_chars && mode == WrapMode::WordChar {
            let word_chars: Vec<char> = word.chars().collect();
            let mut pieces = word_chars.chunks(max_chars).peekable();
            while let Some(piece) = pieces.next() {
                let piece: String = piece.iter().collect();
                if pieces.peek().is_some() {
                    lines.push(piece);
                } else {
                    current = piece;
                }
            }
        } else {
            current.push_str(word);
        }
    }
    lines.push(current);
    lines
}

fn premultiply(argb: u32) -> [u8; 4] {
    let a = (argb >> 24) & 0xff;
    let channel = |shift: u32| (((argb >> shift) & 0xff) * a / 255) as u8;
    [channel(16), channel(8), channel(0), a as u8]
}

impl BlockRasterizer {
    /// Create a rasterizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of images produced so far
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    fn layout(text: &str, style: &TextStyle, metrics: &Metrics) -> Vec<String> {
        let max_chars = style
            .wrap_width
            .map(|w| ((w as f64 * style.scale) / metrics.cell_width as f64).floor() as usize)
            .map(|n| n.max(1))
            .unwrap_or(usize::MAX);

        text.split('\n')
            .flat_map(|line| wrap_line(line, max_chars, style.wrap_mode))
            .collect()
    }
}

impl Rasterizer for BlockRasterizer {
    fn rasterize(&mut self, text: &str, style: &TextStyle) -> Result<RasterizedText> {
        let plain = if style.markup {
            strip_markup(text)
        } else {
            text.to_string()
        };

        let metrics = Metrics::for_style(style);
        let lines = Self::layout(&plain, style, &metrics);
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);

        let width = longest as u32 * metrics.cell_width;
        let height = lines.len().max(1) as u32 * metrics.line_height;
        let fill = premultiply(style.color);
        let outline = premultiply(style.outline_color);

        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        for (row, line) in lines.iter().enumerate() {
            let line_width = line.chars().count() as u32 * metrics.cell_width;
            let x_offset = match style.line_alignment {
                LineAlign::Left => 0,
                LineAlign::Center => (width - line_width) / 2,
                LineAlign::Right => width - line_width,
            };
            let y0 = row as u32 * metrics.line_height + metrics.top;
            let y1 = (y0 + metrics.ascent).min(height);

            for (col, c) in line.chars().enumerate() {
                if c.is_whitespace() {
                    continue;
                }
                let x0 = x_offset + col as u32 * metrics.cell_width;
                let x1 = x0 + metrics.cell_width;
                let gx0 = x0 + u32::from(metrics.cell_width > 2);
                let gx1 = x1 - u32::from(metrics.cell_width > 2);
                for y in y0..y1 {
                    for x in gx0..gx1 {
                        let edge = x == gx0 || x + 1 == gx1 || y == y0 || y + 1 == y1;
                        let px = if edge && gx1 - gx0 > 2 { outline } else { fill };
                        let i = (y as usize * width as usize + x as usize) * 4;
                        pixels[i..i + 4].copy_from_slice(&px);
                    }
                }
            }
        }

        self.rendered += 1;
        let baseline_offset = (metrics.top + metrics.ascent) as i32;

        if style.vertical {
            return Ok(rotate_clockwise(width, height, &pixels));
        }

        Ok(RasterizedText {
            width,
            height,
            pixels,
            baseline_offset,
        })
    }
}

/// Rotate by 90 degrees so horizontal text reads top to bottom
fn rotate_clockwise(width: u32, height: u32, pixels: &[u8]) -> RasterizedText {
    let (w, h) = (width as usize, height as usize);
    let mut rotated = vec![0u8; pixels.len()];
    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * 4;
            let (nx, ny) = (h - 1 - y, x);
            let dst = (ny * h + nx) * 4;
            rotated[dst..dst + 4].copy_from_slice(&pixels[src..src + 4]);
        }
    }
    RasterizedText {
        width: height,
        height: width,
        pixels: rotated,
        baseline_offset: 0,
    }
}
