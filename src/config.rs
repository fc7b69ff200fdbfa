//! Overlay Configuration
//!
//! Typed configuration snapshot read by every scheduling call. Values are
//! checked against an explicit validation table before they are accepted.

use crate::render::TextStyle;
use crate::{Result, TextOverlayError};
use serde::{Deserialize, Serialize};

/// Width in pixels the text layout is designed for when auto-resizing
pub const DEFAULT_SCALE_BASIS: u32 = 640;

/// Horizontal placement of the text image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    /// `xpad` pixels from the left edge
    Left,
    /// Centered
    #[default]
    Center,
    /// `xpad` pixels from the right edge
    Right,
    /// Centered on `xpos * width`
    Position,
}

/// Vertical placement of the text image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    /// `ypad` pixels from the top edge
    Top,
    /// `ypad` pixels from the bottom edge
    Bottom,
    /// Text baseline `ypad` pixels above the bottom edge
    #[default]
    Baseline,
    /// Centered
    Center,
    /// Centered on `ypos * height`
    Position,
}

/// Line wrapping policy handed to the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    /// Never wrap
    None,
    /// Wrap at word boundaries
    Word,
    /// Wrap at any character
    Char,
    /// Wrap at word boundaries, falling back to characters for long words
    #[default]
    WordChar,
}

/// Alignment of text lines relative to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineAlign {
    /// Flush left
    Left,
    /// Centered
    #[default]
    Center,
    /// Flush right
    Right,
}

/// Overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OverlayConfig {
    /// Text rendered when the text input is not connected
    pub text: String,
    /// Darken a box behind the text when blending
    pub shaded_background: bool,
    /// Amount subtracted from each shaded channel
    pub shading_value: u8,
    /// Horizontal alignment
    pub halignment: HAlign,
    /// Vertical alignment
    pub valignment: VAlign,
    /// Horizontal padding for left/right alignment
    pub xpad: i32,
    /// Vertical padding for top/bottom/baseline alignment
    pub ypad: i32,
    /// Horizontal shift in pixels
    pub deltax: i32,
    /// Vertical shift in pixels
    pub deltay: i32,
    /// Horizontal position fraction for position alignment
    pub xpos: f64,
    /// Vertical position fraction for position alignment
    pub ypos: f64,
    /// Line wrapping policy
    pub wrap_mode: WrapMode,
    /// Alignment of lines relative to each other
    pub line_alignment: LineAlign,
    /// Font description, interpreted by the rasterizer
    pub font_desc: String,
    /// Text color, big-endian ARGB
    pub color: u32,
    /// Outline color, big-endian ARGB
    pub outline_color: u32,
    /// Pass every frame through untouched
    pub silent: bool,
    /// Block video frames until text for them is known
    pub wait_text: bool,
    /// Scale the text with the frame width
    pub auto_resize: bool,
    /// Render text rotated by 90 degrees
    pub vertical_render: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            text: String::new(),
            shaded_background: false,
            shading_value: 80,
            halignment: HAlign::Center,
            valignment: VAlign::Baseline,
            xpad: 25,
            ypad: 25,
            deltax: 0,
            deltay: 0,
            xpos: 0.5,
            ypos: 0.5,
            wrap_mode: WrapMode::WordChar,
            line_alignment: LineAlign::Center,
            font_desc: String::new(),
            color: 0xffff_ffff,
            outline_color: 0xff00_0000,
            silent: false,
            wait_text: true,
            auto_resize: true,
            vertical_render: false,
        }
    }
}

/// One row of the validation table
struct FieldRule {
    name: &'static str,
    check: fn(&OverlayConfig) -> bool,
    expected: &'static str,
}

const VALIDATION_TABLE: &[FieldRule] = &[
    FieldRule {
        name: "shading-value",
        check: |c| c.shading_value >= 1,
        expected: "1..=255",
    },
    FieldRule {
        name: "xpad",
        check: |c| c.xpad >= 0,
        expected: ">= 0",
    },
    FieldRule {
        name: "ypad",
        check: |c| c.ypad >= 0,
        expected: ">= 0",
    },
    FieldRule {
        name: "xpos",
        check: |c| (0.0..=1.0).contains(&c.xpos),
        expected: "0.0..=1.0",
    },
    FieldRule {
        name: "ypos",
        check: |c| (0.0..=1.0).contains(&c.ypos),
        expected: "0.0..=1.0",
    },
];

/// Placement inputs derived from the configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Horizontal alignment
    pub halign: HAlign,
    /// Vertical alignment
    pub valign: VAlign,
    /// Horizontal position fraction
    pub xpos: f64,
    /// Vertical position fraction
    pub ypos: f64,
    /// Horizontal padding
    pub xpad: i32,
    /// Vertical padding
    pub ypad: i32,
    /// Horizontal shift
    pub deltax: i32,
    /// Vertical shift
    pub deltay: i32,
}

impl OverlayConfig {
    /// Check every field against the validation table
    pub fn validate(&self) -> Result<()> {
        let failures: Vec<String> = VALIDATION_TABLE
            .iter()
            .filter(|rule| !(rule.check)(self))
            .map(|rule| format!("{} must be {}", rule.name, rule.expected))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TextOverlayError::InvalidConfig(failures.join(", ")))
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: OverlayConfig = serde_json::from_str(json)
            .map_err(|e| TextOverlayError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Placement parameters, with the alignment forced to right/top when
    /// rendering vertically
    pub fn layout(&self) -> LayoutParams {
        let (halign, valign) = if self.vertical_render {
            (HAlign::Right, VAlign::Top)
        } else {
            (self.halignment, self.valignment)
        };
        LayoutParams {
            halign,
            valign,
            xpos: self.xpos,
            ypos: self.ypos,
            xpad: self.xpad,
            ypad: self.ypad,
            deltax: self.deltax,
            deltay: self.deltay,
        }
    }

    /// Rasterizer style for frames of `frame_width` x `frame_height`
    pub fn text_style(&self, frame_width: u32, frame_height: u32, markup: bool) -> TextStyle {
        let w = frame_width as f64;
        let scale = if self.auto_resize && frame_width > 0 {
            w / DEFAULT_SCALE_BASIS as f64
        } else {
            1.0
        };

        let wrap_width = match self.wrap_mode {
            WrapMode::None => None,
            _ if self.auto_resize => {
                let basis = DEFAULT_SCALE_BASIS as i64;
                let width = if self.vertical_render && frame_width > 0 {
                    basis * (frame_height as i64 - self.ypad as i64 * 2) / frame_width as i64
                } else {
                    basis
                };
                Some(width.max(1) as u32)
            }
            _ => {
                let extent = if self.vertical_render {
                    frame_height
                } else {
                    frame_width
                };
                let width = extent as i64 - self.deltax as i64;
                Some(width.clamp(1, u32::MAX as i64) as u32)
            }
        };

        TextStyle {
            font_desc: self.font_desc.clone(),
            color: self.color,
            outline_color: self.outline_color,
            wrap_mode: self.wrap_mode,
            wrap_width,
            line_alignment: self.line_alignment,
            scale,
            vertical: self.vertical_render,
            markup,
        }
    }
}
