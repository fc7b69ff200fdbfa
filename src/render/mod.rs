//! Rendering
//!
//! Interface to the external text rasterizer and the cache holding the
//! image of the current text.
//!
//! The rasterizer is a process-owned collaborator shared between overlay
//! instances through [`SharedRasterizer`], which serializes access with its
//! own mutex. The engine always takes its state lock before the rasterizer
//! lock, never the other way around.

#[cfg(feature = "block-rasterizer")]
pub mod block;

use crate::config::{LineAlign, WrapMode};
use crate::text::normalize_whitespace;
use crate::{Result, TextOverlayError};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Everything besides the text itself that determines the rendered image
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font description, rasterizer specific
    pub font_desc: String,
    /// Fill color, big-endian ARGB
    pub color: u32,
    /// Outline color, big-endian ARGB
    pub outline_color: u32,
    /// Wrapping policy
    pub wrap_mode: WrapMode,
    /// Width available for a line before wrapping, `None` to never wrap
    pub wrap_width: Option<u32>,
    /// Alignment of lines relative to each other
    pub line_alignment: LineAlign,
    /// Scale factor applied to the font size
    pub scale: f64,
    /// Rotate the text by 90 degrees
    pub vertical: bool,
    /// Text contains markup
    pub markup: bool,
}

impl TextStyle {
    /// Identify the image derived from `text` rendered with this style
    pub fn source_key(&self, text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        self.font_desc.hash(&mut hasher);
        self.color.hash(&mut hasher);
        self.outline_color.hash(&mut hasher);
        self.wrap_mode.hash(&mut hasher);
        self.wrap_width.hash(&mut hasher);
        self.line_alignment.hash(&mut hasher);
        self.scale.to_bits().hash(&mut hasher);
        self.vertical.hash(&mut hasher);
        self.markup.hash(&mut hasher);
        hasher.finish()
    }
}

/// Output of a [`Rasterizer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizedText {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Premultiplied RGBA, `width * height * 4` bytes, rows packed
    pub pixels: Vec<u8>,
    /// Distance from the image top to the baseline of the first line
    pub baseline_offset: i32,
}

/// External text rasterizer
///
/// Must be deterministic: identical `(text, style)` pairs produce identical
/// images.
pub trait Rasterizer: Send {
    /// Render marked-up `text` in `style`
    fn rasterize(&mut self, text: &str, style: &TextStyle) -> Result<RasterizedText>;
}

/// Process-owned rasterizer handle with its own lock
#[derive(Clone)]
pub struct SharedRasterizer {
    inner: Arc<Mutex<Box<dyn Rasterizer>>>,
}

impl SharedRasterizer {
    /// Wrap a rasterizer so it can be shared between overlays
    pub fn new<R: Rasterizer + 'static>(rasterizer: R) -> Self {
        SharedRasterizer {
            inner: Arc::new(Mutex::new(Box::new(rasterizer))),
        }
    }

    /// Render under the rasterizer lock
    pub fn rasterize(&self, text: &str, style: &TextStyle) -> Result<RasterizedText> {
        self.inner.lock().rasterize(text, style)
    }
}

impl fmt::Debug for SharedRasterizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRasterizer")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

/// Rendered text image
///
/// Never mutated after creation. A new image replaces the old one as a
/// whole, so holders of an `Arc<RenderedImage>` always see a consistent
/// picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Premultiplied RGBA pixels
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Distance from the image top to the first baseline
    pub baseline_offset: i32,
    /// Identifies the text and style the image was derived from
    pub source_key: u64,
}

impl RenderedImage {
    fn from_raster(raster: RasterizedText, source_key: u64) -> Result<Self> {
        let expected = raster.width as usize * raster.height as usize * 4;
        if raster.pixels.len() != expected {
            return Err(TextOverlayError::Rasterizer(format!(
                "{}x{} image carries {} bytes, expected {}",
                raster.width,
                raster.height,
                raster.pixels.len(),
                expected
            )));
        }
        Ok(RenderedImage {
            pixels: raster.pixels,
            width: raster.width,
            height: raster.height,
            baseline_offset: raster.baseline_offset,
            source_key,
        })
    }

    /// Whether the image has no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Most recent rendered image plus the dirty flag
#[derive(Debug, Default)]
pub struct RenderCache {
    image: Option<Arc<RenderedImage>>,
    dirty: bool,
    renders: u64,
}

impl RenderCache {
    /// Empty cache, marked dirty
    pub fn new() -> Self {
        RenderCache {
            image: None,
            dirty: true,
            renders: 0,
        }
    }

    /// Mark the cached image stale
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Whether the next render must call the rasterizer
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current image, if any
    pub fn current(&self) -> Option<&Arc<RenderedImage>> {
        self.image.as_ref()
    }

    /// Number of rasterizer invocations so far
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Drop the cached image
    pub fn clear(&mut self) {
        self.image = None;
        self.dirty = true;
    }

    /// Image for `text` in `style`.
    ///
    /// Reuses the cached image while the cache is clean and it was derived
    /// from the same text and style; otherwise renders a new one and
    /// clears the dirty flag.
    pub fn render(
        &mut self,
        text: &str,
        style: &TextStyle,
        rasterizer: &SharedRasterizer,
    ) -> Result<Arc<RenderedImage>> {
        let key = style.source_key(text);

        if !self.dirty {
            if let Some(image) = self.image.as_ref().filter(|img| img.source_key == key) {
                log::debug!("using previously rendered text");
                return Ok(Arc::clone(image));
            }
        }

        let text = normalize_whitespace(text);
        log::debug!("rendering '{text}'");
        let raster = rasterizer.rasterize(&text, style)?;
        self.renders += 1;

        let image = Arc::new(RenderedImage::from_raster(raster, key)?);
        self.image = Some(Arc::clone(&image));
        self.dirty = false;
        Ok(image)
    }
}
