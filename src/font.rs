//! Fonts: a small capability trait with two concrete variants.
//!
//! [`BitmapFont`] cuts fixed-size cells out of a glyph sheet. [`TrueTypeFont`]
//! rasterizes through a [`GlyphRasterizer`] and keeps the results in an LRU
//! [`GlyphCache`]. Both measure text by summing glyph advances, which is
//! exactly how far rendering moves the pen.

pub mod bitmap;
pub mod cache;
pub mod outline;
pub mod style;
pub mod truetype;

use crate::error::GfxError;
use crate::surface::Surface;
use crate::types::Point;

pub use bitmap::BitmapFont;
pub use cache::{CachedGlyph, GlyphCache, GlyphKey};
pub use outline::OutlineRasterizer;
pub use style::{FontStyle, RenderStyle};
pub use truetype::TrueTypeFont;

pub trait TextFont {
    /// Height of one line of glyphs in pixels.
    fn line_height(&self) -> u32;
    /// Distance between the tops of consecutive lines.
    fn line_skip(&self) -> u32;
    /// Width of `text` as the sum of its glyph advances. Newlines measure zero.
    fn measure(&mut self, text: &str) -> Result<u32, GfxError>;
    /// Draws `text` with its top-left corner at `at` and returns the advance.
    fn render(&mut self, text: &str, target: &mut Surface, at: Point) -> Result<u32, GfxError>;
}

/// Vertical font metrics in pixels. `descent` is zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FontMetrics {
    pub ascent: i32,
    pub descent: i32,
    pub line_skip: i32,
}

impl FontMetrics {
    pub fn height(&self) -> i32 { self.ascent - self.descent }
}

/// An 8-bit coverage mask for one glyph.
///
/// `x_offset` is the left bearing from the pen position, `y_offset` the top
/// of the mask below the top of the line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
    pub x_offset: i32,
    pub y_offset: i32,
    pub advance: i32,
}

impl GlyphMask {
    /// A mask with no pixels, e.g. for a space.
    pub fn blank(advance: i32) -> Self { GlyphMask { advance, ..Self::default() } }

    pub fn is_blank(&self) -> bool { self.width == 0 || self.height == 0 }

    pub fn at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height { return 0; }
        self.coverage[(y * self.width + x) as usize]
    }

    /// Grows the mask so it covers the line-relative box `left..right`,
    /// `top..bottom` as well as its current pixels.
    pub fn expand(&mut self, left: i32, top: i32, right: i32, bottom: i32) {
        let (old_left, old_top) = (self.x_offset, self.y_offset);
        let (old_right, old_bottom) = (old_left + self.width as i32, old_top + self.height as i32);
        let (left, top) = if self.is_blank() { (left, top) } else { (left.min(old_left), top.min(old_top)) };
        let (right, bottom) = if self.is_blank() { (right, bottom) } else { (right.max(old_right), bottom.max(old_bottom)) };
        let (width, height) = ((right - left).max(0) as u32, (bottom - top).max(0) as u32);
        let mut coverage = vec![0u8; (width * height) as usize];
        for y in 0..self.height {
            for x in 0..self.width {
                let (nx, ny) = ((old_left - left) as u32 + x, (old_top - top) as u32 + y);
                coverage[(ny * width + nx) as usize] = self.at(x, y);
            }
        }
        *self = GlyphMask { width, height, coverage, x_offset: left, y_offset: top, advance: self.advance };
    }
}

/// Source of glyph coverage masks.
pub trait GlyphRasterizer {
    fn metrics(&self) -> FontMetrics;
    /// Renders `ch`. Fails with [`GfxError::MissingGlyph`] if the font has no
    /// glyph for it.
    fn rasterize(&self, ch: char) -> Result<GlyphMask, GfxError>;
}

pub enum Font {
    Bitmap(BitmapFont),
    TrueType(TrueTypeFont),
}

impl TextFont for Font {
    fn line_height(&self) -> u32 {
        match self {
            Font::Bitmap(f) => f.line_height(),
            Font::TrueType(f) => f.line_height(),
        }
    }

    fn line_skip(&self) -> u32 {
        match self {
            Font::Bitmap(f) => f.line_skip(),
            Font::TrueType(f) => f.line_skip(),
        }
    }

    fn measure(&mut self, text: &str) -> Result<u32, GfxError> {
        match self {
            Font::Bitmap(f) => f.measure(text),
            Font::TrueType(f) => f.measure(text),
        }
    }

    fn render(&mut self, text: &str, target: &mut Surface, at: Point) -> Result<u32, GfxError> {
        match self {
            Font::Bitmap(f) => f.render(text, target, at),
            Font::TrueType(f) => f.render(text, target, at),
        }
    }
}

impl From<BitmapFont> for Font {
    fn from(f: BitmapFont) -> Self { Font::Bitmap(f) }
}

impl From<TrueTypeFont> for Font {
    fn from(f: TrueTypeFont) -> Self { Font::TrueType(f) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_expand() {
        let mut mask = GlyphMask { width: 2, height: 1, coverage: vec![10, 20], x_offset: 1, y_offset: 2, advance: 4 };
        mask.expand(0, 0, 4, 3);
        assert_eq!((mask.width, mask.height, mask.x_offset, mask.y_offset), (4, 3, 0, 0));
        assert_eq!(mask.at(1, 2), 10);
        assert_eq!(mask.at(2, 2), 20);
        assert_eq!(mask.at(0, 0), 0);
        assert_eq!(mask.advance, 4);
    }

    #[test]
    fn test_blank_expand_takes_box() {
        let mut mask = GlyphMask::blank(5);
        mask.expand(0, 3, 5, 4);
        assert_eq!((mask.width, mask.height, mask.y_offset), (5, 1, 3));
        assert!(mask.coverage.iter().all(|&c| c == 0));
    }
}
