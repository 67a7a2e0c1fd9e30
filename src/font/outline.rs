//! Outline font rasterization with `ab_glyph`.

use ab_glyph::{point, Font as _, FontArc, PxScale, ScaleFont};

use super::{FontMetrics, GlyphMask, GlyphRasterizer};
use crate::error::GfxError;

/// Rasterizes TrueType/OpenType outlines at a fixed pixel size.
pub struct OutlineRasterizer {
    font: FontArc,
    scale: PxScale,
}

impl OutlineRasterizer {
    pub fn new(font: FontArc, px_size: f32) -> Result<Self, GfxError> {
        if !(px_size.is_finite() && px_size > 0.0) {
            return Err(GfxError::InvalidArgument(format!("font size {}", px_size)));
        }
        Ok(OutlineRasterizer { font, scale: PxScale::from(px_size) })
    }

    pub fn from_bytes(data: Vec<u8>, px_size: f32) -> Result<Self, GfxError> {
        let font = FontArc::try_from_vec(data).map_err(|e| GfxError::Font(e.to_string()))?;
        Self::new(font, px_size)
    }

    pub fn px_size(&self) -> f32 { self.scale.y }
}

impl GlyphRasterizer for OutlineRasterizer {
    fn metrics(&self) -> FontMetrics {
        let scaled = self.font.as_scaled(self.scale);
        let ascent = scaled.ascent().ceil() as i32;
        let descent = scaled.descent().floor() as i32;
        FontMetrics { ascent, descent, line_skip: (ascent - descent) + scaled.line_gap().round() as i32 }
    }

    fn rasterize(&self, ch: char) -> Result<GlyphMask, GfxError> {
        let id = self.font.glyph_id(ch);
        if id.0 == 0 { return Err(GfxError::MissingGlyph(ch)); }
        let scaled = self.font.as_scaled(self.scale);
        let advance = scaled.h_advance(id).round() as i32;
        // Position the baseline at the ascent so bounds come out line-relative.
        let glyph = id.with_scale_and_position(self.scale, point(0.0, scaled.ascent().ceil()));
        let Some(outlined) = self.font.outline_glyph(glyph) else { return Ok(GlyphMask::blank(advance)) };
        let bounds = outlined.px_bounds();
        let (width, height) = (bounds.width() as u32, bounds.height() as u32);
        let mut coverage = vec![0u8; (width * height) as usize];
        outlined.draw(|x, y, c| {
            if x < width && y < height {
                coverage[(y * width + x) as usize] = (c * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        });
        Ok(GlyphMask { width, height, coverage, x_offset: bounds.min.x as i32, y_offset: bounds.min.y as i32, advance })
    }
}
