use log::trace;

use super::cache::{CachedGlyph, GlyphCache, GlyphKey};
use super::outline::OutlineRasterizer;
use super::style::{apply_style, FontStyle, RenderStyle};
use super::{FontMetrics, GlyphMask, GlyphRasterizer, TextFont};
use crate::config::{GfxConfig, DEFAULT_GLYPH_CACHE_SIZE};
use crate::error::GfxError;
use crate::pixel::blend::div255;
use crate::pixel::{BlendMode, PixelFormat};
use crate::subsystem::{SubsystemHandle, SubsystemKind};
use crate::surface::Surface;
use crate::types::{Color, Point};

/// An outline font rendered on demand, one glyph at a time, through an LRU
/// glyph cache.
///
/// Colors, style and render style are part of each glyph's cache key, so
/// changing them never invalidates existing entries. Changing the display
/// format does.
pub struct TrueTypeFont {
    rasterizer: Box<dyn GlyphRasterizer>,
    metrics: FontMetrics,
    foreground: Color,
    shade: Color,
    style: FontStyle,
    render_style: RenderStyle,
    cache: GlyphCache,
    display_format: Option<PixelFormat>,
    // Holds the last glyph while caching is disabled.
    uncached: Option<CachedGlyph>,
    _subsystem: SubsystemHandle,
}

impl TrueTypeFont {
    pub fn new(rasterizer: Box<dyn GlyphRasterizer>, subsystem: SubsystemHandle) -> Result<Self, GfxError> {
        if subsystem.kind() != SubsystemKind::Font {
            return Err(GfxError::InvalidArgument(format!("fonts need the font subsystem, got {}", subsystem.kind())));
        }
        let metrics = rasterizer.metrics();
        Ok(TrueTypeFont {
            rasterizer,
            metrics,
            foreground: Color::WHITE,
            shade: Color::BLACK,
            style: FontStyle::NORMAL,
            render_style: RenderStyle::default(),
            cache: GlyphCache::new(DEFAULT_GLYPH_CACHE_SIZE),
            display_format: None,
            uncached: None,
            _subsystem: subsystem,
        })
    }

    pub fn with_config(rasterizer: Box<dyn GlyphRasterizer>, subsystem: SubsystemHandle, config: &GfxConfig) -> Result<Self, GfxError> {
        let mut font = Self::new(rasterizer, subsystem)?;
        font.render_style = config.render_style;
        font.set_cache_size(config.glyph_cache_size);
        Ok(font)
    }

    /// Loads a TrueType/OpenType font at `px_size` pixels.
    pub fn from_bytes(data: Vec<u8>, px_size: f32, subsystem: SubsystemHandle) -> Result<Self, GfxError> {
        Self::new(Box::new(OutlineRasterizer::from_bytes(data, px_size)?), subsystem)
    }

    pub fn metrics(&self) -> FontMetrics { self.metrics }
    pub fn foreground(&self) -> Color { self.foreground }
    pub fn set_foreground(&mut self, color: Color) { self.foreground = color; }
    pub fn shade(&self) -> Color { self.shade }
    pub fn set_shade(&mut self, color: Color) { self.shade = color; }
    pub fn style(&self) -> FontStyle { self.style }
    pub fn set_style(&mut self, style: FontStyle) { self.style = style; }
    pub fn render_style(&self) -> RenderStyle { self.render_style }
    pub fn set_render_style(&mut self, render_style: RenderStyle) { self.render_style = render_style; }

    pub fn cache_size(&self) -> usize { self.cache.max_size() }
    pub fn cached_glyphs(&self) -> usize { self.cache.len() }

    /// Sets the maximum number of cached glyphs. Zero clears and disables the cache.
    pub fn set_cache_size(&mut self, size: usize) {
        self.cache.set_max_size(size);
        if self.cache.is_enabled() { self.uncached = None; }
    }

    pub fn display_format(&self) -> Option<&PixelFormat> { self.display_format.as_ref() }

    /// Glyph bitmaps fetched after this call are converted to `format` once.
    /// Clears the cache.
    pub fn set_display_format(&mut self, format: Option<PixelFormat>) {
        self.cache.clear();
        self.uncached = None;
        self.display_format = format;
    }

    /// The cache key `ch` gets with the current settings.
    pub fn key_for(&self, ch: char) -> GlyphKey {
        let shade = match self.render_style {
            RenderStyle::Shaded => self.shade,
            _ => Color::TRANSPARENT,
        };
        GlyphKey { ch, foreground: self.foreground.to_argb(), shade: shade.to_argb(), style: self.style, render: self.render_style }
    }

    /// True if `ch` with the current settings is in the cache. Does not
    /// change its recency.
    pub fn is_cached(&self, ch: char) -> bool { self.cache.contains(&self.key_for(ch)) }

    /// Returns the glyph for `ch`, rendering and caching it on a miss.
    pub fn get_char(&mut self, ch: char) -> Result<&CachedGlyph, GfxError> {
        let key = self.key_for(ch);
        let render = self.render_style;
        if self.cache.contains(&key) {
            let format = self.display_format.as_ref();
            let glyph = self.cache.get_mut(&key).ok_or(GfxError::MissingGlyph(ch))?;
            glyph.make_compatible(format, render)?;
            return Ok(&*glyph);
        }
        let mut glyph = self.render_glyph(ch)?;
        glyph.make_compatible(self.display_format.as_ref(), render)?;
        if self.cache.is_enabled() {
            return self.cache.insert(key, glyph).ok_or(GfxError::MissingGlyph(ch));
        }
        Ok(&*self.uncached.insert(glyph))
    }

    fn render_glyph(&self, ch: char) -> Result<CachedGlyph, GfxError> {
        let mut mask = self.rasterizer.rasterize(ch)?;
        apply_style(&mut mask, self.style, &self.metrics);
        trace!("rendered {:?}: {}x{} advance {}", ch, mask.width, mask.height, mask.advance);
        let surface = if mask.is_blank() { None } else { Some(self.colorize(&mask)?) };
        Ok(CachedGlyph {
            ch,
            surface,
            x_offset: mask.x_offset,
            y_offset: mask.y_offset,
            width: mask.width,
            advance: mask.advance,
            compatible: false,
        })
    }

    fn colorize(&self, mask: &GlyphMask) -> Result<Surface, GfxError> {
        let (fg, shade) = (self.foreground, self.shade);
        let mix = |s: u8, f: u8, c: u32| (div255(s as u32 * (255 - c) + f as u32 * c)) as u8;
        let mut rgba = Vec::with_capacity(mask.coverage.len() * 4);
        for &c in &mask.coverage {
            let px = match self.render_style {
                RenderStyle::Solid if c >= 128 => [fg.r, fg.g, fg.b, 255],
                RenderStyle::Solid => [0, 0, 0, 0],
                RenderStyle::Shaded => {
                    let c = c as u32;
                    [mix(shade.r, fg.r, c), mix(shade.g, fg.g, c), mix(shade.b, fg.b, c), 255]
                }
                RenderStyle::Blended => [fg.r, fg.g, fg.b, div255(c as u32 * fg.a as u32) as u8],
            };
            rgba.extend_from_slice(&px);
        }
        let mut surface = Surface::from_rgba(mask.width, mask.height, &rgba)?;
        if self.render_style == RenderStyle::Shaded && !shade.is_transparent() {
            surface.set_color_key(Some(shade.with_alpha(255)));
        }
        Ok(surface)
    }
}

impl TextFont for TrueTypeFont {
    fn line_height(&self) -> u32 { self.metrics.height().max(0) as u32 }
    fn line_skip(&self) -> u32 { self.metrics.line_skip.max(0) as u32 }

    fn measure(&mut self, text: &str) -> Result<u32, GfxError> {
        let mut width = 0i64;
        for ch in text.chars().filter(|&c| c != '\n') {
            width += self.get_char(ch)?.advance as i64;
        }
        Ok(width.max(0) as u32)
    }

    fn render(&mut self, text: &str, target: &mut Surface, at: Point) -> Result<u32, GfxError> {
        let mut pen = 0i32;
        for ch in text.chars().filter(|&c| c != '\n') {
            let shaded = self.render_style == RenderStyle::Shaded;
            let glyph = self.get_char(ch)?;
            if let Some(surface) = &glyph.surface {
                let pos = Point::new(at.x + pen + glyph.x_offset, at.y + glyph.y_offset);
                if shaded {
                    target.blit(surface, None, pos);
                } else {
                    target.blend_from(surface, None, pos, BlendMode::Normal);
                }
            }
            pen += glyph.advance;
        }
        Ok(pen.max(0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::Subsystem;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Draws every glyph as a 4x6 block with a fixed coverage.
    struct BlockRasterizer {
        calls: Rc<Cell<usize>>,
        coverage: u8,
    }

    impl GlyphRasterizer for BlockRasterizer {
        fn metrics(&self) -> FontMetrics { FontMetrics { ascent: 7, descent: -2, line_skip: 10 } }

        fn rasterize(&self, ch: char) -> Result<GlyphMask, GfxError> {
            self.calls.set(self.calls.get() + 1);
            match ch {
                ' ' => Ok(GlyphMask::blank(3)),
                '\u{1}' => Err(GfxError::MissingGlyph(ch)),
                _ => Ok(GlyphMask { width: 4, height: 6, coverage: vec![self.coverage; 24], x_offset: 0, y_offset: 1, advance: 5 }),
            }
        }
    }

    fn font(coverage: u8) -> (TrueTypeFont, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let raster = BlockRasterizer { calls: calls.clone(), coverage };
        let font = TrueTypeFont::new(Box::new(raster), Subsystem::init(SubsystemKind::Font)).unwrap();
        (font, calls)
    }

    #[test]
    fn test_cache_hit_skips_rasterizer() {
        let (mut font, calls) = font(255);
        font.get_char('a').unwrap();
        font.get_char('a').unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(font.cached_glyphs(), 1);
    }

    #[test]
    fn test_render_style_is_part_of_key() {
        let (mut font, calls) = font(200);
        font.get_char('a').unwrap();
        font.set_render_style(RenderStyle::Blended);
        let alpha = font.get_char('a').unwrap().surface.as_ref().unwrap().get_pixel(0, 0).unwrap().a;
        assert_eq!(alpha, 200);
        assert_eq!(calls.get(), 2);
        assert_eq!(font.cached_glyphs(), 2);
        font.set_render_style(RenderStyle::Solid);
        assert!(font.is_cached('a'));
    }

    #[test]
    fn test_shade_ignored_outside_shaded() {
        let (mut font, _) = font(255);
        let before = font.key_for('a');
        font.set_shade(Color::rgb(1, 2, 3));
        assert_eq!(font.key_for('a'), before);
        font.set_render_style(RenderStyle::Shaded);
        assert_eq!(font.key_for('a').shade, Color::rgb(1, 2, 3).to_argb());
    }

    #[test]
    fn test_shaded_sets_color_key() {
        let (mut font, _) = font(0);
        font.set_render_style(RenderStyle::Shaded);
        font.set_shade(Color::rgb(0, 0, 255));
        let glyph = font.get_char('a').unwrap();
        let surface = glyph.surface.as_ref().unwrap();
        assert_eq!(surface.get_pixel(0, 0).unwrap(), Color::rgb(0, 0, 255));
        assert!(surface.color_key().is_some());
    }

    #[test]
    fn test_disabled_cache_rasterizes_every_time() {
        let (mut font, calls) = font(255);
        font.set_cache_size(0);
        font.get_char('a').unwrap();
        font.get_char('a').unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(font.cached_glyphs(), 0);
    }

    #[test]
    fn test_display_format_clears_and_converts() {
        let (mut font, _) = font(255);
        font.set_render_style(RenderStyle::Shaded);
        font.get_char('a').unwrap();
        font.set_display_format(Some(PixelFormat::rgb565()));
        assert_eq!(font.cached_glyphs(), 0);
        let glyph = font.get_char('a').unwrap();
        assert!(glyph.compatible);
        assert_eq!(glyph.surface.as_ref().unwrap().format().bits_per_pixel(), 16);
    }

    #[test]
    fn test_measure_and_render_agree() {
        let (mut font, _) = font(255);
        assert_eq!(font.measure("ab c").unwrap(), 18);
        let mut target = Surface::new(32, 12, PixelFormat::rgba32()).unwrap();
        assert_eq!(font.render("ab c", &mut target, Point::new(1, 0)).unwrap(), 18);
        assert_eq!(target.get_pixel(1, 1).unwrap(), Color::WHITE);
        assert_eq!(target.get_pixel(1, 0).unwrap().a, 0);
        assert_eq!(target.get_pixel(5, 1).unwrap().a, 0);
    }

    #[test]
    fn test_missing_glyph_propagates() {
        let (mut font, _) = font(255);
        assert!(matches!(font.get_char('\u{1}'), Err(GfxError::MissingGlyph('\u{1}'))));
        assert_eq!(font.cached_glyphs(), 0);
    }

    #[test]
    fn test_wrong_subsystem_rejected() {
        let raster = BlockRasterizer { calls: Rc::new(Cell::new(0)), coverage: 0 };
        assert!(TrueTypeFont::new(Box::new(raster), Subsystem::init(SubsystemKind::Video)).is_err());
    }
}
