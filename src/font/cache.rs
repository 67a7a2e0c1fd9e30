//! LRU cache of rendered glyphs.

use std::num::NonZeroUsize;

use log::{debug, trace};
use lru::LruCache;

use super::style::{FontStyle, RenderStyle};
use crate::error::GfxError;
use crate::pixel::PixelFormat;
use crate::surface::Surface;

/// Everything that changes a glyph's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub ch: char,
    /// Foreground as `0xAARRGGBB`.
    pub foreground: u32,
    /// Shade as `0xAARRGGBB`; zero unless the render style is `Shaded`.
    pub shade: u32,
    pub style: FontStyle,
    pub render: RenderStyle,
}

#[derive(Debug, Clone)]
pub struct CachedGlyph {
    pub ch: char,
    /// `None` for glyphs without pixels, such as spaces.
    pub surface: Option<Surface>,
    pub x_offset: i32,
    pub y_offset: i32,
    pub width: u32,
    pub advance: i32,
    /// Set once the surface has been converted to the display format.
    pub compatible: bool,
}

impl CachedGlyph {
    /// Converts the bitmap to `format` unless that was already done. Glyphs
    /// with transparent pixels keep their format when `format` has no alpha.
    pub fn make_compatible(&mut self, format: Option<&PixelFormat>, render: RenderStyle) -> Result<(), GfxError> {
        let Some(format) = format else { return Ok(()) };
        if self.compatible { return Ok(()); }
        let keep = render != RenderStyle::Shaded && !format.has_alpha();
        let converted = match &self.surface {
            Some(surface) if !keep && surface.format() != format => Some(surface.convert(format)?),
            _ => None,
        };
        if converted.is_some() { self.surface = converted; }
        self.compatible = true;
        Ok(())
    }
}

pub struct GlyphCache {
    entries: Option<LruCache<GlyphKey, CachedGlyph>>,
}

impl GlyphCache {
    /// A cache holding at most `max_size` glyphs. Zero disables caching.
    pub fn new(max_size: usize) -> Self {
        GlyphCache { entries: NonZeroUsize::new(max_size).map(LruCache::new) }
    }

    pub fn is_enabled(&self) -> bool { self.entries.is_some() }
    pub fn len(&self) -> usize { self.entries.as_ref().map_or(0, |e| e.len()) }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn max_size(&self) -> usize { self.entries.as_ref().map_or(0, |e| e.cap().get()) }

    /// Changes the capacity, evicting least recently used glyphs if it
    /// shrinks. Zero drops every entry and disables caching.
    pub fn set_max_size(&mut self, max_size: usize) {
        let Some(cap) = NonZeroUsize::new(max_size) else {
            debug!("glyph cache disabled, dropping {} entries", self.len());
            self.entries = None;
            return;
        };
        if let Some(entries) = self.entries.as_mut() {
            let before = entries.len();
            entries.resize(cap);
            if entries.len() < before { debug!("glyph cache shrunk to {}, evicted {}", cap, before - entries.len()); }
        } else {
            self.entries = Some(LruCache::new(cap));
        }
    }

    /// Looks up `key` without touching its recency.
    pub fn contains(&self, key: &GlyphKey) -> bool {
        self.entries.as_ref().is_some_and(|e| e.contains(key))
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&mut self, key: &GlyphKey) -> Option<&CachedGlyph> {
        self.entries.as_mut()?.get(key)
    }

    pub fn get_mut(&mut self, key: &GlyphKey) -> Option<&mut CachedGlyph> {
        self.entries.as_mut()?.get_mut(key)
    }

    /// Inserts a glyph, evicting the least recently used one when full.
    /// Returns the stored glyph, or `None` if caching is disabled.
    pub fn insert(&mut self, key: GlyphKey, glyph: CachedGlyph) -> Option<&CachedGlyph> {
        let entries = self.entries.as_mut()?;
        if let Some((old, _)) = entries.push(key, glyph) {
            if old != key { trace!("evicted glyph {:?}", old.ch); }
        }
        entries.peek(&key)
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() { entries.clear(); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ch: char) -> GlyphKey {
        GlyphKey { ch, foreground: 0xFF00_0000, shade: 0, style: FontStyle::NORMAL, render: RenderStyle::Solid }
    }

    fn glyph(ch: char) -> CachedGlyph {
        CachedGlyph { ch, surface: None, x_offset: 0, y_offset: 0, width: 0, advance: 5, compatible: false }
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut cache = GlyphCache::new(3);
        for ch in ['a', 'b', 'c'] { cache.insert(key(ch), glyph(ch)); }
        // Touch 'a' so 'b' becomes the oldest.
        assert!(cache.get(&key('a')).is_some());
        cache.insert(key('d'), glyph('d'));
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&key('a')));
        assert!(!cache.contains(&key('b')));
        assert!(cache.contains(&key('c')));
    }

    #[test]
    fn test_shrink_evicts_oldest() {
        let mut cache = GlyphCache::new(4);
        for ch in ['a', 'b', 'c', 'd'] { cache.insert(key(ch), glyph(ch)); }
        cache.set_max_size(2);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key('c')) && cache.contains(&key('d')));
    }

    #[test]
    fn test_zero_disables() {
        let mut cache = GlyphCache::new(2);
        cache.insert(key('a'), glyph('a'));
        cache.set_max_size(0);
        assert!(!cache.is_enabled());
        assert!(cache.insert(key('a'), glyph('a')).is_none());
        assert_eq!(cache.len(), 0);
        cache.set_max_size(1);
        assert!(cache.insert(key('a'), glyph('a')).is_some());
    }

    #[test]
    fn test_compatible_conversion_once() {
        let mut g = glyph('x');
        g.surface = Some(Surface::from_rgba(1, 1, &[1, 2, 3, 255]).unwrap());
        g.make_compatible(Some(&PixelFormat::rgb565()), RenderStyle::Shaded).unwrap();
        assert!(g.compatible);
        assert_eq!(g.surface.as_ref().unwrap().format().bits_per_pixel(), 16);
        // Already compatible: a second format is ignored.
        g.make_compatible(Some(&PixelFormat::rgb24()), RenderStyle::Shaded).unwrap();
        assert_eq!(g.surface.as_ref().unwrap().format().bits_per_pixel(), 16);

        let mut blended = glyph('y');
        blended.surface = Some(Surface::from_rgba(1, 1, &[1, 2, 3, 99]).unwrap());
        blended.make_compatible(Some(&PixelFormat::xrgb32()), RenderStyle::Blended).unwrap();
        assert!(blended.surface.as_ref().unwrap().format().has_alpha());
    }
}
