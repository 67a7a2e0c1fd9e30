//! Software surfaces: owned pixel memory with a counted lock, blits and blends.

use std::ops::{Deref, DerefMut};

use log::trace;

use crate::error::GfxError;
use crate::pixel::blend::scale_alpha;
use crate::pixel::{blend, get_pixel_at, put_pixel_at, BlendMode, PixelFormat};
use crate::types::{Color, Point, Rect, Size};

/// A rectangular pixel buffer.
///
/// Raw byte access needs a [`SurfaceLock`]. Locks nest: the count goes up for
/// every guard and down when it drops. Drawing helpers on `Surface` take the
/// lock themselves.
#[derive(Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
    pixels: Vec<u8>,
    lock_count: u32,
    color_key: Option<u32>,
    alpha: Option<u8>,
}

impl Clone for Surface {
    fn clone(&self) -> Self {
        Surface { pixels: self.pixels.clone(), format: self.format.clone(), lock_count: 0, ..*self }
    }
}

impl Surface {
    /// Allocates a zeroed surface. Rows are padded to 4-byte boundaries.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, GfxError> {
        let row = width as usize * format.bytes_per_pixel();
        Self::with_pitch(width, height, (row + 3) & !3, format)
    }

    pub fn with_pitch(width: u32, height: u32, pitch: usize, format: PixelFormat) -> Result<Self, GfxError> {
        if width == 0 || height == 0 { return Err(GfxError::InvalidDimensions { width, height }); }
        let bpp = format.bytes_per_pixel();
        if pitch < width as usize * bpp { return Err(GfxError::InvalidPitch { pitch, width, bytes_per_pixel: bpp }); }
        let len = pitch.checked_mul(height as usize).ok_or(GfxError::InvalidDimensions { width, height })?;
        Ok(Surface { width, height, pitch, format, pixels: vec![0; len], lock_count: 0, color_key: None, alpha: None })
    }

    /// Builds an [`PixelFormat::rgba32`] surface from tightly packed RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, GfxError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(GfxError::InvalidArgument(format!("expected {} RGBA bytes, got {}", expected, rgba.len())));
        }
        let mut surface = Surface::with_pitch(width, height, width as usize * 4, PixelFormat::rgba32())?;
        surface.pixels.copy_from_slice(rgba);
        Ok(surface)
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn size(&self) -> Size { Size::new(self.width, self.height) }
    pub fn rect(&self) -> Rect { Rect::new(0, 0, self.width, self.height) }
    pub fn pitch(&self) -> usize { self.pitch }
    pub fn format(&self) -> &PixelFormat { &self.format }
    pub fn is_locked(&self) -> bool { self.lock_count > 0 }
    pub fn lock_count(&self) -> u32 { self.lock_count }

    pub fn color_key(&self) -> Option<u32> { self.color_key }
    pub fn set_color_key(&mut self, key: Option<Color>) { self.color_key = key.map(|c| self.format.map_rgba(c)); }
    pub fn set_color_key_raw(&mut self, key: Option<u32>) { self.color_key = key; }

    /// Whole-surface alpha applied to this surface's pixels when it is the source of a blend.
    pub fn alpha(&self) -> Option<u8> { self.alpha }
    pub fn set_alpha(&mut self, alpha: Option<u8>) { self.alpha = alpha; }

    pub fn lock(&mut self) -> SurfaceLock<'_> {
        self.lock_count += 1;
        SurfaceLock { surface: self }
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Result<Color, GfxError> {
        self.raw_at(x, y).map(|raw| self.format.get_rgba(raw)).ok_or(GfxError::OutOfBounds { x, y })
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> Result<(), GfxError> {
        let raw = self.format.map_rgba(color);
        if self.lock().put_raw(x, y, raw) { Ok(()) } else { Err(GfxError::OutOfBounds { x, y }) }
    }

    fn raw_at(&self, x: i32, y: i32) -> Option<u32> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height { return None; }
        get_pixel_at(&self.pixels, self.pitch, x as usize, y as usize, self.format.bytes_per_pixel())
    }

    pub fn fill(&mut self, color: Color) {
        let rect = self.rect();
        self.fill_rect(rect, color);
    }

    /// Writes `color` raw (no blending) into `rect`, clipped to the surface.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(area) = rect.intersect(&self.rect()) else { return };
        let raw = self.format.map_rgba(color);
        let mut lock = self.lock();
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() { lock.put_raw(x, y, raw); }
        }
    }

    /// Blends `color` into `rect` with `mode`, clipped to the surface.
    pub fn blend_rect(&mut self, rect: Rect, color: Color, mode: BlendMode) {
        let Some(area) = rect.intersect(&self.rect()) else { return };
        let format = self.format.clone();
        let mut lock = self.lock();
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                if let Some(raw) = lock.get_raw(x, y) {
                    lock.put_raw(x, y, format.map_rgba(blend(format.get_rgba(raw), color, mode)));
                }
            }
        }
    }

    /// Copies pixels from `src` without blending. Pixels matching the source
    /// color key are skipped; differing formats are converted per pixel.
    /// Returns the destination rectangle actually written.
    pub fn blit(&mut self, src: &Surface, src_rect: Option<Rect>, dst: Point) -> Option<Rect> {
        let (from, to) = clip_blit(src, src_rect, self.rect(), dst)?;
        let same_format = src.format == self.format;
        let bpp = src.format.bytes_per_pixel();
        let key = src.color_key;
        let dst_format = self.format.clone();
        let mut lock = self.lock();
        for row in 0..from.height as i32 {
            let (sy, dy) = (from.top() + row, to.top() + row);
            if same_format && key.is_none() {
                let s = sy as usize * src.pitch + from.left() as usize * bpp;
                let d = dy as usize * lock.pitch + to.left() as usize * bpp;
                let n = from.width as usize * bpp;
                lock.pixels[d..d + n].copy_from_slice(&src.pixels[s..s + n]);
                continue;
            }
            for col in 0..from.width as i32 {
                let Some(raw) = src.raw_at(from.left() + col, sy) else { continue };
                if key == Some(raw) { continue; }
                let out = if same_format { raw } else { dst_format.map_rgba(src.format.get_rgba(raw)) };
                lock.put_raw(to.left() + col, dy, out);
            }
        }
        Some(to)
    }

    /// Composites `src` onto this surface pixel by pixel with `mode`.
    ///
    /// Source pixels equal to the source color key are skipped before any
    /// blend math. The source surface alpha, if set, scales each source
    /// pixel's alpha first.
    pub fn blend_from(&mut self, src: &Surface, src_rect: Option<Rect>, dst: Point, mode: BlendMode) -> Option<Rect> {
        let (from, to) = clip_blit(src, src_rect, self.rect(), dst)?;
        let key = src.color_key;
        let dst_format = self.format.clone();
        let mut lock = self.lock();
        for row in 0..from.height as i32 {
            for col in 0..from.width as i32 {
                let Some(raw) = src.raw_at(from.left() + col, from.top() + row) else { continue };
                if key == Some(raw) { continue; }
                let mut color = src.format.get_rgba(raw);
                if let Some(sa) = src.alpha { color.a = scale_alpha(color.a, sa); }
                let (x, y) = (to.left() + col, to.top() + row);
                if let Some(d) = lock.get_raw(x, y) {
                    let out = blend(dst_format.get_rgba(d), color, mode);
                    lock.put_raw(x, y, dst_format.map_rgba(out));
                }
            }
        }
        Some(to)
    }

    /// Returns a copy in another pixel format. The color key is re-mapped and
    /// the surface alpha carried over.
    pub fn convert(&self, format: &PixelFormat) -> Result<Surface, GfxError> {
        let mut out = Surface::new(self.width, self.height, format.clone())?;
        {
            let mut lock = out.lock();
            for y in 0..self.height as i32 {
                for x in 0..self.width as i32 {
                    if let Some(raw) = self.raw_at(x, y) {
                        lock.put_raw(x, y, format.map_rgba(self.format.get_rgba(raw)));
                    }
                }
            }
        }
        out.color_key = self.color_key.map(|k| format.map_rgba(self.format.get_rgba(k)));
        out.alpha = self.alpha;
        trace!("converted {}x{} surface from {} to {} bpp", self.width, self.height, self.format.bits_per_pixel(), format.bits_per_pixel());
        Ok(out)
    }

    /// Tightly packed RGBA bytes, independent of the pixel format.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let c = self.raw_at(x, y).map(|raw| self.format.get_rgba(raw)).unwrap_or_default();
                out.extend_from_slice(&[c.r, c.g, c.b, c.a]);
            }
        }
        out
    }
}

/// Clips a blit of `src_rect` (default: all of `src`) placed at `dst` against
/// both surfaces. Returns the matching source and destination rectangles.
fn clip_blit(src: &Surface, src_rect: Option<Rect>, dst_bounds: Rect, dst: Point) -> Option<(Rect, Rect)> {
    let from = src_rect.unwrap_or_else(|| src.rect()).intersect(&src.rect())?;
    let requested = src_rect.unwrap_or_else(|| src.rect());
    // Shift the destination by however much the source was clipped on the top/left.
    let origin = Point::new(dst.x + (from.x - requested.x), dst.y + (from.y - requested.y));
    let to = Rect::new(origin.x, origin.y, from.width, from.height).intersect(&dst_bounds)?;
    let from = Rect::new(from.x + (to.x - origin.x), from.y + (to.y - origin.y), to.width, to.height);
    Some((from, to))
}

/// Scoped lock on a surface giving raw pixel access. Dropping it unlocks.
pub struct SurfaceLock<'a> {
    surface: &'a mut Surface,
}

impl<'a> SurfaceLock<'a> {
    /// Takes a nested lock on the same surface.
    pub fn relock(&mut self) -> SurfaceLock<'_> {
        self.surface.lock()
    }

    pub fn pixels(&self) -> &[u8] { &self.surface.pixels }
    pub fn pixels_mut(&mut self) -> &mut [u8] { &mut self.surface.pixels }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.surface.height { return None; }
        let start = y as usize * self.surface.pitch;
        let len = self.surface.width as usize * self.surface.format.bytes_per_pixel();
        self.surface.pixels.get(start..start + len)
    }

    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.surface.height { return None; }
        let start = y as usize * self.surface.pitch;
        let len = self.surface.width as usize * self.surface.format.bytes_per_pixel();
        self.surface.pixels.get_mut(start..start + len)
    }

    pub fn get_raw(&self, x: i32, y: i32) -> Option<u32> { self.surface.raw_at(x, y) }

    pub fn put_raw(&mut self, x: i32, y: i32, raw: u32) -> bool {
        let s = &mut *self.surface;
        if x < 0 || y < 0 || x as u32 >= s.width || y as u32 >= s.height { return false; }
        put_pixel_at(&mut s.pixels, s.pitch, x as usize, y as usize, s.format.bytes_per_pixel(), raw)
    }
}

impl Deref for SurfaceLock<'_> {
    type Target = Surface;
    fn deref(&self) -> &Surface { &*self.surface }
}

impl DerefMut for SurfaceLock<'_> {
    fn deref_mut(&mut self) -> &mut Surface { &mut *self.surface }
}

impl Drop for SurfaceLock<'_> {
    fn drop(&mut self) {
        self.surface.lock_count -= 1;
    }
}
