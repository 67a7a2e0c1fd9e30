use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use super::{FontMetrics, GlyphMask};

/// Style bits applied on top of the rasterized outline.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[serde(transparent)]
pub struct FontStyle(u8);

impl FontStyle {
    pub const NORMAL: FontStyle = FontStyle(0);
    pub const BOLD: FontStyle = FontStyle(0x01);
    pub const ITALIC: FontStyle = FontStyle(0x02);
    pub const UNDERLINE: FontStyle = FontStyle(0x04);
    pub const STRIKETHROUGH: FontStyle = FontStyle(0x08);

    pub const fn bits(self) -> u8 { self.0 }
    pub const fn from_bits_truncate(bits: u8) -> Self { FontStyle(bits & 0x0F) }
    pub const fn contains(self, other: FontStyle) -> bool { self.0 & other.0 == other.0 }
    pub const fn is_normal(self) -> bool { self.0 == 0 }
}

impl BitOr for FontStyle {
    type Output = FontStyle;
    fn bitor(self, rhs: FontStyle) -> FontStyle { FontStyle(self.0 | rhs.0) }
}

impl BitOrAssign for FontStyle {
    fn bitor_assign(&mut self, rhs: FontStyle) { self.0 |= rhs.0; }
}

/// How coverage becomes color.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum RenderStyle {
    /// Coverage thresholded at 50%: opaque foreground or fully transparent.
    #[default]
    Solid,
    /// Coverage mixed between the shade and the foreground, opaque.
    Shaded,
    /// Foreground with coverage as alpha.
    Blended,
}

const ITALIC_SHEAR: f32 = 0.2;

/// Applies bold, italic, underline and strikethrough to `mask`.
pub fn apply_style(mask: &mut GlyphMask, style: FontStyle, metrics: &FontMetrics) {
    if style.contains(FontStyle::BOLD) && !mask.is_blank() { embolden(mask); }
    if style.contains(FontStyle::ITALIC) && !mask.is_blank() { shear(mask, metrics.ascent); }

    let thickness = (metrics.height() as f32 * 0.06).round().max(1.0) as i32;
    if style.contains(FontStyle::UNDERLINE) {
        let top = metrics.ascent + (metrics.height() as f32 * 0.1).round().max(1.0) as i32 - thickness / 2;
        decorate(mask, top, thickness);
    }
    if style.contains(FontStyle::STRIKETHROUGH) {
        let top = (metrics.ascent as f32 * 0.6).round() as i32 - thickness / 2;
        decorate(mask, top, thickness);
    }
}

// Smear one pixel to the right.
fn embolden(mask: &mut GlyphMask) {
    let width = mask.width + 1;
    let mut coverage = vec![0u8; (width * mask.height) as usize];
    for y in 0..mask.height {
        for x in 0..width {
            let left = if x > 0 { mask.at(x - 1, y) } else { 0 };
            coverage[(y * width + x) as usize] = mask.at(x, y).max(left);
        }
    }
    mask.width = width;
    mask.coverage = coverage;
    mask.advance += 1;
}

/// Slants rows right in proportion to their height above the baseline.
fn shear(mask: &mut GlyphMask, baseline: i32) {
    let shift = |y: u32| ((baseline - (mask.y_offset + y as i32)) as f32 * ITALIC_SHEAR).round() as i32;
    let shifts: Vec<i32> = (0..mask.height).map(shift).collect();
    let (lo, hi) = (shifts.iter().copied().min().unwrap_or(0), shifts.iter().copied().max().unwrap_or(0));
    let width = mask.width + (hi - lo) as u32;
    let mut coverage = vec![0u8; (width * mask.height) as usize];
    for (y, s) in shifts.iter().enumerate() {
        let y = y as u32;
        let dx = (s - lo) as u32;
        for x in 0..mask.width { coverage[(y * width + x + dx) as usize] = mask.at(x, y); }
    }
    mask.width = width;
    mask.coverage = coverage;
    mask.x_offset += lo;
}

/// Fills a bar `thickness` rows tall across the glyph's advance.
fn decorate(mask: &mut GlyphMask, top: i32, thickness: i32) {
    if mask.advance <= 0 { return; }
    mask.expand(0, top, mask.advance, top + thickness);
    for y in top..top + thickness {
        let row = (y - mask.y_offset) as u32;
        for x in 0..mask.advance {
            let col = (x - mask.x_offset) as u32;
            mask.coverage[(row * mask.width + col) as usize] = 255;
        }
    }
}
