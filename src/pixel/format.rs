use crate::error::GfxError;
use crate::types::Color;

/// Layout of a raw pixel value: bit depth and per-channel masks, or a palette.
///
/// Raw values are stored little-endian in `bytes_per_pixel` bytes, so a
/// 32-bit format with `r_mask = 0x0000_00FF` keeps red in the first byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    bits_per_pixel: u8,
    bytes_per_pixel: u8,
    masks: [u32; 4],
    shifts: [u8; 4],
    losses: [u8; 4],
    palette: Option<Vec<Color>>,
}

const R: usize = 0;
const G: usize = 1;
const B: usize = 2;
const A: usize = 3;

impl PixelFormat {
    pub fn from_masks(bits_per_pixel: u8, r_mask: u32, g_mask: u32, b_mask: u32, a_mask: u32) -> Result<Self, GfxError> {
        let bytes_per_pixel = match bits_per_pixel { 15 | 16 => 2, 24 => 3, 32 => 4, other => return Err(GfxError::UnsupportedDepth(other)) };
        let masks = [r_mask, g_mask, b_mask, a_mask];
        let limit = if bytes_per_pixel == 4 { u32::MAX } else { (1u32 << (bytes_per_pixel as u32 * 8)) - 1 };
        for (i, &m) in masks.iter().enumerate() {
            if m & !limit != 0 { return Err(GfxError::InvalidArgument(format!("mask {:#x} does not fit {} bits", m, bits_per_pixel))); }
            if m.count_ones() > 8 { return Err(GfxError::InvalidArgument(format!("mask {:#x} is wider than 8 bits", m))); }
            if masks.iter().enumerate().any(|(j, &o)| j != i && o & m != 0) {
                return Err(GfxError::InvalidArgument(format!("mask {:#x} overlaps another channel", m)));
            }
        }
        let mut shifts = [0u8; 4];
        let mut losses = [8u8; 4];
        for i in 0..4 {
            if masks[i] != 0 {
                shifts[i] = masks[i].trailing_zeros() as u8;
                losses[i] = 8u32.saturating_sub(masks[i].count_ones()) as u8;
            }
        }
        Ok(PixelFormat { bits_per_pixel, bytes_per_pixel, masks, shifts, losses, palette: None })
    }

    /// 8-bit indexed format. The palette is padded with black to 256 entries.
    pub fn indexed(mut palette: Vec<Color>) -> Result<Self, GfxError> {
        if palette.is_empty() || palette.len() > 256 {
            return Err(GfxError::InvalidArgument(format!("palette needs 1..=256 colors, got {}", palette.len())));
        }
        palette.resize(256, Color::BLACK);
        Ok(PixelFormat { bits_per_pixel: 8, bytes_per_pixel: 1, masks: [0; 4], shifts: [0; 4], losses: [8; 4], palette: Some(palette) })
    }

    /// Bytes in memory are R, G, B, A.
    pub fn rgba32() -> Self { Self::from_masks(32, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000).expect("static masks") }
    /// `0xAARRGGBB` values.
    pub fn argb32() -> Self { Self::from_masks(32, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000).expect("static masks") }
    /// `0x00RRGGBB` values, no alpha.
    pub fn xrgb32() -> Self { Self::from_masks(32, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0).expect("static masks") }
    /// Bytes in memory are R, G, B.
    pub fn rgb24() -> Self { Self::from_masks(24, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0).expect("static masks") }
    pub fn rgb565() -> Self { Self::from_masks(16, 0xF800, 0x07E0, 0x001F, 0).expect("static masks") }
    pub fn argb1555() -> Self { Self::from_masks(16, 0x7C00, 0x03E0, 0x001F, 0x8000).expect("static masks") }

    pub fn bits_per_pixel(&self) -> u8 { self.bits_per_pixel }
    pub fn bytes_per_pixel(&self) -> usize { self.bytes_per_pixel as usize }
    pub fn has_alpha(&self) -> bool { self.masks[A] != 0 }
    pub fn is_indexed(&self) -> bool { self.palette.is_some() }
    pub fn palette(&self) -> Option<&[Color]> { self.palette.as_deref() }
    pub fn masks(&self) -> [u32; 4] { self.masks }
    pub fn losses(&self) -> [u8; 4] { self.losses }

    /// Converts a color to the raw value for this format. Indexed formats pick
    /// the nearest palette entry.
    pub fn map_rgba(&self, c: Color) -> u32 {
        if let Some(palette) = &self.palette { return nearest_index(palette, c) as u32; }
        let channels = [c.r, c.g, c.b, c.a];
        let mut raw = 0u32;
        for i in 0..4 {
            if self.masks[i] == 0 { continue; }
            raw |= (((channels[i] as u32) >> self.losses[i]) << self.shifts[i]) & self.masks[i];
        }
        raw
    }

    pub fn map_rgb(&self, r: u8, g: u8, b: u8) -> u32 { self.map_rgba(Color::rgb(r, g, b)) }

    /// Converts a raw value back to a color. Lost low bits are filled by
    /// replicating the retained high bits; formats without alpha report 255.
    pub fn get_rgba(&self, raw: u32) -> Color {
        if let Some(palette) = &self.palette { return palette[(raw & 0xFF) as usize]; }
        let mut out = [0u8; 4];
        for i in 0..4 {
            if self.masks[i] == 0 { out[i] = if i == A { 255 } else { 0 }; continue; }
            let bits = 8 - self.losses[i] as u32;
            let v = (raw & self.masks[i]) >> self.shifts[i];
            out[i] = expand_bits(v, bits);
        }
        Color::rgba(out[R], out[G], out[B], out[A])
    }
}

fn expand_bits(v: u32, bits: u32) -> u8 {
    if bits >= 8 { return (v >> (bits - 8)) as u8; }
    if bits == 0 { return 0; }
    let mut acc = v << (8 - bits);
    let mut filled = bits;
    while filled < 8 {
        acc |= acc >> filled;
        filled *= 2;
    }
    acc as u8
}

fn nearest_index(palette: &[Color], c: Color) -> usize {
    let mut best = 0;
    let mut best_dist = u32::MAX;
    for (i, p) in palette.iter().enumerate() {
        let d = |a: u8, b: u8| { let x = a as i32 - b as i32; (x * x) as u32 };
        let dist = d(p.r, c.r) + d(p.g, c.g) + d(p.b, c.b) + d(p.a, c.a);
        if dist < best_dist {
            best = i;
            best_dist = dist;
            if dist == 0 { break; }
        }
    }
    best
}
