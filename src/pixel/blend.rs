use serde::{Serialize, Deserialize};
use crate::types::Color;

/// Compositing modes. All arithmetic is integer and saturates at the byte
/// boundary. Except for `Normal` and `Replace`, the destination alpha is kept
/// and the source alpha controls how strongly the mode is applied.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BlendMode {
    /// Source over destination (non-premultiplied alpha-over).
    #[default]
    Normal,
    /// `dst + src * a`.
    Add,
    /// `dst - src * a`.
    Subtract,
    /// `dst * src / 255`, mixed in by the source alpha.
    Multiply,
    /// `255 - (255 - dst) * (255 - src) / 255`, mixed in by the source alpha.
    Screen,
    Lighten,
    Darken,
    /// Copy the source color including its alpha.
    Replace,
}

/// `x / 255`, rounded, for `x <= 255 * 255`.
#[inline]
pub fn div255(x: u32) -> u32 {
    let x = x + 128;
    (x + (x >> 8)) >> 8
}

#[inline]
fn lerp(d: u8, s: u32, a: u32) -> u8 {
    let d = d as u32;
    if s >= d { (d + div255((s - d) * a)) as u8 } else { (d - div255((d - s) * a)) as u8 }
}

/// Scales a per-pixel alpha by a whole-surface alpha.
#[inline]
pub fn scale_alpha(alpha: u8, surface_alpha: u8) -> u8 { div255(alpha as u32 * surface_alpha as u32) as u8 }

pub fn blend(dst: Color, src: Color, mode: BlendMode) -> Color {
    let sa = src.a as u32;
    match mode {
        BlendMode::Replace => src,
        BlendMode::Normal => {
            if sa == 0 { return dst; }
            if sa == 255 { return src; }
            let da = dst.a as u32;
            let dst_w = da * (255 - sa);
            let out_a = sa * 255 + dst_w;
            let mix = |s: u8, d: u8| ((s as u32 * sa * 255 + d as u32 * dst_w + out_a / 2) / out_a) as u8;
            Color::rgba(mix(src.r, dst.r), mix(src.g, dst.g), mix(src.b, dst.b), div255(out_a) as u8)
        }
        BlendMode::Add => {
            let add = |d: u8, s: u8| (d as u32 + div255(s as u32 * sa)).min(255) as u8;
            Color::rgba(add(dst.r, src.r), add(dst.g, src.g), add(dst.b, src.b), dst.a)
        }
        BlendMode::Subtract => {
            let sub = |d: u8, s: u8| (d as u32).saturating_sub(div255(s as u32 * sa)) as u8;
            Color::rgba(sub(dst.r, src.r), sub(dst.g, src.g), sub(dst.b, src.b), dst.a)
        }
        BlendMode::Multiply => {
            let f = |d: u8, s: u8| lerp(d, div255(d as u32 * s as u32), sa);
            Color::rgba(f(dst.r, src.r), f(dst.g, src.g), f(dst.b, src.b), dst.a)
        }
        BlendMode::Screen => {
            let f = |d: u8, s: u8| lerp(d, 255 - div255((255 - d as u32) * (255 - s as u32)), sa);
            Color::rgba(f(dst.r, src.r), f(dst.g, src.g), f(dst.b, src.b), dst.a)
        }
        BlendMode::Lighten => {
            let f = |d: u8, s: u8| lerp(d, d.max(s) as u32, sa);
            Color::rgba(f(dst.r, src.r), f(dst.g, src.g), f(dst.b, src.b), dst.a)
        }
        BlendMode::Darken => {
            let f = |d: u8, s: u8| lerp(d, d.min(s) as u32, sa);
            Color::rgba(f(dst.r, src.r), f(dst.g, src.g), f(dst.b, src.b), dst.a)
        }
    }
}
