use log::trace;

use super::wrap::word_wrap;
use crate::error::GfxError;
use crate::font::TextFont;
use crate::surface::Surface;
use crate::types::{HorizontalAlign, Point, Rect, VerticalAlign};

/// One wrapped line, positioned in target coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaidOutLine {
    /// The line's characters without its trailing newline.
    pub text: String,
    pub origin: Point,
    pub width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextAlign {
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
}

impl TextAlign {
    pub const TOP_LEFT: TextAlign = TextAlign { horizontal: HorizontalAlign::Left, vertical: VerticalAlign::Top };

    pub fn new(horizontal: HorizontalAlign, vertical: VerticalAlign) -> Self { TextAlign { horizontal, vertical } }

    fn is_top_left(&self) -> bool { *self == Self::TOP_LEFT }
}

/// Wraps `text` into `rect` and positions each line.
///
/// `start` only applies to top-left aligned text, where it offsets the first
/// line (see [`word_wrap`]). Other alignments wrap from the rectangle origin.
pub fn layout_lines<F: TextFont + ?Sized>(font: &mut F, text: &str, rect: Rect, start: Point, align: TextAlign, breakers: &str) -> Result<Vec<LaidOutLine>, GfxError> {
    let start = if align.is_top_left() { start } else { Point::ORIGIN };
    let lengths = word_wrap(font, text, rect, start, breakers)?;
    let block = lengths.len() as i32 * font.line_skip() as i32;
    let top = match align.vertical {
        VerticalAlign::Top => rect.top() + start.y,
        VerticalAlign::Middle => rect.top() + (rect.height as i32 - block) / 2,
        VerticalAlign::Bottom => rect.bottom() - block,
    };

    let mut chars = text.chars();
    let mut lines = Vec::with_capacity(lengths.len());
    for (i, &len) in lengths.iter().enumerate() {
        let line: String = chars.by_ref().take(len).filter(|&c| c != '\n').collect();
        let width = font.measure(line.trim_end())?;
        let x = match align.horizontal {
            HorizontalAlign::Left if i == 0 => rect.left() + start.x,
            HorizontalAlign::Left => rect.left(),
            HorizontalAlign::Center => rect.left() + (rect.width as i32 - width as i32) / 2,
            HorizontalAlign::Right => rect.right() - width as i32,
        };
        let origin = Point::new(x, top + i as i32 * font.line_skip() as i32);
        lines.push(LaidOutLine { text: line, origin, width });
    }
    Ok(lines)
}

/// Lays out and draws `text` onto `target`. Returns the lines drawn.
pub fn render_text<F: TextFont + ?Sized>(font: &mut F, target: &mut Surface, text: &str, rect: Rect, start: Point, align: TextAlign, breakers: &str) -> Result<Vec<LaidOutLine>, GfxError> {
    let lines = layout_lines(font, text, rect, start, align, breakers)?;
    for line in &lines {
        trace!("drawing {:?} at {:?}", line.text, line.origin);
        font.render(&line.text, target, line.origin)?;
    }
    Ok(lines)
}
