use log::trace;

use super::TextFont;
use crate::error::GfxError;
use crate::pixel::BlendMode;
use crate::surface::Surface;
use crate::types::{Point, Rect};

/// A fixed-cell font cut from a glyph sheet.
///
/// Cells are laid out left to right, top to bottom, starting with
/// `first_char`. Characters without a cell advance like any other but draw
/// nothing. The sheet's color key and alpha apply when drawing.
#[derive(Debug, Clone)]
pub struct BitmapFont {
    sheet: Surface,
    cell_width: u32,
    cell_height: u32,
    first_char: u32,
    columns: u32,
    glyph_count: u32,
    spacing: i32,
    line_spacing: u32,
}

impl BitmapFont {
    pub fn new(sheet: Surface, cell_width: u32, cell_height: u32, first_char: char) -> Result<Self, GfxError> {
        if cell_width == 0 || cell_height == 0 || cell_width > sheet.width() || cell_height > sheet.height() {
            return Err(GfxError::InvalidDimensions { width: cell_width, height: cell_height });
        }
        let columns = sheet.width() / cell_width;
        let glyph_count = columns * (sheet.height() / cell_height);
        Ok(BitmapFont { sheet, cell_width, cell_height, first_char: first_char as u32, columns, glyph_count, spacing: 0, line_spacing: 0 })
    }

    pub fn cell_size(&self) -> (u32, u32) { (self.cell_width, self.cell_height) }
    pub fn glyph_count(&self) -> u32 { self.glyph_count }

    /// Extra pixels added to every advance. May be negative.
    pub fn set_spacing(&mut self, spacing: i32) { self.spacing = spacing; }
    /// Extra pixels between lines.
    pub fn set_line_spacing(&mut self, line_spacing: u32) { self.line_spacing = line_spacing; }

    pub fn advance(&self) -> i32 { self.cell_width as i32 + self.spacing }

    /// The sheet rectangle holding `ch`, if the sheet has one.
    pub fn cell_for(&self, ch: char) -> Option<Rect> {
        let index = (ch as u32).checked_sub(self.first_char).filter(|&i| i < self.glyph_count)?;
        let (col, row) = (index % self.columns, index / self.columns);
        Some(Rect::new((col * self.cell_width) as i32, (row * self.cell_height) as i32, self.cell_width, self.cell_height))
    }
}

impl TextFont for BitmapFont {
    fn line_height(&self) -> u32 { self.cell_height }
    fn line_skip(&self) -> u32 { self.cell_height + self.line_spacing }

    fn measure(&mut self, text: &str) -> Result<u32, GfxError> {
        let count = text.chars().filter(|&c| c != '\n').count() as i64;
        Ok((count * self.advance() as i64).max(0) as u32)
    }

    fn render(&mut self, text: &str, target: &mut Surface, at: Point) -> Result<u32, GfxError> {
        let mut pen = 0i32;
        for ch in text.chars().filter(|&c| c != '\n') {
            match self.cell_for(ch) {
                Some(cell) => { target.blend_from(&self.sheet, Some(cell), Point::new(at.x + pen, at.y), BlendMode::Normal); }
                None => trace!("no cell for {:?}", ch),
            }
            pen += self.advance();
        }
        Ok(pen.max(0) as u32)
    }
}
