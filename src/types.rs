use serde::{Serialize, Deserialize};

/// An 8-bit-per-channel RGBA color, not premultiplied.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self { Color { r, g, b, a: 255 } }
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self { Color { r, g, b, a } }

    /// Packs the color as `0xAARRGGBB`.
    pub fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub fn from_argb(argb: u32) -> Self {
        Color { a: (argb >> 24) as u8, r: (argb >> 16) as u8, g: (argb >> 8) as u8, b: argb as u8 }
    }

    pub fn with_alpha(self, a: u8) -> Self { Color { a, ..self } }
    pub fn is_opaque(self) -> bool { self.a == 255 }
    pub fn is_transparent(self) -> bool { self.a == 0 }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };
    pub const fn new(x: i32, y: i32) -> Self { Point { x, y } }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self { Size { width, height } }
}

/// An integer rectangle. `width`/`height` of zero describe an empty area.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self { Rect { x, y, width, height } }

    /// Builds a rectangle from PSD-style edges. Inverted edges give an empty rect.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Rect { x: left, y: top, width: (right as i64 - left as i64).max(0) as u32, height: (bottom as i64 - top as i64).max(0) as u32 }
    }

    pub fn left(&self) -> i32 { self.x }
    pub fn top(&self) -> i32 { self.y }
    pub fn right(&self) -> i32 { self.x.saturating_add(self.width as i32) }
    pub fn bottom(&self) -> i32 { self.y.saturating_add(self.height as i32) }
    pub fn is_empty(&self) -> bool { self.width == 0 || self.height == 0 }
    pub fn area(&self) -> usize { self.width as usize * self.height as usize }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left() && p.x < self.right() && p.y >= self.top() && p.y < self.bottom()
    }

    /// True if `other` lies entirely inside `self`. Empty rects are inside
    /// when their origin is within the closed bounds.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left() >= self.left() && other.top() >= self.top() && other.right() <= self.right() && other.bottom() <= self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top { return None; }
        Some(Rect::from_edges(left, top, right, bottom))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum VerticalAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}
