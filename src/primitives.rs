//! Lines, rectangles, polygons and ellipses drawn straight onto a [`Surface`].
//!
//! Opaque colors are written as is; translucent ones are blended with
//! [`BlendMode::Normal`]. Everything is clipped to the surface.

use kurbo::{Ellipse, PathEl, Shape};

use crate::pixel::{blend, BlendMode};
use crate::surface::Surface;
use crate::types::{Color, Point, Rect};

const FLATTEN_TOLERANCE: f64 = 0.1;

fn plot(surface: &mut Surface, x: i32, y: i32, color: Color) {
    let color = if color.is_opaque() {
        color
    } else {
        match surface.get_pixel(x, y) {
            Ok(dst) => blend(dst, color, BlendMode::Normal),
            Err(_) => return,
        }
    };
    let _ = surface.set_pixel(x, y, color);
}

fn span(surface: &mut Surface, x0: i32, x1: i32, y: i32, color: Color) {
    if x1 > x0 { fill_rect(surface, Rect::new(x0, y, (x1 - x0) as u32, 1), color); }
}

/// Bresenham line, both endpoints included.
pub fn draw_line(surface: &mut Surface, from: Point, to: Point, color: Color) {
    let (dx, dy) = ((to.x - from.x).abs(), -(to.y - from.y).abs());
    let (sx, sy) = (if from.x < to.x { 1 } else { -1 }, if from.y < to.y { 1 } else { -1 });
    let (mut x, mut y, mut err) = (from.x, from.y, dx + dy);
    loop {
        plot(surface, x, y, color);
        if x == to.x && y == to.y { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x += sx; }
        if e2 <= dx { err += dx; y += sy; }
    }
}

/// One pixel wide outline along the inside of `rect`.
pub fn draw_rect(surface: &mut Surface, rect: Rect, color: Color) {
    if rect.is_empty() { return; }
    let (right, bottom) = (rect.right() - 1, rect.bottom() - 1);
    span(surface, rect.left(), rect.right(), rect.top(), color);
    if bottom > rect.top() { span(surface, rect.left(), rect.right(), bottom, color); }
    for y in rect.top() + 1..bottom {
        plot(surface, rect.left(), y, color);
        if right > rect.left() { plot(surface, right, y, color); }
    }
}

pub fn fill_rect(surface: &mut Surface, rect: Rect, color: Color) {
    if color.is_opaque() {
        surface.fill_rect(rect, color);
    } else {
        surface.blend_rect(rect, color, BlendMode::Normal);
    }
}

/// Closed outline through `points`.
pub fn draw_polygon(surface: &mut Surface, points: &[Point], color: Color) {
    for (i, &p) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        if points.len() > 1 { draw_line(surface, p, next, color); } else { plot(surface, p.x, p.y, color); }
    }
}

/// Fills the polygon with the even-odd rule, sampling at pixel centers.
pub fn fill_polygon(surface: &mut Surface, points: &[Point], color: Color) {
    let vertices: Vec<kurbo::Point> = points.iter().map(|p| kurbo::Point::new(p.x as f64, p.y as f64)).collect();
    fill_vertices(surface, &vertices, color);
}

fn fill_vertices(surface: &mut Surface, vertices: &[kurbo::Point], color: Color) {
    if vertices.len() < 3 { return; }
    let (min_y, max_y) = vertices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let top = (min_y.floor() as i32).max(0);
    let bottom = (max_y.ceil() as i32).min(surface.height() as i32);
    let mut crossings = Vec::new();
    for y in top..bottom {
        let yc = y as f64 + 0.5;
        crossings.clear();
        for (i, a) in vertices.iter().enumerate() {
            let b = vertices[(i + 1) % vertices.len()];
            if (a.y <= yc) != (b.y <= yc) {
                crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks_exact(2) {
            let x0 = (pair[0] - 0.5).ceil() as i32;
            let x1 = (pair[1] - 0.5).ceil() as i32;
            span(surface, x0, x1, y, color);
        }
    }
}

fn ellipse_points(rect: Rect, inset: f64) -> Vec<kurbo::Point> {
    let rx = (rect.width as f64 - inset) / 2.0;
    let ry = (rect.height as f64 - inset) / 2.0;
    let center = (rect.left() as f64 + rx, rect.top() as f64 + ry);
    let mut points = Vec::new();
    Ellipse::new(center, (rx, ry), 0.0).to_path(FLATTEN_TOLERANCE).flatten(FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => points.push(p),
        _ => {}
    });
    points
}

/// Outline of the ellipse inscribed in `rect`.
pub fn draw_ellipse(surface: &mut Surface, rect: Rect, color: Color) {
    if rect.is_empty() { return; }
    let mut points: Vec<Point> = ellipse_points(rect, 1.0).iter().map(|p| Point::new(p.x.round() as i32, p.y.round() as i32)).collect();
    points.dedup();
    if points.len() > 1 && points.first() == points.last() { points.pop(); }
    draw_polygon(surface, &points, color);
}

pub fn fill_ellipse(surface: &mut Surface, rect: Rect, color: Color) {
    if rect.is_empty() { return; }
    fill_vertices(surface, &ellipse_points(rect, 0.0), color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelFormat;

    fn canvas(w: u32, h: u32) -> Surface {
        let mut s = Surface::new(w, h, PixelFormat::rgba32()).unwrap();
        s.fill(Color::WHITE);
        s
    }

    fn count(s: &Surface, color: Color) -> usize {
        let mut n = 0;
        for y in 0..s.height() as i32 {
            for x in 0..s.width() as i32 { if s.get_pixel(x, y).unwrap() == color { n += 1; } }
        }
        n
    }

    const RED: Color = Color::rgb(255, 0, 0);

    #[test]
    fn test_lines() {
        let mut s = canvas(8, 8);
        draw_line(&mut s, Point::new(1, 1), Point::new(6, 1), RED);
        assert_eq!(count(&s, RED), 6);
        draw_line(&mut s, Point::new(0, 7), Point::new(7, 0), RED);
        assert_eq!(s.get_pixel(3, 4).unwrap(), RED);
        // Shares (6, 1) with the first line.
        assert_eq!(count(&s, RED), 13);
    }

    #[test]
    fn test_line_clipped() {
        let mut s = canvas(4, 4);
        draw_line(&mut s, Point::new(-10, 2), Point::new(10, 2), RED);
        assert_eq!(count(&s, RED), 4);
    }

    #[test]
    fn test_rect_outline_and_fill() {
        let mut s = canvas(6, 6);
        draw_rect(&mut s, Rect::new(1, 1, 4, 4), RED);
        assert_eq!(count(&s, RED), 12);
        assert_eq!(s.get_pixel(2, 2).unwrap(), Color::WHITE);
        fill_rect(&mut s, Rect::new(1, 1, 4, 4), RED);
        assert_eq!(count(&s, RED), 16);
    }

    #[test]
    fn test_translucent_blends() {
        let mut s = canvas(2, 2);
        let half = RED.with_alpha(128);
        fill_rect(&mut s, Rect::new(0, 0, 1, 1), half);
        draw_line(&mut s, Point::new(1, 1), Point::new(1, 1), half);
        let expected = blend(Color::WHITE, half, BlendMode::Normal);
        assert_eq!(s.get_pixel(0, 0).unwrap(), expected);
        assert_eq!(s.get_pixel(1, 1).unwrap(), expected);
        assert_eq!(s.get_pixel(1, 0).unwrap(), Color::WHITE);
    }

    #[test]
    fn test_fill_polygon() {
        let mut s = canvas(6, 6);
        fill_polygon(&mut s, &[Point::new(0, 0), Point::new(4, 0), Point::new(4, 4), Point::new(0, 4)], RED);
        assert_eq!(count(&s, RED), 16);
        assert_eq!(s.get_pixel(4, 4).unwrap(), Color::WHITE);

        let mut t = canvas(6, 6);
        fill_polygon(&mut t, &[Point::new(0, 0), Point::new(6, 0), Point::new(0, 6)], RED);
        assert_eq!(t.get_pixel(0, 0).unwrap(), RED);
        assert_eq!(t.get_pixel(5, 5).unwrap(), Color::WHITE);
        // Degenerate input draws nothing.
        fill_polygon(&mut t, &[Point::new(0, 5), Point::new(5, 5)], Color::BLACK);
        assert_eq!(count(&t, Color::BLACK), 0);
    }

    #[test]
    fn test_ellipses() {
        let mut s = canvas(10, 10);
        fill_ellipse(&mut s, Rect::new(0, 0, 10, 10), RED);
        assert_eq!(s.get_pixel(5, 5).unwrap(), RED);
        assert_eq!(s.get_pixel(0, 5).unwrap(), RED);
        assert_eq!(s.get_pixel(0, 0).unwrap(), Color::WHITE);
        assert_eq!(s.get_pixel(9, 9).unwrap(), Color::WHITE);

        let mut t = canvas(11, 11);
        draw_ellipse(&mut t, Rect::new(0, 0, 11, 11), RED);
        assert_eq!(t.get_pixel(10, 5).unwrap(), RED);
        assert_eq!(t.get_pixel(5, 5).unwrap(), Color::WHITE);
        assert_eq!(t.get_pixel(0, 0).unwrap(), Color::WHITE);
    }
}
