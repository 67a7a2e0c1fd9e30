use crate::error::GfxError;
use crate::font::TextFont;
use crate::types::{Point, Rect};

/// Splits `text` into lines that fit `rect` and returns each line's length
/// in characters.
///
/// Lines break after any character in `breakers`; a word too long for a row
/// is split between characters. `start` is relative to the rectangle origin:
/// its `x` narrows only the first row and its `y` moves the first line down.
/// `'\n'` always ends a line and counts towards that line's length. Layout
/// stops at the first line that no longer fits vertically, or when not even
/// one character fits a row.
pub fn word_wrap<F: TextFont + ?Sized>(font: &mut F, text: &str, rect: Rect, start: Point, breakers: &str) -> Result<Vec<usize>, GfxError> {
    let chars: Vec<char> = text.chars().collect();
    let line_height = font.line_height();
    let line_skip = font.line_skip();
    let start_x = start.x.max(0) as u32;
    let mut y = start.y.max(0) as u32;
    let mut lines = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if y.saturating_add(line_height) > rect.height { break; }
        let narrowed = lines.is_empty() && start_x > 0;
        let row_width = if narrowed { rect.width.saturating_sub(start_x) } else { rect.width };
        let hard_end = chars[pos..].iter().position(|&c| c == '\n').map_or(chars.len(), |i| pos + i);

        let len = match fit_words(font, &chars, pos, hard_end, row_width, breakers)? {
            Some(end) if end == hard_end && hard_end < chars.len() => end - pos + 1,
            Some(end) => end - pos,
            None if narrowed => 0,
            None => match fit_chars(font, &chars[pos..hard_end], row_width)? {
                0 => break,
                n => n,
            },
        };
        lines.push(len);
        pos += len;
        y = y.saturating_add(line_skip);
    }
    // An empty first row with nothing after it carries no text.
    if lines.last() == Some(&0) { lines.pop(); }
    Ok(lines)
}

/// Furthest break boundary in `pos..hard_end` whose text fits `width`.
fn fit_words<F: TextFont + ?Sized>(font: &mut F, chars: &[char], pos: usize, hard_end: usize, width: u32, breakers: &str) -> Result<Option<usize>, GfxError> {
    let mut best = None;
    let mut cursor = pos;
    loop {
        let end = chars[cursor..hard_end].iter().position(|c| breakers.contains(*c)).map_or(hard_end, |i| cursor + i + 1);
        if measure_trimmed(font, &chars[pos..end])? > width { break; }
        best = Some(end);
        if end >= hard_end { break; }
        cursor = end;
    }
    Ok(best)
}

/// Number of leading characters of `chars` that fit `width`.
fn fit_chars<F: TextFont + ?Sized>(font: &mut F, chars: &[char], width: u32) -> Result<usize, GfxError> {
    let mut used = 0u32;
    let mut buf = [0u8; 4];
    for (i, c) in chars.iter().enumerate() {
        used = used.saturating_add(font.measure(c.encode_utf8(&mut buf))?);
        if used > width { return Ok(i); }
    }
    Ok(chars.len())
}

fn measure_trimmed<F: TextFont + ?Sized>(font: &mut F, chars: &[char]) -> Result<u32, GfxError> {
    let trimmed: String = chars.iter().collect::<String>().trim_end().to_string();
    font.measure(&trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Surface;

    /// Every character is 10 pixels wide and 12 tall, lines are 14 apart.
    struct Fixed;

    impl TextFont for Fixed {
        fn line_height(&self) -> u32 { 12 }
        fn line_skip(&self) -> u32 { 14 }
        fn measure(&mut self, text: &str) -> Result<u32, GfxError> {
            Ok(text.chars().filter(|&c| c != '\n').count() as u32 * 10)
        }
        fn render(&mut self, text: &str, _: &mut Surface, _: Point) -> Result<u32, GfxError> { self.measure(text) }
    }

    fn wrap(text: &str, width: u32, height: u32, start: Point) -> Vec<usize> {
        word_wrap(&mut Fixed, text, Rect::new(0, 0, width, height), start, " -").unwrap()
    }

    #[test]
    fn test_breaks_after_words() {
        assert_eq!(wrap("the quick brown fox", 100, 100, Point::ORIGIN), vec![10, 9]);
        assert_eq!(wrap("well-known", 60, 100, Point::ORIGIN), vec![5, 5]);
    }

    #[test]
    fn test_trailing_space_not_measured() {
        // "abc " is 40 wide with the space but fits 30 without it.
        assert_eq!(wrap("abc def", 30, 100, Point::ORIGIN), vec![4, 3]);
    }

    #[test]
    fn test_long_word_split_by_chars() {
        assert_eq!(wrap("AAAAAAAAAA", 35, 200, Point::ORIGIN), vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_narrow_rect_gives_nothing() {
        assert!(wrap("AAAAAAAAAA", 5, 200, Point::ORIGIN).is_empty());
        assert!(wrap("", 100, 100, Point::ORIGIN).is_empty());
    }

    #[test]
    fn test_height_limit() {
        // Lines at y = 0, 14, 28; the third ends at 40.
        assert_eq!(wrap("aa bb cc dd", 30, 39, Point::ORIGIN), vec![3, 3]);
        assert_eq!(wrap("aa bb cc dd", 30, 40, Point::ORIGIN), vec![3, 3, 3]);
        assert!(wrap("aa", 30, 11, Point::ORIGIN).is_empty());
    }

    #[test]
    fn test_hard_breaks() {
        assert_eq!(wrap("ab\ncd", 100, 100, Point::ORIGIN), vec![3, 2]);
        assert_eq!(wrap("\n\nx", 100, 100, Point::ORIGIN), vec![1, 1, 1]);
        assert_eq!(wrap("ab \ncd", 100, 100, Point::ORIGIN), vec![4, 2]);
    }

    #[test]
    fn test_start_offset_narrows_first_row() {
        assert_eq!(wrap("aa bb", 50, 100, Point::new(20, 0)), vec![3, 2]);
        // Nothing fits beside the offset: empty first line, then a full row.
        assert_eq!(wrap("abcd", 50, 100, Point::new(20, 0)), vec![0, 4]);
        // Room for one line only: the empty first row is dropped.
        assert!(wrap("abcd", 50, 25, Point::new(20, 0)).is_empty());
        // The start y counts against the height.
        assert!(wrap("abcd", 50, 20, Point::new(0, 10)).is_empty());
    }
}
