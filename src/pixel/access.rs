//! Bounds-checked raw pixel addressing.
//!
//! Raw values are little-endian, `bpp` bytes wide (1 to 4). Every other module
//! reads and writes pixel bytes through these helpers.

#[inline]
fn offset(len: usize, pitch: usize, x: usize, y: usize, bpp: usize) -> Option<usize> {
    if bpp == 0 || bpp > 4 || x.checked_mul(bpp)?.checked_add(bpp)? > pitch { return None; }
    let start = y.checked_mul(pitch)?.checked_add(x * bpp)?;
    if start + bpp > len { return None; }
    Some(start)
}

/// Reads the raw value of pixel `(x, y)`, or `None` if it is outside the buffer.
pub fn get_pixel_at(buf: &[u8], pitch: usize, x: usize, y: usize, bpp: usize) -> Option<u32> {
    let start = offset(buf.len(), pitch, x, y, bpp)?;
    let mut v = 0u32;
    for (i, &b) in buf[start..start + bpp].iter().enumerate() { v |= (b as u32) << (8 * i); }
    Some(v)
}

/// Writes the raw value of pixel `(x, y)`. Returns false if it is outside the buffer.
pub fn put_pixel_at(buf: &mut [u8], pitch: usize, x: usize, y: usize, bpp: usize, value: u32) -> bool {
    let Some(start) = offset(buf.len(), pitch, x, y, bpp) else { return false };
    for (i, b) in buf[start..start + bpp].iter_mut().enumerate() { *b = (value >> (8 * i)) as u8; }
    true
}

/// Copies channel `channel` out of an interleaved buffer with `channels` bytes per pixel.
pub fn extract_plane(interleaved: &[u8], channels: usize, channel: usize) -> Vec<u8> {
    if channels == 0 || channel >= channels { return Vec::new(); }
    interleaved.iter().skip(channel).step_by(channels).copied().collect()
}

/// Writes `plane` into channel `channel` of an interleaved buffer. Extra plane
/// bytes beyond the buffer are ignored.
pub fn interleave_plane(interleaved: &mut [u8], channels: usize, channel: usize, plane: &[u8]) {
    if channels == 0 || channel >= channels { return; }
    for (dst, &src) in interleaved.iter_mut().skip(channel).step_by(channels).zip(plane) { *dst = src; }
}
