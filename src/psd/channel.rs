//! Big-endian primitives and channel (plane) coding for the PSD codec.

use std::io::{Read, Seek, SeekFrom, Write};

use flate2::read::ZlibDecoder;
use log::{debug, warn};

use crate::error::PsdError;
use crate::rle::{self, RleEncoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Compression {
    Raw = 0,
    Rle = 1,
    Zip = 2,
    ZipPredicted = 3,
}

impl Compression {
    fn from_u16(value: u16) -> Result<Self, PsdError> {
        match value {
            0 => Ok(Compression::Raw),
            1 => Ok(Compression::Rle),
            2 => Ok(Compression::Zip),
            3 => Ok(Compression::ZipPredicted),
            other => Err(PsdError::UnsupportedCompression(other)),
        }
    }
}

pub(crate) trait ReadBe: Read {
    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], PsdError> { let mut b = [0u8; N]; self.read_exact(&mut b)?; Ok(b) }
    fn read_u8(&mut self) -> Result<u8, PsdError> { Ok(self.read_bytes::<1>()?[0]) }
    fn read_u16(&mut self) -> Result<u16, PsdError> { Ok(u16::from_be_bytes(self.read_bytes()?)) }
    fn read_i16(&mut self) -> Result<i16, PsdError> { Ok(i16::from_be_bytes(self.read_bytes()?)) }
    fn read_u32(&mut self) -> Result<u32, PsdError> { Ok(u32::from_be_bytes(self.read_bytes()?)) }
    fn read_i32(&mut self) -> Result<i32, PsdError> { Ok(i32::from_be_bytes(self.read_bytes()?)) }
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, PsdError> { let mut v = vec![0u8; len]; self.read_exact(&mut v)?; Ok(v) }
}

impl<R: Read + ?Sized> ReadBe for R {}

pub(crate) trait WriteBe: Write {
    fn write_u8(&mut self, v: u8) -> Result<(), PsdError> { Ok(self.write_all(&[v])?) }
    fn write_u16(&mut self, v: u16) -> Result<(), PsdError> { Ok(self.write_all(&v.to_be_bytes())?) }
    fn write_i16(&mut self, v: i16) -> Result<(), PsdError> { Ok(self.write_all(&v.to_be_bytes())?) }
    fn write_u32(&mut self, v: u32) -> Result<(), PsdError> { Ok(self.write_all(&v.to_be_bytes())?) }
    fn write_i32(&mut self, v: i32) -> Result<(), PsdError> { Ok(self.write_all(&v.to_be_bytes())?) }
}

impl<W: Write + ?Sized> WriteBe for W {}

pub(crate) fn skip<S: Seek + ?Sized>(s: &mut S, len: u64) -> Result<(), PsdError> {
    if len > 0 { s.seek(SeekFrom::Current(len as i64))?; }
    Ok(())
}

/// Overwrites a 4-byte length field at `pos` and returns to the current position.
pub(crate) fn patch_u32<W: Write + Seek + ?Sized>(w: &mut W, pos: u64, value: u32) -> Result<(), PsdError> {
    let end = w.stream_position()?;
    w.seek(SeekFrom::Start(pos))?;
    w.write_u32(value)?;
    w.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// Reads one layer channel: a compression flag followed by `width * height`
/// samples. `length` is the recorded channel length including the flag.
pub(crate) fn read_channel<R: Read + ?Sized>(r: &mut R, width: usize, height: usize, length: u64) -> Result<Vec<u8>, PsdError> {
    let compression = Compression::from_u16(r.read_u16()?)?;
    let mut plane = vec![0u8; width * height];
    match compression {
        Compression::Raw => r.read_exact(&mut plane)?,
        Compression::Rle => {
            let lens = read_row_lengths(r, height)?;
            decode_rows(r, &lens, width, &mut plane)?;
        }
        Compression::Zip | Compression::ZipPredicted => {
            let n = plane.len();
            let mut out = Vec::with_capacity(n);
            let packed = (&mut *r).take(length.saturating_sub(2));
            ZlibDecoder::new(packed).take(n as u64).read_to_end(&mut out).map_err(|e| PsdError::Zip(e.to_string()))?;
            if out.len() < n {
                return Err(PsdError::Zip(format!("inflated {} bytes, expected {}", out.len(), n)));
            }
            plane.copy_from_slice(&out);
            if compression == Compression::ZipPredicted && width > 0 {
                for row in plane.chunks_mut(width) {
                    for x in 1..row.len() { row[x] = row[x].wrapping_add(row[x - 1]); }
                }
            }
        }
    }
    Ok(plane)
}

fn read_row_lengths<R: Read + ?Sized>(r: &mut R, rows: usize) -> Result<Vec<u16>, PsdError> {
    (0..rows).map(|_| r.read_u16()).collect()
}

fn decode_rows<R: Read + ?Sized>(r: &mut R, lens: &[u16], width: usize, out: &mut [u8]) -> Result<(), PsdError> {
    let mut packed = Vec::new();
    for (row, &len) in out.chunks_mut(width.max(1)).zip(lens) {
        packed.resize(len as usize, 0);
        r.read_exact(&mut packed)?;
        let used = rle::decode_into(&packed, row)?;
        if used < packed.len() { debug!("row carries {} padding bytes", packed.len() - used); }
    }
    Ok(())
}

/// Reads the composite image data: one compression flag shared by all
/// `channels` planes, then the planes. Only the first `keep` planes are returned.
pub(crate) fn read_planes<R: Read + Seek + ?Sized>(r: &mut R, width: usize, height: usize, channels: usize, keep: usize) -> Result<Vec<Vec<u8>>, PsdError> {
    let compression = Compression::from_u16(r.read_u16()?)?;
    let plane_len = width * height;
    let mut planes = Vec::with_capacity(keep);
    match compression {
        Compression::Raw => {
            for _ in 0..keep { planes.push(r.read_vec(plane_len)?); }
        }
        Compression::Rle => {
            let lens = read_row_lengths(r, height * channels)?;
            for c in 0..keep {
                let mut plane = vec![0u8; plane_len];
                decode_rows(r, &lens[c * height..(c + 1) * height], width, &mut plane)?;
                planes.push(plane);
            }
        }
        other => return Err(PsdError::UnsupportedCompression(other as u16)),
    }
    if keep < channels { debug!("ignoring {} extra composite channels", channels - keep); }
    Ok(planes)
}

/// Writes one layer channel and returns its length including the compression
/// flag.
///
/// RLE is tried first when `compress` is set. The encoder's threshold is the
/// raw size minus the row-length table, so an abandoned attempt never extends
/// past the raw rewrite that replaces it.
pub(crate) fn write_channel<W: Write + Seek + ?Sized>(w: &mut W, plane: &[u8], width: usize, height: usize, compress: bool) -> Result<u32, PsdError> {
    let start = w.stream_position()?;
    if compress && try_rle(w, &[plane], width, height)? {
        return Ok((w.stream_position()? - start) as u32);
    }
    w.seek(SeekFrom::Start(start))?;
    w.write_u16(Compression::Raw as u16)?;
    w.write_all(plane)?;
    Ok(2 + plane.len() as u32)
}

/// Writes the composite planes with a single compression flag.
pub(crate) fn write_planes<W: Write + Seek + ?Sized>(w: &mut W, planes: &[Vec<u8>], width: usize, height: usize, compress: bool) -> Result<(), PsdError> {
    let start = w.stream_position()?;
    let refs: Vec<&[u8]> = planes.iter().map(|p| p.as_slice()).collect();
    if compress && try_rle(w, &refs, width, height)? { return Ok(()); }
    w.seek(SeekFrom::Start(start))?;
    w.write_u16(Compression::Raw as u16)?;
    for plane in planes { w.write_all(plane)?; }
    Ok(())
}

/// Speculatively writes `planes` RLE-compressed. Returns false, leaving the
/// stream somewhere after the start, if compression would not pay off.
fn try_rle<W: Write + Seek + ?Sized>(w: &mut W, planes: &[&[u8]], width: usize, height: usize) -> Result<bool, PsdError> {
    let rows = height * planes.len();
    let raw_size = width * rows;
    let table_size = 2 * rows;
    if width == 0 || raw_size <= table_size { return Ok(false); }
    w.write_u16(Compression::Rle as u16)?;
    let table_pos = w.stream_position()?;
    w.write_all(&vec![0u8; table_size])?;
    let mut encoder = RleEncoder::with_threshold(raw_size - table_size);
    let mut lens = Vec::with_capacity(rows);
    for plane in planes {
        for row in plane.chunks(width) {
            let packed = match encoder.encode_row(row) {
                Ok(packed) => packed,
                Err(overflow) => {
                    warn!("RLE would take {} of {} bytes, storing raw", overflow.total, overflow.threshold);
                    return Ok(false);
                }
            };
            let Ok(len) = u16::try_from(packed.len()) else { return Ok(false) };
            lens.push(len);
            w.write_all(packed)?;
        }
    }
    let end = w.stream_position()?;
    w.seek(SeekFrom::Start(table_pos))?;
    for len in lens { w.write_u16(len)?; }
    w.seek(SeekFrom::Start(end))?;
    Ok(true)
}
