//! PackBits run-length coding, as used by PSD channel data.
//!
//! A control byte `n` is followed by either `n + 1` literal bytes (`n` in
//! 0..=127) or one byte repeated `257 - n` times (`n` in 129..=255). 128 is a
//! no-op. Rows are encoded independently; the PSD layer stores each row's
//! compressed length out of band.

use crate::error::RleError;

const MAX_RUN: usize = 128;

/// Raised by [`RleEncoder::encode_row`] when the running total would pass the
/// threshold. The caller is expected to store the data uncompressed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleOverflow {
    pub total: usize,
    pub threshold: usize,
}

/// Encodes a whole buffer as one row.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 1);
    encode_into(data, &mut out);
    out
}

/// Appends the PackBits encoding of `data` to `out`.
pub fn encode_into(data: &[u8], out: &mut Vec<u8>) {
    let mut literal_start = 0;
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == b { run += 1; }
        if run < 3 {
            // Two equal bytes cost the same as literals and avoid breaking a literal run.
            i += run;
            continue;
        }
        flush_literals(&data[literal_start..i], out);
        let mut left = run;
        while left >= 2 {
            let n = left.min(MAX_RUN);
            out.push((1i32 - n as i32) as i8 as u8);
            out.push(b);
            left -= n;
        }
        i += run;
        // A single leftover byte starts the next literal run.
        literal_start = i - left;
    }
    flush_literals(&data[literal_start..], out);
}

fn flush_literals(mut lit: &[u8], out: &mut Vec<u8>) {
    while !lit.is_empty() {
        let n = lit.len().min(MAX_RUN);
        out.push((n - 1) as u8);
        out.extend_from_slice(&lit[..n]);
        lit = &lit[n..];
    }
}

/// Row-by-row encoder that tracks the cumulative compressed size.
#[derive(Debug, Default)]
pub struct RleEncoder {
    threshold: Option<usize>,
    total: usize,
    scratch: Vec<u8>,
}

impl RleEncoder {
    pub fn new() -> Self { Self::default() }

    /// Fails once the cumulative compressed size would exceed `threshold` bytes.
    pub fn with_threshold(threshold: usize) -> Self {
        RleEncoder { threshold: Some(threshold), ..Self::default() }
    }

    pub fn total(&self) -> usize { self.total }

    /// Encodes one row and returns its compressed bytes. On overflow nothing
    /// is counted and the encoder should be discarded.
    pub fn encode_row(&mut self, row: &[u8]) -> Result<&[u8], RleOverflow> {
        self.scratch.clear();
        encode_into(row, &mut self.scratch);
        let total = self.total + self.scratch.len();
        if let Some(threshold) = self.threshold {
            if total > threshold { return Err(RleOverflow { total, threshold }); }
        }
        self.total = total;
        Ok(&self.scratch)
    }
}

/// Decodes `src` into `dst`, which must be filled exactly. Returns the number
/// of source bytes consumed; bytes after the last needed run are left alone.
pub fn decode_into(src: &[u8], dst: &mut [u8]) -> Result<usize, RleError> {
    let mut si = 0;
    let mut di = 0;
    while di < dst.len() {
        let Some(&ctrl) = src.get(si) else {
            return Err(RleError::Truncated { consumed: si, missing: dst.len() - di });
        };
        let at = si;
        si += 1;
        match ctrl {
            128 => {}
            0..=127 => {
                let n = ctrl as usize + 1;
                if di + n > dst.len() { return Err(RleError::Overflow { offset: at, run: n }); }
                let lit = src.get(si..si + n).ok_or(RleError::Truncated { consumed: src.len(), missing: dst.len() - di })?;
                dst[di..di + n].copy_from_slice(lit);
                si += n;
                di += n;
            }
            _ => {
                let n = 257 - ctrl as usize;
                if di + n > dst.len() { return Err(RleError::Overflow { offset: at, run: n }); }
                let &b = src.get(si).ok_or(RleError::Truncated { consumed: src.len(), missing: dst.len() - di })?;
                dst[di..di + n].fill(b);
                si += 1;
                di += n;
            }
        }
    }
    Ok(si)
}

pub fn decode(src: &[u8], expected_len: usize) -> Result<Vec<u8>, RleError> {
    let mut out = vec![0u8; expected_len];
    decode_into(src, &mut out)?;
    Ok(out)
}
