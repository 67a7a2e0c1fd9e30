//! Error types shared across the crate.

use std::io;

/// Broad classification of a failure, used by callers to decide whether a
/// session can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsupported data. Not recoverable for the current stream.
    Format,
    /// A call made in the wrong protocol state. Nothing was read or written.
    InvalidOperation,
    /// Arguments rejected before any I/O took place.
    Validation,
    /// The underlying stream failed.
    Io,
}

/// Errors raised while decoding PackBits data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RleError {
    #[error("compressed data ended after {consumed} bytes with {missing} output bytes missing")]
    Truncated { consumed: usize, missing: usize },
    #[error("run of {run} bytes at source offset {offset} overflows the output row")]
    Overflow { offset: usize, run: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum PsdError {
    #[error("invalid signature {0:?}, expected \"8BPS\"")]
    InvalidSignature([u8; 4]),
    #[error("unsupported PSD version {0}")]
    UnsupportedVersion(u16),
    #[error("unsupported channel depth {0}, only 8 bits are supported")]
    UnsupportedDepth(u16),
    #[error("unsupported color mode {0}, only RGB is supported")]
    UnsupportedColorMode(u16),
    #[error("unsupported channel count {0}")]
    UnsupportedChannelCount(u16),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid layer data: {0}")]
    InvalidLayerData(String),
    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),
    #[error("corrupt RLE data: {0}")]
    Rle(#[from] RleError),
    #[error("corrupt ZIP data: {0}")]
    Zip(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("invalid layer {index}: {reason}")]
    InvalidLayer { index: usize, reason: String },
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("output stream is not seekable")]
    NotSeekable,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl PsdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PsdError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            PsdError::InvalidLayer { .. } | PsdError::InvalidImage(_) | PsdError::NotSeekable => ErrorKind::Validation,
            PsdError::Io(e) if e.kind() != io::ErrorKind::UnexpectedEof => ErrorKind::Io,
            _ => ErrorKind::Format,
        }
    }
}

/// Errors raised by surfaces, fonts and drawing.
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("unsupported bit depth {0}")]
    UnsupportedDepth(u8),
    #[error("invalid pitch {pitch} for width {width} at {bytes_per_pixel} bytes per pixel")]
    InvalidPitch { pitch: usize, width: u32, bytes_per_pixel: usize },
    #[error("pixel ({x}, {y}) is outside the surface")]
    OutOfBounds { x: i32, y: i32 },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("glyph for {0:?} is not available")]
    MissingGlyph(char),
    #[error("font error: {0}")]
    Font(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("psd error: {0}")]
    Psd(#[from] PsdError),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl GfxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GfxError::Psd(e) => e.kind(),
            GfxError::Io(_) => ErrorKind::Io,
            GfxError::Image(_) | GfxError::Font(_) | GfxError::Config(_) | GfxError::MissingGlyph(_) => ErrorKind::Format,
            _ => ErrorKind::Validation,
        }
    }
}
