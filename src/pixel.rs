//! Pixel formats, raw pixel access and blend arithmetic.
//!
//! [`access`] reads and writes single pixels with bounds checks. [`format`]
//! converts between [`Color`](crate::types::Color) and raw values, and
//! [`blend`] composites colors in integer arithmetic.

pub mod access;
pub mod blend;
pub mod format;

pub use access::{extract_plane, get_pixel_at, interleave_plane, put_pixel_at};
pub use blend::{blend, BlendMode};
pub use format::PixelFormat;
