//! Loading and saving surfaces as image files.
//!
//! PSD data is recognised by its signature and decoded with [`crate::psd`];
//! everything else goes through the `image` crate.

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};
use log::debug;

use crate::error::GfxError;
use crate::psd::PsdImage;
use crate::surface::Surface;

const PSD_SIGNATURE: &[u8; 4] = b"8BPS";

pub fn is_psd(bytes: &[u8]) -> bool { bytes.starts_with(PSD_SIGNATURE) }

/// Decodes PSD, PNG or JPEG data into an RGBA surface.
pub fn decode_surface(bytes: &[u8]) -> Result<Surface, GfxError> {
    if is_psd(bytes) {
        let mut psd = PsdImage::from_bytes(bytes)?;
        debug!("decoded psd {}x{} with {} layers", psd.width, psd.height, psd.layers.len());
        if let Some(surface) = psd.flattened_surface()? {
            return Ok(surface);
        }
        psd.flattened = Some(psd.composite()?);
        return psd.flattened_surface()?.ok_or_else(|| GfxError::InvalidArgument("psd has no pixels".into()));
    }
    let img = image::load_from_memory(bytes)?.to_rgba8();
    Surface::from_rgba(img.width(), img.height(), img.as_raw())
}

pub fn load_surface<P: AsRef<Path>>(path: P) -> Result<Surface, GfxError> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_surface(&bytes)
}

pub fn to_rgba_image(surface: &Surface) -> Result<RgbaImage, GfxError> {
    RgbaImage::from_raw(surface.width(), surface.height(), surface.to_rgba())
        .ok_or(GfxError::InvalidDimensions { width: surface.width(), height: surface.height() })
}

pub fn encode_png(surface: &Surface) -> Result<Vec<u8>, GfxError> {
    let mut png_bytes = Vec::new();
    DynamicImage::ImageRgba8(to_rgba_image(surface)?).write_to(&mut Cursor::new(&mut png_bytes), ImageOutputFormat::Png)?;
    Ok(png_bytes)
}

pub fn save_png<P: AsRef<Path>>(surface: &Surface, path: P) -> Result<(), GfxError> {
    to_rgba_image(surface)?.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// `data:image/png;base64,...` for embedding in HTML or SVG.
pub fn to_data_url(surface: &Surface) -> Result<String, GfxError> {
    let b64 = general_purpose::STANDARD.encode(encode_png(surface)?);
    Ok(format!("data:image/png;base64,{}", b64))
}
