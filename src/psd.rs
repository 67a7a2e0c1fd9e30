//! Photoshop (PSD) images: 8-bit RGB with optional alpha and layers.
//!
//! [`PsdImage`] is the in-memory model. Reading and writing go through a
//! staged [`PsdCodec`] session; [`PsdImage::read_from`] and
//! [`PsdImage::write_to`] run a whole session in one call.

mod channel;
pub mod codec;
pub mod layer;

use std::io::{Cursor, Read, Seek, Write};

use crate::error::{GfxError, PsdError};
use crate::pixel::{BlendMode, PixelFormat};
use crate::surface::Surface;
use crate::types::{Color, Point, Rect};

pub use codec::{CodecMode, CodecState, PsdCodec, PsdOptions};
pub use layer::{PsdLayer, FLAG_HIDDEN};

const MAX_DIMENSION: u32 = 30_000;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PsdImage {
    pub width: u32,
    pub height: u32,
    /// Composite channel count: 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    /// Interleaved composite pixels, `width * height * channels` bytes.
    pub flattened: Option<Vec<u8>>,
    /// Bottom-most layer first.
    pub layers: Vec<PsdLayer>,
}

impl PsdImage {
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        PsdImage { width, height, channels, flattened: None, layers: Vec::new() }
    }

    pub fn bounds(&self) -> Rect { Rect::new(0, 0, self.width, self.height) }
    pub fn has_alpha(&self) -> bool { self.channels == 4 }

    pub fn validate(&self) -> Result<(), PsdError> {
        if self.width == 0 || self.height == 0 || self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(PsdError::InvalidImage(format!("dimensions {}x{}", self.width, self.height)));
        }
        if self.channels != 3 && self.channels != 4 {
            return Err(PsdError::InvalidImage(format!("{} channels, expected 3 or 4", self.channels)));
        }
        if let Some(flat) = &self.flattened {
            let expected = self.width as usize * self.height as usize * self.channels as usize;
            if flat.len() != expected {
                return Err(PsdError::InvalidImage(format!("flattened image has {} bytes, expected {}", flat.len(), expected)));
            }
        }
        if self.layers.len() > i16::MAX as usize {
            return Err(PsdError::InvalidImage(format!("{} layers", self.layers.len())));
        }
        for (index, layer) in self.layers.iter().enumerate() {
            layer.validate(index, self.width, self.height)?;
        }
        Ok(())
    }

    /// Reads a complete image, decoding every layer.
    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self, PsdError> {
        let mut codec = PsdCodec::new(reader);
        codec.start_reading()?;
        while codec.state() == CodecState::Header {
            codec.read_layer()?;
        }
        codec.read_flattened()?;
        codec.finish_reading()
    }

    /// Writes the image. Without a flattened buffer the composite is built
    /// from the layers first.
    pub fn write_to<W: Write + Seek>(&self, writer: W, options: PsdOptions) -> Result<(), PsdError> {
        self.validate()?;
        let composite;
        let flattened = match &self.flattened {
            Some(flat) => flat.as_slice(),
            None => {
                composite = self.composite().map_err(|e| PsdError::InvalidImage(e.to_string()))?;
                composite.as_slice()
            }
        };
        let mut codec = PsdCodec::with_options(writer, options);
        codec.start_writing(self)?;
        for layer in &self.layers {
            codec.write_layer(layer)?;
        }
        codec.write_flattened(flattened)?;
        codec.finish_writing()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PsdError> {
        Self::read_from(Cursor::new(data))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PsdError> {
        let mut out = Cursor::new(Vec::new());
        self.write_to(&mut out, PsdOptions::default())?;
        Ok(out.into_inner())
    }

    /// Flattens the visible layers bottom to top with alpha-over and layer
    /// opacity. Blend tags are kept as metadata only. RGB images start from
    /// white, RGBA images from transparent.
    pub fn composite(&self) -> Result<Vec<u8>, GfxError> {
        let mut canvas = Surface::new(self.width, self.height, PixelFormat::rgba32())?;
        canvas.fill(if self.has_alpha() { Color::TRANSPARENT } else { Color::WHITE });
        for layer in self.layers.iter().filter(|l| l.visible()) {
            let Some(surface) = layer.to_surface()? else { continue };
            canvas.blend_from(&surface, None, Point::new(layer.bounds.x, layer.bounds.y), BlendMode::Normal);
        }
        let rgba = canvas.to_rgba();
        Ok(match self.channels {
            4 => rgba,
            n => rgba.chunks_exact(4).flat_map(|p| p[..n as usize].to_vec()).collect(),
        })
    }

    /// The flattened image as an RGBA surface, if one was read or set.
    pub fn flattened_surface(&self) -> Result<Option<Surface>, GfxError> {
        let Some(flat) = &self.flattened else { return Ok(None) };
        let rgba: Vec<u8> = match self.channels {
            4 => flat.clone(),
            _ => flat.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        };
        Ok(Some(Surface::from_rgba(self.width, self.height, &rgba)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image() {
        assert!(PsdImage::new(0, 4, 3).validate().is_err());
        assert!(PsdImage::new(4, 4, 5).validate().is_err());
        let mut image = PsdImage::new(2, 2, 3);
        image.flattened = Some(vec![0; 11]);
        assert!(matches!(image.validate(), Err(PsdError::InvalidImage(_))));
        image.flattened = Some(vec![0; 12]);
        assert!(image.validate().is_ok());
    }

    #[test]
    fn test_composite_layers() {
        let mut image = PsdImage::new(2, 1, 3);
        image.layers.push(PsdLayer::new("red", Rect::new(0, 0, 1, 1), 3).with_pixels(vec![255, 0, 0]));
        let mut hidden = PsdLayer::new("hidden", Rect::new(1, 0, 1, 1), 3).with_pixels(vec![0, 0, 0]);
        hidden.flags = FLAG_HIDDEN;
        image.layers.push(hidden);
        let mut half = PsdLayer::new("half", Rect::new(0, 0, 1, 1), 4).with_pixels(vec![0, 0, 255, 255]);
        half.opacity = 0;
        image.layers.push(half);
        assert_eq!(image.composite().unwrap(), vec![255, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_composite_ignores_blend_tags() {
        let mut image = PsdImage::new(1, 1, 3);
        let mut screen = PsdLayer::new("screen", Rect::new(0, 0, 1, 1), 3).with_pixels(vec![0, 0, 0]);
        screen.blend_tag = *b"scrn";
        image.layers.push(screen);
        assert_eq!(image.composite().unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_flattened_surface() {
        let mut image = PsdImage::new(1, 1, 3);
        assert!(image.flattened_surface().unwrap().is_none());
        image.flattened = Some(vec![1, 2, 3]);
        let surface = image.flattened_surface().unwrap().unwrap();
        assert_eq!(surface.get_pixel(0, 0).unwrap(), Color::rgba(1, 2, 3, 255));
    }
}
