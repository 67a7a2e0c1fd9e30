use crate::error::{GfxError, PsdError};
use crate::surface::Surface;
use crate::types::Rect;

/// Flag bit: the layer is hidden.
pub const FLAG_HIDDEN: u8 = 0x02;

/// One layer of a [`PsdImage`](super::PsdImage).
///
/// `pixels` is interleaved `RGB` or `RGBA` covering `bounds`. Empty layers
/// (zero-area bounds) carry no pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PsdLayer {
    pub name: String,
    pub bounds: Rect,
    pub channels: u8,
    pub blend_tag: [u8; 4],
    pub opacity: u8,
    pub clipping: u8,
    pub flags: u8,
    pub pixels: Option<Vec<u8>>,
}

impl PsdLayer {
    /// A visible, fully opaque layer in normal blend mode.
    pub fn new(name: impl Into<String>, bounds: Rect, channels: u8) -> Self {
        PsdLayer {
            name: name.into(),
            bounds,
            channels,
            blend_tag: *b"norm",
            opacity: 255,
            clipping: 0,
            flags: 0,
            pixels: None,
        }
    }

    pub fn with_pixels(mut self, pixels: Vec<u8>) -> Self {
        self.pixels = Some(pixels);
        self
    }

    pub fn is_empty(&self) -> bool { self.bounds.is_empty() }
    pub fn visible(&self) -> bool { self.flags & FLAG_HIDDEN == 0 }
    pub fn has_alpha(&self) -> bool { self.channels == 4 }

    /// Byte length of a complete pixel buffer for this layer.
    pub fn pixel_len(&self) -> usize { self.bounds.area() * self.channels as usize }

    pub fn blend_mode_name(&self) -> &'static str {
        match &self.blend_tag {
            b"norm" => "Normal", b"mul " => "Multiply", b"scrn" => "Screen", b"over" => "Overlay", b"dark" => "Darken", b"lite" => "Lighten",
            b"idiv" => "ColorDodge", b"ibrn" => "ColorBurn", b"hLit" => "HardLight", b"sLit" => "SoftLight", b"diff" => "Difference",
            b"smud" => "Exclusion", b"hue " => "Hue", b"sat " => "Saturation", b"colr" => "Color", b"lum " => "Luminosity",
            b"lddg" => "LinearDodge", b"fsub" => "Subtract", b"pass" => "PassThrough", _ => "Normal",
        }
    }

    /// Checks the layer against an image of `width` x `height`.
    pub fn validate(&self, index: usize, width: u32, height: u32) -> Result<(), PsdError> {
        let invalid = |reason: String| PsdError::InvalidLayer { index, reason };
        if self.channels != 3 && self.channels != 4 {
            return Err(invalid(format!("{} channels, expected 3 or 4", self.channels)));
        }
        if !self.blend_tag.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(invalid(format!("blend tag {:?} is not printable", self.blend_tag)));
        }
        let image = Rect::new(0, 0, width, height);
        if !self.is_empty() && !image.contains_rect(&self.bounds) {
            return Err(invalid(format!("bounds {:?} outside {}x{} image", self.bounds, width, height)));
        }
        if self.name.len() > 255 {
            return Err(invalid("name longer than 255 bytes".into()));
        }
        match &self.pixels {
            Some(_) if self.is_empty() => Err(invalid("empty layer carries pixels".into())),
            Some(p) if p.len() != self.pixel_len() => {
                Err(invalid(format!("{} pixel bytes, expected {}", p.len(), self.pixel_len())))
            }
            _ => Ok(()),
        }
    }

    /// The layer's pixels as an RGBA surface with its opacity as surface
    /// alpha. `None` for empty or undecoded layers.
    pub fn to_surface(&self) -> Result<Option<Surface>, GfxError> {
        let Some(pixels) = self.pixels.as_ref().filter(|_| !self.is_empty()) else { return Ok(None) };
        let rgba = match self.channels {
            4 => pixels.clone(),
            _ => pixels.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        };
        let mut surface = Surface::from_rgba(self.bounds.width, self.bounds.height, &rgba)?;
        if self.opacity < 255 { surface.set_alpha(Some(self.opacity)); }
        Ok(Some(surface))
    }
}
