//! Streaming PSD session.
//!
//! A [`PsdCodec`] drives one read or write of a PSD stream in stages: header,
//! then each layer, then the flattened image. Calls made in the wrong stage
//! fail with [`PsdError::InvalidOperation`] before touching the stream. Any
//! other failure inside a stage ends the session.

use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::channel::{self, patch_u32, skip, ReadBe, WriteBe};
use super::{PsdImage, PsdLayer};
use crate::error::{ErrorKind, PsdError};
use crate::pixel::{extract_plane, interleave_plane};
use crate::types::Rect;

const SIGNATURE: &[u8; 4] = b"8BPS";
const RESOURCE_SIGNATURE: &[u8; 4] = b"8BIM";
const MAX_DIMENSION: u32 = 30_000;
const MAX_CHANNELS: u16 = 56;
const RESOLUTION_INFO: u16 = 1005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    Nothing,
    Header,
    Layers,
    Flattened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    Reading,
    Writing,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PsdOptions {
    /// Try RLE for every channel, keeping it only when it is smaller.
    pub compress: bool,
    /// Drop the stream when the session ends, successfully or not.
    pub auto_close: bool,
}

impl Default for PsdOptions {
    fn default() -> Self { PsdOptions { compress: true, auto_close: false } }
}

/// One read or write session over a seekable stream.
pub struct PsdCodec<S> {
    stream: Option<S>,
    options: PsdOptions,
    state: CodecState,
    mode: Option<CodecMode>,
    image: PsdImage,
    layer_index: usize,
    /// Reading: (channel id, recorded length) per layer.
    channel_tables: Vec<Vec<(i16, u32)>>,
    /// Writing: (channel id, offset of the length placeholder) per layer.
    placeholders: Vec<Vec<(i16, u64)>>,
    /// Reading: channel count of the composite image on disk.
    stored_channels: u16,
    /// Reading: end of the layer and mask section.
    section_end: u64,
    section_len_pos: u64,
    layer_info_len_pos: u64,
}

impl<S> PsdCodec<S> {
    pub fn new(stream: S) -> Self { Self::with_options(stream, PsdOptions::default()) }

    pub fn with_options(stream: S, options: PsdOptions) -> Self {
        PsdCodec {
            stream: Some(stream),
            options,
            state: CodecState::Nothing,
            mode: None,
            image: PsdImage::default(),
            layer_index: 0,
            channel_tables: Vec::new(),
            placeholders: Vec::new(),
            stored_channels: 0,
            section_end: 0,
            section_len_pos: 0,
            layer_info_len_pos: 0,
        }
    }

    pub fn state(&self) -> CodecState { self.state }
    pub fn mode(&self) -> Option<CodecMode> { self.mode }
    pub fn options(&self) -> PsdOptions { self.options }
    /// Index of the next layer to read or write.
    pub fn layer_index(&self) -> usize { self.layer_index }
    /// The image assembled so far (reading) or being written.
    pub fn image(&self) -> &PsdImage { &self.image }
    pub fn is_closed(&self) -> bool { self.stream.is_none() }
    pub fn get_ref(&self) -> Option<&S> { self.stream.as_ref() }
    pub fn into_inner(self) -> Option<S> { self.stream }

    /// Ends the current session from any stage.
    pub fn abort(&mut self) -> Result<(), PsdError> {
        if self.state == CodecState::Nothing && self.mode.is_none() {
            return Err(PsdError::InvalidOperation("no session to abort"));
        }
        self.end_session();
        Ok(())
    }

    fn end_session(&mut self) {
        debug!("psd session ended in state {:?}", self.state);
        self.state = CodecState::Nothing;
        self.mode = None;
        self.layer_index = 0;
        self.channel_tables.clear();
        self.placeholders.clear();
        if self.options.auto_close {
            self.stream = None;
        }
    }

    fn set_state(&mut self, state: CodecState) {
        debug!("psd codec {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn check_state(&self, mode: Option<CodecMode>, allowed: &[CodecState], message: &'static str) -> Result<(), PsdError> {
        if self.stream.is_none() { return Err(PsdError::InvalidOperation("stream is closed")); }
        if !allowed.contains(&self.state) || (mode.is_some() && self.mode != mode) {
            return Err(PsdError::InvalidOperation(message));
        }
        Ok(())
    }

    /// Runs one stage; a failure other than a protocol error ends the session.
    fn guarded<T>(&mut self, stage: impl FnOnce(&mut Self) -> Result<T, PsdError>) -> Result<T, PsdError> {
        let result = stage(self);
        if let Err(e) = &result {
            if e.kind() != ErrorKind::InvalidOperation {
                warn!("psd session aborted: {}", e);
                self.end_session();
            }
        }
        result
    }

    fn stream_mut(&mut self) -> Result<&mut S, PsdError> {
        self.stream.as_mut().ok_or(PsdError::InvalidOperation("stream is closed"))
    }

    fn advance_layer(&mut self) {
        self.layer_index += 1;
        if self.layer_index >= self.image.layers.len() {
            self.set_state(CodecState::Layers);
        }
    }
}

struct Header {
    channels: u16,
    width: u32,
    height: u32,
}

fn read_header<R: Read + ?Sized>(r: &mut R) -> Result<Header, PsdError> {
    let signature: [u8; 4] = r.read_bytes()?;
    if &signature != SIGNATURE { return Err(PsdError::InvalidSignature(signature)); }
    let version = r.read_u16()?;
    if version != 1 { return Err(PsdError::UnsupportedVersion(version)); }
    let _reserved: [u8; 6] = r.read_bytes()?;
    let channels = r.read_u16()?;
    let height = r.read_u32()?;
    let width = r.read_u32()?;
    let depth = r.read_u16()?;
    let color_mode = r.read_u16()?;
    if !(3..=MAX_CHANNELS).contains(&channels) { return Err(PsdError::UnsupportedChannelCount(channels)); }
    if depth != 8 { return Err(PsdError::UnsupportedDepth(depth)); }
    if color_mode != 3 { return Err(PsdError::UnsupportedColorMode(color_mode)); }
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PsdError::InvalidHeader(format!("dimensions {}x{}", width, height)));
    }
    Ok(Header { channels, width, height })
}

fn read_layer_record<R: Read + Seek + ?Sized>(r: &mut R, index: usize, width: u32, height: u32) -> Result<(PsdLayer, Vec<(i16, u32)>), PsdError> {
    let top = r.read_i32()?;
    let left = r.read_i32()?;
    let bottom = r.read_i32()?;
    let right = r.read_i32()?;
    let bounds = Rect::from_edges(left, top, right, bottom);
    if !bounds.is_empty() && !Rect::new(0, 0, width, height).contains_rect(&bounds) {
        return Err(PsdError::InvalidLayerData(format!("layer {} bounds {:?} outside the image", index, bounds)));
    }
    let count = r.read_u16()?;
    let mut table = Vec::with_capacity(count as usize);
    for _ in 0..count { table.push((r.read_i16()?, r.read_u32()?)); }

    let signature: [u8; 4] = r.read_bytes()?;
    if &signature != RESOURCE_SIGNATURE {
        return Err(PsdError::InvalidLayerData(format!("layer {} has blend signature {:?}", index, signature)));
    }
    let blend_tag: [u8; 4] = r.read_bytes()?;
    let opacity = r.read_u8()?;
    let clipping = r.read_u8()?;
    let flags = r.read_u8()?;
    let _filler = r.read_u8()?;

    let extra_len = r.read_u32()? as u64;
    let extra_end = r.stream_position()? + extra_len;
    let mask_len = r.read_u32()? as u64;
    skip(r, mask_len)?;
    let ranges_len = r.read_u32()? as u64;
    skip(r, ranges_len)?;
    let name_len = r.read_u8()? as usize;
    let mut name: String = r.read_vec(name_len)?.iter().map(|&b| b as char).collect();
    skip(r, ((4 - (name_len + 1) % 4) % 4) as u64)?;

    // Additional layer information blocks.
    while r.stream_position()? + 12 <= extra_end {
        let _signature: [u8; 4] = r.read_bytes()?;
        let key: [u8; 4] = r.read_bytes()?;
        let len = r.read_u32()? as u64;
        let data_start = r.stream_position()?;
        if &key == b"luni" && len >= 4 {
            let units = r.read_u32()? as u64;
            if 4 + units * 2 <= len {
                let utf16: Vec<u16> = (0..units).map(|_| r.read_u16()).collect::<Result<_, _>>()?;
                name = String::from_utf16_lossy(&utf16).trim_end_matches('\0').to_string();
            }
        }
        r.seek(SeekFrom::Start(data_start + len))?;
    }
    r.seek(SeekFrom::Start(extra_end))?;

    let channels = if table.iter().any(|&(id, _)| id == -1) { 4 } else { 3 };
    let layer = PsdLayer { name, bounds, channels, blend_tag, opacity, clipping, flags, pixels: None };
    Ok((layer, table))
}

/// Maps a PSD channel id to its index in an interleaved RGB(A) buffer.
fn channel_slot(id: i16, channels: u8) -> Option<usize> {
    match id {
        0..=2 => Some(id as usize),
        -1 if channels == 4 => Some(3),
        _ => None,
    }
}

impl<S: Read + Seek> PsdCodec<S> {
    /// Reads and validates the header and every layer record. The stream is
    /// left at the first layer's channel data.
    ///
    /// If the header is rejected the stream is returned to where it started.
    pub fn start_reading(&mut self) -> Result<(), PsdError> {
        self.check_state(None, &[CodecState::Nothing], "a session is already open")?;
        let start = self.stream_mut()?.stream_position()?;
        self.mode = Some(CodecMode::Reading);
        self.guarded(|codec| {
            let stream = codec.stream_mut()?;
            let header = match read_header(stream) {
                Ok(header) => header,
                Err(e) => {
                    if let Err(seek) = stream.seek(SeekFrom::Start(start)) { warn!("could not rewind after bad header: {}", seek); }
                    return Err(e);
                }
            };
            codec.read_layer_section(header)
        })
    }

    fn read_layer_section(&mut self, header: Header) -> Result<(), PsdError> {
        let stream = self.stream_mut()?;
        let color_mode_len = stream.read_u32()? as u64;
        skip(stream, color_mode_len)?;
        let resources_len = stream.read_u32()? as u64;
        skip(stream, resources_len)?;

        let section_len = stream.read_u32()? as u64;
        let section_end = stream.stream_position()? + section_len;
        let mut layers = Vec::new();
        let mut tables = Vec::new();
        if section_len >= 4 {
            let info_len = stream.read_u32()?;
            if info_len >= 2 {
                let count = stream.read_i16()?.unsigned_abs() as usize;
                for index in 0..count {
                    let (layer, table) = read_layer_record(stream, index, header.width, header.height)?;
                    layers.push(layer);
                    tables.push(table);
                }
            }
        }
        info!("reading {}x{} PSD with {} channels and {} layers", header.width, header.height, header.channels, layers.len());

        self.image = PsdImage {
            width: header.width,
            height: header.height,
            channels: header.channels.min(4) as u8,
            flattened: None,
            layers,
        };
        self.channel_tables = tables;
        self.stored_channels = header.channels;
        self.section_end = section_end;
        self.layer_index = 0;
        self.set_state(CodecState::Header);
        if self.image.layers.is_empty() { self.set_state(CodecState::Layers); }
        Ok(())
    }

    /// Decodes the next layer's channels. Empty layers are passed over
    /// without decoding.
    pub fn read_layer(&mut self) -> Result<&PsdLayer, PsdError> {
        self.check_state(Some(CodecMode::Reading), &[CodecState::Header], "no layers left to read")?;
        let index = self.layer_index;
        self.guarded(|codec| codec.decode_layer(index))?;
        Ok(&self.image.layers[index])
    }

    fn decode_layer(&mut self, index: usize) -> Result<(), PsdError> {
        let stream = self.stream.as_mut().ok_or(PsdError::InvalidOperation("stream is closed"))?;
        let layer = &mut self.image.layers[index];
        let table = &self.channel_tables[index];
        if layer.is_empty() {
            let total: u64 = table.iter().map(|&(_, len)| len as u64).sum();
            skip(stream, total)?;
            layer.pixels = None;
        } else {
            let (w, h) = (layer.bounds.width as usize, layer.bounds.height as usize);
            let mut pixels = vec![0u8; layer.pixel_len()];
            for &(id, len) in table {
                let len = len as u64;
                let Some(slot) = channel_slot(id, layer.channels) else {
                    warn!("layer {} skipping channel {}", index, id);
                    skip(stream, len)?;
                    continue;
                };
                let start = stream.stream_position()?;
                let plane = channel::read_channel(stream, w, h, len)?;
                let used = stream.stream_position()? - start;
                if used > len {
                    return Err(PsdError::InvalidLayerData(format!("layer {} channel {} used {} of {} bytes", index, id, used, len)));
                }
                skip(stream, len - used)?;
                interleave_plane(&mut pixels, layer.channels as usize, slot, &plane);
            }
            layer.pixels = Some(pixels);
        }
        self.advance_layer();
        Ok(())
    }

    /// Moves past the next layer's channel data without decoding it.
    pub fn skip_layer(&mut self) -> Result<(), PsdError> {
        self.check_state(Some(CodecMode::Reading), &[CodecState::Header], "no layers left to skip")?;
        self.guarded(|codec| {
            let total: u64 = codec.channel_tables[codec.layer_index].iter().map(|&(_, len)| len as u64).sum();
            skip(codec.stream_mut()?, total)?;
            codec.advance_layer();
            Ok(())
        })
    }

    /// Reads the composite image. Every layer must have been read or skipped.
    pub fn read_flattened(&mut self) -> Result<&[u8], PsdError> {
        self.check_state(Some(CodecMode::Reading), &[CodecState::Layers], "layers remain unread or the image was already read")?;
        self.guarded(|codec| {
            let (w, h) = (codec.image.width as usize, codec.image.height as usize);
            let keep = codec.image.channels as usize;
            let stored = codec.stored_channels as usize;
            let section_end = codec.section_end;
            let stream = codec.stream_mut()?;
            stream.seek(SeekFrom::Start(section_end))?;
            let planes = channel::read_planes(stream, w, h, stored, keep)?;
            let mut pixels = vec![0u8; w * h * keep];
            for (slot, plane) in planes.iter().enumerate() { interleave_plane(&mut pixels, keep, slot, plane); }
            codec.image.flattened = Some(pixels);
            codec.set_state(CodecState::Flattened);
            Ok(())
        })?;
        Ok(self.image.flattened.as_deref().unwrap_or_default())
    }

    /// Ends the session and hands back everything read so far.
    pub fn finish_reading(&mut self) -> Result<PsdImage, PsdError> {
        self.check_state(Some(CodecMode::Reading), &[CodecState::Header, CodecState::Layers, CodecState::Flattened], "no read session to finish")?;
        let image = std::mem::take(&mut self.image);
        info!("finished reading PSD at layer {} of {}", self.layer_index, image.layers.len());
        self.end_session();
        Ok(image)
    }
}

fn write_header<W: Write + ?Sized>(w: &mut W, image: &PsdImage) -> Result<(), PsdError> {
    w.write_all(SIGNATURE)?;
    w.write_u16(1)?;
    w.write_all(&[0; 6])?;
    w.write_u16(image.channels as u16)?;
    w.write_u32(image.height)?;
    w.write_u32(image.width)?;
    w.write_u16(8)?;
    w.write_u16(3)?;
    // Color mode data.
    w.write_u32(0)?;
    // Image resources: 72 dpi resolution info.
    w.write_u32(28)?;
    w.write_all(RESOURCE_SIGNATURE)?;
    w.write_u16(RESOLUTION_INFO)?;
    w.write_u16(0)?;
    w.write_u32(16)?;
    for _ in 0..2 {
        w.write_u16(72)?;
        w.write_u16(0)?;
        w.write_u16(1)?;
        w.write_u16(1)?;
    }
    Ok(())
}

/// Channel ids in file order: alpha first when present.
fn channel_ids(channels: u8) -> &'static [i16] {
    if channels == 4 { &[-1, 0, 1, 2] } else { &[0, 1, 2] }
}

fn write_layer_record<W: Write + Seek + ?Sized>(w: &mut W, layer: &PsdLayer) -> Result<Vec<(i16, u64)>, PsdError> {
    let b = layer.bounds;
    w.write_i32(b.top())?;
    w.write_i32(b.left())?;
    w.write_i32(b.bottom())?;
    w.write_i32(b.right())?;
    let ids = channel_ids(layer.channels);
    w.write_u16(ids.len() as u16)?;
    let mut placeholders = Vec::with_capacity(ids.len());
    for &id in ids {
        w.write_i16(id)?;
        placeholders.push((id, w.stream_position()?));
        w.write_u32(0)?;
    }
    w.write_all(RESOURCE_SIGNATURE)?;
    w.write_all(&layer.blend_tag)?;
    w.write_u8(layer.opacity)?;
    w.write_u8(layer.clipping)?;
    w.write_u8(layer.flags)?;
    w.write_u8(0)?;

    let pascal: Vec<u8> = layer.name.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }).take(255).collect();
    let pascal_pad = (4 - (pascal.len() + 1) % 4) % 4;
    let utf16: Vec<u16> = layer.name.encode_utf16().collect();
    let luni_len = if utf16.is_empty() { 0 } else { 12 + 4 + utf16.len() * 2 };
    w.write_u32((4 + 4 + 1 + pascal.len() + pascal_pad + luni_len) as u32)?;
    w.write_u32(0)?;
    w.write_u32(0)?;
    w.write_u8(pascal.len() as u8)?;
    w.write_all(&pascal)?;
    w.write_all(&[0; 3][..pascal_pad])?;
    if !utf16.is_empty() {
        w.write_all(RESOURCE_SIGNATURE)?;
        w.write_all(b"luni")?;
        w.write_u32(4 + utf16.len() as u32 * 2)?;
        w.write_u32(utf16.len() as u32)?;
        for unit in utf16 { w.write_u16(unit)?; }
    }
    Ok(placeholders)
}

impl<S: Write + Seek> PsdCodec<S> {
    /// Validates `image`, then writes the header and every layer record with
    /// placeholder channel lengths. Layer pixels are written by
    /// [`write_layer`](Self::write_layer) in the same order.
    pub fn start_writing(&mut self, image: &PsdImage) -> Result<(), PsdError> {
        self.check_state(None, &[CodecState::Nothing], "a session is already open")?;
        image.validate()?;
        self.stream_mut()?.stream_position().map_err(|_| PsdError::NotSeekable)?;
        self.mode = Some(CodecMode::Writing);
        self.image = PsdImage {
            flattened: None,
            layers: image.layers.iter().map(|l| PsdLayer { pixels: None, ..l.clone() }).collect(),
            ..*image
        };
        info!("writing {}x{} PSD with {} channels and {} layers", image.width, image.height, image.channels, image.layers.len());
        self.guarded(|codec| {
            let has_alpha = codec.image.channels == 4;
            let stream = codec.stream_mut()?;
            write_header(stream, image)?;
            let section_len_pos = stream.stream_position()?;
            stream.write_u32(0)?;
            let layer_info_len_pos = stream.stream_position()?;
            stream.write_u32(0)?;
            let mut placeholders = Vec::with_capacity(image.layers.len());
            if !image.layers.is_empty() {
                let count = image.layers.len() as i16;
                // A negative count marks the first alpha channel as merged transparency.
                stream.write_i16(if has_alpha { -count } else { count })?;
                for layer in &image.layers { placeholders.push(write_layer_record(stream, layer)?); }
            }
            codec.placeholders = placeholders;
            codec.section_len_pos = section_len_pos;
            codec.layer_info_len_pos = layer_info_len_pos;
            codec.layer_index = 0;
            codec.set_state(CodecState::Header);
            if codec.image.layers.is_empty() {
                codec.close_layer_section()?;
                codec.set_state(CodecState::Layers);
            }
            Ok(())
        })
    }

    /// Writes the next layer's channels and patches their lengths. `layer`
    /// must match the record written by `start_writing`; missing pixels are
    /// written as zeros.
    pub fn write_layer(&mut self, layer: &PsdLayer) -> Result<(), PsdError> {
        self.check_state(Some(CodecMode::Writing), &[CodecState::Header], "no layers left to write")?;
        let index = self.layer_index;
        let Some(planned) = self.image.layers.get(index) else {
            return Err(PsdError::InvalidOperation("no layers left to write"));
        };
        layer.validate(index, self.image.width, self.image.height)?;
        if planned.bounds != layer.bounds || planned.channels != layer.channels {
            return Err(PsdError::InvalidLayer { index, reason: "does not match the layer record".into() });
        }
        self.guarded(|codec| {
            let compress = codec.options.compress;
            let (w, h) = (layer.bounds.width as usize, layer.bounds.height as usize);
            let channels = layer.channels as usize;
            let zeros;
            let pixels = match &layer.pixels {
                Some(p) => p.as_slice(),
                None => { zeros = vec![0u8; layer.pixel_len()]; zeros.as_slice() }
            };
            let stream = codec.stream.as_mut().ok_or(PsdError::InvalidOperation("stream is closed"))?;
            for &(id, placeholder) in &codec.placeholders[index] {
                let slot = channel_slot(id, layer.channels).unwrap_or(0);
                let plane = extract_plane(pixels, channels, slot);
                let len = channel::write_channel(stream, &plane, w, h, compress)?;
                patch_u32(stream, placeholder, len)?;
            }
            codec.advance_layer();
            if codec.state == CodecState::Layers { codec.close_layer_section()?; }
            Ok(())
        })
    }

    fn close_layer_section(&mut self) -> Result<(), PsdError> {
        let (section_len_pos, info_len_pos) = (self.section_len_pos, self.layer_info_len_pos);
        let stream = self.stream_mut()?;
        let mut info_len = stream.stream_position()? - (info_len_pos + 4);
        if info_len % 2 == 1 {
            stream.write_u8(0)?;
            info_len += 1;
        }
        patch_u32(stream, info_len_pos, info_len as u32)?;
        // Global layer mask info.
        stream.write_u32(0)?;
        let section_len = stream.stream_position()? - (section_len_pos + 4);
        patch_u32(stream, section_len_pos, section_len as u32)?;
        debug!("layer section closed: {} bytes", section_len);
        Ok(())
    }

    /// Writes the composite image, interleaved with the image's channel count.
    pub fn write_flattened(&mut self, pixels: &[u8]) -> Result<(), PsdError> {
        self.check_state(Some(CodecMode::Writing), &[CodecState::Layers], "layers remain unwritten or the image was already written")?;
        let channels = self.image.channels as usize;
        let expected = self.image.width as usize * self.image.height as usize * channels;
        if pixels.len() != expected {
            return Err(PsdError::InvalidImage(format!("flattened image has {} bytes, expected {}", pixels.len(), expected)));
        }
        self.guarded(|codec| {
            let (w, h) = (codec.image.width as usize, codec.image.height as usize);
            let compress = codec.options.compress;
            let planes: Vec<Vec<u8>> = (0..channels).map(|c| extract_plane(pixels, channels, c)).collect();
            channel::write_planes(codec.stream_mut()?, &planes, w, h, compress)?;
            codec.set_state(CodecState::Flattened);
            Ok(())
        })
    }

    /// Flushes the stream and ends the session.
    pub fn finish_writing(&mut self) -> Result<(), PsdError> {
        self.check_state(Some(CodecMode::Writing), &[CodecState::Flattened], "the flattened image has not been written")?;
        self.guarded(|codec| Ok(codec.stream_mut()?.flush()?))?;
        info!("finished writing PSD with {} layers", self.image.layers.len());
        self.end_session();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> PsdImage {
        let mut image = PsdImage::new(4, 2, 3);
        image.layers.push(PsdLayer::new("solid", Rect::new(0, 0, 4, 2), 3).with_pixels(vec![200; 24]));
        image.flattened = Some(vec![200; 24]);
        image
    }

    #[test]
    fn test_state_transitions() {
        let image = sample();
        let mut codec = PsdCodec::new(Cursor::new(Vec::new()));
        assert_eq!(codec.state(), CodecState::Nothing);
        codec.start_writing(&image).unwrap();
        assert_eq!(codec.state(), CodecState::Header);
        assert_eq!(codec.mode(), Some(CodecMode::Writing));
        assert!(matches!(codec.write_flattened(&[200; 24]), Err(PsdError::InvalidOperation(_))));
        codec.write_layer(&image.layers[0]).unwrap();
        assert_eq!(codec.state(), CodecState::Layers);
        assert!(matches!(codec.write_layer(&image.layers[0]), Err(PsdError::InvalidOperation(_))));
        assert!(matches!(codec.finish_writing(), Err(PsdError::InvalidOperation(_))));
        codec.write_flattened(&[200; 24]).unwrap();
        codec.finish_writing().unwrap();
        assert_eq!(codec.state(), CodecState::Nothing);
        assert!(matches!(codec.finish_writing(), Err(PsdError::InvalidOperation(_))));

        let bytes = codec.into_inner().unwrap().into_inner();
        let mut codec = PsdCodec::new(Cursor::new(bytes));
        codec.start_reading().unwrap();
        assert_eq!(codec.layer_index(), 0);
        codec.skip_layer().unwrap();
        assert_eq!(codec.read_flattened().unwrap(), &[200; 24][..]);
        let read = codec.finish_reading().unwrap();
        assert_eq!(read.layers.len(), 1);
        assert_eq!(read.layers[0].pixels, None);
    }

    #[test]
    fn test_validation_happens_before_io() {
        let mut image = sample();
        image.layers[0].bounds = Rect::new(2, 0, 4, 2);
        let mut codec = PsdCodec::new(Cursor::new(Vec::new()));
        let err = codec.start_writing(&image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(codec.state(), CodecState::Nothing);
        assert!(codec.get_ref().unwrap().get_ref().is_empty());
    }

    #[test]
    fn test_mismatched_layer_is_rejected() {
        let image = sample();
        let mut codec = PsdCodec::new(Cursor::new(Vec::new()));
        codec.start_writing(&image).unwrap();
        let other = PsdLayer::new("solid", Rect::new(0, 0, 2, 2), 3);
        assert!(matches!(codec.write_layer(&other), Err(PsdError::InvalidLayer { index: 0, .. })));
        assert_eq!(codec.state(), CodecState::Header);
    }

    #[test]
    fn test_format_error_aborts_and_closes() {
        let options = PsdOptions { compress: true, auto_close: true };
        let mut codec = PsdCodec::with_options(Cursor::new(b"8BPS\x00\x01".to_vec()), options);
        assert!(codec.start_reading().is_err());
        assert_eq!(codec.state(), CodecState::Nothing);
        assert!(codec.is_closed());
        assert!(matches!(codec.start_reading(), Err(PsdError::InvalidOperation(_))));
    }

    #[test]
    fn test_abort_from_any_state() {
        let image = sample();
        let mut codec = PsdCodec::new(Cursor::new(Vec::new()));
        assert!(codec.abort().is_err());
        codec.start_writing(&image).unwrap();
        codec.abort().unwrap();
        assert_eq!(codec.state(), CodecState::Nothing);
        assert!(!codec.is_closed());
        codec.start_writing(&image).unwrap();
    }

    #[test]
    fn test_empty_image_skips_layer_stage() {
        let mut image = PsdImage::new(2, 2, 4);
        image.flattened = Some(vec![1, 2, 3, 4].repeat(4));
        let mut codec = PsdCodec::new(Cursor::new(Vec::new()));
        codec.start_writing(&image).unwrap();
        assert_eq!(codec.state(), CodecState::Layers);
        codec.write_flattened(image.flattened.as_deref().unwrap()).unwrap();
        codec.finish_writing().unwrap();
        let bytes = codec.into_inner().unwrap().into_inner();
        let read = PsdImage::from_bytes(&bytes).unwrap();
        assert_eq!(read, image);
    }

    #[test]
    fn test_layer_write_on_layerless_image_is_rejected() {
        let mut image = PsdImage::new(2, 1, 3);
        image.flattened = Some(vec![9; 6]);
        let mut codec = PsdCodec::new(Cursor::new(Vec::new()));
        codec.start_writing(&image).unwrap();
        let position = codec.get_ref().unwrap().position();
        let stray = PsdLayer::new("stray", Rect::new(0, 0, 1, 1), 3);
        let err = codec.write_layer(&stray).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(codec.state(), CodecState::Layers);
        assert_eq!(codec.get_ref().unwrap().position(), position);
        codec.write_flattened(&[9; 6]).unwrap();
        codec.finish_writing().unwrap();
        assert_eq!(PsdImage::from_bytes(&image.to_bytes().unwrap()).unwrap(), image);
    }

    #[test]
    fn test_luni_name_roundtrip() {
        let mut image = PsdImage::new(1, 1, 3);
        image.layers.push(PsdLayer::new("Ebene über", Rect::new(0, 0, 1, 1), 3).with_pixels(vec![1, 2, 3]));
        let read = PsdImage::from_bytes(&image.to_bytes().unwrap()).unwrap();
        assert_eq!(read.layers[0].name, "Ebene über");
    }
}
