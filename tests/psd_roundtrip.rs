use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};

use gfx2d::psd::{CodecState, PsdCodec, PsdImage, PsdLayer, PsdOptions};
use gfx2d::{ErrorKind, PsdError, Rect};
use rand::Rng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sample_image() -> PsdImage {
    let mut rng = rand::rng();
    let mut image = PsdImage::new(8, 6, 4);
    image.layers.push(PsdLayer::new("empty", Rect::default(), 3));
    let noise: Vec<u8> = (0..5 * 4 * 4).map(|_| rng.random()).collect();
    let mut noisy = PsdLayer::new("noise", Rect::new(2, 1, 5, 4), 4).with_pixels(noise);
    noisy.opacity = 200;
    image.layers.push(noisy);
    // Long runs so the RLE path is taken.
    image.layers.push(PsdLayer::new("flat", Rect::new(0, 0, 8, 6), 3).with_pixels(vec![77; 8 * 6 * 3]));
    image.flattened = Some((0..8 * 6 * 4).map(|i| (i % 251) as u8).collect());
    image
}

#[test]
fn test_memory_roundtrip() {
    init_logging();
    let image = sample_image();
    let bytes = image.to_bytes().unwrap();
    assert_eq!(&bytes[..4], b"8BPS");
    assert_eq!(PsdImage::from_bytes(&bytes).unwrap(), image);
}

#[test]
fn test_uncompressed_matches_compressed() {
    init_logging();
    let image = sample_image();
    let mut raw = Cursor::new(Vec::new());
    image.write_to(&mut raw, PsdOptions { compress: false, ..PsdOptions::default() }).unwrap();
    let raw = raw.into_inner();
    assert!(raw.len() > image.to_bytes().unwrap().len());
    assert_eq!(PsdImage::from_bytes(&raw).unwrap(), image);
}

#[test]
fn test_file_roundtrip() {
    init_logging();
    let image = sample_image();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layers.psd");
    image.write_to(File::create(&path).unwrap(), PsdOptions::default()).unwrap();
    let back = PsdImage::read_from(File::open(&path).unwrap()).unwrap();
    assert_eq!(back.layers[1].name, "noise");
    assert_eq!(back, image);
}

#[test]
fn test_bad_header_rewinds() {
    init_logging();
    let mut bytes = vec![0xAA; 3];
    bytes.extend_from_slice(b"XXXX");
    bytes.extend_from_slice(&[0; 32]);
    let mut cursor = Cursor::new(bytes);
    cursor.seek(SeekFrom::Start(3)).unwrap();
    let mut codec = PsdCodec::new(cursor);
    let err = codec.start_reading().unwrap_err();
    assert!(matches!(err, PsdError::InvalidSignature(sig) if &sig == b"XXXX"));
    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(codec.state(), CodecState::Nothing);
    assert_eq!(codec.get_ref().unwrap().position(), 3);

    let mut bytes = sample_image().to_bytes().unwrap();
    bytes[5] = 2;
    let mut codec = PsdCodec::new(Cursor::new(bytes));
    assert!(matches!(codec.start_reading(), Err(PsdError::UnsupportedVersion(2))));
    assert_eq!(codec.get_ref().unwrap().position(), 0);
}

#[test]
fn test_out_of_order_calls_leave_stream_alone() {
    init_logging();
    let bytes = sample_image().to_bytes().unwrap();
    let mut codec = PsdCodec::new(Cursor::new(bytes));
    codec.start_reading().unwrap();
    assert_eq!(codec.state(), CodecState::Header);
    let position = codec.get_ref().unwrap().position();

    let err = codec.read_flattened().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(codec.get_ref().unwrap().position(), position);
    assert_eq!(codec.state(), CodecState::Header);

    codec.skip_layer().unwrap();
    assert!(codec.read_layer().unwrap().pixels.is_some());
    codec.skip_layer().unwrap();
    assert_eq!(codec.state(), CodecState::Layers);
    assert_eq!(codec.read_flattened().unwrap().len(), 8 * 6 * 4);
    let image = codec.finish_reading().unwrap();
    assert!(image.layers[2].pixels.is_none());
    assert_eq!(codec.state(), CodecState::Nothing);
}

#[test]
fn test_truncated_file_ends_session() {
    init_logging();
    let mut bytes = sample_image().to_bytes().unwrap();
    bytes.truncate(bytes.len() - 10);
    let mut codec = PsdCodec::with_options(Cursor::new(bytes), PsdOptions { auto_close: true, ..PsdOptions::default() });
    codec.start_reading().unwrap();
    while codec.state() == CodecState::Header { codec.read_layer().unwrap(); }
    let err = codec.read_flattened().unwrap_err();
    assert_ne!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(codec.state(), CodecState::Nothing);
    assert!(codec.is_closed());
}

/// A write-only sink, like a pipe.
struct Pipe(Vec<u8>);

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Seek for Pipe {
    fn seek(&mut self, _: SeekFrom) -> io::Result<u64> { Err(io::Error::new(io::ErrorKind::Unsupported, "pipe")) }
}

#[test]
fn test_unseekable_output_is_rejected() {
    init_logging();
    let image = sample_image();
    let mut codec = PsdCodec::new(Pipe(Vec::new()));
    let err = codec.start_writing(&image).unwrap_err();
    assert!(matches!(err, PsdError::NotSeekable));
    assert_eq!(codec.state(), CodecState::Nothing);
    assert!(codec.get_ref().unwrap().0.is_empty());
    assert!(matches!(image.write_to(Pipe(Vec::new()), PsdOptions::default()), Err(PsdError::NotSeekable)));
}

fn be16(out: &mut Vec<u8>, v: u16) { out.extend_from_slice(&v.to_be_bytes()); }
fn be32(out: &mut Vec<u8>, v: u32) { out.extend_from_slice(&v.to_be_bytes()); }

/// A 2x1 RGB file with one layer whose first two channels carry trailing
/// padding inside their recorded lengths.
fn padded_psd() -> Vec<u8> {
    let mut data = Vec::new();
    // raw [10, 20] + 3 padding bytes
    data.extend_from_slice(&[0, 0, 10, 20, 0xEE, 0xEE, 0xEE]);
    // RLE: one row of length 2 holding a run of two 5s, + 2 padding bytes
    data.extend_from_slice(&[0, 1, 0, 2, 0xFF, 5, 0xEE, 0xEE]);
    // raw [30, 40]
    data.extend_from_slice(&[0, 0, 30, 40]);

    let mut info = Vec::new();
    be16(&mut info, 1);
    for edge in [0u32, 0, 1, 2] { be32(&mut info, edge); }
    be16(&mut info, 3);
    for (id, len) in [(0u16, 7u32), (1, 8), (2, 4)] {
        be16(&mut info, id);
        be32(&mut info, len);
    }
    info.extend_from_slice(b"8BIMnorm");
    info.extend_from_slice(&[255, 0, 0, 0]);
    be32(&mut info, 12);
    be32(&mut info, 0);
    be32(&mut info, 0);
    info.extend_from_slice(&[1, b'p', 0, 0]);
    info.extend_from_slice(&data);
    if info.len() % 2 == 1 { info.push(0); }

    let mut bytes = b"8BPS".to_vec();
    be16(&mut bytes, 1);
    bytes.extend_from_slice(&[0; 6]);
    be16(&mut bytes, 3);
    be32(&mut bytes, 1);
    be32(&mut bytes, 2);
    be16(&mut bytes, 8);
    be16(&mut bytes, 3);
    be32(&mut bytes, 0);
    be32(&mut bytes, 0);
    be32(&mut bytes, 4 + info.len() as u32 + 4);
    be32(&mut bytes, info.len() as u32);
    bytes.extend_from_slice(&info);
    be32(&mut bytes, 0);
    // raw composite, planar
    bytes.extend_from_slice(&[0, 0, 1, 2, 3, 4, 5, 6]);
    bytes
}

#[test]
fn test_padded_channels_follow_recorded_length() {
    init_logging();
    let mut codec = PsdCodec::new(Cursor::new(padded_psd()));
    codec.start_reading().unwrap();
    let layer = codec.read_layer().unwrap();
    assert_eq!(layer.name, "p");
    assert_eq!(layer.bounds, Rect::new(0, 0, 2, 1));
    assert_eq!(layer.pixels.as_deref(), Some(&[10, 5, 30, 20, 5, 40][..]));
    assert_eq!(codec.state(), CodecState::Layers);
    assert_eq!(codec.read_flattened().unwrap(), &[1, 3, 5, 2, 4, 6]);
    let image = codec.finish_reading().unwrap();
    assert_eq!(image.layers.len(), 1);
}
