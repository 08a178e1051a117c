//! Integration tests for complete compression jobs.
//!
//! These tests drive the public API end to end:
//! - Descriptor + profile + sink → bytes on disk or in a handler
//! - Error channel behavior for invalid, unsupported and failing jobs
//! - Header contents and payload ordering
//!
//! Run with: `cargo test --test compress_integration`

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use texbake::engine::{TextureHeader, HEADER_SIZE};
use texbake::output::{MemoryOutput, OutputHandler};
use texbake::{
    CompressionProfile, Compressor, ErrorKind, Format, InputDescriptor, OutputSink, Quality,
    TextureKind,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// BGRA gradient with a varying alpha channel.
fn gradient(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push(((x + y) * 31 % 256) as u8);
            data.push((255 - (x * 7 + y * 3) % 256) as u8);
        }
    }
    data
}

fn input_2d(pixels: &[u8], width: u32, height: u32) -> InputDescriptor<'_> {
    let mut input = InputDescriptor::new();
    input.set_texture_layout(TextureKind::TwoD, width, height, 1);
    input.set_mipmap_data(0, 0, pixels);
    input
}

/// Sink that records every error kind it receives.
fn recording_sink(sink: OutputSink) -> (OutputSink, Arc<Mutex<Vec<ErrorKind>>>) {
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&kinds);
    let sink = sink.with_error_handler(move |kind| seen.lock().unwrap().push(kind));
    (sink, kinds)
}

/// Handler whose writes always fail.
struct BrokenPipe;

impl OutputHandler for BrokenPipe {
    fn begin_image(&self, _size: u64, _w: u32, _h: u32, _d: u32, _face: u32, _level: u32) {}

    fn write_data(&self, _data: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
    }
}

/// Handler that cancels the job on its first write and counts images
/// announced afterwards.
struct CancelOnFirstWrite {
    token: CancellationToken,
    cancelled: AtomicBool,
    late_images: AtomicUsize,
}

impl CancelOnFirstWrite {
    fn new(token: CancellationToken) -> Self {
        Self {
            token,
            cancelled: AtomicBool::new(false),
            late_images: AtomicUsize::new(0),
        }
    }
}

impl OutputHandler for CancelOnFirstWrite {
    fn begin_image(&self, _size: u64, _w: u32, _h: u32, _d: u32, _face: u32, _level: u32) {
        if self.cancelled.load(Ordering::SeqCst) {
            self.late_images.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn write_data(&self, _data: &[u8]) -> io::Result<()> {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.token.cancel();
        }
        Ok(())
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

/// A 4×4 image without mipmaps is a single BC1 block after the header.
#[test]
fn test_single_block_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("block.dds");

    let pixels = gradient(4, 4);
    let mut input = input_2d(&pixels, 4, 4);
    input.set_mipmap_generation(false, None);

    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Bc1);
    profile.set_quality(Quality::Normal);

    let (sink, kinds) = recording_sink(OutputSink::to_file(&path));
    let compressor = Compressor::new();

    assert!(compressor.compress(&input, &profile, &sink));
    assert!(kinds.lock().unwrap().is_empty());

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), HEADER_SIZE + 8);
    assert_eq!(compressor.estimate_size(&input, &profile), 8);
}

/// Zero width fails validation before the destination is touched.
#[test]
fn test_zero_width_leaves_destination_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("never.dds");

    let pixels = gradient(4, 4);
    let mut input = InputDescriptor::new();
    input.set_texture_layout(TextureKind::TwoD, 0, 4, 1);
    input.set_mipmap_data(0, 0, &pixels);

    let (sink, kinds) = recording_sink(OutputSink::to_file(&path));

    assert!(!Compressor::new().compress(&input, &CompressionProfile::new(), &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::InvalidInput]);
    assert!(!path.exists());
}

/// Identical jobs produce identical bytes.
#[test]
fn test_output_is_deterministic() {
    let temp_dir = TempDir::new().unwrap();
    let pixels = gradient(64, 32);
    let input = input_2d(&pixels, 64, 32);

    for format in [Format::Bc1, Format::Bc3, Format::Bc5] {
        for quality in [Quality::Fastest, Quality::Production] {
            let mut profile = CompressionProfile::new();
            profile.set_format(format);
            profile.set_quality(quality);

            let first = temp_dir.path().join("first.dds");
            let second = temp_dir.path().join("second.dds");
            let compressor = Compressor::new();
            assert!(compressor.compress(&input, &profile, &OutputSink::to_file(&first)));
            assert!(compressor.compress(&input, &profile, &OutputSink::to_file(&second)));

            assert_eq!(
                std::fs::read(&first).unwrap(),
                std::fs::read(&second).unwrap(),
                "{} at {:?} differs between runs",
                format,
                quality
            );
        }
    }
}

/// Jobs running concurrently on one compressor do not interfere.
#[test]
fn test_concurrent_jobs_match_sequential() {
    let pixels = gradient(32, 32);
    let input = input_2d(&pixels, 32, 32);
    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Bc3);

    let compressor = Compressor::new();
    let reference = Arc::new(MemoryOutput::new());
    assert!(compressor.compress(&input, &profile, &OutputSink::to_handler(reference.clone())));

    let outputs: Vec<Arc<MemoryOutput>> = (0..4).map(|_| Arc::new(MemoryOutput::new())).collect();
    std::thread::scope(|scope| {
        for output in &outputs {
            let sink = OutputSink::to_handler(output.clone());
            let (compressor, input, profile) = (&compressor, &input, &profile);
            scope.spawn(move || assert!(compressor.compress(input, profile, &sink)));
        }
    });

    for output in outputs {
        assert_eq!(output.bytes(), reference.bytes());
    }
}

/// The header describes the job and parses back.
#[test]
fn test_header_round_trip() {
    let pixels = gradient(32, 16);
    let input = input_2d(&pixels, 32, 16);
    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Bc3n);

    let memory = Arc::new(MemoryOutput::new());
    assert!(Compressor::new().compress(&input, &profile, &OutputSink::to_handler(memory.clone())));

    let bytes = memory.bytes();
    let header = TextureHeader::parse(&bytes[..HEADER_SIZE]).unwrap();
    assert_eq!(header.kind, TextureKind::TwoD);
    assert_eq!((header.width, header.height, header.depth), (32, 16, 1));
    assert_eq!(header.face_count(), 1);
    assert_eq!(header.mip_count, 6);
    assert_eq!(header.format, Format::Bc3n);
    assert!(header.is_normal_map);

    // Payload starts right after the header
    assert_eq!(memory.images()[0].offset, HEADER_SIZE);
}

/// Cube maps are emitted face-major, mip-minor.
#[test]
fn test_cube_map_ordering() {
    let faces: Vec<Vec<u8>> = (0..6).map(|_| gradient(8, 8)).collect();
    let mut input = InputDescriptor::new();
    input.set_texture_layout(TextureKind::Cube, 8, 8, 1);
    for (face, data) in faces.iter().enumerate() {
        input.set_mipmap_data(face as u32, 0, data);
    }

    let memory = Arc::new(MemoryOutput::new());
    let sink = OutputSink::to_handler(memory.clone());
    let report = Compressor::new()
        .try_compress(&input, &CompressionProfile::new(), &sink)
        .unwrap();

    assert_eq!(report.face_count, 6);
    assert_eq!(report.mip_count, 4);

    let order: Vec<(u32, u32)> = memory.images().iter().map(|i| (i.face, i.level)).collect();
    let expected: Vec<(u32, u32)> = (0..6).flat_map(|f| (0..4).map(move |l| (f, l))).collect();
    assert_eq!(order, expected);

    let header = TextureHeader::parse(&memory.bytes()).unwrap();
    assert_eq!(header.kind, TextureKind::Cube);
    assert_eq!(header.face_count(), 6);
}

/// A cube map missing a face is invalid input.
#[test]
fn test_cube_map_missing_face() {
    let data = gradient(8, 8);
    let mut input = InputDescriptor::new();
    input.set_texture_layout(TextureKind::Cube, 8, 8, 1);
    for face in 0..5 {
        input.set_mipmap_data(face, 0, &data);
    }

    let memory = Arc::new(MemoryOutput::new());
    let (sink, kinds) = recording_sink(OutputSink::to_handler(memory.clone()));

    assert!(!Compressor::new().compress(&input, &CompressionProfile::new(), &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::InvalidInput]);
    assert!(memory.is_empty());
}

/// Supplied levels replace generated ones when generation is disabled.
#[test]
fn test_supplied_mip_chain() {
    let levels: Vec<Vec<u8>> = [8u32, 4, 2, 1].iter().map(|&s| gradient(s, s)).collect();
    let mut input = InputDescriptor::new();
    input.set_texture_layout(TextureKind::TwoD, 8, 8, 1);
    input.set_mipmap_generation(false, Some(3));
    for (level, data) in levels.iter().enumerate() {
        input.set_mipmap_data(0, level as u32, data);
    }

    let memory = Arc::new(MemoryOutput::new());
    let report = Compressor::new()
        .try_compress(&input, &CompressionProfile::new(), &OutputSink::to_handler(memory.clone()))
        .unwrap();
    assert_eq!(report.mip_count, 4);
    assert_eq!(memory.images().len(), 4);
}

/// Without generation every declared level must be supplied.
#[test]
fn test_missing_supplied_level() {
    let level0 = gradient(8, 8);
    let mut input = input_2d(&level0, 8, 8);
    input.set_mipmap_generation(false, Some(3));

    let memory = Arc::new(MemoryOutput::new());
    let (sink, kinds) = recording_sink(OutputSink::to_handler(memory.clone()));

    assert!(!Compressor::new().compress(&input, &CompressionProfile::new(), &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::InvalidInput]);
    assert!(memory.is_empty());
}

/// A buffer of the wrong length is invalid input.
#[test]
fn test_wrong_buffer_length() {
    let pixels = gradient(4, 4);
    let input = input_2d(&pixels[..60], 4, 4);

    let (sink, kinds) = recording_sink(OutputSink::to_handler(Arc::new(MemoryOutput::new())));
    assert!(!Compressor::new().compress(&input, &CompressionProfile::new(), &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::InvalidInput]);
}

/// Incompatible format and alpha intent.
#[test]
fn test_unsupported_feature() {
    let pixels = gradient(8, 8);
    let mut input = input_2d(&pixels, 8, 8);
    input.set_alpha_mode(texbake::input::AlphaMode::Premultiplied);
    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Bc5);

    let (sink, kinds) = recording_sink(OutputSink::to_handler(Arc::new(MemoryOutput::new())));
    assert!(!Compressor::new().compress(&input, &profile, &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::UnsupportedFeature]);
}

/// Dual-channel normal maps carry no alpha, so transparency is rejected.
#[test]
fn test_dual_channel_normal_format_rejects_transparency() {
    let pixels = gradient(8, 8);
    let mut input = input_2d(&pixels, 8, 8);
    input.set_alpha_mode(texbake::input::AlphaMode::Transparency);
    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Bc3n);

    let memory = Arc::new(MemoryOutput::new());
    let (sink, kinds) = recording_sink(OutputSink::to_handler(memory.clone()));
    assert!(!Compressor::new().compress(&input, &profile, &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::UnsupportedFeature]);
    assert!(memory.is_empty());
}

/// Volume textures are reported as unsupported.
#[test]
fn test_volume_texture_unsupported() {
    let pixels = [gradient(4, 4), gradient(4, 4)].concat();
    let mut input = InputDescriptor::new();
    input.set_texture_layout(TextureKind::TwoD, 4, 4, 2);
    input.set_mipmap_data(0, 0, &pixels);

    let (sink, kinds) = recording_sink(OutputSink::to_handler(Arc::new(MemoryOutput::new())));
    assert!(!Compressor::new().compress(&input, &CompressionProfile::new(), &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::UnsupportedFeature]);
}

/// An unopenable destination reports FileOpen.
#[test]
fn test_file_open_failure() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing").join("out.dds");

    let pixels = gradient(4, 4);
    let input = input_2d(&pixels, 4, 4);
    let (sink, kinds) = recording_sink(OutputSink::to_file(&path));

    assert!(!Compressor::new().compress(&input, &CompressionProfile::new(), &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::FileOpen]);
}

/// A failing handler reports FileWrite once.
#[test]
fn test_handler_write_failure() {
    let pixels = gradient(16, 16);
    let input = input_2d(&pixels, 16, 16);
    let (sink, kinds) = recording_sink(OutputSink::to_handler(Arc::new(BrokenPipe)));

    assert!(!Compressor::new().compress(&input, &CompressionProfile::new(), &sink));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::FileWrite]);
}

/// A cancelled job stops with UserInterruption.
#[test]
fn test_interruption() {
    let pixels = gradient(16, 16);
    let input = input_2d(&pixels, 16, 16);
    let token = CancellationToken::new();
    token.cancel();

    let memory = Arc::new(MemoryOutput::new());
    let (sink, kinds) = recording_sink(OutputSink::to_handler(memory.clone()));

    let compressor = Compressor::new();
    assert!(!compressor.compress_with_cancellation(&input, &CompressionProfile::new(), &sink, token));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::UserInterruption]);
    assert!(memory.images().is_empty());
}

/// Cancelling from inside the output handler stops the job before the
/// next image is announced.
#[test]
fn test_interruption_mid_job() {
    let pixels = gradient(16, 16);
    let input = input_2d(&pixels, 16, 16);
    let token = CancellationToken::new();
    let handler = Arc::new(CancelOnFirstWrite::new(token.clone()));
    let (sink, kinds) = recording_sink(OutputSink::to_handler(handler.clone()));

    let compressor = Compressor::new();
    assert!(!compressor.compress_with_cancellation(&input, &CompressionProfile::new(), &sink, token));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::UserInterruption]);
    assert!(handler.cancelled.load(Ordering::SeqCst));
    assert_eq!(handler.late_images.load(Ordering::SeqCst), 0);
}

/// A cancelled job leaves the compressor usable for the next one.
#[test]
fn test_compressor_reusable_after_cancelled_job() {
    let pixels = gradient(16, 16);
    let input = input_2d(&pixels, 16, 16);
    let compressor = Compressor::new();

    let token = CancellationToken::new();
    token.cancel();
    let (sink, kinds) = recording_sink(OutputSink::to_handler(Arc::new(MemoryOutput::new())));
    assert!(!compressor.compress_with_cancellation(&input, &CompressionProfile::new(), &sink, token));
    assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::UserInterruption]);

    let memory = Arc::new(MemoryOutput::new());
    let (sink, kinds) = recording_sink(OutputSink::to_handler(memory.clone()));
    assert!(compressor.compress(&input, &CompressionProfile::new(), &sink));
    assert!(kinds.lock().unwrap().is_empty());
    assert_eq!(memory.images().len(), 5);
}

/// Headerless output is exactly the payload.
#[test]
fn test_without_header() {
    let pixels = gradient(16, 8);
    let input = input_2d(&pixels, 16, 8);
    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Bc2);

    let memory = Arc::new(MemoryOutput::new());
    let sink = OutputSink::to_handler(memory.clone()).with_header(false);
    let compressor = Compressor::new();

    assert!(compressor.compress(&input, &profile, &sink));
    assert_eq!(memory.len() as u64, compressor.estimate_size(&input, &profile));
    assert_eq!(compressor.estimate_file_size(&input, &profile, &sink), memory.len() as u64);
    assert_eq!(memory.images()[0].offset, 0);
}

/// Uncompressed output follows the pixel layout.
#[test]
fn test_uncompressed_rgb565() {
    let pixels = gradient(8, 8);
    let input = input_2d(&pixels, 8, 8);
    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Rgb);
    profile.set_pixel_format(16, 0xF800, 0x07E0, 0x001F, 0);

    let memory = Arc::new(MemoryOutput::new());
    let sink = OutputSink::to_handler(memory.clone()).with_header(false);
    let compressor = Compressor::new();

    assert!(compressor.compress(&input, &profile, &sink));
    let images = memory.images();
    assert_eq!(images[0].size, 8 * 2 * 8);
    assert_eq!(memory.len() as u64, compressor.estimate_size(&input, &profile));
}

/// Extent policy resizes level 0 before the chain starts.
#[test]
fn test_max_extent_resizes() {
    let pixels = gradient(64, 32);
    let mut input = input_2d(&pixels, 64, 32);
    input.set_max_extents(Some(16));

    let memory = Arc::new(MemoryOutput::new());
    let report = Compressor::new()
        .try_compress(&input, &CompressionProfile::new(), &OutputSink::to_handler(memory.clone()))
        .unwrap();

    let first = memory.images()[0];
    assert_eq!((first.width, first.height), (16, 8));
    assert_eq!(report.mip_count, 5);
}

/// Height maps convert to normal maps flagged in the header.
#[test]
fn test_height_to_normal_conversion() {
    let pixels = gradient(16, 16);
    let mut input = input_2d(&pixels, 16, 16);
    input.set_convert_to_normal_map(true);
    input.set_normal_filter(1.0, 0.5, 0.25, 0.125);
    let mut profile = CompressionProfile::new();
    profile.set_format(Format::Bc3n);

    let memory = Arc::new(MemoryOutput::new());
    assert!(Compressor::new().compress(&input, &profile, &OutputSink::to_handler(memory.clone())));

    let header = TextureHeader::parse(&memory.bytes()).unwrap();
    assert!(header.is_normal_map);
    assert_eq!(header.mip_count, 5);
}
