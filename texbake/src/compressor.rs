//! Job orchestration.
//!
//! A [`Compressor`] validates a job, walks the mip chain of every face,
//! preprocesses and encodes each level, and streams the result to the
//! output sink. Failures are reported exactly once through the sink's error
//! channel by [`Compressor::compress`], or returned by
//! [`Compressor::try_compress`].
//!
//! Cancellation is per job: the `*_with_cancellation` variants take the
//! token the host uses to stop that one job. It is polled before each mip
//! level, before each encode and before each image is announced.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use texbake::compressor::Compressor;
//! use texbake::input::{InputDescriptor, TextureKind};
//! use texbake::output::{MemoryOutput, OutputSink};
//! use texbake::profile::CompressionProfile;
//!
//! let pixels = [0u8, 0, 255, 255].repeat(16);
//! let mut input = InputDescriptor::new();
//! input.set_texture_layout(TextureKind::TwoD, 4, 4, 1);
//! input.set_mipmap_generation(false, None);
//! input.set_mipmap_data(0, 0, &pixels);
//!
//! let memory = Arc::new(MemoryOutput::new());
//! let sink = OutputSink::to_handler(memory.clone()).with_header(false);
//!
//! let compressor = Compressor::new();
//! assert!(compressor.compress(&input, &CompressionProfile::new(), &sink));
//! assert_eq!(memory.len(), 8);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, trace, warn};

use crate::engine::{EncodingEngine, NativeEngine};
use crate::error::{CompressError, CompressResult};
use crate::format::Format;
use crate::input::InputDescriptor;
use crate::output::{OutputSink, SinkWriter};
use crate::pipeline::{bgra_to_float, to_fixed, JobState, MipChain, Preprocessor, ResolvedJob};
use crate::profile::CompressionProfile;

/// Summary of a successful job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    /// Bytes handed to the destination, header included.
    pub bytes_written: u64,
    pub mip_count: u32,
    pub face_count: u32,
    pub format: Format,
}

/// Source of the `job` field on each job's span.
static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Tracks the state of one running job.
struct JobTracker {
    state: JobState,
    cancellation: CancellationToken,
}

impl JobTracker {
    fn new(cancellation: CancellationToken) -> Self {
        Self {
            state: JobState::Idle,
            cancellation,
        }
    }

    fn check_cancelled(&self) -> CompressResult<()> {
        if self.cancellation.is_cancelled() {
            debug!(state = %self.state, "Cancellation observed");
            return Err(CompressError::Interrupted);
        }
        Ok(())
    }

    fn advance(&mut self, next: JobState) -> CompressResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CompressError::Internal(format!(
                "invalid job transition {} -> {}",
                self.state, next
            )));
        }
        trace!(from = %self.state, to = %next, "Job state");
        self.state = next;
        Ok(())
    }

    fn fail(&mut self) {
        if self.state.can_transition_to(JobState::Failed) {
            debug!(from = %self.state, "Job failed");
            self.state = JobState::Failed;
        }
    }
}

/// Runs compression jobs against an encoding engine.
///
/// A compressor holds no per-job state; one instance can run jobs from
/// several threads at once, and a cancelled job never affects later ones.
#[derive(Clone)]
pub struct Compressor {
    engine: Arc<dyn EncodingEngine>,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Compressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compressor")
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl Compressor {
    /// Compressor backed by the [`NativeEngine`].
    pub fn new() -> Self {
        Self::with_engine(Arc::new(NativeEngine::new()))
    }

    pub fn with_engine(engine: Arc<dyn EncodingEngine>) -> Self {
        Self { engine }
    }

    /// Run a job. Returns true iff every byte was written.
    ///
    /// On failure the sink's error channel receives exactly one error kind.
    pub fn compress(
        &self,
        input: &InputDescriptor<'_>,
        profile: &CompressionProfile,
        output: &OutputSink,
    ) -> bool {
        self.compress_with_cancellation(input, profile, output, CancellationToken::new())
    }

    /// [`Compressor::compress`] stopped early once `cancellation` fires.
    ///
    /// The job fails with [`ErrorKind::UserInterruption`](crate::ErrorKind)
    /// and nothing more is written after the cancellation is observed.
    pub fn compress_with_cancellation(
        &self,
        input: &InputDescriptor<'_>,
        profile: &CompressionProfile,
        output: &OutputSink,
        cancellation: CancellationToken,
    ) -> bool {
        match self.try_compress_with_cancellation(input, profile, output, cancellation) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "Compression failed");
                output.report_error(e.kind());
                false
            }
        }
    }

    /// Run a job, returning the failure instead of reporting it.
    pub fn try_compress(
        &self,
        input: &InputDescriptor<'_>,
        profile: &CompressionProfile,
        output: &OutputSink,
    ) -> CompressResult<JobReport> {
        self.try_compress_with_cancellation(input, profile, output, CancellationToken::new())
    }

    pub fn try_compress_with_cancellation(
        &self,
        input: &InputDescriptor<'_>,
        profile: &CompressionProfile,
        output: &OutputSink,
        cancellation: CancellationToken,
    ) -> CompressResult<JobReport> {
        let job_id = NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed);
        let _span = debug_span!("compress_job", job = job_id, engine = self.engine.name()).entered();

        let mut tracker = JobTracker::new(cancellation);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(&mut tracker, input, profile, output)
        }))
        .unwrap_or_else(|_| Err(CompressError::Internal("encoder panicked".to_string())));

        if result.is_err() {
            tracker.fail();
        }
        result
    }

    fn run(
        &self,
        tracker: &mut JobTracker,
        input: &InputDescriptor<'_>,
        profile: &CompressionProfile,
        output: &OutputSink,
    ) -> CompressResult<JobReport> {
        tracker.advance(JobState::Validating)?;
        let job = ResolvedJob::from_config(input, profile)?;
        job.check_slots(input)?;
        job.check_format()?;
        debug!(
            format = %job.format(),
            width = job.target.0,
            height = job.target.1,
            faces = job.face_count,
            mips = job.mip_count,
            "Job validated"
        );

        let mut writer = SinkWriter::open(output.destination())?;

        let header = job.header();
        let params = job.encode_params();
        let downsample = job.downsample_params();
        let preprocessor = Preprocessor::new(&job.settings);
        let generate = job.settings.mipmaps.enabled;
        let use_supplied = !generate || !job.settings.normal.convert_to_normal_map;

        let mut bytes_written = 0u64;
        let mut header_pending = output.writes_header();

        for face in 0..job.face_count {
            tracker.advance(JobState::GeneratingMips)?;

            let level0 = input
                .mipmap_data(face, 0)
                .ok_or(CompressError::MissingMipmap { face, level: 0 })?;
            let mut base = bgra_to_float(level0, job.source.0, job.source.1)?;
            if job.needs_resize() {
                debug!(
                    face = face,
                    from = ?job.source,
                    to = ?job.target,
                    "Resizing base level"
                );
                base = self.engine.resize(&base, job.target.0, job.target.1, &downsample)?;
            }

            let supplied = (0..job.mip_count)
                .map(|level| {
                    if level > 0 && use_supplied {
                        job.supplied_level(input, face, level)
                    } else {
                        None
                    }
                })
                .collect();

            let chain = MipChain::new(self.engine.as_ref(), downsample, face, base, supplied, generate);

            for (index, produced) in chain.enumerate() {
                if index > 0 {
                    tracker.advance(JobState::GeneratingMips)?;
                }
                tracker.check_cancelled()?;
                let (level, mut image) = produced?;

                tracker.advance(JobState::Preprocessing)?;
                preprocessor.apply(&mut image);
                let fixed = to_fixed(&image, &job.settings);

                tracker.check_cancelled()?;
                tracker.advance(JobState::Encoding)?;
                let encoded = self.engine.encode(&fixed, &params)?;

                tracker.advance(JobState::Writing)?;
                if header_pending {
                    let bytes = self.engine.header(&header)?;
                    writer.write(&bytes)?;
                    bytes_written += bytes.len() as u64;
                    header_pending = false;
                }

                tracker.check_cancelled()?;
                let extents = (fixed.width(), fixed.height(), 1);
                writer.begin_image(encoded.len() as u64, extents, face, level);
                writer.write(&encoded)?;
                bytes_written += encoded.len() as u64;
                trace!(face = face, level = level, bytes = encoded.len(), "Level written");
            }
        }

        writer.finish()?;
        tracker.advance(JobState::Done)?;

        info!(
            format = %job.format(),
            width = job.target.0,
            height = job.target.1,
            faces = job.face_count,
            mips = job.mip_count,
            bytes = bytes_written,
            "Compression complete"
        );

        Ok(JobReport {
            bytes_written,
            mip_count: job.mip_count,
            face_count: job.face_count,
            format: job.format(),
        })
    }

    /// Payload bytes the job would produce, header excluded.
    ///
    /// Does no encoding or I/O. An invalid layout estimates 0.
    pub fn estimate_size(&self, input: &InputDescriptor<'_>, profile: &CompressionProfile) -> u64 {
        let job = match ResolvedJob::from_config(input, profile) {
            Ok(job) => job,
            Err(_) => return 0,
        };

        let (width, height, depth) = job.target;
        let per_face = self.engine.estimate_encoded_size(
            job.format(),
            &job.profile.pixel_layout(),
            width,
            height,
            depth,
            job.mip_count,
        );
        per_face * job.face_count as u64
    }

    /// [`Compressor::estimate_size`] plus the header, when `output` writes one.
    pub fn estimate_file_size(
        &self,
        input: &InputDescriptor<'_>,
        profile: &CompressionProfile,
        output: &OutputSink,
    ) -> u64 {
        let payload = self.estimate_size(input, profile);
        if payload == 0 || !output.writes_header() {
            return payload;
        }
        match ResolvedJob::from_config(input, profile) {
            Ok(job) => payload + self.engine.header_size(&job.header()),
            Err(_) => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DownsampleParams, EncodeParams, EngineError, FloatImage, TextureHeader};
    use crate::error::ErrorKind;
    use crate::format::PixelLayout;
    use crate::input::TextureKind;
    use crate::output::MemoryOutput;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn solid(width: u32, height: u32) -> Vec<u8> {
        [40u8, 80, 160, 255].repeat((width * height) as usize)
    }

    fn input_with<'a>(pixels: &'a [u8], width: u32, height: u32) -> InputDescriptor<'a> {
        let mut input = InputDescriptor::new();
        input.set_texture_layout(TextureKind::TwoD, width, height, 1);
        input.set_mipmap_data(0, 0, pixels);
        input
    }

    fn counting_sink(memory: Arc<MemoryOutput>) -> (OutputSink, Arc<Mutex<Vec<ErrorKind>>>) {
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&kinds);
        let sink = OutputSink::to_handler(memory).with_error_handler(move |kind| {
            seen.lock().unwrap().push(kind);
        });
        (sink, kinds)
    }

    /// Engine whose encoder always reports a backend failure.
    struct FailingEngine {
        inner: NativeEngine,
        encodes: AtomicUsize,
    }

    impl EncodingEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        fn downsample(&self, image: &FloatImage, params: &DownsampleParams) -> Result<FloatImage, EngineError> {
            self.inner.downsample(image, params)
        }

        fn resize(
            &self,
            image: &FloatImage,
            width: u32,
            height: u32,
            params: &DownsampleParams,
        ) -> Result<FloatImage, EngineError> {
            self.inner.resize(image, width, height, params)
        }

        fn encode(&self, _image: &RgbaImage, _params: &EncodeParams) -> Result<Vec<u8>, EngineError> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Backend("device lost".to_string()))
        }

        fn estimate_encoded_size(
            &self,
            format: Format,
            layout: &PixelLayout,
            width: u32,
            height: u32,
            depth: u32,
            mip_count: u32,
        ) -> u64 {
            self.inner
                .estimate_encoded_size(format, layout, width, height, depth, mip_count)
        }

        fn header(&self, header: &TextureHeader) -> Result<Vec<u8>, EngineError> {
            self.inner.header(header)
        }

        fn header_size(&self, header: &TextureHeader) -> u64 {
            self.inner.header_size(header)
        }
    }

    #[test]
    fn test_single_block_with_header() {
        let pixels = solid(4, 4);
        let mut input = input_with(&pixels, 4, 4);
        input.set_mipmap_generation(false, None);

        let memory = Arc::new(MemoryOutput::new());
        let (sink, kinds) = counting_sink(memory.clone());

        let report = Compressor::new()
            .try_compress(&input, &CompressionProfile::new(), &sink)
            .unwrap();

        assert_eq!(report.bytes_written, 128 + 8);
        assert_eq!(report.mip_count, 1);
        assert_eq!(report.face_count, 1);
        assert_eq!(memory.len(), 136);
        assert!(kinds.lock().unwrap().is_empty());
    }

    #[test]
    fn test_full_chain_is_written() {
        let pixels = solid(16, 16);
        let input = input_with(&pixels, 16, 16);
        let memory = Arc::new(MemoryOutput::new());
        let sink = OutputSink::to_handler(memory.clone()).with_header(false);

        let report = Compressor::new()
            .try_compress(&input, &CompressionProfile::new(), &sink)
            .unwrap();

        // 16, 8, 4, 2, 1
        assert_eq!(report.mip_count, 5);
        let levels: Vec<u32> = memory.images().iter().map(|i| i.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);
        assert_eq!(memory.len(), (16 + 4 + 1 + 1 + 1) * 8);
    }

    #[test]
    fn test_invalid_layout_reports_once() {
        let memory = Arc::new(MemoryOutput::new());
        let (sink, kinds) = counting_sink(memory.clone());

        let ok = Compressor::new().compress(&InputDescriptor::new(), &CompressionProfile::new(), &sink);

        assert!(!ok);
        assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::InvalidInput]);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_backend_failure_maps_to_cuda_error() {
        let pixels = solid(8, 8);
        let input = input_with(&pixels, 8, 8);
        let engine = Arc::new(FailingEngine {
            inner: NativeEngine::new(),
            encodes: AtomicUsize::new(0),
        });

        let memory = Arc::new(MemoryOutput::new());
        let (sink, kinds) = counting_sink(memory.clone());

        let compressor = Compressor::with_engine(engine.clone());
        assert!(!compressor.compress(&input, &CompressionProfile::new(), &sink));
        assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::CudaError]);
        // First failure aborts the job
        assert_eq!(engine.encodes.load(Ordering::SeqCst), 1);
        assert!(memory.images().is_empty());
    }

    #[test]
    fn test_cancelled_token_interrupts() {
        let pixels = solid(8, 8);
        let input = input_with(&pixels, 8, 8);
        let token = CancellationToken::new();
        token.cancel();

        let memory = Arc::new(MemoryOutput::new());
        let (sink, kinds) = counting_sink(memory.clone());

        let compressor = Compressor::new();
        assert!(!compressor.compress_with_cancellation(&input, &CompressionProfile::new(), &sink, token));
        assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::UserInterruption]);
    }

    #[test]
    fn test_cancelled_job_does_not_poison_compressor() {
        let pixels = solid(8, 8);
        let input = input_with(&pixels, 8, 8);
        let compressor = Compressor::new();

        let token = CancellationToken::new();
        token.cancel();
        let err = compressor
            .try_compress_with_cancellation(&input, &CompressionProfile::new(), &OutputSink::to_handler(Arc::new(MemoryOutput::new())), token)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserInterruption);

        let memory = Arc::new(MemoryOutput::new());
        let report = compressor
            .try_compress(&input, &CompressionProfile::new(), &OutputSink::to_handler(memory.clone()))
            .unwrap();
        assert_eq!(report.mip_count, 4);
        assert_eq!(memory.images().len(), 4);
    }

    #[test]
    fn test_unsupported_combination() {
        let pixels = solid(4, 4);
        let mut input = input_with(&pixels, 4, 4);
        input.set_alpha_mode(crate::input::AlphaMode::Transparency);
        let mut profile = CompressionProfile::new();
        profile.set_format(Format::Bc4);

        let err = Compressor::new()
            .try_compress(&input, &profile, &OutputSink::to_handler(Arc::new(MemoryOutput::new())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn test_estimate_matches_output() {
        let pixels = solid(32, 16);
        let input = input_with(&pixels, 32, 16);
        let mut profile = CompressionProfile::new();
        profile.set_format(Format::Bc3);

        let memory = Arc::new(MemoryOutput::new());
        let sink = OutputSink::to_handler(memory.clone());
        let compressor = Compressor::new();

        assert!(compressor.compress(&input, &profile, &sink));
        assert_eq!(
            compressor.estimate_file_size(&input, &profile, &sink),
            memory.len() as u64
        );
        assert_eq!(
            compressor.estimate_size(&input, &profile) + 128,
            memory.len() as u64
        );
    }

    #[test]
    fn test_estimate_invalid_layout_is_zero() {
        let compressor = Compressor::new();
        let sink = OutputSink::to_file("unused.dds");
        assert_eq!(compressor.estimate_size(&InputDescriptor::new(), &CompressionProfile::new()), 0);
        assert_eq!(
            compressor.estimate_file_size(&InputDescriptor::new(), &CompressionProfile::new(), &sink),
            0
        );
    }

    #[test]
    fn test_tracker_rejects_skipped_states() {
        let mut tracker = JobTracker::new(CancellationToken::new());
        assert!(tracker.advance(JobState::Encoding).is_err());
        assert!(tracker.check_cancelled().is_ok());
        tracker.advance(JobState::Validating).unwrap();
        tracker.fail();
        assert_eq!(tracker.state, JobState::Failed);
    }

    #[test]
    fn test_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Compressor>();
    }
}
