//! Encoding engine abstraction.
//!
//! The compressor drives a job through the [`EncodingEngine`] trait so that
//! the block encoders, resampling filters and container header can be
//! swapped without touching the pipeline.
//!
//! ```text
//! ┌─────────────────────┐
//! │     Compressor      │
//! │                     │
//! │ Arc<dyn EncodingEngine>
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   EncodingEngine    │ (trait)
//! └──────────┬──────────┘
//!            │
//!       ┌────┴────┐
//!       ▼         ▼
//! ┌──────────┐ ┌──────────┐
//! │  Native  │ │  Other   │
//! │  Engine  │ │ Backends │
//! └──────────┘ └──────────┘
//! ```
//!
//! Engines only ever see resolved snapshots ([`DownsampleParams`],
//! [`EncodeParams`], [`TextureHeader`]) built from a validated job.
//!
//! # Available Engines
//!
//! - [`NativeEngine`] - CPU block encoders, separable filters and a
//!   DDS-style header
//!
//! # Errors
//!
//! Engine methods return [`EngineError`]; the compressor maps
//! [`EngineError::Unsupported`] to `UnsupportedFeature`,
//! [`EngineError::Backend`] to `CudaError` and everything else to `Unknown`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use texbake::engine::{EncodingEngine, NativeEngine};
//! use texbake::format::{Format, PixelLayout};
//!
//! let engine: Arc<dyn EncodingEngine> = Arc::new(NativeEngine::new());
//!
//! // 4×4 BC1 with no mipmaps is a single 8-byte block
//! let size = engine.estimate_encoded_size(Format::Bc1, &PixelLayout::default(), 4, 4, 1, 1);
//! assert_eq!(size, 8);
//! ```

mod bc;
mod filter;
mod header;
mod native;
mod quantize;
mod rgb;

use image::{Rgba32FImage, RgbaImage};
use thiserror::Error;

use crate::format::{ColorWeights, Format, PixelLayout, Quality, Quantization};
use crate::input::{KaiserParams, MipFilter, TextureKind, WrapMode};

pub(crate) use filter::wrap_index;
pub use header::{HeaderError, HEADER_SIZE};
pub use native::NativeEngine;

/// Linear-light RGBA image used between mip generation and encoding.
pub type FloatImage = Rgba32FImage;

/// Errors reported by an encoding engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine cannot produce the requested output.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An accelerated backend failed.
    #[error("backend failure: {0}")]
    Backend(String),

    /// Any other failure inside the engine.
    #[error("{0}")]
    Internal(String),
}

/// Resampling parameters for one job.
///
/// Shared by mip generation and the extent-rounding resize, so both use
/// the same filter and edge handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownsampleParams {
    pub filter: MipFilter,
    /// Edge handling for taps that fall outside the image.
    pub wrap: WrapMode,
    /// Window parameters, read only by [`MipFilter::Kaiser`].
    pub kaiser: KaiserParams,
    /// Weight color contributions by alpha.
    pub alpha_weighted: bool,
}

impl Default for DownsampleParams {
    fn default() -> Self {
        Self {
            filter: MipFilter::Box,
            wrap: WrapMode::Mirror,
            kaiser: KaiserParams::default(),
            alpha_weighted: false,
        }
    }
}

/// Encoding parameters for one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    pub format: Format,
    /// Speed/quality tier; controls endpoint refinement passes.
    pub quality: Quality,
    /// Per-channel weights of the block error metric.
    pub weights: ColorWeights,
    /// Dithering and binary alpha applied before encoding.
    pub quantization: Quantization,
    /// Bit layout for [`Format::Rgb`]; ignored by block formats.
    pub pixel_layout: PixelLayout,
}

impl EncodeParams {
    /// Parameters for `format` with default quality, weights, quantization
    /// and pixel layout.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            quality: Quality::default(),
            weights: ColorWeights::default(),
            quantization: Quantization::default(),
            pixel_layout: PixelLayout::default(),
        }
    }
}

/// Container header description.
///
/// Extents are those of the top level after any extent rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureHeader {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Levels per face, top level included.
    pub mip_count: u32,
    pub format: Format,
    pub pixel_layout: PixelLayout,
    pub is_normal_map: bool,
}

impl TextureHeader {
    pub fn face_count(&self) -> u32 {
        self.kind.face_count()
    }

    /// Parse a serialized header. See [`NativeEngine::header`].
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError`] when `bytes` is shorter than [`HEADER_SIZE`],
    /// lacks the magic, or names a pixel format no [`Format`] maps to.
    pub fn parse(bytes: &[u8]) -> Result<TextureHeader, HeaderError> {
        header::parse(bytes)
    }
}

/// Encoding engine used by the compressor.
///
/// Implementations must be deterministic: the same image and parameters
/// always produce the same bytes, whatever the degree of parallelism.
pub trait EncodingEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Produce the next mip level: each dimension halved, minimum 1.
    ///
    /// # Arguments
    ///
    /// * `image` - Linear-light source level
    /// * `params` - Filter, wrap mode and alpha weighting for the job
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] for an empty image.
    fn downsample(
        &self,
        image: &FloatImage,
        params: &DownsampleParams,
    ) -> Result<FloatImage, EngineError>;

    /// Resample to arbitrary extents.
    ///
    /// Used once per face when extent rounding or the maximum extent changes
    /// the top level size. `width` and `height` are at least 1.
    fn resize(
        &self,
        image: &FloatImage,
        width: u32,
        height: u32,
        params: &DownsampleParams,
    ) -> Result<FloatImage, EngineError>;

    /// Encode one whole level.
    ///
    /// The image holds the preprocessed 8-bit pixels of one (face, level);
    /// quantization from `params` is applied here. Block formats pad partial edge blocks by replication; the returned
    /// length always matches [`EncodingEngine::estimate_encoded_size`] for a
    /// single level of the same extents.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unsupported`] when the pixel layout cannot be
    /// packed, [`EngineError::Backend`] when an accelerated backend fails,
    /// and [`EngineError::Internal`] for an empty image.
    fn encode(&self, image: &RgbaImage, params: &EncodeParams) -> Result<Vec<u8>, EngineError>;

    /// Payload bytes of one face for `mip_count` levels starting at the given
    /// extents.
    ///
    /// # Arguments
    ///
    /// * `format` - Target format
    /// * `layout` - Pixel layout, read only for [`Format::Rgb`]
    /// * `width`, `height`, `depth` - Top level extents
    /// * `mip_count` - Number of levels, each halving the previous one
    fn estimate_encoded_size(
        &self,
        format: Format,
        layout: &PixelLayout,
        width: u32,
        height: u32,
        depth: u32,
        mip_count: u32,
    ) -> u64;

    /// Serialize a container header.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unsupported`] if the header cannot describe
    /// the texture.
    fn header(&self, header: &TextureHeader) -> Result<Vec<u8>, EngineError>;

    /// Length of the bytes [`EncodingEngine::header`] returns.
    fn header_size(&self, header: &TextureHeader) -> u64;
}
