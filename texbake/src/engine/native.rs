//! CPU encoding engine.

use image::{ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::engine::bc::{self, Block};
use crate::engine::{
    filter, header, quantize, rgb, DownsampleParams, EncodeParams, EncodingEngine, EngineError,
    FloatImage, TextureHeader,
};
use crate::format::{Format, PixelLayout, Quality};

/// Encoding engine running entirely on the CPU.
///
/// Block rows are encoded in parallel with rayon and collected in order, so
/// output bytes never depend on scheduling. At [`Quality::Fastest`] BC1 and
/// BC3 go through the ISPC kernels of `intel_tex_2`; every other
/// combination uses the built-in block encoders.
///
/// # Example
///
/// ```
/// use image::RgbaImage;
/// use texbake::engine::{EncodeParams, EncodingEngine, NativeEngine};
/// use texbake::format::Format;
///
/// let engine = NativeEngine::new();
/// let image = RgbaImage::new(8, 8);
///
/// let bytes = engine.encode(&image, &EncodeParams::new(Format::Bc3)).unwrap();
/// assert_eq!(bytes.len(), 4 * 16);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NativeEngine;

impl NativeEngine {
    /// Create the CPU engine. It holds no state; rayon's global pool runs
    /// the block rows.
    pub fn new() -> Self {
        Self
    }

    fn encode_blocks(image: &RgbaImage, params: &EncodeParams) -> Vec<u8> {
        let blocks_wide = image.width().div_ceil(4);
        let blocks_high = image.height().div_ceil(4);
        let passes = params.quality.refinement_passes();
        let weights = params.weights;
        let format = params.format;

        let rows: Vec<Vec<u8>> = (0..blocks_high)
            .into_par_iter()
            .map(|block_y| {
                let mut row = Vec::new();
                for block_x in 0..blocks_wide {
                    let block = extract_block(image, block_x, block_y);
                    match format {
                        Format::Bc1 => {
                            row.extend_from_slice(&bc::encode_bc1(&block, &weights, passes, false))
                        }
                        Format::Bc1a => {
                            row.extend_from_slice(&bc::encode_bc1(&block, &weights, passes, true))
                        }
                        Format::Bc2 => row.extend_from_slice(&bc::encode_bc2(&block, &weights, passes)),
                        Format::Bc3 | Format::Bc3n => {
                            row.extend_from_slice(&bc::encode_bc3(&block, &weights, passes))
                        }
                        Format::Bc4 => row.extend_from_slice(&bc::encode_bc4(&block, passes)),
                        Format::Bc5 => row.extend_from_slice(&bc::encode_bc5(&block, passes)),
                        Format::Rgb => {}
                    }
                }
                row
            })
            .collect();

        rows.concat()
    }

    /// ISPC path for the fastest tier.
    fn encode_ispc(image: &RgbaImage, format: Format) -> Vec<u8> {
        let padded = pad_to_blocks(image);
        let surface = intel_tex_2::RgbaSurface {
            data: padded.as_raw(),
            width: padded.width(),
            height: padded.height(),
            stride: padded.width() * 4,
        };
        match format {
            Format::Bc3 => intel_tex_2::bc3::compress_blocks(&surface),
            _ => intel_tex_2::bc1::compress_blocks(&surface),
        }
    }
}

/// Extract a 4×4 block, replicating the last row and column past the edge.
fn extract_block(image: &RgbaImage, block_x: u32, block_y: u32) -> Block {
    let mut block = [[0u8; 4]; 16];
    let max_x = image.width() - 1;
    let max_y = image.height() - 1;

    for y in 0..4 {
        for x in 0..4 {
            let px = (block_x * 4 + x).min(max_x);
            let py = (block_y * 4 + y).min(max_y);
            block[(y * 4 + x) as usize] = image.get_pixel(px, py).0;
        }
    }
    block
}

/// Copy of `image` grown to a multiple of 4 by edge replication.
fn pad_to_blocks(image: &RgbaImage) -> RgbaImage {
    let width = image.width().div_ceil(4) * 4;
    let height = image.height().div_ceil(4) * 4;
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    let max_x = image.width() - 1;
    let max_y = image.height() - 1;
    ImageBuffer::from_fn(width, height, |x, y| *image.get_pixel(x.min(max_x), y.min(max_y)))
}

/// Move red into alpha and clear red and blue, leaving x in alpha and y in
/// green for the BC3 normal-map layout.
fn swizzle_normal(image: &mut RgbaImage) {
    for p in image.pixels_mut() {
        let [r, g, _, _] = p.0;
        *p = Rgba([0, g, 0, r]);
    }
}

impl EncodingEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn downsample(
        &self,
        image: &FloatImage,
        params: &DownsampleParams,
    ) -> Result<FloatImage, EngineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::Internal("cannot downsample an empty image".to_string()));
        }
        Ok(filter::downsample(image, params))
    }

    fn resize(
        &self,
        image: &FloatImage,
        width: u32,
        height: u32,
        params: &DownsampleParams,
    ) -> Result<FloatImage, EngineError> {
        if image.width() == 0 || image.height() == 0 || width == 0 || height == 0 {
            return Err(EngineError::Internal(format!(
                "cannot resize {}×{} to {}×{}",
                image.width(),
                image.height(),
                width,
                height
            )));
        }
        Ok(filter::resample(image, width, height, params))
    }

    fn encode(&self, image: &RgbaImage, params: &EncodeParams) -> Result<Vec<u8>, EngineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::Internal("cannot encode an empty image".to_string()));
        }

        let mut image = image.clone();
        quantize::apply(
            &mut image,
            params.format,
            &params.pixel_layout,
            &params.quantization,
        );

        match params.format {
            Format::Rgb => {
                if !params.pixel_layout.is_valid() {
                    return Err(EngineError::Unsupported(format!(
                        "pixel layout with {} bits per pixel",
                        params.pixel_layout.bit_count
                    )));
                }
                Ok(rgb::pack(&image, &params.pixel_layout))
            }
            Format::Bc1 | Format::Bc3 if params.quality == Quality::Fastest => {
                Ok(Self::encode_ispc(&image, params.format))
            }
            Format::Bc3n => {
                swizzle_normal(&mut image);
                Ok(Self::encode_blocks(&image, params))
            }
            _ => Ok(Self::encode_blocks(&image, params)),
        }
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
        let mut total = 0u64;
        for level in 0..mip_count {
            let w = (width >> level.min(31)).max(1) as u64;
            let h = (height >> level.min(31)).max(1);
            let d = (depth >> level.min(31)).max(1) as u64;

            total += match format.block_size() {
                Some(block) => {
                    w.div_ceil(4) * (h as u64).div_ceil(4) * d * block as u64
                }
                None => layout.pitch(w as u32) * h as u64 * d,
            };
        }
        total
    }

    fn header(&self, header: &TextureHeader) -> Result<Vec<u8>, EngineError> {
        if header.width == 0 || header.height == 0 {
            return Err(EngineError::Internal("header for an empty texture".to_string()));
        }
        Ok(header::to_bytes(header))
    }

    fn header_size(&self, _header: &TextureHeader) -> u64 {
        header::HEADER_SIZE as u64
    }
}
