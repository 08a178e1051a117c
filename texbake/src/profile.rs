//! Compression profile: target format, quality and quantization policy.

use crate::format::{ColorWeights, Format, PixelLayout, Quality, Quantization};

/// What the encoder should produce.
///
/// Setters are independent; no combination is rejected here. Incompatible
/// combinations (BC4 with transparency, for example) surface as
/// `UnsupportedFeature` when a job starts.
///
/// # Example
///
/// ```
/// use texbake::format::{Format, Quality};
/// use texbake::profile::CompressionProfile;
///
/// let mut profile = CompressionProfile::new();
/// profile.set_format("DXT5".parse().unwrap());
/// profile.set_quality(Quality::Production);
///
/// assert_eq!(profile.format(), Format::Bc3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompressionProfile {
    format: Format,
    quality: Quality,
    weights: ColorWeights,
    pixel_layout: PixelLayout,
    quantization: Quantization,
}

impl CompressionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore every field to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn set_color_weights(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.weights = ColorWeights::new(red, green, blue, alpha);
    }

    /// Pixel layout used when the format is [`Format::Rgb`].
    pub fn set_pixel_format(&mut self, bit_count: u32, r_mask: u32, g_mask: u32, b_mask: u32, a_mask: u32) {
        self.pixel_layout = PixelLayout::new(bit_count, r_mask, g_mask, b_mask, a_mask);
    }

    pub fn set_pixel_layout(&mut self, layout: PixelLayout) {
        self.pixel_layout = layout;
    }

    pub fn set_quantization(&mut self, color_dithering: bool, alpha_dithering: bool, binary_alpha: bool) {
        self.quantization.color_dithering = color_dithering;
        self.quantization.alpha_dithering = alpha_dithering;
        self.quantization.binary_alpha = binary_alpha;
    }

    /// Threshold for binary alpha: values above it become opaque.
    pub fn set_alpha_threshold(&mut self, threshold: u8) {
        self.quantization.alpha_threshold = threshold;
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn color_weights(&self) -> ColorWeights {
        self.weights
    }

    pub fn pixel_layout(&self) -> PixelLayout {
        self.pixel_layout
    }

    pub fn quantization(&self) -> Quantization {
        self.quantization
    }
}
