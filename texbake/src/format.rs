//! Output format types shared by the profile, the engine and the container
//! header.
//!
//! Legacy format names (`DXT1`, `DXT5n`, `ATI2`, ...) are resolved to one
//! canonical [`Format`] when parsed. Nothing past the configuration boundary
//! ever sees an alias.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Target encoding of a compression job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Uncompressed pixels packed per the profile's [`PixelLayout`].
    Rgb,
    /// BC1/DXT1: 8 bytes per 4×4 block, opaque.
    #[default]
    Bc1,
    /// BC1/DXT1 with 1-bit alpha.
    Bc1a,
    /// BC2/DXT3: explicit 4-bit alpha.
    Bc2,
    /// BC3/DXT5: interpolated alpha.
    Bc3,
    /// BC3 holding a two-channel normal map (x in alpha, y in green).
    Bc3n,
    /// BC4/ATI1: single channel.
    Bc4,
    /// BC5/ATI2: two channels.
    Bc5,
}

/// Error returned when a format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown texture format: {0}")]
pub struct ParseFormatError(pub String);

impl Format {
    /// Every canonical format.
    pub const ALL: [Format; 8] = [
        Format::Rgb,
        Format::Bc1,
        Format::Bc1a,
        Format::Bc2,
        Format::Bc3,
        Format::Bc3n,
        Format::Bc4,
        Format::Bc5,
    ];

    /// Bytes per 4×4 block, or `None` for uncompressed output.
    pub fn block_size(self) -> Option<u32> {
        match self {
            Format::Rgb => None,
            Format::Bc1 | Format::Bc1a | Format::Bc4 => Some(8),
            Format::Bc2 | Format::Bc3 | Format::Bc3n | Format::Bc5 => Some(16),
        }
    }

    /// Whether the format is block compressed.
    pub fn is_block_compressed(self) -> bool {
        self.block_size().is_some()
    }

    /// Number of color channels the format stores.
    pub fn channel_count(self) -> u32 {
        match self {
            Format::Bc4 => 1,
            Format::Bc5 | Format::Bc3n => 2,
            Format::Bc1 => 3,
            Format::Rgb | Format::Bc1a | Format::Bc2 | Format::Bc3 => 4,
        }
    }

    /// Stable numeric tag used by the container header.
    pub fn tag(self) -> u32 {
        match self {
            Format::Rgb => 1,
            Format::Bc1 => 2,
            Format::Bc1a => 3,
            Format::Bc2 => 4,
            Format::Bc3 => 5,
            Format::Bc3n => 6,
            Format::Bc4 => 7,
            Format::Bc5 => 8,
        }
    }

    /// Inverse of [`Format::tag`].
    pub fn from_tag(tag: u32) -> Option<Format> {
        Format::ALL.into_iter().find(|f| f.tag() == tag)
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Format::Rgb => "RGB",
            Format::Bc1 => "BC1",
            Format::Bc1a => "BC1a",
            Format::Bc2 => "BC2",
            Format::Bc3 => "BC3",
            Format::Bc3n => "BC3n",
            Format::Bc4 => "BC4",
            Format::Bc5 => "BC5",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" | "rgba" | "uncompressed" => Ok(Format::Rgb),
            "bc1" | "dxt1" => Ok(Format::Bc1),
            "bc1a" | "dxt1a" => Ok(Format::Bc1a),
            "bc2" | "dxt3" => Ok(Format::Bc2),
            "bc3" | "dxt5" => Ok(Format::Bc3),
            "bc3n" | "dxt5n" => Ok(Format::Bc3n),
            "bc4" | "ati1" => Ok(Format::Bc4),
            "bc5" | "ati2" | "3dc" => Ok(Format::Bc5),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

/// Encoder search effort. Never changes the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Quality {
    Fastest,
    #[default]
    Normal,
    Production,
    Highest,
}

impl Quality {
    /// Endpoint refinement passes the block encoder runs at this tier.
    pub fn refinement_passes(self) -> u32 {
        match self {
            Quality::Fastest => 0,
            Quality::Normal => 1,
            Quality::Production => 3,
            Quality::Highest => 8,
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(Quality::Fastest),
            "normal" => Ok(Quality::Normal),
            "production" => Ok(Quality::Production),
            "highest" => Ok(Quality::Highest),
            other => Err(format!("unknown quality: {}", other)),
        }
    }
}

/// Per-channel weights of the encoder's error metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorWeights {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl ColorWeights {
    pub fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

impl Default for ColorWeights {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }
}

/// Bit layout of an uncompressed output pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelLayout {
    pub bit_count: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

impl PixelLayout {
    pub fn new(bit_count: u32, r_mask: u32, g_mask: u32, b_mask: u32, a_mask: u32) -> Self {
        Self {
            bit_count,
            r_mask,
            g_mask,
            b_mask,
            a_mask,
        }
    }

    /// Build a layout from channel widths, alpha in the lowest bits and red
    /// in the highest.
    ///
    /// Widths adding up to more than 32 bits yield a layout with empty
    /// masks, which [`is_valid`](Self::is_valid) rejects.
    pub fn from_sizes(r_size: u32, g_size: u32, b_size: u32, a_size: u32) -> Self {
        let total = r_size
            .checked_add(g_size)
            .and_then(|sum| sum.checked_add(b_size))
            .and_then(|sum| sum.checked_add(a_size));
        let bit_count = match total {
            Some(bits) if bits <= 32 => bits,
            _ => {
                let saturated = r_size
                    .saturating_add(g_size)
                    .saturating_add(b_size)
                    .saturating_add(a_size);
                return Self::new(saturated, 0, 0, 0, 0);
            }
        };

        let a_shift = 0;
        let b_shift = a_shift + a_size;
        let g_shift = b_shift + b_size;
        let r_shift = g_shift + g_size;

        Self {
            bit_count,
            r_mask: mask_of(r_size, r_shift),
            g_mask: mask_of(g_size, g_shift),
            b_mask: mask_of(b_size, b_shift),
            a_mask: mask_of(a_size, a_shift),
        }
    }

    /// Masks in r, g, b, a order.
    pub fn masks(&self) -> [u32; 4] {
        [self.r_mask, self.g_mask, self.b_mask, self.a_mask]
    }

    /// Bytes per stored pixel.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.bit_count.div_ceil(8)
    }

    /// Row pitch in bytes, aligned to 32 bits.
    pub fn pitch(&self, width: u32) -> u64 {
        let bytes = width as u64 * self.bytes_per_pixel() as u64;
        bytes.div_ceil(4) * 4
    }

    /// Whether the layout can be packed: a byte-multiple bit count up to 32
    /// and disjoint masks that fit inside it.
    pub fn is_valid(&self) -> bool {
        if !matches!(self.bit_count, 8 | 16 | 24 | 32) {
            return false;
        }

        let limit = if self.bit_count == 32 {
            u32::MAX
        } else {
            (1u32 << self.bit_count) - 1
        };

        let mut seen = 0u32;
        for mask in self.masks() {
            if mask & !limit != 0 || mask & seen != 0 {
                return false;
            }
            seen |= mask;
        }

        seen != 0
    }
}

impl Default for PixelLayout {
    /// A8R8G8B8.
    fn default() -> Self {
        Self::new(32, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000)
    }
}

fn mask_of(size: u32, shift: u32) -> u32 {
    if size == 0 {
        0
    } else if size >= 32 {
        u32::MAX
    } else {
        ((1u32 << size) - 1) << shift
    }
}

/// Shift and width of a contiguous channel mask.
pub fn mask_shift_and_size(mask: u32) -> (u32, u32) {
    if mask == 0 {
        return (0, 0);
    }
    let shift = mask.trailing_zeros();
    let size = (mask >> shift).trailing_ones();
    (shift, size)
}

/// Quantization applied to pixels before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantization {
    pub color_dithering: bool,
    pub alpha_dithering: bool,
    pub binary_alpha: bool,
    pub alpha_threshold: u8,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            color_dithering: false,
            alpha_dithering: false,
            binary_alpha: false,
            alpha_threshold: 127,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_canonical() {
        assert_eq!("DXT1".parse::<Format>().unwrap(), Format::Bc1);
        assert_eq!("dxt1a".parse::<Format>().unwrap(), Format::Bc1a);
        assert_eq!("DXT3".parse::<Format>().unwrap(), Format::Bc2);
        assert_eq!("DXT5".parse::<Format>().unwrap(), Format::Bc3);
        assert_eq!("DXT5n".parse::<Format>().unwrap(), Format::Bc3n);
        assert_eq!("ATI2".parse::<Format>().unwrap(), Format::Bc5);
        assert_eq!("RGBA".parse::<Format>().unwrap(), Format::Rgb);
        assert_eq!(" bc4 ".parse::<Format>().unwrap(), Format::Bc4);
    }

    #[test]
    fn test_unknown_format() {
        let err = "BC7".parse::<Format>().unwrap_err();
        assert_eq!(err.to_string(), "unknown texture format: BC7");
    }

    #[test]
    fn test_block_sizes() {
        assert_eq!(Format::Bc1.block_size(), Some(8));
        assert_eq!(Format::Bc1a.block_size(), Some(8));
        assert_eq!(Format::Bc4.block_size(), Some(8));
        assert_eq!(Format::Bc2.block_size(), Some(16));
        assert_eq!(Format::Bc3.block_size(), Some(16));
        assert_eq!(Format::Bc3n.block_size(), Some(16));
        assert_eq!(Format::Bc5.block_size(), Some(16));
        assert_eq!(Format::Rgb.block_size(), None);
    }

    #[test]
    fn test_tag_roundtrip() {
        for format in Format::ALL {
            assert_eq!(Format::from_tag(format.tag()), Some(format));
        }
        assert_eq!(Format::from_tag(0), None);
    }

    #[test]
    fn test_display_uses_canonical_name() {
        let format: Format = "DXT5".parse().unwrap();
        assert_eq!(format.to_string(), "BC3");
    }

    #[test]
    fn test_quality_parse_and_order() {
        assert_eq!("production".parse::<Quality>(), Ok(Quality::Production));
        assert!(Quality::Fastest < Quality::Highest);
        assert!("slow".parse::<Quality>().is_err());
    }

    #[test]
    fn test_default_pixel_layout() {
        let layout = PixelLayout::default();
        assert_eq!(layout.bit_count, 32);
        assert!(layout.is_valid());
        assert_eq!(layout.pitch(3), 12);
    }

    #[test]
    fn test_from_sizes_565() {
        let layout = PixelLayout::from_sizes(5, 6, 5, 0);
        assert_eq!(layout.bit_count, 16);
        assert_eq!(layout.r_mask, 0xF800);
        assert_eq!(layout.g_mask, 0x07E0);
        assert_eq!(layout.b_mask, 0x001F);
        assert_eq!(layout.a_mask, 0);
        assert!(layout.is_valid());
        // 3 pixels * 2 bytes = 6, aligned to 8
        assert_eq!(layout.pitch(3), 8);
    }

    #[test]
    fn test_invalid_layouts() {
        assert!(!PixelLayout::new(12, 0xF00, 0xF0, 0xF, 0).is_valid());
        assert!(!PixelLayout::new(16, 0xFF00, 0x0FF0, 0x000F, 0).is_valid());
        assert!(!PixelLayout::new(16, 0xFF_0000, 0xFF00, 0xFF, 0).is_valid());
        assert!(!PixelLayout::new(32, 0, 0, 0, 0).is_valid());
    }

    #[test]
    fn test_from_sizes_wider_than_32_bits() {
        for (r, g, b, a) in [(16, 16, 16, 16), (8, 8, 8, 16), (u32::MAX, 1, 1, 1), (33, 0, 0, 0)] {
            let layout = PixelLayout::from_sizes(r, g, b, a);
            assert!(!layout.is_valid(), "{} {} {} {}", r, g, b, a);
            assert_eq!(layout.masks(), [0; 4]);
        }

        let layout = PixelLayout::from_sizes(8, 8, 8, 8);
        assert!(layout.is_valid());
        assert_eq!(layout.r_mask, 0xFF00_0000);
        assert_eq!(layout.a_mask, 0x0000_00FF);
    }

    #[test]
    fn test_mask_shift_and_size() {
        assert_eq!(mask_shift_and_size(0x00FF_0000), (16, 8));
        assert_eq!(mask_shift_and_size(0x07E0), (5, 6));
        assert_eq!(mask_shift_and_size(0), (0, 0));
        assert_eq!(mask_shift_and_size(0xFF00_0000), (24, 8));
    }

    #[test]
    fn test_default_quantization() {
        let q = Quantization::default();
        assert!(!q.binary_alpha);
        assert_eq!(q.alpha_threshold, 127);
    }
}
