//! Input description: texture layout, caller-owned pixel data and the
//! preprocessing intent for a job.
//!
//! [`InputDescriptor`] is a plain data holder. Setters never validate; the
//! compressor checks everything when a job starts so that every problem is
//! reported through the same error channel.
//!
//! Pixel buffers are borrowed, not copied. The borrow checker enforces that a
//! buffer outlives every job that reads it and cannot be mutated while a job
//! holds the descriptor.

use std::collections::BTreeMap;
use std::str::FromStr;

/// Texture shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    #[default]
    TwoD,
    Cube,
}

impl TextureKind {
    /// Number of faces a texture of this kind has.
    pub fn face_count(self) -> u32 {
        match self {
            TextureKind::TwoD => 1,
            TextureKind::Cube => 6,
        }
    }
}

/// Pixel format of the supplied buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputFormat {
    /// 8-bit unsigned BGRA, 4 bytes per pixel.
    #[default]
    Bgra8,
}

impl InputFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            InputFormat::Bgra8 => 4,
        }
    }
}

/// Interpretation of the alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    #[default]
    None,
    Transparency,
    Premultiplied,
}

/// Edge handling used by the resampling filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    Clamp,
    Repeat,
    #[default]
    Mirror,
}

/// Mipmap downsampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipFilter {
    #[default]
    Box,
    Triangle,
    Kaiser,
}

/// Kaiser-windowed sinc parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KaiserParams {
    pub width: f32,
    pub alpha: f32,
    pub stretch: f32,
}

impl Default for KaiserParams {
    fn default() -> Self {
        Self {
            width: 3.0,
            alpha: 4.0,
            stretch: 1.0,
        }
    }
}

/// Mipmap generation toggle and level cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MipmapGeneration {
    pub enabled: bool,
    /// Highest level index to produce; `None` runs the chain down to 1×1.
    pub max_level: Option<u32>,
}

impl Default for MipmapGeneration {
    fn default() -> Self {
        Self {
            enabled: true,
            max_level: None,
        }
    }
}

/// Normal-map handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalMapOptions {
    /// Treat the input as a normal map (skips gamma handling).
    pub is_normal_map: bool,
    /// Derive normals from a height field.
    pub convert_to_normal_map: bool,
    /// Channel weights that produce the height from r, g, b, a.
    pub height_scale: [f32; 4],
    /// Strength of the normal filter at four increasing scales; `None`
    /// disables the filter stage.
    pub filter: Option<[f32; 4]>,
    /// Renormalize vectors of every level.
    pub normalize_mipmaps: bool,
}

impl NormalMapOptions {
    /// Whether the pipeline produces a normal map.
    pub fn produces_normals(&self) -> bool {
        self.is_normal_map || self.convert_to_normal_map
    }
}

impl Default for NormalMapOptions {
    fn default() -> Self {
        Self {
            is_normal_map: false,
            convert_to_normal_map: false,
            height_scale: [0.0, 0.0, 0.0, 1.0],
            filter: None,
            normalize_mipmaps: true,
        }
    }
}

/// Color transform selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorTransform {
    #[default]
    None,
    Linear,
}

/// Gamma pair and linear transform coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorOptions {
    pub transform: ColorTransform,
    pub input_gamma: f32,
    pub output_gamma: f32,
    /// Row `i` produces output channel `i` from (r, g, b, a).
    pub linear_transform: [[f32; 4]; 4],
    pub offsets: [f32; 4],
}

impl ColorOptions {
    /// Whether the color stage changes pixels at all.
    pub fn is_active(&self) -> bool {
        self.transform == ColorTransform::Linear || self.input_gamma != self.output_gamma
    }
}

impl Default for ColorOptions {
    fn default() -> Self {
        Self {
            transform: ColorTransform::None,
            input_gamma: 2.2,
            output_gamma: 2.2,
            linear_transform: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            offsets: [0.0; 4],
        }
    }
}

/// Power-of-two rounding of the target extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoundMode {
    #[default]
    None,
    ToNext,
    ToNearest,
    ToPrevious,
}

/// Target extent policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtentPolicy {
    /// Largest allowed dimension; `None` leaves extents unclamped.
    pub max_extent: Option<u32>,
    pub round_mode: RoundMode,
}

/// Every option of an input descriptor except the layout and pixel data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputSettings {
    pub format: InputFormat,
    pub alpha_mode: AlphaMode,
    pub wrap_mode: WrapMode,
    pub mipmaps: MipmapGeneration,
    pub mip_filter: MipFilter,
    pub kaiser: KaiserParams,
    pub normal: NormalMapOptions,
    pub color: ColorOptions,
    pub extents: ExtentPolicy,
    pub premultiply_alpha: bool,
}

/// Declared texture layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureLayout {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Source texture description for a compression job.
///
/// # Example
///
/// ```
/// use texbake::input::{InputDescriptor, TextureKind};
///
/// let pixels = vec![0u8; 4 * 4 * 4];
/// let mut input = InputDescriptor::new();
/// input.set_texture_layout(TextureKind::TwoD, 4, 4, 1);
/// input.set_mipmap_data(0, 0, &pixels);
/// input.set_mipmap_generation(false, None);
///
/// assert_eq!(input.supplied_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InputDescriptor<'a> {
    layout: Option<TextureLayout>,
    images: BTreeMap<(u32, u32), &'a [u8]>,
    settings: InputSettings,
}

impl<'a> InputDescriptor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore every option to its default. Layout and data are kept.
    pub fn reset(&mut self) {
        self.settings = InputSettings::default();
    }

    /// Declare the texture layout. Clears any previously supplied data.
    pub fn set_texture_layout(&mut self, kind: TextureKind, width: u32, height: u32, depth: u32) {
        self.layout = Some(TextureLayout {
            kind,
            width,
            height,
            depth,
        });
        self.images.clear();
    }

    /// Return the layout to "unset" and drop every supplied buffer.
    pub fn reset_layout(&mut self) {
        self.layout = None;
        self.images.clear();
    }

    /// Reference pixel data for one (face, mip level) slot.
    ///
    /// The buffer is expected to hold `width * height * depth` BGRA pixels of
    /// that level. Replaces any earlier buffer for the same slot.
    pub fn set_mipmap_data(&mut self, face: u32, level: u32, data: &'a [u8]) {
        self.images.insert((face, level), data);
    }

    pub fn set_format(&mut self, format: InputFormat) {
        self.settings.format = format;
    }

    pub fn set_alpha_mode(&mut self, mode: AlphaMode) {
        self.settings.alpha_mode = mode;
    }

    pub fn set_gamma(&mut self, input_gamma: f32, output_gamma: f32) {
        self.settings.color.input_gamma = input_gamma;
        self.settings.color.output_gamma = output_gamma;
    }

    pub fn set_wrap_mode(&mut self, mode: WrapMode) {
        self.settings.wrap_mode = mode;
    }

    pub fn set_mipmap_filter(&mut self, filter: MipFilter) {
        self.settings.mip_filter = filter;
    }

    pub fn set_mipmap_generation(&mut self, enabled: bool, max_level: Option<u32>) {
        self.settings.mipmaps = MipmapGeneration { enabled, max_level };
    }

    pub fn set_kaiser_parameters(&mut self, width: f32, alpha: f32, stretch: f32) {
        self.settings.kaiser = KaiserParams {
            width,
            alpha,
            stretch,
        };
    }

    pub fn set_normal_map(&mut self, is_normal_map: bool) {
        self.settings.normal.is_normal_map = is_normal_map;
    }

    pub fn set_convert_to_normal_map(&mut self, convert: bool) {
        self.settings.normal.convert_to_normal_map = convert;
    }

    pub fn set_height_evaluation(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.settings.normal.height_scale = [red, green, blue, alpha];
    }

    /// Enable the normal filter with strengths for the four scales.
    pub fn set_normal_filter(&mut self, small: f32, medium: f32, big: f32, large: f32) {
        self.settings.normal.filter = Some([small, medium, big, large]);
    }

    pub fn clear_normal_filter(&mut self) {
        self.settings.normal.filter = None;
    }

    pub fn set_normalize_mipmaps(&mut self, normalize: bool) {
        self.settings.normal.normalize_mipmaps = normalize;
    }

    pub fn set_color_transform(&mut self, transform: ColorTransform) {
        self.settings.color.transform = transform;
    }

    /// Set the coefficients producing output `channel` (0 = red .. 3 = alpha).
    /// Channels outside 0..4 are ignored.
    pub fn set_linear_transform(&mut self, channel: usize, weights: [f32; 4], offset: f32) {
        if channel < 4 {
            self.settings.color.linear_transform[channel] = weights;
            self.settings.color.offsets[channel] = offset;
        }
    }

    pub fn set_max_extents(&mut self, max_extent: Option<u32>) {
        self.settings.extents.max_extent = max_extent;
    }

    pub fn set_round_mode(&mut self, mode: RoundMode) {
        self.settings.extents.round_mode = mode;
    }

    pub fn set_premultiply_alpha(&mut self, premultiply: bool) {
        self.settings.premultiply_alpha = premultiply;
    }

    /// Replace every option at once.
    pub fn set_settings(&mut self, settings: InputSettings) {
        self.settings = settings;
    }

    pub fn layout(&self) -> Option<TextureLayout> {
        self.layout
    }

    pub fn settings(&self) -> &InputSettings {
        &self.settings
    }

    /// Pixel data for a slot, if supplied.
    pub fn mipmap_data(&self, face: u32, level: u32) -> Option<&'a [u8]> {
        self.images.get(&(face, level)).copied()
    }

    /// Every supplied slot as `(face, level, bytes)`, in face-major order.
    pub fn supplied(&self) -> impl Iterator<Item = (u32, u32, &'a [u8])> + '_ {
        self.images
            .iter()
            .map(|(&(face, level), &data)| (face, level, data))
    }

    pub fn supplied_count(&self) -> usize {
        self.images.len()
    }
}

macro_rules! impl_from_str {
    ($ty:ty, $what:literal, { $($name:literal => $value:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($value),)+
                    other => Err(format!(concat!("unknown ", $what, ": {}"), other)),
                }
            }
        }
    };
}

impl_from_str!(WrapMode, "wrap mode", {
    "clamp" => WrapMode::Clamp,
    "repeat" => WrapMode::Repeat,
    "mirror" => WrapMode::Mirror,
});

impl_from_str!(MipFilter, "mipmap filter", {
    "box" => MipFilter::Box,
    "triangle" => MipFilter::Triangle,
    "kaiser" => MipFilter::Kaiser,
});

impl_from_str!(AlphaMode, "alpha mode", {
    "none" => AlphaMode::None,
    "transparency" => AlphaMode::Transparency,
    "premultiplied" => AlphaMode::Premultiplied,
});

impl_from_str!(RoundMode, "round mode", {
    "none" => RoundMode::None,
    "next" => RoundMode::ToNext,
    "nearest" => RoundMode::ToNearest,
    "previous" => RoundMode::ToPrevious,
});

impl_from_str!(TextureKind, "texture kind", {
    "2d" => TextureKind::TwoD,
    "cube" => TextureKind::Cube,
});

impl_from_str!(ColorTransform, "color transform", {
    "none" => ColorTransform::None,
    "linear" => ColorTransform::Linear,
});
