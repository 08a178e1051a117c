//! Job validation and the resolved snapshot handed to the engine.

use crate::engine::{DownsampleParams, EncodeParams, TextureHeader};
use crate::error::{CompressError, CompressResult};
use crate::format::Format;
use crate::input::{AlphaMode, InputDescriptor, InputSettings, TextureKind};
use crate::pipeline::extents::{
    declared_mip_count, full_chain_length, level_extent, target_extents,
};
use crate::profile::CompressionProfile;

/// A job's configuration with every derived quantity computed.
#[derive(Debug, Clone)]
pub struct ResolvedJob {
    pub kind: TextureKind,
    pub face_count: u32,
    /// Extents of the supplied level 0.
    pub source: (u32, u32, u32),
    /// Extents of the emitted level 0.
    pub target: (u32, u32, u32),
    pub mip_count: u32,
    pub settings: InputSettings,
    pub profile: CompressionProfile,
}

impl ResolvedJob {
    /// Check the layout and derive extents and mip count.
    pub fn from_config(input: &InputDescriptor<'_>, profile: &CompressionProfile) -> CompressResult<Self> {
        let layout = input.layout().ok_or(CompressError::LayoutUnset)?;
        if layout.width == 0 || layout.height == 0 || layout.depth == 0 {
            return Err(CompressError::InvalidDimensions {
                width: layout.width,
                height: layout.height,
                depth: layout.depth,
            });
        }

        let settings = input.settings().clone();
        let source = (layout.width, layout.height, layout.depth);
        let target = target_extents(layout.width, layout.height, layout.depth, &settings.extents);
        let full = full_chain_length(target.0, target.1, target.2);
        let mip_count = declared_mip_count(full, &settings.mipmaps);

        Ok(Self {
            kind: layout.kind,
            face_count: layout.kind.face_count(),
            source,
            target,
            mip_count,
            settings,
            profile: profile.clone(),
        })
    }

    pub fn format(&self) -> Format {
        self.profile.format()
    }

    /// Target extents of `level`.
    pub fn level_extents(&self, level: u32) -> (u32, u32, u32) {
        (
            level_extent(self.target.0, level),
            level_extent(self.target.1, level),
            level_extent(self.target.2, level),
        )
    }

    fn source_level_extents(&self, level: u32) -> (u32, u32, u32) {
        (
            level_extent(self.source.0, level),
            level_extent(self.source.1, level),
            level_extent(self.source.2, level),
        )
    }

    /// Whether level 0 has to be resampled to reach the target extents.
    pub fn needs_resize(&self) -> bool {
        self.source != self.target
    }

    /// Source level whose extents equal target `level`, if any.
    fn exact_source_level(&self, level: u32) -> Option<u32> {
        let wanted = self.level_extents(level);
        let source_levels = full_chain_length(self.source.0, self.source.1, self.source.2);
        (0..source_levels).find(|&s| self.source_level_extents(s) == wanted)
    }

    /// Caller-supplied pixels usable as target `level` of `face` without
    /// resampling. Level 0 always maps to the supplied level 0.
    pub fn supplied_level<'a>(
        &self,
        input: &InputDescriptor<'a>,
        face: u32,
        level: u32,
    ) -> Option<&'a [u8]> {
        if level == 0 {
            return input.mipmap_data(face, 0);
        }
        let source_level = self.exact_source_level(level)?;
        input.mipmap_data(face, source_level)
    }

    /// Every supplied buffer lies inside the layout with the right length,
    /// and every slot the job needs is present.
    pub fn check_slots(&self, input: &InputDescriptor<'_>) -> CompressResult<()> {
        let source_levels = full_chain_length(self.source.0, self.source.1, self.source.2);

        for (face, level, data) in input.supplied() {
            if face >= self.face_count || level >= source_levels {
                return Err(CompressError::SlotOutOfLayout { face, level });
            }
            let (w, h, d) = self.source_level_extents(level);
            let expected = w as usize * h as usize * d as usize * input.settings().format.bytes_per_pixel();
            if data.len() != expected {
                return Err(CompressError::BufferSize {
                    face,
                    level,
                    expected,
                    actual: data.len(),
                });
            }
        }

        for face in 0..self.face_count {
            if input.mipmap_data(face, 0).is_none() {
                return Err(CompressError::MissingMipmap { face, level: 0 });
            }
            if !self.settings.mipmaps.enabled {
                for level in 1..self.mip_count {
                    if self.supplied_level(input, face, level).is_none() {
                        return Err(CompressError::MissingMipmap { face, level });
                    }
                }
            }
        }

        Ok(())
    }

    /// The format can express the declared input.
    pub fn check_format(&self) -> CompressResult<()> {
        let format = self.format();

        if self.source.2 > 1 {
            return Err(CompressError::Unsupported(format!(
                "volume textures (depth {})",
                self.source.2
            )));
        }

        // One- and two-channel formats have nowhere to put alpha.
        if format.channel_count() <= 2
            && matches!(
                self.settings.alpha_mode,
                AlphaMode::Transparency | AlphaMode::Premultiplied
            )
        {
            return Err(CompressError::Unsupported(format!(
                "{} cannot store {:?} alpha",
                format, self.settings.alpha_mode
            )));
        }

        if format == Format::Bc1 && self.profile.quantization().binary_alpha {
            return Err(CompressError::Unsupported(
                "BC1 is opaque; use BC1a for binary alpha".to_string(),
            ));
        }

        if format == Format::Rgb && !self.profile.pixel_layout().is_valid() {
            let layout = self.profile.pixel_layout();
            return Err(CompressError::Unsupported(format!(
                "pixel layout {} bits, masks {:#x}/{:#x}/{:#x}/{:#x}",
                layout.bit_count, layout.r_mask, layout.g_mask, layout.b_mask, layout.a_mask
            )));
        }

        Ok(())
    }

    pub fn downsample_params(&self) -> DownsampleParams {
        DownsampleParams {
            filter: self.settings.mip_filter,
            wrap: self.settings.wrap_mode,
            kaiser: self.settings.kaiser,
            alpha_weighted: self.settings.alpha_mode == AlphaMode::Transparency,
        }
    }

    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            format: self.format(),
            quality: self.profile.quality(),
            weights: self.profile.color_weights(),
            quantization: self.profile.quantization(),
            pixel_layout: self.profile.pixel_layout(),
        }
    }

    pub fn header(&self) -> TextureHeader {
        TextureHeader {
            kind: self.kind,
            width: self.target.0,
            height: self.target.1,
            depth: self.target.2,
            mip_count: self.mip_count,
            format: self.format(),
            pixel_layout: self.profile.pixel_layout(),
            is_normal_map: self.settings.normal.produces_normals() || self.format() == Format::Bc3n,
        }
    }
}
