//! INI parsing for job files.
//!
//! This is the single place where INI key names are mapped to option fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::{ConfigError, JobConfig};
use crate::format::{Format, PixelLayout, Quality};
use crate::input::{AlphaMode, MipFilter, RoundMode, WrapMode};

/// Parse an `Ini` object into a `JobConfig`.
///
/// Starts from `JobConfig::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<JobConfig, ConfigError> {
    let mut config = JobConfig::default();

    // [input] section
    if let Some(section) = ini.section(Some("input")) {
        let reader = SectionReader::new("input", section);
        let input = &mut config.input;

        if let Some(v) = reader.parsed::<WrapMode>("wrap", "must be one of: clamp, repeat, mirror")? {
            input.wrap_mode = v;
        }
        if let Some(v) =
            reader.parsed::<MipFilter>("mip_filter", "must be one of: box, triangle, kaiser")?
        {
            input.mip_filter = v;
        }
        if let Some(v) = reader.boolean("generate_mipmaps")? {
            input.mipmaps.enabled = v;
        }
        if let Some(v) = reader.optional_number("max_level")? {
            input.mipmaps.max_level = v;
        }
        if let Some(v) = reader.parsed::<AlphaMode>(
            "alpha_mode",
            "must be one of: none, transparency, premultiplied",
        )? {
            input.alpha_mode = v;
        }
        if let Some(v) = reader.gamma("input_gamma")? {
            input.color.input_gamma = v;
        }
        if let Some(v) = reader.gamma("output_gamma")? {
            input.color.output_gamma = v;
        }
        if let Some(v) = reader.boolean("normal_map")? {
            input.normal.is_normal_map = v;
        }
        if let Some(v) = reader.boolean("convert_to_normal_map")? {
            input.normal.convert_to_normal_map = v;
        }
        if let Some(v) = reader.four_floats("height_scale")? {
            input.normal.height_scale = v;
        }
        if let Some(v) = reader.get("normal_filter") {
            input.normal.filter = if is_none(v) {
                None
            } else {
                Some(parse_four_floats(v).ok_or_else(|| {
                    reader.invalid("normal_filter", v, "expected four comma-separated numbers or 'none'")
                })?)
            };
        }
        if let Some(v) = reader.boolean("normalize_mipmaps")? {
            input.normal.normalize_mipmaps = v;
        }
        if let Some(v) = reader.optional_number("max_extent")? {
            input.extents.max_extent = v.filter(|&m| m > 0);
        }
        if let Some(v) = reader.parsed::<RoundMode>(
            "round_mode",
            "must be one of: none, next, nearest, previous",
        )? {
            input.extents.round_mode = v;
        }
        if let Some(v) = reader.boolean("premultiply_alpha")? {
            input.premultiply_alpha = v;
        }
        if let Some(v) = reader.parsed::<f32>("kaiser_width", "must be a number")? {
            input.kaiser.width = v;
        }
        if let Some(v) = reader.parsed::<f32>("kaiser_alpha", "must be a number")? {
            input.kaiser.alpha = v;
        }
        if let Some(v) = reader.parsed::<f32>("kaiser_stretch", "must be a number")? {
            input.kaiser.stretch = v;
        }
    }

    // [compression] section
    if let Some(section) = ini.section(Some("compression")) {
        let reader = SectionReader::new("compression", section);
        let profile = &mut config.profile;

        if let Some(v) = reader.parsed::<Format>(
            "format",
            "must be one of: rgb, bc1, bc1a, bc2, bc3, bc3n, bc4, bc5 (or dxt1, dxt1a, dxt3, dxt5, dxt5n, ati1, ati2)",
        )? {
            profile.set_format(v);
        }
        if let Some(v) = reader.parsed::<Quality>(
            "quality",
            "must be one of: fastest, normal, production, highest",
        )? {
            profile.set_quality(v);
        }
        if let Some([r, g, b, a]) = reader.four_floats("color_weights")? {
            profile.set_color_weights(r, g, b, a);
        }

        let mut quantization = profile.quantization();
        if let Some(v) = reader.boolean("color_dithering")? {
            quantization.color_dithering = v;
        }
        if let Some(v) = reader.boolean("alpha_dithering")? {
            quantization.alpha_dithering = v;
        }
        if let Some(v) = reader.boolean("binary_alpha")? {
            quantization.binary_alpha = v;
        }
        profile.set_quantization(
            quantization.color_dithering,
            quantization.alpha_dithering,
            quantization.binary_alpha,
        );
        if let Some(v) = reader.parsed::<u8>("alpha_threshold", "must be an integer from 0 to 255")? {
            profile.set_alpha_threshold(v);
        }

        if let Some(v) = reader.get("pixel_format") {
            let layout = parse_pixel_format(v).ok_or_else(|| {
                reader.invalid(
                    "pixel_format",
                    v,
                    "expected 'bitcount, rmask, gmask, bmask, amask' (masks in hex or decimal)",
                )
            })?;
            profile.set_pixel_layout(layout);
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        let reader = SectionReader::new("output", section);

        if let Some(v) = reader.get("path") {
            if !v.is_empty() {
                config.output_path = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = reader.boolean("header")? {
            config.write_header = v;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        let reader = SectionReader::new("logging", section);
        let logging = &mut config.logging;

        if let Some(v) = reader.get("directory") {
            if !v.is_empty() {
                logging.directory = PathBuf::from(v);
            }
        }
        if let Some(v) = reader.get("file") {
            if v.is_empty() {
                return Err(reader.invalid("file", v, "must name a file"));
            }
            logging.file_name = v.to_string();
        }
        if let Some(v) = reader.get("filter") {
            if !v.is_empty() {
                logging.filter = v.to_string();
            }
        }
        if let Some(v) = reader.boolean("stdout")? {
            logging.stdout = v;
        }
    }

    Ok(config)
}

/// Typed access to one INI section with uniform error reporting.
struct SectionReader<'a> {
    name: &'static str,
    section: &'a Properties,
}

impl<'a> SectionReader<'a> {
    fn new(name: &'static str, section: &'a Properties) -> Self {
        Self { name, section }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.section.get(key).map(str::trim)
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parsed<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|v| v.parse().map_err(|_| self.invalid(key, v, reason)))
            .transpose()
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get(key)
            .map(|v| {
                parse_bool(v).ok_or_else(|| self.invalid(key, v, "must be true or false"))
            })
            .transpose()
    }

    /// A number, or `none` for no value.
    fn optional_number(&self, key: &str) -> Result<Option<Option<u32>>, ConfigError> {
        self.get(key)
            .map(|v| {
                if is_none(v) {
                    Ok(None)
                } else {
                    v.parse()
                        .map(Some)
                        .map_err(|_| self.invalid(key, v, "must be a non-negative integer or 'none'"))
                }
            })
            .transpose()
    }

    fn gamma(&self, key: &str) -> Result<Option<f32>, ConfigError> {
        match self.parsed::<f32>(key, "must be a positive number")? {
            Some(v) if v <= 0.0 || !v.is_finite() => {
                Err(self.invalid(key, &v.to_string(), "must be a positive number"))
            }
            other => Ok(other),
        }
    }

    fn four_floats(&self, key: &str) -> Result<Option<[f32; 4]>, ConfigError> {
        self.get(key)
            .map(|v| {
                parse_four_floats(v)
                    .ok_or_else(|| self.invalid(key, v, "expected four comma-separated numbers"))
            })
            .transpose()
    }
}

pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_none(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("none")
}

fn parse_four_floats(value: &str) -> Option<[f32; 4]> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    parts.try_into().ok()
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_u32(value: &str) -> Option<u32> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn parse_pixel_format(value: &str) -> Option<PixelLayout> {
    let parts: Vec<u32> = value.split(',').map(parse_u32).collect::<Option<_>>()?;
    match parts.as_slice() {
        &[bits, r, g, b, a] => Some(PixelLayout::new(bits, r, g, b, a)),
        _ => None,
    }
}
