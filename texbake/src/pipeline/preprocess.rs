//! Per-level preprocessing and fixed-point conversion.
//!
//! Stages run in a fixed order: color transform, height to normal
//! conversion, normal filter, normalization. Each stage is skipped when its
//! options leave it inactive.

use image::{ImageBuffer, Rgba, RgbaImage};

use crate::engine::{wrap_index, FloatImage};
use crate::error::{CompressError, CompressResult};
use crate::input::{ColorTransform, InputSettings, WrapMode};

/// Blur radii of the four normal filter scales.
const NORMAL_FILTER_RADII: [usize; 4] = [1, 2, 4, 8];

/// Convert caller BGRA8 bytes to a float RGBA image.
pub fn bgra_to_float(data: &[u8], width: u32, height: u32) -> CompressResult<FloatImage> {
    let needed = width as usize * height as usize * 4;
    if data.len() < needed {
        return Err(CompressError::Internal(format!(
            "{}×{} level needs {} bytes, buffer has {}",
            width,
            height,
            needed,
            data.len()
        )));
    }

    Ok(ImageBuffer::from_fn(width, height, |x, y| {
        let i = (y as usize * width as usize + x as usize) * 4;
        Rgba([
            data[i + 2] as f32 / 255.0,
            data[i + 1] as f32 / 255.0,
            data[i] as f32 / 255.0,
            data[i + 3] as f32 / 255.0,
        ])
    }))
}

/// A preprocessing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ColorTransform,
    NormalConversion,
    NormalFilter,
    Normalize,
}

fn color_stage_active(settings: &InputSettings) -> bool {
    settings.color.is_active() && !settings.normal.is_normal_map
}

fn positive_gamma(gamma: f32) -> f32 {
    if gamma > 0.0 {
        gamma
    } else {
        1.0
    }
}

/// Applies the active stages of a job to each level.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    settings: InputSettings,
}

impl Preprocessor {
    pub fn new(settings: &InputSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Active stages in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        let normal = &self.settings.normal;
        let mut stages = Vec::new();
        if color_stage_active(&self.settings) {
            stages.push(Stage::ColorTransform);
        }
        if normal.convert_to_normal_map {
            stages.push(Stage::NormalConversion);
        }
        if normal.produces_normals() && normal.filter.is_some() {
            stages.push(Stage::NormalFilter);
        }
        if normal.produces_normals() && normal.normalize_mipmaps {
            stages.push(Stage::Normalize);
        }
        stages
    }

    pub fn apply(&self, image: &mut FloatImage) {
        for stage in self.stages() {
            match stage {
                Stage::ColorTransform => self.color_transform(image),
                Stage::NormalConversion => self.height_to_normal(image),
                Stage::NormalFilter => self.normal_filter(image),
                Stage::Normalize => normalize(image),
            }
        }
    }

    fn color_transform(&self, image: &mut FloatImage) {
        let color = &self.settings.color;
        let gamma = positive_gamma(color.input_gamma);

        for p in image.pixels_mut() {
            let mut c = p.0;
            for v in &mut c[..3] {
                *v = v.max(0.0).powf(gamma);
            }
            if color.transform == ColorTransform::Linear {
                let input = c;
                for (i, out) in c.iter_mut().enumerate() {
                    let row = color.linear_transform[i];
                    *out = row[0] * input[0]
                        + row[1] * input[1]
                        + row[2] * input[2]
                        + row[3] * input[3]
                        + color.offsets[i];
                }
            }
            p.0 = c;
        }
    }

    fn height_to_normal(&self, image: &mut FloatImage) {
        let scale = self.settings.normal.height_scale;
        let wrap = self.settings.wrap_mode;
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);

        let heights: Vec<f32> = image
            .pixels()
            .map(|p| (0..4).map(|c| p.0[c] * scale[c]).sum())
            .collect();
        let at = |x: i64, y: i64| heights[wrap_index(y, h, wrap) * w + wrap_index(x, w, wrap)];

        for y in 0..h as i64 {
            for x in 0..w as i64 {
                let dx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
                let dy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
                let n = unit([-dx / 8.0, -dy / 8.0, 1.0]);
                let height_value = at(x, y).clamp(0.0, 1.0);
                image.put_pixel(
                    x as u32,
                    y as u32,
                    Rgba([
                        n[0] * 0.5 + 0.5,
                        n[1] * 0.5 + 0.5,
                        n[2] * 0.5 + 0.5,
                        height_value,
                    ]),
                );
            }
        }
    }

    fn normal_filter(&self, image: &mut FloatImage) {
        let Some(strengths) = self.settings.normal.filter else {
            return;
        };
        let total: f32 = strengths.iter().sum();
        if total.abs() < f32::EPSILON {
            return;
        }

        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let wrap = self.settings.wrap_mode;
        let normals: Vec<[f32; 3]> = image
            .pixels()
            .map(|p| [p.0[0] * 2.0 - 1.0, p.0[1] * 2.0 - 1.0, p.0[2] * 2.0 - 1.0])
            .collect();

        let mut blended = vec![[0.0f32; 3]; w * h];
        for (&radius, &strength) in NORMAL_FILTER_RADII.iter().zip(strengths.iter()) {
            if strength == 0.0 {
                continue;
            }
            let blurred = box_blur(&normals, w, h, radius, wrap);
            for (acc, b) in blended.iter_mut().zip(&blurred) {
                for c in 0..3 {
                    acc[c] += b[c] * strength / total;
                }
            }
        }

        for (p, n) in image.pixels_mut().zip(&blended) {
            p.0[0] = n[0] * 0.5 + 0.5;
            p.0[1] = n[1] * 0.5 + 0.5;
            p.0[2] = n[2] * 0.5 + 0.5;
        }
    }
}

fn unit(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len < 1e-6 {
        [0.0, 0.0, 1.0]
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

fn normalize(image: &mut FloatImage) {
    for p in image.pixels_mut() {
        let n = unit([p.0[0] * 2.0 - 1.0, p.0[1] * 2.0 - 1.0, p.0[2] * 2.0 - 1.0]);
        p.0[0] = n[0] * 0.5 + 0.5;
        p.0[1] = n[1] * 0.5 + 0.5;
        p.0[2] = n[2] * 0.5 + 0.5;
    }
}

/// Separable box blur with the given wrap mode.
fn box_blur(src: &[[f32; 3]], w: usize, h: usize, radius: usize, wrap: WrapMode) -> Vec<[f32; 3]> {
    let r = radius as i64;
    let taps = (2 * radius + 1) as f32;

    let mut horizontal = vec![[0.0f32; 3]; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0.0f32; 3];
            for dx in -r..=r {
                let sx = wrap_index(x as i64 + dx, w, wrap);
                let s = src[y * w + sx];
                for c in 0..3 {
                    sum[c] += s[c];
                }
            }
            horizontal[y * w + x] = sum.map(|v| v / taps);
        }
    }

    let mut out = vec![[0.0f32; 3]; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0.0f32; 3];
            for dy in -r..=r {
                let sy = wrap_index(y as i64 + dy, h, wrap);
                let s = horizontal[sy * w + x];
                for c in 0..3 {
                    sum[c] += s[c];
                }
            }
            out[y * w + x] = sum.map(|v| v / taps);
        }
    }
    out
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert a processed level to 8-bit RGBA for the engine.
///
/// Applies the output gamma when the color stage ran, then premultiplies
/// color by alpha if requested.
pub fn to_fixed(image: &FloatImage, settings: &InputSettings) -> RgbaImage {
    let encode_gamma = color_stage_active(settings);
    let inverse = 1.0 / positive_gamma(settings.color.output_gamma);
    let premultiply = settings.premultiply_alpha;

    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0;
        let mut out = [0u8; 4];
        for c in 0..3 {
            let v = if encode_gamma {
                p[c].max(0.0).powf(inverse)
            } else {
                p[c]
            };
            out[c] = to_byte(v);
        }
        out[3] = to_byte(p[3]);

        if premultiply {
            let a = out[3] as u32;
            for v in &mut out[..3] {
                *v = ((*v as u32 * a + 127) / 255) as u8;
            }
        }
        Rgba(out)
    })
}
