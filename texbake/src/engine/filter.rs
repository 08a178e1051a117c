//! Separable resampling filters for mip generation and resizing.
//!
//! Every output sample is a normalized weighted sum of source samples. The
//! kernel is stretched by the reduction factor so a 2× reduction with the box
//! filter averages exactly the 2×2 footprint, while odd sizes pick up a third
//! tap at the edge.

use std::f32::consts::PI;

use image::{ImageBuffer, Rgba};

use crate::engine::{DownsampleParams, FloatImage};
use crate::input::{KaiserParams, MipFilter, WrapMode};

/// Resample `image` to half size in each dimension, minimum 1.
pub(crate) fn downsample(image: &FloatImage, params: &DownsampleParams) -> FloatImage {
    let width = (image.width() / 2).max(1);
    let height = (image.height() / 2).max(1);
    resample(image, width, height, params)
}

/// Resample `image` to the given extents.
pub(crate) fn resample(
    image: &FloatImage,
    width: u32,
    height: u32,
    params: &DownsampleParams,
) -> FloatImage {
    let src_w = image.width() as usize;
    let src_h = image.height() as usize;
    let dst_w = width.max(1) as usize;
    let dst_h = height.max(1) as usize;

    let mut pixels: Vec<[f32; 4]> = image.pixels().map(|p| p.0).collect();
    if params.alpha_weighted {
        for p in &mut pixels {
            p[0] *= p[3];
            p[1] *= p[3];
            p[2] *= p[3];
        }
    }

    let kernel = Kernel::new(params.filter, params.kaiser);
    let x_taps = taps(&kernel, src_w, dst_w, params.wrap);
    let y_taps = taps(&kernel, src_h, dst_h, params.wrap);

    // Horizontal pass: dst_w × src_h
    let mut horizontal = vec![[0.0f32; 4]; dst_w * src_h];
    for y in 0..src_h {
        let row = &pixels[y * src_w..(y + 1) * src_w];
        for (x, taps) in x_taps.iter().enumerate() {
            horizontal[y * dst_w + x] = accumulate(taps.iter().map(|&(i, w)| (row[i], w)));
        }
    }

    // Vertical pass: dst_w × dst_h
    let mut output = vec![[0.0f32; 4]; dst_w * dst_h];
    for (y, taps) in y_taps.iter().enumerate() {
        for x in 0..dst_w {
            output[y * dst_w + x] =
                accumulate(taps.iter().map(|&(i, w)| (horizontal[i * dst_w + x], w)));
        }
    }

    if params.alpha_weighted {
        for p in &mut output {
            if p[3] > f32::EPSILON {
                p[0] /= p[3];
                p[1] /= p[3];
                p[2] /= p[3];
            }
        }
    }

    ImageBuffer::from_fn(dst_w as u32, dst_h as u32, |x, y| {
        Rgba(output[y as usize * dst_w + x as usize])
    })
}

fn accumulate(samples: impl Iterator<Item = ([f32; 4], f32)>) -> [f32; 4] {
    let mut sum = [0.0f32; 4];
    for (pixel, weight) in samples {
        for c in 0..4 {
            sum[c] += pixel[c] * weight;
        }
    }
    sum
}

/// Resampling kernel evaluated in destination-pixel units.
struct Kernel {
    filter: MipFilter,
    kaiser: KaiserParams,
}

impl Kernel {
    fn new(filter: MipFilter, kaiser: KaiserParams) -> Self {
        Self { filter, kaiser }
    }

    /// Half-width of the kernel's support.
    fn width(&self) -> f32 {
        match self.filter {
            MipFilter::Box => 0.5,
            MipFilter::Triangle => 1.0,
            MipFilter::Kaiser => self.kaiser.width.max(0.5),
        }
    }

    fn evaluate(&self, x: f32) -> f32 {
        let x = x.abs();
        match self.filter {
            MipFilter::Box => {
                if x <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            MipFilter::Triangle => (1.0 - x).max(0.0),
            MipFilter::Kaiser => {
                let width = self.width();
                if x >= width {
                    return 0.0;
                }
                let t = x / width;
                let window =
                    bessel_i0(self.kaiser.alpha * (1.0 - t * t).sqrt()) / bessel_i0(self.kaiser.alpha);
                sinc(x * self.kaiser.stretch) * window
            }
        }
    }
}

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-4 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Zeroth-order modified Bessel function of the first kind.
fn bessel_i0(x: f32) -> f32 {
    let mut sum = 1.0f32;
    let mut term = 1.0f32;
    let half = x * 0.5;
    for k in 1..32 {
        term *= half / k as f32;
        let t2 = term * term;
        sum += t2;
        if t2 < sum * 1e-8 {
            break;
        }
    }
    sum
}

/// Source index and normalized weight for every destination sample.
fn taps(kernel: &Kernel, src: usize, dst: usize, wrap: WrapMode) -> Vec<Vec<(usize, f32)>> {
    let scale = src as f32 / dst as f32;
    let stretch = scale.max(1.0);
    let support = kernel.width() * stretch;

    (0..dst)
        .map(|x| {
            let center = (x as f32 + 0.5) * scale - 0.5;
            let first = (center - support).ceil() as i64;
            let last = (center + support).floor() as i64;

            let mut taps: Vec<(usize, f32)> = (first..=last)
                .filter_map(|i| {
                    let w = kernel.evaluate((i as f32 - center) / stretch);
                    (w != 0.0).then(|| (wrap_index(i, src, wrap), w))
                })
                .collect();

            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            if taps.is_empty() || total.abs() < f32::EPSILON {
                // Nearest sample
                let nearest = wrap_index(center.round() as i64, src, wrap);
                return vec![(nearest, 1.0)];
            }
            for tap in &mut taps {
                tap.1 /= total;
            }
            taps
        })
        .collect()
}

/// Map a possibly out-of-range coordinate into `0..len`.
pub(crate) fn wrap_index(i: i64, len: usize, wrap: WrapMode) -> usize {
    let n = len as i64;
    if n <= 1 {
        return 0;
    }
    let idx = match wrap {
        WrapMode::Clamp => i.clamp(0, n - 1),
        WrapMode::Repeat => i.rem_euclid(n),
        WrapMode::Mirror => {
            let period = 2 * n - 2;
            let m = i.rem_euclid(period);
            if m >= n {
                period - m
            } else {
                m
            }
        }
    };
    idx as usize
}
