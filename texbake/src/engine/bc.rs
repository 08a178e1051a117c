//! BC1 to BC5 block encoders.
//!
//! Color blocks (BC1, and the color half of BC2/BC3) store two RGB565
//! endpoints and sixteen 2-bit palette indices. Single-channel blocks (BC4,
//! the alpha half of BC3, each half of BC5) store two 8-bit endpoints and
//! sixteen 3-bit indices.
//!
//! The endpoint search starts from the color bounding box. With refinement
//! passes the box is first oriented along the block's dominant axis, then each
//! pass refits the endpoints by least squares against the current index
//! assignment and keeps the result only if the weighted error drops.

use crate::format::ColorWeights;

/// 16 RGBA pixels in row-major order.
pub(crate) type Block = [[u8; 4]; 16];

/// Convert RGB888 to RGB565, rounding to nearest.
pub(crate) fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r as u16 * 31 + 127) / 255;
    let g6 = (g as u16 * 63 + 127) / 255;
    let b5 = (b as u16 * 31 + 127) / 255;
    (r5 << 11) | (g6 << 5) | b5
}

/// Expand RGB565 to RGB888 by bit replication.
pub(crate) fn rgb565_to_rgb888(color: u16) -> [u8; 3] {
    let r5 = (color >> 11) & 0x1F;
    let g6 = (color >> 5) & 0x3F;
    let b5 = color & 0x1F;
    [
        ((r5 << 3) | (r5 >> 2)) as u8,
        ((g6 << 2) | (g6 >> 4)) as u8,
        ((b5 << 3) | (b5 >> 2)) as u8,
    ]
}

fn weighted_distance(a: &[u8; 4], b: &[u8; 3], weights: &ColorWeights) -> f32 {
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    weights.red * dr * dr + weights.green * dg * dg + weights.blue * db * db
}

fn mix(a: [u8; 3], b: [u8; 3], wa: u16, wb: u16) -> [u8; 3] {
    let d = wa + wb;
    [
        ((a[0] as u16 * wa + b[0] as u16 * wb) / d) as u8,
        ((a[1] as u16 * wa + b[1] as u16 * wb) / d) as u8,
        ((a[2] as u16 * wa + b[2] as u16 * wb) / d) as u8,
    ]
}

/// Color block palette mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorMode {
    /// Four opaque colors, `c0 > c1`.
    Opaque,
    /// Three colors plus transparent black, `c0 <= c1`.
    PunchThrough,
}

struct ColorFit {
    c0: u16,
    c1: u16,
    indices: u32,
    error: f32,
}

/// Palette entries, in index order, for the given endpoints and mode.
fn palette(c0: u16, c1: u16, mode: ColorMode) -> [[u8; 3]; 4] {
    let a = rgb565_to_rgb888(c0);
    let b = rgb565_to_rgb888(c1);
    match mode {
        ColorMode::Opaque => [a, b, mix(a, b, 2, 1), mix(a, b, 1, 2)],
        ColorMode::PunchThrough => [a, b, mix(a, b, 1, 1), [0, 0, 0]],
    }
}

/// Order two endpoints for the mode and pick the best index per pixel.
fn fit_indices(
    pixels: &Block,
    e0: u16,
    e1: u16,
    mode: ColorMode,
    weights: &ColorWeights,
) -> ColorFit {
    let (c0, c1) = match mode {
        ColorMode::Opaque => (e0.max(e1), e0.min(e1)),
        ColorMode::PunchThrough => (e0.min(e1), e0.max(e1)),
    };
    let pal = palette(c0, c1, mode);
    let selectable = match mode {
        ColorMode::Opaque => 4,
        ColorMode::PunchThrough => 3,
    };

    let mut indices = 0u32;
    let mut error = 0.0f32;
    for (i, pixel) in pixels.iter().enumerate() {
        let index = if mode == ColorMode::PunchThrough && pixel[3] < 128 {
            3
        } else if c0 == c1 && mode == ColorMode::Opaque {
            error += weighted_distance(pixel, &pal[0], weights);
            0
        } else {
            let mut best = 0;
            let mut best_dist = f32::MAX;
            for (idx, color) in pal.iter().take(selectable).enumerate() {
                let dist = weighted_distance(pixel, color, weights);
                if dist < best_dist {
                    best_dist = dist;
                    best = idx;
                }
            }
            error += best_dist;
            best
        };
        indices |= (index as u32) << (i * 2);
    }

    ColorFit {
        c0,
        c1,
        indices,
        error,
    }
}

/// Interpolation weight of `c1` for each palette index.
fn index_weight(index: u32, mode: ColorMode) -> Option<f32> {
    match (mode, index) {
        (_, 0) => Some(0.0),
        (_, 1) => Some(1.0),
        (ColorMode::Opaque, 2) => Some(1.0 / 3.0),
        (ColorMode::Opaque, 3) => Some(2.0 / 3.0),
        (ColorMode::PunchThrough, 2) => Some(0.5),
        _ => None,
    }
}

/// Least-squares endpoints for the current index assignment.
fn refit(pixels: &Block, fit: &ColorFit, mode: ColorMode) -> Option<(u16, u16)> {
    let (mut aa, mut ab, mut bb) = (0.0f32, 0.0f32, 0.0f32);
    let mut ax = [0.0f32; 3];
    let mut bx = [0.0f32; 3];

    for (i, pixel) in pixels.iter().enumerate() {
        let index = (fit.indices >> (i * 2)) & 0x3;
        let Some(t) = index_weight(index, mode) else {
            continue;
        };
        let s = 1.0 - t;
        aa += s * s;
        ab += s * t;
        bb += t * t;
        for c in 0..3 {
            ax[c] += s * pixel[c] as f32;
            bx[c] += t * pixel[c] as f32;
        }
    }

    let det = aa * bb - ab * ab;
    if det.abs() < 1e-6 {
        return None;
    }

    let mut a = [0u8; 3];
    let mut b = [0u8; 3];
    for c in 0..3 {
        a[c] = ((ax[c] * bb - bx[c] * ab) / det).round().clamp(0.0, 255.0) as u8;
        b[c] = ((bx[c] * aa - ax[c] * ab) / det).round().clamp(0.0, 255.0) as u8;
    }
    Some((
        rgb888_to_rgb565(a[0], a[1], a[2]),
        rgb888_to_rgb565(b[0], b[1], b[2]),
    ))
}

/// Bounding-box endpoints. When `oriented`, channels whose variation runs
/// against the dominant channel are flipped so the box diagonal follows
/// the block's color axis.
fn bounding_box(pixels: &Block, mode: ColorMode, oriented: bool) -> (u16, u16) {
    let considered = || {
        pixels
            .iter()
            .filter(move |p| mode == ColorMode::Opaque || p[3] >= 128)
    };

    let mut min = [255u8; 3];
    let mut max = [0u8; 3];
    let mut mean = [0.0f32; 3];
    let mut count = 0.0f32;
    for p in considered() {
        for c in 0..3 {
            min[c] = min[c].min(p[c]);
            max[c] = max[c].max(p[c]);
            mean[c] += p[c] as f32;
        }
        count += 1.0;
    }
    if count == 0.0 {
        return (0, 0);
    }

    if oriented {
        for m in &mut mean {
            *m /= count;
        }
        let dominant = (0..3)
            .max_by_key(|&c| max[c] as i32 - min[c] as i32)
            .unwrap_or(1);
        for c in 0..3 {
            if c == dominant {
                continue;
            }
            let covariance: f32 = considered()
                .map(|p| (p[c] as f32 - mean[c]) * (p[dominant] as f32 - mean[dominant]))
                .sum();
            if covariance < 0.0 {
                std::mem::swap(&mut min[c], &mut max[c]);
            }
        }
    }

    (
        rgb888_to_rgb565(max[0], max[1], max[2]),
        rgb888_to_rgb565(min[0], min[1], min[2]),
    )
}

fn fit_color(pixels: &Block, mode: ColorMode, weights: &ColorWeights, passes: u32) -> ColorFit {
    let (e0, e1) = bounding_box(pixels, mode, passes > 0);
    let mut best = fit_indices(pixels, e0, e1, mode, weights);

    for _ in 0..passes {
        let Some((e0, e1)) = refit(pixels, &best, mode) else {
            break;
        };
        let candidate = fit_indices(pixels, e0, e1, mode, weights);
        if candidate.error < best.error {
            best = candidate;
        } else {
            break;
        }
    }
    best
}

fn pack_color(fit: &ColorFit) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..2].copy_from_slice(&fit.c0.to_le_bytes());
    out[2..4].copy_from_slice(&fit.c1.to_le_bytes());
    out[4..8].copy_from_slice(&fit.indices.to_le_bytes());
    out
}

/// BC1 color block. `PunchThrough` is chosen only when `allow_alpha` is set
/// and some pixel is transparent.
pub(crate) fn encode_bc1(
    pixels: &Block,
    weights: &ColorWeights,
    passes: u32,
    allow_alpha: bool,
) -> [u8; 8] {
    let mode = if allow_alpha && pixels.iter().any(|p| p[3] < 128) {
        ColorMode::PunchThrough
    } else {
        ColorMode::Opaque
    };
    pack_color(&fit_color(pixels, mode, weights, passes))
}

/// BC2: explicit 4-bit alpha followed by an opaque color block.
pub(crate) fn encode_bc2(pixels: &Block, weights: &ColorWeights, passes: u32) -> [u8; 16] {
    let mut alpha = 0u64;
    for (i, p) in pixels.iter().enumerate() {
        let a4 = (p[3] as u64 * 15 + 127) / 255;
        alpha |= a4 << (i * 4);
    }

    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&alpha.to_le_bytes());
    out[8..16].copy_from_slice(&encode_bc1(pixels, weights, passes, false));
    out
}

/// BC3: interpolated alpha followed by an opaque color block.
pub(crate) fn encode_bc3(pixels: &Block, weights: &ColorWeights, passes: u32) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&encode_channel(&channel(pixels, 3), passes));
    out[8..16].copy_from_slice(&encode_bc1(pixels, weights, passes, false));
    out
}

/// BC4: the red channel as one interpolated block.
pub(crate) fn encode_bc4(pixels: &Block, passes: u32) -> [u8; 8] {
    encode_channel(&channel(pixels, 0), passes)
}

/// BC5: red then green, each as an interpolated block.
pub(crate) fn encode_bc5(pixels: &Block, passes: u32) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&encode_channel(&channel(pixels, 0), passes));
    out[8..16].copy_from_slice(&encode_channel(&channel(pixels, 1), passes));
    out
}

fn channel(pixels: &Block, c: usize) -> [u8; 16] {
    let mut values = [0u8; 16];
    for (v, p) in values.iter_mut().zip(pixels) {
        *v = p[c];
    }
    values
}

/// Eight-value palette when `a0 > a1`, otherwise six values plus 0 and 255.
fn channel_palette(a0: u8, a1: u8) -> [u8; 8] {
    let (a, b) = (a0 as u16, a1 as u16);
    if a0 > a1 {
        [
            a0,
            a1,
            ((6 * a + b) / 7) as u8,
            ((5 * a + 2 * b) / 7) as u8,
            ((4 * a + 3 * b) / 7) as u8,
            ((3 * a + 4 * b) / 7) as u8,
            ((2 * a + 5 * b) / 7) as u8,
            ((a + 6 * b) / 7) as u8,
        ]
    } else {
        [
            a0,
            a1,
            ((4 * a + b) / 5) as u8,
            ((3 * a + 2 * b) / 5) as u8,
            ((2 * a + 3 * b) / 5) as u8,
            ((a + 4 * b) / 5) as u8,
            0,
            255,
        ]
    }
}

fn fit_channel(values: &[u8; 16], a0: u8, a1: u8) -> (u64, u32) {
    let pal = channel_palette(a0, a1);
    let mut indices = 0u64;
    let mut error = 0u32;
    for (i, &v) in values.iter().enumerate() {
        let (best, dist) = pal
            .iter()
            .enumerate()
            .map(|(idx, &p)| (idx, (v as i32 - p as i32).unsigned_abs()))
            .min_by_key(|&(_, d)| d)
            .unwrap_or((0, 0));
        indices |= (best as u64) << (i * 3);
        error += dist * dist;
    }
    (indices, error)
}

fn encode_channel(values: &[u8; 16], passes: u32) -> [u8; 8] {
    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);

    let (mut a0, mut a1) = (max, min);
    let (mut indices, error) = fit_channel(values, a0, a1);

    // The six-value mode spends no palette entries on exact 0 and 255
    if passes > 0 {
        let inner = values.iter().copied().filter(|&v| v != 0 && v != 255);
        let lo = inner.clone().min();
        let hi = inner.max();
        if let (Some(lo), Some(hi)) = (lo, hi) {
            let (alt_indices, alt_error) = fit_channel(values, lo, hi);
            if alt_error < error {
                a0 = lo;
                a1 = hi;
                indices = alt_indices;
            }
        }
    }

    let mut out = [0u8; 8];
    out[0] = a0;
    out[1] = a1;
    out[2..8].copy_from_slice(&indices.to_le_bytes()[0..6]);
    out
}
