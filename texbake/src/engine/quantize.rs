//! Pre-encoding quantization: binary alpha and Floyd–Steinberg dithering.

use image::RgbaImage;

use crate::format::{mask_shift_and_size, Format, PixelLayout, Quantization};

/// Apply the quantization policy in place.
///
/// Binary alpha runs first. Dithering then reduces channels to the precision
/// the target format stores: 5:6:5 color for BC1 to BC3, 4-bit alpha for BC2
/// and the mask widths for uncompressed output.
pub(crate) fn apply(image: &mut RgbaImage, format: Format, layout: &PixelLayout, q: &Quantization) {
    if q.binary_alpha {
        let threshold = q.alpha_threshold;
        diffuse(image, 3, q.alpha_dithering, |v| {
            if v > threshold as f32 {
                255
            } else {
                0
            }
        });
    }

    if q.color_dithering {
        let bits = match format {
            Format::Bc1 | Format::Bc1a | Format::Bc2 | Format::Bc3 => Some([5, 6, 5]),
            Format::Rgb => {
                let [r, g, b, _] = layout.masks().map(|m| mask_shift_and_size(m).1);
                Some([r, g, b])
            }
            _ => None,
        };
        if let Some(bits) = bits {
            for (channel, bits) in bits.into_iter().enumerate() {
                if bits > 0 && bits < 8 {
                    diffuse(image, channel, true, |v| reduce(v, bits));
                }
            }
        }
    }

    if q.alpha_dithering {
        let bits = match format {
            Format::Bc2 => Some(4),
            Format::Rgb => Some(mask_shift_and_size(layout.a_mask).1),
            _ => None,
        };
        if let Some(bits) = bits.filter(|&b| b > 0 && b < 8) {
            diffuse(image, 3, true, |v| reduce(v, bits));
        }
    }
}

/// Round an 8-bit value to the nearest value representable with `bits`
/// bits, expressed back in 8-bit range.
fn reduce(v: f32, bits: u32) -> u8 {
    let levels = ((1u32 << bits) - 1) as f32;
    let q = (v.clamp(0.0, 255.0) * levels / 255.0).round();
    (q * 255.0 / levels).round() as u8
}

/// Quantize one channel, optionally spreading the error over the
/// unvisited neighbours.
fn diffuse(image: &mut RgbaImage, channel: usize, dither: bool, quantize: impl Fn(f32) -> u8) {
    let (width, height) = image.dimensions();
    let w = width as usize;

    // Two rows of accumulated error, padded by one on each side
    let mut current = vec![0.0f32; w + 2];
    let mut next = vec![0.0f32; w + 2];

    for y in 0..height {
        for x in 0..width {
            let xi = x as usize + 1;
            let pixel = image.get_pixel_mut(x, y);
            let value = pixel.0[channel] as f32 + if dither { current[xi] } else { 0.0 };
            let q = quantize(value);
            pixel.0[channel] = q;

            if dither {
                let err = value - q as f32;
                current[xi + 1] += err * 7.0 / 16.0;
                next[xi - 1] += err * 3.0 / 16.0;
                next[xi] += err * 5.0 / 16.0;
                next[xi + 1] += err / 16.0;
            }
        }
        std::mem::swap(&mut current, &mut next);
        next.iter_mut().for_each(|e| *e = 0.0);
    }
}
