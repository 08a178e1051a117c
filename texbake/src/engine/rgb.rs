//! Uncompressed output packed per a [`PixelLayout`].

use image::RgbaImage;

use crate::format::{mask_shift_and_size, PixelLayout};

/// Scale an 8-bit value to a channel of `size` bits.
fn scale(value: u8, size: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    let max = if size >= 32 {
        u32::MAX as u64
    } else {
        (1u64 << size) - 1
    };
    ((value as u64 * max + 127) / 255) as u32
}

/// Pack every pixel into `layout.bytes_per_pixel()` little-endian bytes,
/// padding each row to the layout's 4-byte aligned pitch.
pub(crate) fn pack(image: &RgbaImage, layout: &PixelLayout) -> Vec<u8> {
    let (width, height) = image.dimensions();
    let bpp = layout.bytes_per_pixel() as usize;
    let pitch = layout.pitch(width) as usize;
    let channels = layout.masks().map(mask_shift_and_size);

    let mut out = Vec::with_capacity(pitch * height as usize);
    for y in 0..height {
        let row_start = out.len();
        for x in 0..width {
            let p = image.get_pixel(x, y).0;
            let mut packed = 0u32;
            for (c, &(shift, size)) in channels.iter().enumerate() {
                if size > 0 {
                    packed |= scale(p[c], size) << shift;
                }
            }
            out.extend_from_slice(&packed.to_le_bytes()[..bpp]);
        }
        out.resize(row_start + pitch, 0);
    }
    out
}
