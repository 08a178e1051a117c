//! DDS-style container header.
//!
//! The layout follows the 128-byte DirectDraw Surface header. The canonical
//! format tag is also written into a reserved word behind a `TXBK` marker so
//! that formats sharing a FourCC (BC1 and BC1a, BC3 and BC3n) can be told
//! apart when the header is read back.

use thiserror::Error;

use crate::engine::TextureHeader;
use crate::format::{Format, PixelLayout};
use crate::input::TextureKind;

/// Serialized header length, magic included.
pub const HEADER_SIZE: usize = 128;

const MAGIC: [u8; 4] = *b"DDS ";
const STRUCT_SIZE: u32 = 124;
const PIXEL_FORMAT_SIZE: u32 = 32;
const SIGNATURE: [u8; 4] = *b"TXBK";

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PITCH: u32 = 0x8;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x20000;
const DDSD_LINEARSIZE: u32 = 0x80000;
const DDSD_DEPTH: u32 = 0x800000;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_NORMAL: u32 = 0x8000_0000;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;

const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_CUBEMAP_ALL_FACES: u32 = 0xFC00;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;

/// Errors returned when reading a header back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header needs {HEADER_SIZE} bytes, got {0}")]
    TooShort(usize),

    #[error("missing DDS magic")]
    BadMagic,

    #[error("unexpected header size {0}")]
    BadSize(u32),

    #[error("unrecognised pixel format")]
    UnknownFormat,
}

fn fourcc(format: Format) -> Option<[u8; 4]> {
    match format {
        Format::Rgb => None,
        Format::Bc1 | Format::Bc1a => Some(*b"DXT1"),
        Format::Bc2 => Some(*b"DXT3"),
        Format::Bc3 | Format::Bc3n => Some(*b"DXT5"),
        Format::Bc4 => Some(*b"ATI1"),
        Format::Bc5 => Some(*b"ATI2"),
    }
}

fn format_from_fourcc(code: &[u8], normal: bool) -> Option<Format> {
    match code {
        b"DXT1" => Some(Format::Bc1),
        b"DXT3" => Some(Format::Bc2),
        b"DXT5" if normal => Some(Format::Bc3n),
        b"DXT5" => Some(Format::Bc3),
        b"ATI1" | b"BC4U" => Some(Format::Bc4),
        b"ATI2" | b"BC5U" => Some(Format::Bc5),
        _ => None,
    }
}

/// Size of the top level: linear size for block formats, pitch otherwise.
///
/// The field is 32 bits wide; larger surfaces saturate to `u32::MAX`.
fn pitch_or_linear_size(header: &TextureHeader) -> u32 {
    let size = match header.format.block_size() {
        Some(block) => {
            header.width.div_ceil(4) as u64 * header.height.div_ceil(4) as u64 * block as u64
        }
        None => header.pixel_layout.pitch(header.width),
    };
    u32::try_from(size).unwrap_or(u32::MAX)
}

/// Serialize a header to its 128-byte form.
pub(crate) fn to_bytes(header: &TextureHeader) -> Vec<u8> {
    let compressed = header.format.is_block_compressed();

    let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT;
    flags |= if compressed {
        DDSD_LINEARSIZE
    } else {
        DDSD_PITCH
    };
    if header.mip_count > 1 {
        flags |= DDSD_MIPMAPCOUNT;
    }
    if header.depth > 1 {
        flags |= DDSD_DEPTH;
    }

    let mut caps = DDSCAPS_TEXTURE;
    let mut caps2 = 0;
    if header.mip_count > 1 {
        caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    if header.kind == TextureKind::Cube {
        caps |= DDSCAPS_COMPLEX;
        caps2 |= DDSCAPS2_CUBEMAP | DDSCAPS2_CUBEMAP_ALL_FACES;
    }
    if header.depth > 1 {
        caps |= DDSCAPS_COMPLEX;
        caps2 |= DDSCAPS2_VOLUME;
    }

    let mut reserved1 = [0u32; 11];
    reserved1[9] = u32::from_le_bytes(SIGNATURE);
    reserved1[10] = header.format.tag();

    let mut pf_flags = 0;
    let mut code = [0u8; 4];
    let mut layout = PixelLayout::new(0, 0, 0, 0, 0);
    match fourcc(header.format) {
        Some(c) => {
            pf_flags |= DDPF_FOURCC;
            code = c;
        }
        None => {
            pf_flags |= DDPF_RGB;
            layout = header.pixel_layout;
            if layout.a_mask != 0 {
                pf_flags |= DDPF_ALPHAPIXELS;
            }
        }
    }
    if header.is_normal_map {
        pf_flags |= DDPF_NORMAL;
    }

    let mut bytes = Vec::with_capacity(HEADER_SIZE);
    bytes.extend_from_slice(&MAGIC);

    for value in [
        STRUCT_SIZE,
        flags,
        header.height,
        header.width,
        pitch_or_linear_size(header),
        if header.depth > 1 { header.depth } else { 0 },
        header.mip_count,
    ] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for value in reserved1 {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    // Pixel format (32 bytes)
    bytes.extend_from_slice(&PIXEL_FORMAT_SIZE.to_le_bytes());
    bytes.extend_from_slice(&pf_flags.to_le_bytes());
    bytes.extend_from_slice(&code);
    for value in [
        layout.bit_count,
        layout.r_mask,
        layout.g_mask,
        layout.b_mask,
        layout.a_mask,
    ] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    // caps, caps2, caps3, caps4, reserved2
    for value in [caps, caps2, 0, 0, 0] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    bytes
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Read a header written by [`to_bytes`]. Plain DDS headers are accepted too;
/// without the signature the format comes from the FourCC or RGB masks.
pub(crate) fn parse(bytes: &[u8]) -> Result<TextureHeader, HeaderError> {
    if bytes.len() < HEADER_SIZE {
        return Err(HeaderError::TooShort(bytes.len()));
    }
    if bytes[0..4] != MAGIC {
        return Err(HeaderError::BadMagic);
    }
    let size = read_u32(bytes, 4);
    if size != STRUCT_SIZE {
        return Err(HeaderError::BadSize(size));
    }

    let height = read_u32(bytes, 12);
    let width = read_u32(bytes, 16);
    let depth = read_u32(bytes, 24).max(1);
    let mip_count = read_u32(bytes, 28).max(1);
    let signature = read_u32(bytes, 32 + 9 * 4);
    let tag = read_u32(bytes, 32 + 10 * 4);

    let pf_flags = read_u32(bytes, 80);
    let code = &bytes[84..88];
    let layout = PixelLayout::new(
        read_u32(bytes, 88),
        read_u32(bytes, 92),
        read_u32(bytes, 96),
        read_u32(bytes, 100),
        read_u32(bytes, 104),
    );
    let caps2 = read_u32(bytes, 112);
    let is_normal_map = pf_flags & DDPF_NORMAL != 0;

    let format = if signature.to_le_bytes() == SIGNATURE {
        Format::from_tag(tag)
    } else if pf_flags & DDPF_FOURCC != 0 {
        format_from_fourcc(code, is_normal_map)
    } else if pf_flags & DDPF_RGB != 0 {
        Some(Format::Rgb)
    } else {
        None
    }
    .ok_or(HeaderError::UnknownFormat)?;

    let kind = if caps2 & DDSCAPS2_CUBEMAP != 0 {
        TextureKind::Cube
    } else {
        TextureKind::TwoD
    };

    Ok(TextureHeader {
        kind,
        width,
        height,
        depth,
        mip_count,
        format,
        pixel_layout: if format == Format::Rgb {
            layout
        } else {
            PixelLayout::default()
        },
        is_normal_map,
    })
}
