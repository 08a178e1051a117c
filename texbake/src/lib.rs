//! texbake - texture compression jobs
//!
//! This library turns raw BGRA images into GPU block-compressed textures
//! (BC1 through BC5) or packed uncompressed pixels, with optional mipmap
//! generation, color and normal-map preprocessing, and a DDS-style header.
//!
//! A job is described by three objects:
//!
//! - [`InputDescriptor`]: layout, borrowed pixel data and preprocessing intent
//! - [`CompressionProfile`]: target format, quality and quantization
//! - [`OutputSink`]: destination, header toggle and error channel
//!
//! and run by a [`Compressor`].

pub mod compressor;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod input;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod profile;

pub use compressor::{Compressor, JobReport};
pub use error::{CompressError, CompressResult, ErrorKind};
pub use format::{Format, Quality};
pub use input::{InputDescriptor, TextureKind};
pub use output::{OutputHandler, OutputSink};
pub use profile::CompressionProfile;
