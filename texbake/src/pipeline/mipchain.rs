//! Lazy mip chain for one face.

use crate::engine::{DownsampleParams, EncodingEngine, FloatImage};
use crate::error::{CompressError, CompressResult};
use crate::pipeline::extents::level_extent;
use crate::pipeline::preprocess::bgra_to_float;

/// Finite iterator over the levels of one face.
///
/// Level 0 is the (already resized) base image. Each later level is either
/// the caller's buffer for that exact size or, when generation is enabled,
/// the engine's downsample of the previous level. Iteration stops after the
/// declared count or at 1×1, whichever comes first. The first error ends the
/// chain.
pub struct MipChain<'a> {
    engine: &'a dyn EncodingEngine,
    params: DownsampleParams,
    face: u32,
    base: Option<FloatImage>,
    supplied: Vec<Option<&'a [u8]>>,
    generate: bool,
    previous: Option<FloatImage>,
    next_level: u32,
    count: u32,
}

impl<'a> MipChain<'a> {
    /// `supplied[level]` holds caller pixels usable for that level; its
    /// length is the number of levels to produce.
    pub fn new(
        engine: &'a dyn EncodingEngine,
        params: DownsampleParams,
        face: u32,
        base: FloatImage,
        supplied: Vec<Option<&'a [u8]>>,
        generate: bool,
    ) -> Self {
        let count = supplied.len().max(1) as u32;
        Self {
            engine,
            params,
            face,
            base: Some(base),
            supplied,
            generate,
            previous: None,
            next_level: 0,
            count,
        }
    }

    fn produce(&mut self, level: u32) -> CompressResult<FloatImage> {
        if level == 0 {
            return self
                .base
                .take()
                .ok_or_else(|| CompressError::Internal("mip chain restarted".to_string()));
        }

        let previous = self
            .previous
            .as_ref()
            .ok_or_else(|| CompressError::Internal("mip chain has no previous level".to_string()))?;

        if let Some(Some(data)) = self.supplied.get(level as usize) {
            let width = level_extent(previous.width(), 1);
            let height = level_extent(previous.height(), 1);
            return bgra_to_float(data, width, height);
        }

        if !self.generate {
            return Err(CompressError::MissingMipmap {
                face: self.face,
                level,
            });
        }

        Ok(self.engine.downsample(previous, &self.params)?)
    }
}

impl Iterator for MipChain<'_> {
    type Item = CompressResult<(u32, FloatImage)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_level >= self.count {
            return None;
        }
        if let Some(previous) = &self.previous {
            if previous.width() == 1 && previous.height() == 1 {
                return None;
            }
        }

        let level = self.next_level;
        match self.produce(level) {
            Ok(image) => {
                tracing::trace!(
                    face = self.face,
                    level = level,
                    width = image.width(),
                    height = image.height(),
                    "Mip level ready"
                );
                self.previous = Some(image.clone());
                self.next_level += 1;
                Some(Ok((level, image)))
            }
            Err(e) => {
                self.next_level = self.count;
                Some(Err(e))
            }
        }
    }
}
