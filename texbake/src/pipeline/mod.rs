//! Job pipeline stages: validation snapshot, mip chain, preprocessing.
//!
//! The compressor strings these together:
//!
//! ```text
//! InputDescriptor + CompressionProfile
//!          │
//!          ▼
//!     ResolvedJob ── validation, derived extents and mip count
//!          │
//!          ▼ per face
//!      MipChain ──── level 0, then supplied or downsampled levels
//!          │
//!          ▼ per level
//!    Preprocessor ── color → normal conversion → normal filter → normalize
//!          │
//!          ▼
//!     to_fixed ───── output gamma, premultiply, 8-bit RGBA for the engine
//! ```

pub mod extents;
mod mipchain;
mod preprocess;
mod resolve;

use std::fmt;

pub use mipchain::MipChain;
pub use preprocess::{bgra_to_float, to_fixed, Preprocessor};
pub use resolve::ResolvedJob;

/// Lifecycle of a single compression job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Validating,
    GeneratingMips,
    Preprocessing,
    Encoding,
    Writing,
    Done,
    Failed,
}

impl JobState {
    /// Whether the job can move from `self` to `next`.
    ///
    /// The generate → preprocess → encode → write cycle repeats once per
    /// (face, level); any running state may fail.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, Validating) => true,
            (Validating, GeneratingMips) => true,
            (GeneratingMips, Preprocessing) => true,
            (Preprocessing, Encoding) => true,
            (Encoding, Writing) => true,
            (Writing, GeneratingMips) => true,
            (Writing, Done) => true,
            (Done | Failed | Idle, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Validating => "validating",
            JobState::GeneratingMips => "generating_mips",
            JobState::Preprocessing => "preprocessing",
            JobState::Encoding => "encoding",
            JobState::Writing => "writing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}
