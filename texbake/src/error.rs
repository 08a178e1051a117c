//! Error types for compression jobs.
//!
//! Every failure inside a job is a [`CompressError`] carrying enough context
//! for logging. At the job boundary it is collapsed into exactly one
//! [`ErrorKind`], which is what the output's error channel receives.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for job operations.
pub type CompressResult<T> = Result<T, CompressError>;

/// The error kinds reported through an output's error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Internal failure with no more specific kind.
    Unknown,
    /// Layout or pixel data does not describe a valid texture.
    InvalidInput,
    /// The host asked the job to stop.
    UserInterruption,
    /// The requested format cannot express the declared input.
    UnsupportedFeature,
    /// The accelerated backend failed.
    CudaError,
    /// The destination could not be opened for writing.
    FileOpen,
    /// Writing to the destination failed.
    FileWrite,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Unknown,
        ErrorKind::InvalidInput,
        ErrorKind::UserInterruption,
        ErrorKind::UnsupportedFeature,
        ErrorKind::CudaError,
        ErrorKind::FileOpen,
        ErrorKind::FileWrite,
    ];

    /// Human-readable description of the kind.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Unknown => "Unknown error",
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::UserInterruption => "Interrupted by user",
            ErrorKind::UnsupportedFeature => "Unsupported feature",
            ErrorKind::CudaError => "Accelerated backend error",
            ErrorKind::FileOpen => "Error opening file",
            ErrorKind::FileWrite => "Error writing through output handler",
        }
    }

    /// Whether the caller can fix the destination and resubmit.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::FileOpen | ErrorKind::FileWrite)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur while validating or running a compression job.
#[derive(Debug, Error)]
pub enum CompressError {
    /// No texture layout has been set.
    #[error("texture layout is not set")]
    LayoutUnset,

    /// A layout dimension is zero.
    #[error("invalid texture dimensions {width}×{height}×{depth}")]
    InvalidDimensions { width: u32, height: u32, depth: u32 },

    /// Pixel data was supplied for a slot the layout does not have.
    #[error("mipmap data for face {face}, level {level} lies outside the texture layout")]
    SlotOutOfLayout { face: u32, level: u32 },

    /// Pixel data has the wrong length for its slot.
    #[error("mipmap data for face {face}, level {level} has {actual} bytes, expected {expected}")]
    BufferSize {
        face: u32,
        level: u32,
        expected: usize,
        actual: usize,
    },

    /// A required slot has no pixel data.
    #[error("missing mipmap data for face {face}, level {level}")]
    MissingMipmap { face: u32, level: u32 },

    /// The format or option combination is not supported.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// The destination could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing to the destination failed.
    #[error("failed to write output: {0}")]
    FileWrite(#[source] io::Error),

    /// Cooperative cancellation was observed.
    #[error("job interrupted")]
    Interrupted,

    /// The accelerated backend reported a failure.
    #[error("accelerated backend failure: {0}")]
    Backend(String),

    /// Any other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompressError {
    /// The kind reported through the error channel for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompressError::LayoutUnset
            | CompressError::InvalidDimensions { .. }
            | CompressError::SlotOutOfLayout { .. }
            | CompressError::BufferSize { .. }
            | CompressError::MissingMipmap { .. } => ErrorKind::InvalidInput,
            CompressError::Unsupported(_) => ErrorKind::UnsupportedFeature,
            CompressError::FileOpen { .. } => ErrorKind::FileOpen,
            CompressError::FileWrite(_) => ErrorKind::FileWrite,
            CompressError::Interrupted => ErrorKind::UserInterruption,
            CompressError::Backend(_) => ErrorKind::CudaError,
            CompressError::Internal(_) => ErrorKind::Unknown,
        }
    }
}

impl From<EngineError> for CompressError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unsupported(msg) => CompressError::Unsupported(msg),
            EngineError::Backend(msg) => CompressError::Backend(msg),
            EngineError::Internal(msg) => CompressError::Internal(msg),
        }
    }
}
