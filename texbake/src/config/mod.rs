//! INI job configuration.
//!
//! A job file describes the input options, the compression profile and the
//! output destination of a job. Pixel data and the texture layout are not
//! part of it; the caller still supplies those through an
//! [`InputDescriptor`].
//!
//! ```ini
//! [input]
//! mip_filter = kaiser
//! wrap = repeat
//! alpha_mode = transparency
//!
//! [compression]
//! format = dxt5
//! quality = production
//! color_weights = 0.3, 0.59, 0.11, 1.0
//!
//! [output]
//! path = out.dds
//! header = true
//!
//! [logging]
//! directory = logs
//! filter = texbake=debug
//! ```
//!
//! # Example
//!
//! ```
//! use texbake::config::JobConfig;
//! use texbake::format::Format;
//! use texbake::profile::CompressionProfile;
//!
//! let config = JobConfig::from_ini_str("[compression]\nformat = bc3\n").unwrap();
//!
//! let mut profile = CompressionProfile::new();
//! config.apply_profile(&mut profile);
//! assert_eq!(profile.format(), Format::Bc3);
//! ```

mod parser;

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::input::{InputDescriptor, InputSettings};
use crate::logging::LoggingConfig;
use crate::output::OutputSink;
use crate::profile::CompressionProfile;

/// Errors loading a job file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed.
    #[error("Failed to read job file: {0}")]
    ReadError(#[from] ini::Error),

    /// The text is not valid INI.
    #[error("Failed to parse job file: {0}")]
    ParseError(#[from] ini::ParseError),

    /// A key holds a value it cannot take.
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Options loaded from a job file.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub input: InputSettings,
    pub profile: CompressionProfile,
    /// `[output] path`; `None` when the file names no destination.
    pub output_path: Option<PathBuf>,
    /// `[output] header` (default true).
    pub write_header: bool,
    /// `[logging]` section, consumed by [`crate::logging::init_logging`].
    pub logging: LoggingConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input: InputSettings::default(),
            profile: CompressionProfile::default(),
            output_path: None,
            write_header: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl JobConfig {
    /// Load a job file. Keys the file leaves out keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path)?;
        parser::parse_ini(&ini)
    }

    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        parser::parse_ini(&ini)
    }

    /// Replace every option of `input`. Layout and pixel data are kept.
    pub fn apply_input(&self, input: &mut InputDescriptor<'_>) {
        input.set_settings(self.input.clone());
    }

    pub fn apply_profile(&self, profile: &mut CompressionProfile) {
        *profile = self.profile.clone();
    }

    /// File sink for `[output] path`, if the file names one.
    pub fn output_sink(&self) -> Option<OutputSink> {
        self.output_path
            .as_ref()
            .map(|path| OutputSink::to_file(path.clone()).with_header(self.write_header))
    }
}
