//! Logging setup for hosts embedding texbake.
//!
//! The library only emits `tracing` events and never installs a subscriber.
//! Every job runs inside a `compress_job` span carrying the job id and the
//! engine name, so events from jobs running on different threads stay
//! apart. The subscriber built by [`init_logging`] prints each span's close
//! event, which gives one timing line per job.
//!
//! The settings come from the `[logging]` section of a job file:
//!
//! ```ini
//! [logging]
//! directory = logs
//! file = texbake.log
//! filter = texbake=debug
//! stdout = false
//! ```
//!
//! `RUST_LOG`, when set, overrides `filter`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Where job logs go and how much of them is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory holding the log file; created on demand.
    pub directory: PathBuf,
    /// Log file name, truncated at every [`init_logging`] call.
    pub file_name: String,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// Mirror events to stdout.
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "texbake.log".to_string(),
            filter: "info".to_string(),
            stdout: true,
        }
    }
}

impl LoggingConfig {
    pub fn log_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Keeps the background log writer alive.
///
/// Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails if the directory cannot be created, the file cannot be truncated,
/// or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> io::Result<LoggingGuard> {
    prepare_log_file(&config.directory, &config.file_name)?;

    let file_appender = tracing_appender::rolling::never(&config.directory, &config.file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_names(true);

    let stdout_layer = config.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
    });

    tracing_subscriber::registry()
        .with(job_filter(&config.filter))
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// `RUST_LOG` if set, otherwise `directives`.
fn job_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Create `log_dir` if needed and truncate the session's log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file);
    fs::write(&path, "")?;
    Ok(path)
}
