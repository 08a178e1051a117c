//! Output destinations, header policy and the error channel.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CompressError, CompressResult, ErrorKind};

/// Streaming receiver for encoded bytes.
///
/// `begin_image` announces each (face, level) before its bytes arrive.
/// Header bytes, when enabled, are written before the first announcement.
pub trait OutputHandler: Send + Sync {
    fn begin_image(&self, size: u64, width: u32, height: u32, depth: u32, face: u32, level: u32);

    fn write_data(&self, data: &[u8]) -> io::Result<()>;
}

/// Callback receiving the error kind of a failed job.
pub type ErrorHandler = Box<dyn Fn(ErrorKind) + Send + Sync>;

/// Where encoded bytes go.
#[derive(Clone)]
pub enum Destination {
    /// A file created (or truncated) when the job starts writing.
    File(PathBuf),
    /// A caller-supplied streaming handler.
    Handler(Arc<dyn OutputHandler>),
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::File(path) => f.debug_tuple("File").field(path).finish(),
            Destination::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Destination, header toggle and error channel of a job.
///
/// The error handler is fixed at construction.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use texbake::output::OutputSink;
///
/// let failures = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&failures);
///
/// let sink = OutputSink::to_file("out.dds")
///     .with_header(false)
///     .with_error_handler(move |_kind| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
///
/// assert!(!sink.writes_header());
/// ```
pub struct OutputSink {
    destination: Destination,
    write_header: bool,
    error_handler: Option<ErrorHandler>,
}

impl OutputSink {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            write_header: true,
            error_handler: None,
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Destination::File(path.into()))
    }

    pub fn to_handler(handler: Arc<dyn OutputHandler>) -> Self {
        Self::new(Destination::Handler(handler))
    }

    /// Whether a container header precedes the payload (default on).
    pub fn with_header(mut self, enabled: bool) -> Self {
        self.write_header = enabled;
        self
    }

    pub fn with_error_handler(mut self, handler: impl Fn(ErrorKind) + Send + Sync + 'static) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn writes_header(&self) -> bool {
        self.write_header
    }

    /// Deliver a job failure to the error channel, if one is registered.
    pub(crate) fn report_error(&self, kind: ErrorKind) {
        if let Some(handler) = &self.error_handler {
            handler(kind);
        }
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("destination", &self.destination)
            .field("write_header", &self.write_header)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Open destination for one job. Files are closed when it drops.
pub(crate) enum SinkWriter {
    File(BufWriter<File>),
    Handler(Arc<dyn OutputHandler>),
}

impl SinkWriter {
    pub(crate) fn open(destination: &Destination) -> CompressResult<Self> {
        match destination {
            Destination::File(path) => Ok(Self::File(create(path)?)),
            Destination::Handler(handler) => Ok(Self::Handler(Arc::clone(handler))),
        }
    }

    pub(crate) fn begin_image(&self, size: u64, extents: (u32, u32, u32), face: u32, level: u32) {
        if let SinkWriter::Handler(handler) = self {
            handler.begin_image(size, extents.0, extents.1, extents.2, face, level);
        }
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> CompressResult<()> {
        match self {
            SinkWriter::File(file) => file.write_all(data),
            SinkWriter::Handler(handler) => handler.write_data(data),
        }
        .map_err(CompressError::FileWrite)
    }

    pub(crate) fn finish(&mut self) -> CompressResult<()> {
        match self {
            SinkWriter::File(file) => file.flush().map_err(CompressError::FileWrite),
            SinkWriter::Handler(_) => Ok(()),
        }
    }
}

fn create(path: &Path) -> CompressResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| CompressError::FileOpen {
            path: path.to_path_buf(),
            source,
        })
}

/// An announced image inside a [`MemoryOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRecord {
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub face: u32,
    pub level: u32,
    /// Offset of the image's first byte in [`MemoryOutput::bytes`].
    pub offset: usize,
}

/// In-memory [`OutputHandler`] collecting every byte and announcement.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    bytes: Mutex<Vec<u8>>,
    images: Mutex<Vec<ImageRecord>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    pub fn images(&self) -> Vec<ImageRecord> {
        self.images.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputHandler for MemoryOutput {
    fn begin_image(&self, size: u64, width: u32, height: u32, depth: u32, face: u32, level: u32) {
        let offset = self.bytes.lock().len();
        self.images.lock().push(ImageRecord {
            size,
            width,
            height,
            depth,
            face,
            level,
            offset,
        });
    }

    fn write_data(&self, data: &[u8]) -> io::Result<()> {
        self.bytes.lock().extend_from_slice(data);
        Ok(())
    }
}
