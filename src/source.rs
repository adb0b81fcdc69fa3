//! Archive input sources.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::format::ArchiveFormat;
use crate::string::{LongPathPolicy, io_path};
use crate::volume::{MultiVolumeReader, VolumeReader, is_volume_path};
use crate::{Error, Result};

/// A seekable byte stream that can be handed to the engine.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Reads until `buf` is full or the reader is exhausted.
///
/// Returns the number of bytes read, which is less than `buf.len()` only at
/// end of stream.
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A stream shared between the reader and the engine's stream objects.
pub type SharedStream = Arc<Mutex<Box<dyn ReadSeek>>>;

/// Where archive bytes come from.
///
/// The three kinds are mutually exclusive; only path sources can locate
/// sibling volumes or provide a file stem for single-item archives.
pub enum ArchiveSource {
    /// A file on disk.
    Path(PathBuf),
    /// An in-memory buffer.
    Buffer(Vec<u8>),
    /// A caller-provided seekable stream.
    Stream(Box<dyn ReadSeek>),
}

/// The kind of an [`ArchiveSource`], kept after the source is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Opened from a file path.
    Path,
    /// Opened from a memory buffer.
    Buffer,
    /// Opened from a stream.
    Stream,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Buffer => write!(f, "buffer"),
            Self::Stream => write!(f, "stream"),
        }
    }
}

impl ArchiveSource {
    /// Wraps any seekable reader.
    pub fn stream<R: ReadSeek + 'static>(reader: R) -> Self {
        Self::Stream(Box::new(reader))
    }

    /// Returns the kind of this source.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Path(_) => SourceKind::Path,
            Self::Buffer(_) => SourceKind::Buffer,
            Self::Stream(_) => SourceKind::Stream,
        }
    }

    /// Returns the file path for path sources.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Buffer(data) => f.debug_struct("Buffer").field("len", &data.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ArchiveSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for ArchiveSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ArchiveSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Buffer(data)
    }
}

impl From<&[u8]> for ArchiveSource {
    fn from(data: &[u8]) -> Self {
        Self::Buffer(data.to_vec())
    }
}

impl From<Box<dyn ReadSeek>> for ArchiveSource {
    fn from(stream: Box<dyn ReadSeek>) -> Self {
        Self::Stream(stream)
    }
}

/// A source turned into a shared stream, ready for the engine.
pub(crate) struct OpenedSource {
    pub stream: SharedStream,
    pub kind: SourceKind,
    pub path: Option<PathBuf>,
    /// Volumes concatenated by [`MultiVolumeReader`], if any.
    pub volumes: Option<u32>,
}

impl OpenedSource {
    /// Opens `source`.
    ///
    /// A numbered volume path (`name.001`) opened under a concrete format is
    /// read through a [`MultiVolumeReader`]; with `Split` or no format the
    /// first volume is opened alone and the engine requests the rest.
    pub fn open(
        source: ArchiveSource,
        format: Option<ArchiveFormat>,
        policy: LongPathPolicy,
    ) -> Result<Self> {
        let kind = source.kind();
        let (stream, path, volumes): (Box<dyn ReadSeek>, _, _) = match source {
            ArchiveSource::Path(path) => {
                let concatenate =
                    format.is_some_and(|f| !f.is_virtual()) && is_volume_path(&path);
                if concatenate {
                    let reader = MultiVolumeReader::open(&path)?;
                    let count = reader.volume_count();
                    (Box::new(reader), Some(path), Some(count))
                } else {
                    let file = File::open(io_path(&path, policy)).map_err(|e| {
                        log::debug!("cannot open {}: {}", path.display(), e);
                        Error::Io(e)
                    })?;
                    (Box::new(BufReader::new(file)), Some(path), None)
                }
            }
            ArchiveSource::Buffer(data) => (Box::new(Cursor::new(data)), None, None),
            ArchiveSource::Stream(stream) => (stream, None, None),
        };

        Ok(Self {
            stream: Arc::new(Mutex::new(stream)),
            kind,
            path,
            volumes,
        })
    }

    /// Rewinds the shared stream before a new open attempt.
    pub fn rewind(&self) -> io::Result<()> {
        lock_stream(&self.stream).rewind()
    }
}

/// Locks a shared stream, ignoring poisoning.
pub(crate) fn lock_stream(stream: &SharedStream) -> std::sync::MutexGuard<'_, Box<dyn ReadSeek>> {
    stream.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
