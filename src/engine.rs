//! Engine abstraction.
//!
//! The archive reader talks to the compression engine exclusively through
//! the [`Engine`] and [`EngineArchive`] traits defined here. The native
//! 7-Zip binding in [`crate::native`] is the production implementation; the
//! value types in this module ([`PropertyId`], [`PropValue`],
//! [`OperationResult`]) are the Rust-side view of what crosses the ABI.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::format::ArchiveFormat;
use crate::password::Password;
use crate::source::SharedStream;
use crate::string::LongPathPolicy;
use crate::{Error, Result};

/// Identifier of an item or archive property (`kpid*` in the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum PropertyId {
    /// Full in-archive path.
    Path,
    /// File name.
    Name,
    /// File extension.
    Extension,
    /// Directory flag.
    IsDir,
    /// Uncompressed size.
    Size,
    /// Compressed size.
    PackSize,
    /// Attribute bitmask.
    Attrib,
    /// Creation time.
    CTime,
    /// Access time.
    ATime,
    /// Modification time.
    MTime,
    /// Solid archive flag.
    Solid,
    /// Commented flag.
    Commented,
    /// Encrypted flag.
    Encrypted,
    /// Dictionary size.
    DictionarySize,
    /// CRC-32 of the item data.
    Crc,
    /// Type description.
    Type,
    /// Anti-item flag.
    IsAnti,
    /// Compression method description.
    Method,
    /// Host operating system.
    HostOs,
    /// Comment text.
    Comment,
    /// Item position within the archive.
    Position,
    /// Multi-volume flag.
    IsVolume,
    /// Offset of the archive in the file.
    Offset,
    /// Number of solid blocks.
    NumBlocks,
    /// Number of volumes.
    NumVolumes,
    /// Physical size of the archive.
    PhySize,
    /// Size of the headers.
    HeadersSize,
    /// Checksum of the item.
    Checksum,
    /// POSIX mode bits.
    PosixAttrib,
    /// Symbolic link target.
    SymLink,
    /// Error description.
    Error,
    /// Error flag bitmask.
    ErrorFlags,
    /// Warning flag bitmask.
    WarningFlags,
    /// Number of streams.
    NumStreams,
    /// Index of the current volume.
    VolumeIndex,
    /// Code page of names.
    CodePage,
    /// Read-only flag.
    ReadOnly,
    /// Any other engine property.
    Other(u32),
}

impl PropertyId {
    /// Returns the engine's numeric property id.
    pub fn id(self) -> u32 {
        match self {
            Self::Path => 3,
            Self::Name => 4,
            Self::Extension => 5,
            Self::IsDir => 6,
            Self::Size => 7,
            Self::PackSize => 8,
            Self::Attrib => 9,
            Self::CTime => 10,
            Self::ATime => 11,
            Self::MTime => 12,
            Self::Solid => 13,
            Self::Commented => 14,
            Self::Encrypted => 15,
            Self::DictionarySize => 18,
            Self::Crc => 19,
            Self::Type => 20,
            Self::IsAnti => 21,
            Self::Method => 22,
            Self::HostOs => 23,
            Self::Comment => 28,
            Self::Position => 29,
            Self::IsVolume => 35,
            Self::Offset => 36,
            Self::NumBlocks => 38,
            Self::NumVolumes => 39,
            Self::PhySize => 44,
            Self::HeadersSize => 45,
            Self::Checksum => 46,
            Self::PosixAttrib => 53,
            Self::SymLink => 54,
            Self::Error => 55,
            Self::ErrorFlags => 71,
            Self::WarningFlags => 72,
            Self::NumStreams => 74,
            Self::VolumeIndex => 80,
            Self::CodePage => 83,
            Self::ReadOnly => 93,
            Self::Other(id) => id,
        }
    }

    /// Maps an engine property id back to a [`PropertyId`].
    pub fn from_id(id: u32) -> Self {
        match id {
            3 => Self::Path,
            4 => Self::Name,
            5 => Self::Extension,
            6 => Self::IsDir,
            7 => Self::Size,
            8 => Self::PackSize,
            9 => Self::Attrib,
            10 => Self::CTime,
            11 => Self::ATime,
            12 => Self::MTime,
            13 => Self::Solid,
            14 => Self::Commented,
            15 => Self::Encrypted,
            18 => Self::DictionarySize,
            19 => Self::Crc,
            20 => Self::Type,
            21 => Self::IsAnti,
            22 => Self::Method,
            23 => Self::HostOs,
            28 => Self::Comment,
            29 => Self::Position,
            35 => Self::IsVolume,
            36 => Self::Offset,
            38 => Self::NumBlocks,
            39 => Self::NumVolumes,
            44 => Self::PhySize,
            45 => Self::HeadersSize,
            46 => Self::Checksum,
            53 => Self::PosixAttrib,
            54 => Self::SymLink,
            55 => Self::Error,
            71 => Self::ErrorFlags,
            72 => Self::WarningFlags,
            74 => Self::NumStreams,
            80 => Self::VolumeIndex,
            83 => Self::CodePage,
            93 => Self::ReadOnly,
            other => Self::Other(other),
        }
    }

    /// Returns a human-readable property name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Path => "Path",
            Self::Name => "Name",
            Self::Extension => "Extension",
            Self::IsDir => "IsDir",
            Self::Size => "Size",
            Self::PackSize => "PackSize",
            Self::Attrib => "Attrib",
            Self::CTime => "CTime",
            Self::ATime => "ATime",
            Self::MTime => "MTime",
            Self::Solid => "Solid",
            Self::Commented => "Commented",
            Self::Encrypted => "Encrypted",
            Self::DictionarySize => "DictionarySize",
            Self::Crc => "CRC",
            Self::Type => "Type",
            Self::IsAnti => "IsAnti",
            Self::Method => "Method",
            Self::HostOs => "HostOS",
            Self::Comment => "Comment",
            Self::Position => "Position",
            Self::IsVolume => "IsVolume",
            Self::Offset => "Offset",
            Self::NumBlocks => "NumBlocks",
            Self::NumVolumes => "NumVolumes",
            Self::PhySize => "PhySize",
            Self::HeadersSize => "HeadersSize",
            Self::Checksum => "Checksum",
            Self::PosixAttrib => "PosixAttrib",
            Self::SymLink => "SymLink",
            Self::Error => "Error",
            Self::ErrorFlags => "ErrorFlags",
            Self::WarningFlags => "WarningFlags",
            Self::NumStreams => "NumStreams",
            Self::VolumeIndex => "VolumeIndex",
            Self::CodePage => "CodePage",
            Self::ReadOnly => "ReadOnly",
            Self::Other(_) => "Other",
        }
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(id) => write!(f, "Property({})", id),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// A property value returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropValue {
    /// The property is not set.
    #[default]
    Empty,
    /// Boolean value.
    Bool(bool),
    /// Unsigned 32-bit value.
    U32(u32),
    /// Unsigned 64-bit value.
    U64(u64),
    /// Signed 32-bit value.
    I32(i32),
    /// Signed 64-bit value.
    I64(i64),
    /// Text value.
    String(String),
    /// Windows FILETIME (100-ns intervals since 1601-01-01).
    FileTime(u64),
}

impl PropValue {
    /// Returns true if the value is [`PropValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer, widening or converting
    /// non-negative signed values.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            Self::I32(v) => u64::try_from(v).ok(),
            Self::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the value as a `u32` if it fits.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// Returns the value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the raw FILETIME, if the value is a timestamp.
    pub fn as_filetime(&self) -> Option<u64> {
        match self {
            Self::FileTime(t) => Some(*t),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{}", if *b { "+" } else { "-" }),
            Self::U32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{}", s),
            Self::FileTime(t) => write!(f, "{}", t),
        }
    }
}

/// Result of the engine's per-item extract or test operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationResult {
    /// The item was processed successfully.
    Ok,
    /// The compression method is not supported.
    UnsupportedMethod,
    /// The data is corrupted.
    DataError,
    /// The CRC check failed.
    CrcError,
    /// The data is not available (e.g. missing volume).
    Unavailable,
    /// The data ended unexpectedly.
    UnexpectedEnd,
    /// There is data after the end of the payload.
    DataAfterEnd,
    /// The data is not an archive.
    IsNotArc,
    /// The headers are damaged.
    HeadersError,
    /// The password is wrong.
    WrongPassword,
    /// An unknown result code.
    Other(i32),
}

impl OperationResult {
    /// Maps the engine's numeric result code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::UnsupportedMethod,
            2 => Self::DataError,
            3 => Self::CrcError,
            4 => Self::Unavailable,
            5 => Self::UnexpectedEnd,
            6 => Self::DataAfterEnd,
            7 => Self::IsNotArc,
            8 => Self::HeadersError,
            9 => Self::WrongPassword,
            other => Self::Other(other),
        }
    }

    /// Returns true for [`OperationResult::Ok`].
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// What the engine intends to do with an item during an extract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskMode {
    /// Decode the item and write its data.
    Extract,
    /// Decode the item and verify it without writing.
    Test,
    /// Skip over the item.
    Skip,
}

impl AskMode {
    /// Maps the engine's numeric ask mode.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Extract,
            1 => Self::Test,
            _ => Self::Skip,
        }
    }
}

/// Receiver of item data and per-item results during an extract or test.
///
/// Calls for one item always arrive in the order `begin`, `write*`,
/// `finish`. Items arrive in ascending index order.
pub trait ExtractSink: Send {
    /// Called with the total number of bytes the engine will process.
    fn total(&mut self, bytes: u64) {
        let _ = bytes;
    }

    /// Called periodically with the number of bytes processed so far.
    fn completed(&mut self, bytes: u64) {
        let _ = bytes;
    }

    /// Called before the engine processes `index`.
    ///
    /// Returns `true` if the sink wants the item's data delivered through
    /// [`write`](Self::write).
    fn begin(&mut self, index: u32, mode: AskMode) -> io::Result<bool>;

    /// Receives a chunk of decoded data for `index`.
    fn write(&mut self, index: u32, data: &[u8]) -> io::Result<()>;

    /// Called once the engine has finished processing `index`.
    fn finish(&mut self, index: u32, result: OperationResult) -> io::Result<()>;
}

/// A sink shared between the reader and the engine callbacks.
pub type SharedSink = Arc<Mutex<dyn ExtractSink>>;

/// Whether an extract call decodes data for the caller or only verifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Deliver decoded data to the sink.
    Extract,
    /// Verify data without delivering it.
    Test,
}

/// Parameters of an engine open call.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRequest<'a> {
    /// Password offered when the engine asks for one.
    pub password: Option<&'a Password>,
    /// Path of the archive file, used to locate sibling volumes.
    pub volume_path: Option<&'a Path>,
    /// How far into the stream the engine may scan for a signature.
    pub max_check_start_position: Option<u64>,
    /// Path form used when the engine asks for sibling volumes.
    pub long_path_policy: LongPathPolicy,
}

/// A compression engine that can open archives.
pub trait Engine {
    /// Opens `stream` as an archive of `format`.
    ///
    /// # Errors
    ///
    /// - [`Error::FormatMismatch`] if the data is structurally not `format`
    /// - [`Error::PasswordRequired`] / [`Error::WrongPassword`] if the header
    ///   is encrypted and no or a wrong password was offered
    /// - [`Error::UnsupportedFormat`] if the engine has no handler for `format`
    fn open_archive<'a>(
        &'a self,
        format: ArchiveFormat,
        stream: SharedStream,
        request: &OpenRequest<'_>,
    ) -> Result<Box<dyn EngineArchive + 'a>>;
}

/// An archive opened by an [`Engine`].
///
/// Dropping the value closes the archive and releases every engine
/// resource associated with it.
pub trait EngineArchive {
    /// Number of items in the archive.
    fn item_count(&self) -> Result<u32>;

    /// Reads a property of item `index`.
    fn item_property(&self, index: u32, property: PropertyId) -> Result<PropValue>;

    /// Reads an archive-level property.
    fn archive_property(&self, property: PropertyId) -> Result<PropValue>;

    /// Lists the archive-level properties the handler exposes.
    fn archive_property_ids(&self) -> Result<Vec<PropertyId>>;

    /// Number of volumes the engine opened through the volume callback.
    fn opened_volumes(&self) -> u32 {
        1
    }

    /// Extracts or tests `indices` (all items when `None`), reporting to
    /// `sink`.
    ///
    /// Returns `Ok` when the engine call itself succeeded; per-item failures
    /// are reported through [`ExtractSink::finish`].
    fn extract(
        &self,
        indices: Option<&[u32]>,
        mode: ExtractMode,
        sink: SharedSink,
        password: Option<&Password>,
    ) -> Result<()>;
}

/// Reads an item property and maps an engine failure on it to `Empty`.
///
/// Handlers return `E_INVALIDARG` for properties they do not know about;
/// that is not an error from the caller's point of view.
pub(crate) fn optional_property(
    archive: &dyn EngineArchive,
    index: u32,
    property: PropertyId,
) -> Result<PropValue> {
    match archive.item_property(index, property) {
        Ok(value) => Ok(value),
        Err(Error::Engine { .. }) => Ok(PropValue::Empty),
        Err(e) => Err(e),
    }
}
