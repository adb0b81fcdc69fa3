//! Error types for native archive operations.
//!
//! This module provides the [`Error`] enum which represents every failure the
//! binding can surface, the coarse [`ErrorKind`] discriminator, and the
//! [`Result<T>`] alias used throughout the crate.
//!
//! # Error Handling
//!
//! All fallible operations return `Result<T, Error>`. Errors are raised at the
//! point of failure and never retried:
//!
//! ```rust,no_run
//! use zesven_native::{Archive, Error, ErrorKind, Library};
//!
//! fn count_items(lib: &Library, path: &str) -> zesven_native::Result<u32> {
//!     match Archive::open_path(lib, path) {
//!         Ok(archive) => Ok(archive.items_count()),
//!         Err(e) if e.kind() == ErrorKind::Authentication => {
//!             eprintln!("{path} needs a password");
//!             Err(e)
//!         }
//!         Err(Error::FormatMismatch { format }) => {
//!             eprintln!("{path} is not a {format} archive");
//!             Err(Error::FormatMismatch { format })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use std::io;

use crate::engine::OperationResult;
use crate::format::ArchiveFormat;

/// Broad category of an [`Error`].
///
/// Every error belongs to exactly one category, which lets callers react to a
/// class of failures without matching individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine could not be loaded, or the archive could not be opened as
    /// the requested or detected format.
    Open,
    /// A password is missing or wrong.
    Authentication,
    /// An item index or path does not exist in the archive.
    Range,
    /// The engine reported corrupted or unsupported item data.
    Integrity,
    /// The underlying file or stream failed.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Authentication => write!(f, "authentication"),
            Self::Range => write!(f, "range"),
            Self::Integrity => write!(f, "integrity"),
            Self::Io => write!(f, "I/O"),
        }
    }
}

/// Helper struct for formatting item-scoped messages.
struct ItemDisplay<'a> {
    what: &'a str,
    index: Option<u32>,
    path: Option<&'a str>,
}

impl std::fmt::Display for ItemDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)?;
        match (self.index, self.path) {
            (Some(idx), Some(path)) => write!(f, " in item {} ({})", idx, path),
            (Some(idx), None) => write!(f, " in item {}", idx),
            (None, Some(path)) => write!(f, " in '{}'", path),
            (None, None) => Ok(()),
        }
    }
}

/// The main error type for native archive operations.
///
/// # Error Categories
///
/// | Kind | Variants |
/// |------|----------|
/// | Open | [`LibraryLoad`][Self::LibraryLoad], [`MissingSymbol`][Self::MissingSymbol], [`FormatMismatch`][Self::FormatMismatch], [`UnknownFormat`][Self::UnknownFormat], [`UnsupportedFormat`][Self::UnsupportedFormat], [`Engine`][Self::Engine], [`VolumeMissing`][Self::VolumeMissing] |
/// | Authentication | [`PasswordRequired`][Self::PasswordRequired], [`WrongPassword`][Self::WrongPassword] |
/// | Range | [`IndexOutOfRange`][Self::IndexOutOfRange], [`ItemNotFound`][Self::ItemNotFound], [`InvalidPath`][Self::InvalidPath], [`SymlinkTargetEscape`][Self::SymlinkTargetEscape] |
/// | Integrity | [`DataError`][Self::DataError], [`CrcMismatch`][Self::CrcMismatch], [`UnsupportedMethod`][Self::UnsupportedMethod], [`UnexpectedEnd`][Self::UnexpectedEnd], [`DataAfterEnd`][Self::DataAfterEnd], [`HeadersError`][Self::HeadersError], [`Unavailable`][Self::Unavailable] |
/// | Io | [`Io`][Self::Io] |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the archive file, stream, or extraction target.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine shared library could not be loaded.
    #[error("failed to load 7-Zip library '{path}': {source}")]
    LibraryLoad {
        /// Path that was passed to the loader.
        path: String,
        /// The loader error.
        #[source]
        source: libloading::Error,
    },

    /// No engine library was found in any of the searched locations.
    #[error("7-Zip library not found (searched: {})", searched.join(", "))]
    LibraryNotFound {
        /// Every location that was tried.
        searched: Vec<String>,
    },

    /// The engine library does not export a required entry point.
    #[error("7-Zip library does not export '{symbol}'")]
    MissingSymbol {
        /// Name of the missing export.
        symbol: &'static str,
    },

    /// The engine does not provide a handler for this format.
    #[error("format {format} is not supported by the loaded 7-Zip library")]
    UnsupportedFormat {
        /// The requested format.
        format: ArchiveFormat,
    },

    /// The data is structurally not an archive of the requested format.
    ///
    /// Returned before any item is enumerated when a caller forces the wrong
    /// format. During auto-detection this is the normal negative result that
    /// moves on to the next candidate.
    #[error("the archive is not a valid {format} archive")]
    FormatMismatch {
        /// The format that rejected the data.
        format: ArchiveFormat,
    },

    /// Auto-detection exhausted every candidate format.
    #[error("unable to detect the archive format (tried: {})", tried_names(tried))]
    UnknownFormat {
        /// Formats that were attempted, in order.
        tried: Vec<ArchiveFormat>,
    },

    /// An engine call failed with an unexpected HRESULT.
    #[error("7-Zip engine error {hresult:#010x} during {context}")]
    Engine {
        /// The raw HRESULT value.
        hresult: u32,
        /// The operation that failed.
        context: &'static str,
    },

    /// A volume of a multi-volume archive could not be opened.
    #[error("volume {volume} missing: expected at '{path}'")]
    VolumeMissing {
        /// The volume number (1-indexed).
        volume: u32,
        /// The expected path of the missing volume.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A password is needed but none was set.
    #[error("password required for encrypted archive")]
    PasswordRequired,

    /// The password that was set does not decrypt the data.
    #[error("{}", ItemDisplay { what: "wrong password", index: *index, path: None })]
    WrongPassword {
        /// The item whose data failed to decrypt, or `None` for the header.
        index: Option<u32>,
    },

    /// An item index is outside `0..count`.
    #[error("item index {index} out of range (archive has {count} items)")]
    IndexOutOfRange {
        /// The requested index.
        index: u32,
        /// Number of items in the archive.
        count: u32,
    },

    /// No item has the requested path.
    #[error("item not found: {path}")]
    ItemNotFound {
        /// The normalized path that was searched.
        path: String,
    },

    /// An item path cannot be mapped onto the file system safely.
    #[error("invalid item path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why the path was rejected.
        reason: &'static str,
    },

    /// A symbolic link points outside the extraction directory.
    #[error("symbolic link target escapes extraction directory at item {index}: {path} -> {target}")]
    SymlinkTargetEscape {
        /// The link item.
        index: u32,
        /// In-archive path of the link.
        path: String,
        /// The stored link target.
        target: String,
    },

    /// Item data is corrupted.
    #[error("{}", ItemDisplay { what: "data error", index: Some(*index), path: None })]
    DataError {
        /// The failing item.
        index: u32,
    },

    /// Item data does not match its stored checksum.
    #[error("{}", ItemDisplay { what: "CRC mismatch", index: Some(*index), path: None })]
    CrcMismatch {
        /// The failing item.
        index: u32,
    },

    /// Item uses a compression or encryption method the engine lacks.
    #[error("{}", ItemDisplay { what: "unsupported compression method", index: Some(*index), path: None })]
    UnsupportedMethod {
        /// The failing item.
        index: u32,
    },

    /// Item data ends before its declared size.
    #[error("{}", ItemDisplay { what: "unexpected end of data", index: Some(*index), path: None })]
    UnexpectedEnd {
        /// The failing item.
        index: u32,
    },

    /// Extra data follows the end of the item payload.
    #[error("{}", ItemDisplay { what: "data after end of payload", index: Some(*index), path: None })]
    DataAfterEnd {
        /// The failing item.
        index: u32,
    },

    /// The archive headers are damaged.
    #[error("{}", ItemDisplay { what: "headers error", index: Some(*index), path: None })]
    HeadersError {
        /// The item being processed when the error was found.
        index: u32,
    },

    /// Item data is not available, typically because a volume is missing.
    #[error("{}", ItemDisplay { what: "data unavailable", index: Some(*index), path: None })]
    Unavailable {
        /// The failing item.
        index: u32,
    },
}

fn tried_names(tried: &[ArchiveFormat]) -> String {
    if tried.is_empty() {
        return "none".to_string();
    }
    tried
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::LibraryLoad { .. }
            | Error::LibraryNotFound { .. }
            | Error::MissingSymbol { .. }
            | Error::UnsupportedFormat { .. }
            | Error::FormatMismatch { .. }
            | Error::UnknownFormat { .. }
            | Error::Engine { .. }
            | Error::VolumeMissing { .. } => ErrorKind::Open,
            Error::PasswordRequired | Error::WrongPassword { .. } => ErrorKind::Authentication,
            Error::IndexOutOfRange { .. }
            | Error::ItemNotFound { .. }
            | Error::InvalidPath { .. }
            | Error::SymlinkTargetEscape { .. } => ErrorKind::Range,
            Error::DataError { .. }
            | Error::CrcMismatch { .. }
            | Error::UnsupportedMethod { .. }
            | Error::UnexpectedEnd { .. }
            | Error::DataAfterEnd { .. }
            | Error::HeadersError { .. }
            | Error::Unavailable { .. } => ErrorKind::Integrity,
        }
    }

    /// Returns `true` if retrying with different input could succeed.
    ///
    /// - `PasswordRequired` / `WrongPassword`: retry with a password
    /// - `VolumeMissing`: provide the missing volume
    /// - `FormatMismatch`: retry with another format
    /// - `Io` (transient kinds only)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::PasswordRequired | Error::WrongPassword { .. } => true,
            Error::VolumeMissing { .. } | Error::FormatMismatch { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if this is a data corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::DataError { .. }
                | Error::CrcMismatch { .. }
                | Error::UnexpectedEnd { .. }
                | Error::DataAfterEnd { .. }
                | Error::HeadersError { .. }
        )
    }

    /// Returns `true` if this is an encryption-related error.
    pub fn is_encryption_error(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// Returns the item index associated with this error, if any.
    pub fn item_index(&self) -> Option<u32> {
        match self {
            Error::WrongPassword { index } => *index,
            Error::IndexOutOfRange { index, .. }
            | Error::SymlinkTargetEscape { index, .. }
            | Error::DataError { index }
            | Error::CrcMismatch { index }
            | Error::UnsupportedMethod { index }
            | Error::UnexpectedEnd { index }
            | Error::DataAfterEnd { index }
            | Error::HeadersError { index }
            | Error::Unavailable { index } => Some(*index),
            _ => None,
        }
    }

    /// Maps a failed per-item operation result onto an error.
    ///
    /// Data and CRC failures on encrypted items are reported as a wrong
    /// password, since that is by far the most common cause. Returns `None`
    /// for [`OperationResult::Ok`].
    pub fn from_operation_result(
        index: u32,
        result: OperationResult,
        encrypted: bool,
    ) -> Option<Self> {
        let err = match result {
            OperationResult::Ok => return None,
            OperationResult::WrongPassword => Error::WrongPassword { index: Some(index) },
            OperationResult::DataError | OperationResult::CrcError if encrypted => {
                Error::WrongPassword { index: Some(index) }
            }
            OperationResult::DataError => Error::DataError { index },
            OperationResult::CrcError => Error::CrcMismatch { index },
            OperationResult::UnsupportedMethod => Error::UnsupportedMethod { index },
            OperationResult::Unavailable => Error::Unavailable { index },
            OperationResult::UnexpectedEnd => Error::UnexpectedEnd { index },
            OperationResult::DataAfterEnd => Error::DataAfterEnd { index },
            OperationResult::IsNotArc => Error::DataError { index },
            OperationResult::HeadersError => Error::HeadersError { index },
            OperationResult::Other(_) => Error::DataError { index },
        };
        Some(err)
    }
}

/// A specialized Result type for native archive operations.
pub type Result<T> = std::result::Result<T, Error>;
