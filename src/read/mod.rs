//! Archive reading API.
//!
//! An [`Archive`] is one open session on an archive: its items are read
//! when it is opened, and it can then be queried, tested, and extracted.
//! Every archive borrows the [`Library`](crate::Library) that opened it.
//!
//! # Example
//!
//! ```rust,no_run
//! use zesven_native::{Archive, ExtractOptions, Library};
//!
//! let lib = Library::load_default()?;
//! let archive = Archive::open_path(&lib, "archive.7z")?;
//!
//! for item in &archive {
//!     println!("{}: {} bytes", item.path, item.size);
//! }
//!
//! archive.test()?;
//! let result = archive.extract_to("output_dir", &ExtractOptions::default())?;
//! assert!(result.is_ok());
//! # Ok::<(), zesven_native::Error>(())
//! ```

mod archive_open;
mod archive_query;
mod extraction;
#[cfg(test)]
pub(crate) mod fake;
mod info;
mod item;
mod metadata;
mod options;

pub use info::ExtractResult;
pub use item::ArchiveItem;
pub use options::{
    ExtractOptions, LinkPolicy, OpenOptions, OverwritePolicy, PreserveMetadata,
};

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::EngineArchive;
use crate::format::ArchiveFormat;
use crate::password::Password;
use crate::progress::ProgressReporter;
use crate::source::SourceKind;

/// Path given to the only item of a buffer or stream source that stores no
/// name.
pub const CONTENT_PLACEHOLDER: &str = "[Content]";

/// An open archive.
///
/// Holds engine resources for as long as it lives; dropping it closes the
/// archive. The `'lib` lifetime ties it to the engine that opened it.
pub struct Archive<'lib> {
    inner: Box<dyn EngineArchive + 'lib>,
    format: ArchiveFormat,
    detected: bool,
    source: SourceKind,
    path: Option<PathBuf>,
    items: Arc<[ArchiveItem]>,
    password: Option<Password>,
    /// Volumes concatenated before the engine saw the data.
    volumes: Option<u32>,
    progress: RefCell<Option<Box<dyn ProgressReporter>>>,
}

impl<'lib> Archive<'lib> {
    /// Returns the format the archive was opened as.
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Returns the format found by auto-detection, or `None` when the
    /// caller named the format explicitly.
    pub fn detected_format(&self) -> Option<ArchiveFormat> {
        self.detected.then_some(self.format)
    }

    /// Returns what kind of source the archive was opened from.
    pub fn source_kind(&self) -> SourceKind {
        self.source
    }

    /// Returns the archive path for path sources.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sets the password used for item data from now on.
    ///
    /// The archive is not reopened: items listed under an encrypted header
    /// stay as they were read.
    pub fn set_password(&mut self, password: impl Into<Password>) {
        self.password = Some(password.into());
    }

    /// Forgets the password.
    pub fn clear_password(&mut self) {
        self.password = None;
    }

    /// Returns true if a password is set.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Installs a progress reporter for subsequent test and extract calls.
    pub fn set_progress(&self, reporter: impl ProgressReporter + 'static) {
        *self.progress.borrow_mut() = Some(Box::new(reporter));
    }

    /// Removes the progress reporter.
    pub fn clear_progress(&self) {
        self.progress.borrow_mut().take();
    }
}

impl std::fmt::Debug for Archive<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("format", &self.format)
            .field("source", &self.source)
            .field("path", &self.path)
            .field("items", &self.items.len())
            .field("password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}
