//! Native 7-Zip engine binding.
//!
//! [`Library`] loads the engine shared object (`7z.dll`, `7z.so`,
//! `lib7z.dylib`) and creates format handlers through its `CreateObject`
//! export. Everything that touches the COM-style ABI lives below this
//! module; the rest of the crate only sees the [`Engine`] trait.
//!
//! # Example
//!
//! ```rust,no_run
//! use zesven_native::{ArchiveFormat, Library};
//!
//! let lib = Library::load("/usr/lib/p7zip/7z.so")?;
//! println!("engine ships {:?} formats", lib.format_count());
//! assert!(lib.supports(ArchiveFormat::SevenZip));
//! # Ok::<(), zesven_native::Error>(())
//! ```

mod archive;
mod callback;
pub(crate) mod com;
mod propvariant;
mod stream;

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use crate::engine::{Engine, EngineArchive, OpenRequest};
use crate::format::ArchiveFormat;
use crate::source::SharedStream;
use crate::{Error, Result};

use archive::NativeArchive;
pub use archive::DEFAULT_MAX_CHECK_START_POSITION;
use com::{ComPtr, HRESULT, IID_IIN_ARCHIVE, S_OK, check};
pub use com::Guid;

type CreateObjectFn =
    unsafe extern "system" fn(*const Guid, *const Guid, *mut *mut c_void) -> HRESULT;
type GetNumberOfFormatsFn = unsafe extern "system" fn(*mut u32) -> HRESULT;
type SetLargePageModeFn = unsafe extern "system" fn() -> HRESULT;

/// Places the engine is looked for by [`Library::load_default`].
#[cfg(windows)]
pub const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "7z.dll",
    r"C:\Program Files\7-Zip\7z.dll",
    r"C:\Program Files (x86)\7-Zip\7z.dll",
];

/// Places the engine is looked for by [`Library::load_default`].
#[cfg(target_os = "macos")]
pub const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "lib7z.dylib",
    "7z.so",
    "/opt/homebrew/lib/p7zip/7z.so",
    "/usr/local/lib/p7zip/7z.so",
];

/// Places the engine is looked for by [`Library::load_default`].
#[cfg(not(any(windows, target_os = "macos")))]
pub const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "7z.so",
    "/usr/lib/7zip/7z.so",
    "/usr/lib/p7zip/7z.so",
    "/usr/libexec/p7zip/7z.so",
    "/usr/lib64/p7zip/7z.so",
    "/usr/local/lib/p7zip/7z.so",
    "/usr/lib/x86_64-linux-gnu/p7zip/7z.so",
];

/// A loaded 7-Zip engine.
///
/// The shared object stays loaded for as long as the value lives; every
/// [`Archive`](crate::Archive) borrows it, so the library cannot be dropped
/// while an archive is open.
pub struct Library {
    path: PathBuf,
    create_object: CreateObjectFn,
    get_number_of_formats: Option<GetNumberOfFormatsFn>,
    set_large_page_mode: Option<SetLargePageModeFn>,
    _library: libloading::Library,
}

impl Library {
    /// Loads the engine from `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::LibraryLoad`] if the file cannot be loaded
    /// - [`Error::MissingSymbol`] if it does not export `CreateObject`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // SAFETY: loading runs the engine's static initializers, which only
        // register codecs and formats
        let library = unsafe { libloading::Library::new(path) }.map_err(|source| {
            Error::LibraryLoad {
                path: path.display().to_string(),
                source,
            }
        })?;

        // SAFETY: the signatures match the engine's exports
        let (create_object, get_number_of_formats, set_large_page_mode) = unsafe {
            let create_object = library
                .get::<CreateObjectFn>(b"CreateObject\0")
                .map(|symbol| *symbol)
                .map_err(|_| Error::MissingSymbol {
                    symbol: "CreateObject",
                })?;
            let get_number_of_formats = library
                .get::<GetNumberOfFormatsFn>(b"GetNumberOfFormats\0")
                .ok()
                .map(|symbol| *symbol);
            let set_large_page_mode = library
                .get::<SetLargePageModeFn>(b"SetLargePageMode\0")
                .ok()
                .map(|symbol| *symbol);
            (create_object, get_number_of_formats, set_large_page_mode)
        };

        log::debug!("loaded 7-Zip library {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            create_object,
            get_number_of_formats,
            set_large_page_mode,
            _library: library,
        })
    }

    /// Loads the engine from the first of [`DEFAULT_SEARCH_PATHS`] that works.
    ///
    /// # Errors
    ///
    /// [`Error::LibraryNotFound`] listing every location tried.
    pub fn load_default() -> Result<Self> {
        let mut searched = Vec::with_capacity(DEFAULT_SEARCH_PATHS.len());
        for candidate in DEFAULT_SEARCH_PATHS {
            match Self::load(candidate) {
                Ok(library) => return Ok(library),
                Err(e) => {
                    log::debug!("{}", e);
                    searched.push((*candidate).to_string());
                }
            }
        }
        Err(Error::LibraryNotFound { searched })
    }

    /// Returns the path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of format handlers the engine provides, if it
    /// exports `GetNumberOfFormats`.
    pub fn format_count(&self) -> Option<u32> {
        let get = self.get_number_of_formats?;
        let mut count = 0u32;
        // SAFETY: valid out pointer
        let hr = unsafe { get(&mut count) };
        (hr == S_OK).then_some(count)
    }

    /// Asks the engine to use large memory pages for its buffers.
    ///
    /// # Errors
    ///
    /// [`Error::MissingSymbol`] if the engine does not export
    /// `SetLargePageMode`.
    pub fn set_large_page_mode(&self) -> Result<()> {
        let set = self.set_large_page_mode.ok_or(Error::MissingSymbol {
            symbol: "SetLargePageMode",
        })?;
        // SAFETY: the export takes no arguments
        check(unsafe { set() }, "set large page mode")
    }

    /// Returns true if the engine can create a handler for `format`.
    pub fn supports(&self, format: ArchiveFormat) -> bool {
        self.create_in_archive(format).is_ok()
    }

    fn create_in_archive(&self, format: ArchiveFormat) -> Result<ComPtr> {
        let class_id = format.class_id();
        let mut out = std::ptr::null_mut();
        // SAFETY: valid GUID pointers and out pointer
        let hr = unsafe { (self.create_object)(&class_id, &IID_IIN_ARCHIVE, &mut out) };
        if hr != S_OK {
            log::debug!("no handler for {} ({:#010x})", format, hr as u32);
            return Err(Error::UnsupportedFormat { format });
        }
        // SAFETY: CreateObject returned an owned reference
        unsafe { ComPtr::from_raw(out) }.ok_or(Error::UnsupportedFormat { format })
    }
}

impl Engine for Library {
    fn open_archive<'a>(
        &'a self,
        format: ArchiveFormat,
        stream: SharedStream,
        request: &OpenRequest<'_>,
    ) -> Result<Box<dyn EngineArchive + 'a>> {
        let handler = self.create_in_archive(format)?;
        log::debug!("trying to open as {}", format);
        let archive: NativeArchive<'a> = NativeArchive::open(handler, format, stream, request)?;
        Ok(Box::new(archive))
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}
