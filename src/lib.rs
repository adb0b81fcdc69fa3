//! # zesven-native
//!
//! Read archives through the native 7-Zip engine.
//!
//! This crate loads the 7-Zip shared library (`7z.dll`, `7z.so`,
//! `lib7z.dylib`) at runtime and drives it through its COM-style ABI. The
//! engine does all parsing, decompression, checksum verification, and
//! decryption; the crate turns its results into Rust values with owned
//! lifetimes and typed errors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zesven_native::{Archive, ExtractOptions, Library, Result};
//!
//! fn main() -> Result<()> {
//!     // The library must outlive every archive opened with it.
//!     let lib = Library::load_default()?;
//!     let archive = Archive::open_path(&lib, "archive.7z")?;
//!
//!     for item in archive.items() {
//!         println!("{}: {} bytes", item.path, item.size);
//!     }
//!
//!     archive.test()?;
//!     let result = archive.extract_to("./output", &ExtractOptions::default())?;
//!     println!("extracted {} items", result.entries_extracted);
//!     Ok(())
//! }
//! ```
//!
//! ### Encrypted Archives
//!
//! ```rust,no_run
//! use zesven_native::{Archive, Error, Library, OpenOptions};
//!
//! let lib = Library::load_default()?;
//! if Archive::is_header_encrypted(&lib, "secret.7z", None)? {
//!     println!("the item list itself is encrypted");
//! }
//!
//! let mut archive = Archive::open(&lib, "secret.7z", OpenOptions::new().password("pw"))?;
//! match archive.extract_to_buffer(0) {
//!     Err(Error::WrongPassword { .. }) => archive.set_password("other"),
//!     other => println!("{} bytes", other?.len()),
//! }
//! # Ok::<(), zesven_native::Error>(())
//! ```
//!
//! ### Archives in Memory
//!
//! ```rust,no_run
//! use zesven_native::{Archive, Library};
//!
//! let lib = Library::load_default()?;
//! let data = std::fs::read("bundle.zip")?;
//! let archive = Archive::open_buffer(&lib, data)?;
//! for (path, contents) in archive.extract_to_memory()? {
//!     println!("{path}: {} bytes", contents.len());
//! }
//! # Ok::<(), zesven_native::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`]. [`Error::kind`] groups failures
//! into open, authentication, range, integrity, and I/O errors:
//!
//! ```rust,no_run
//! use zesven_native::{Archive, Error, ErrorKind, Library};
//!
//! let lib = Library::load_default()?;
//! match Archive::open_path(&lib, "data.bin") {
//!     Ok(archive) => println!("{} items", archive.items_count()),
//!     Err(Error::UnknownFormat { tried }) => println!("not an archive ({tried:?})"),
//!     Err(e) if e.kind() == ErrorKind::Authentication => println!("needs a password"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), zesven_native::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `p7zip-abi` | No | Vtable layout of p7zip builds, which insert destructor slots after `IUnknown` |
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod archive_path;
pub mod attributes;
pub mod engine;
pub mod error;
pub mod format;
pub mod native;
pub mod password;
pub mod progress;
pub mod read;
pub mod source;
pub mod string;
pub mod timestamp;
pub mod volume;

pub use error::{Error, ErrorKind, Result};
pub use format::ArchiveFormat;
pub use native::Library;
pub use password::Password;
pub use timestamp::Timestamp;

// Re-export reading API at crate root for convenience
pub use read::{
    Archive, ArchiveItem, ExtractOptions, ExtractResult, LinkPolicy, OpenOptions,
    OverwritePolicy, PreserveMetadata,
};
pub use source::{ArchiveSource, SourceKind};

// Re-export raw property access
pub use engine::{PropValue, PropertyId};

// Re-export progress API
pub use progress::{NoProgress, ProgressReporter, ProgressState, StatisticsProgress};
