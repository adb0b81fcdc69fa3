//! Multi-volume archive support.
//!
//! Archives split by a generic file splitter are stored as `name.001`,
//! `name.002`, and so on. When such a set is opened under its real format
//! (for example `backup.zip.001` as Zip), the volumes are concatenated by
//! [`MultiVolumeReader`] and the engine sees a single stream. When the set is
//! opened as [`Split`](crate::ArchiveFormat::Split), or for formats with
//! their own volume scheme (RAR), the engine requests sibling volumes itself
//! through the native volume callback.
//!
//! # Volume Naming Convention
//!
//! - `archive.zip.001` - First volume
//! - `archive.zip.002` - Second volume
//! - etc.
//!
//! The suffix width is taken from the path that was opened (three digits or
//! more).

mod reader;

pub use reader::{MultiVolumeReader, VolumeReader, is_volume_path, split_volume_path};
