//! Archive item descriptors.

use std::time::SystemTime;

use crate::archive_path::{extension, file_name};
use crate::attributes;
use crate::engine::{EngineArchive, PropValue, PropertyId, optional_property};
use crate::timestamp::Timestamp;
use crate::Result;

/// An item of an open archive.
///
/// Items are read once when the archive is opened; the values do not change
/// for the lifetime of the [`Archive`](super::Archive).
///
/// This struct is marked `#[non_exhaustive]`; pattern matching on it
/// requires a `..` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ArchiveItem {
    /// Position of the item in the archive, starting at 0.
    pub index: u32,
    /// Last path segment.
    pub name: String,
    /// Path within the archive, as stored.
    pub path: String,
    /// Extension of the name without the dot. Empty for directories.
    pub extension: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Compressed size in bytes.
    ///
    /// Solid archives attribute the whole block to one item; the others
    /// report 0.
    pub pack_size: u64,
    /// CRC-32 of the uncompressed data, for formats that store one.
    pub crc32: Option<u32>,
    /// Attribute bitmask, see [`crate::attributes`].
    pub attributes: u32,
    /// Whether the item data is encrypted.
    pub is_encrypted: bool,
    /// Whether the item is a directory.
    pub is_directory: bool,
    /// Whether the item is a symbolic link.
    pub is_symlink: bool,
    /// Target of a symbolic link, when the handler reports it.
    pub link_target: Option<String>,
    /// Modification time.
    pub modification_time: Option<Timestamp>,
    /// Creation time.
    pub creation_time: Option<Timestamp>,
    /// Access time.
    pub access_time: Option<Timestamp>,
}

impl ArchiveItem {
    /// Reads item `index` from `archive`.
    ///
    /// `fallback_path` names the item when the handler stores no path
    /// (single-stream formats such as gzip without a stored name).
    pub(crate) fn load(
        archive: &dyn EngineArchive,
        index: u32,
        fallback_path: &str,
    ) -> Result<Self> {
        let property = |id| optional_property(archive, index, id);

        let stored_name = non_empty(property(PropertyId::Name)?);
        let path = match non_empty(property(PropertyId::Path)?) {
            Some(path) => path,
            None => stored_name
                .clone()
                .unwrap_or_else(|| fallback_path.to_string()),
        };
        let name = stored_name.unwrap_or_else(|| file_name(&path).to_string());

        let attributes = match property(PropertyId::Attrib)?.as_u32() {
            Some(attrib) => attrib,
            None => property(PropertyId::PosixAttrib)?
                .as_u32()
                .map(attributes::from_posix)
                .unwrap_or(0),
        };
        let is_directory = property(PropertyId::IsDir)?
            .as_bool()
            .unwrap_or_else(|| attributes::is_dir(attributes));
        let link_target = non_empty(property(PropertyId::SymLink)?);
        let is_symlink =
            link_target.is_some() || (!is_directory && attributes::is_symlink(attributes));

        let extension = if is_directory {
            String::new()
        } else {
            match non_empty(property(PropertyId::Extension)?) {
                Some(ext) => ext,
                None => extension(&name).to_string(),
            }
        };

        let time = |id| -> Result<Option<Timestamp>> {
            Ok(property(id)?
                .as_filetime()
                .filter(|&ft| ft != 0)
                .map(Timestamp::from_filetime))
        };

        let item = Self {
            index,
            size: property(PropertyId::Size)?.as_u64().unwrap_or(0),
            pack_size: property(PropertyId::PackSize)?.as_u64().unwrap_or(0),
            crc32: property(PropertyId::Crc)?.as_u32(),
            is_encrypted: property(PropertyId::Encrypted)?.as_bool().unwrap_or(false),
            modification_time: time(PropertyId::MTime)?,
            creation_time: time(PropertyId::CTime)?,
            access_time: time(PropertyId::ATime)?,
            name,
            path,
            extension,
            attributes,
            is_directory,
            is_symlink,
            link_target,
        };
        log::trace!(
            "item {}: {:?} ({} bytes, dir: {})",
            index,
            item.path,
            item.size,
            item.is_directory
        );
        Ok(item)
    }

    /// Returns true if this is neither a directory nor a symbolic link.
    pub fn is_file(&self) -> bool {
        !self.is_directory && !self.is_symlink
    }

    /// Returns the POSIX mode, if the attributes carry one.
    pub fn posix_mode(&self) -> Option<u32> {
        attributes::posix_mode(self.attributes)
    }

    /// Returns true if the item is marked read-only.
    pub fn is_readonly(&self) -> bool {
        attributes::is_readonly(self.attributes)
    }

    /// Returns true if the item carries the hidden attribute.
    pub fn is_hidden(&self) -> bool {
        attributes::is_hidden(self.attributes)
    }

    /// Returns the modification time as a `SystemTime`.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modification_time.map(|ts| ts.as_system_time())
    }

    /// Returns the creation time as a `SystemTime`.
    pub fn created(&self) -> Option<SystemTime> {
        self.creation_time.map(|ts| ts.as_system_time())
    }

    /// Returns the access time as a `SystemTime`.
    pub fn accessed(&self) -> Option<SystemTime> {
        self.access_time.map(|ts| ts.as_system_time())
    }
}

fn non_empty(value: PropValue) -> Option<String> {
    match value {
        PropValue::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::fake::{FakeArchive, FakeItem};

    #[test]
    fn test_load_regular_file() {
        let archive = FakeArchive::new(vec![
            FakeItem::file("docs/readme.txt", b"hello")
                .with(PropertyId::MTime, PropValue::FileTime(116444736000000000)),
        ]);
        let item = ArchiveItem::load(&archive, 0, "unused").unwrap();
        assert_eq!(item.path, "docs/readme.txt");
        assert_eq!(item.name, "readme.txt");
        assert_eq!(item.extension, "txt");
        assert_eq!(item.size, 5);
        assert_eq!(item.crc32, Some(crc32fast::hash(b"hello")));
        assert!(item.is_file());
        assert_eq!(item.modified(), Some(std::time::UNIX_EPOCH));
        assert!(item.created().is_none());
    }

    #[test]
    fn test_load_directory_has_no_extension() {
        let archive = FakeArchive::new(vec![FakeItem::dir("photos.d")]);
        let item = ArchiveItem::load(&archive, 0, "unused").unwrap();
        assert!(item.is_directory);
        assert!(!item.is_file());
        assert_eq!(item.extension, "");
        assert_eq!(item.size, 0);
    }

    #[test]
    fn test_load_path_fallback() {
        let archive = FakeArchive::new(vec![FakeItem::unnamed(b"data")]);
        let item = ArchiveItem::load(&archive, 0, "[Content]").unwrap();
        assert_eq!(item.path, "[Content]");
        assert_eq!(item.name, "[Content]");
    }

    #[test]
    fn test_load_posix_attributes() {
        let archive = FakeArchive::new(vec![
            FakeItem::file("bin/tool", b"#!")
                .without(PropertyId::Attrib)
                .with(PropertyId::PosixAttrib, PropValue::U32(0o100755)),
            FakeItem::file("link", b"tool")
                .with(PropertyId::Attrib, PropValue::U32(attributes::from_posix(0o120777))),
        ]);
        let tool = ArchiveItem::load(&archive, 0, "").unwrap();
        assert_eq!(tool.posix_mode(), Some(0o100755));
        assert!(!tool.is_symlink);

        let link = ArchiveItem::load(&archive, 1, "").unwrap();
        assert!(link.is_symlink);
        assert!(!link.is_file());
    }

    #[test]
    fn test_windows_attribute_flags() {
        let archive = FakeArchive::new(vec![
            FakeItem::file("hidden", b"h").with(
                PropertyId::Attrib,
                PropValue::U32(attributes::HIDDEN | attributes::ARCHIVE),
            ),
            FakeItem::file("read_only", b"r").with(
                PropertyId::Attrib,
                PropValue::U32(attributes::READONLY | attributes::ARCHIVE),
            ),
        ]);
        let hidden = ArchiveItem::load(&archive, 0, "").unwrap();
        assert!(hidden.is_hidden());
        assert!(!hidden.is_readonly());
        assert!(hidden.is_file());

        let read_only = ArchiveItem::load(&archive, 1, "").unwrap();
        assert!(read_only.is_readonly());
        assert!(!read_only.is_hidden());
    }
}
