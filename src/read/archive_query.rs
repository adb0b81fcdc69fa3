//! Item listing and archive-level queries.

use std::collections::BTreeMap;

use super::{Archive, ArchiveItem};
use crate::archive_path::normalize;
use crate::engine::{PropValue, PropertyId};
use crate::{Error, Result};

impl<'lib> Archive<'lib> {
    /// Returns every item in index order.
    pub fn items(&self) -> &[ArchiveItem] {
        &self.items
    }

    /// Returns an iterator over the items in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, ArchiveItem> {
        self.items.iter()
    }

    /// Returns the item at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `index >= items_count()`.
    pub fn item(&self, index: u32) -> Result<&ArchiveItem> {
        self.items
            .get(index as usize)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Finds an item by path.
    ///
    /// Both sides are normalized first, so `dir\file.txt`, `./dir/file.txt`
    /// and `dir/file.txt` all match the same item.
    pub fn find(&self, path: &str) -> Option<&ArchiveItem> {
        let wanted = normalize(path);
        self.items.iter().find(|item| normalize(&item.path) == wanted)
    }

    /// Like [`find`](Self::find), but a missing path is an error.
    ///
    /// # Errors
    ///
    /// [`Error::ItemNotFound`] if no item has `path`.
    pub fn item_by_path(&self, path: &str) -> Result<&ArchiveItem> {
        self.find(path).ok_or_else(|| Error::ItemNotFound {
            path: normalize(path),
        })
    }

    /// Returns true if an item with `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Number of items, directories included.
    pub fn items_count(&self) -> u32 {
        self.items.len() as u32
    }

    /// Number of items that are not directories.
    pub fn files_count(&self) -> u32 {
        self.items.iter().filter(|item| !item.is_directory).count() as u32
    }

    /// Number of directory items.
    pub fn folders_count(&self) -> u32 {
        self.items.iter().filter(|item| item.is_directory).count() as u32
    }

    /// Total uncompressed size of all items.
    pub fn size(&self) -> u64 {
        self.items.iter().map(|item| item.size).sum()
    }

    /// Total compressed size of all items.
    pub fn pack_size(&self) -> u64 {
        self.items.iter().map(|item| item.pack_size).sum()
    }

    /// Returns true if the archive has files and every one of them is
    /// encrypted.
    pub fn is_encrypted(&self) -> bool {
        let mut files = self.items.iter().filter(|item| !item.is_directory).peekable();
        files.peek().is_some() && files.all(|item| item.is_encrypted)
    }

    /// Returns true if any item is encrypted.
    pub fn has_encrypted_items(&self) -> bool {
        self.items.iter().any(|item| item.is_encrypted)
    }

    /// Returns true if the archive spans several volumes.
    pub fn is_multi_volume(&self) -> bool {
        self.format.is_virtual()
            || self.archive_flag(PropertyId::IsVolume)
            || self.volumes_count() > 1
    }

    /// Number of volumes the archive spans; 1 for single-file archives.
    pub fn volumes_count(&self) -> u32 {
        let reported = self
            .optional_archive_property(PropertyId::NumVolumes)
            .as_u32()
            .filter(|&n| n > 0);
        reported.unwrap_or_else(|| {
            self.volumes
                .unwrap_or(1)
                .max(self.inner.opened_volumes())
                .max(1)
        })
    }

    /// Returns true if the items are compressed together as one stream.
    pub fn is_solid(&self) -> bool {
        self.archive_flag(PropertyId::Solid)
    }

    /// Returns every archive-level property the handler reports a value
    /// for.
    pub fn archive_properties(&self) -> Result<BTreeMap<PropertyId, PropValue>> {
        let mut properties = BTreeMap::new();
        for id in self.inner.archive_property_ids()? {
            let value = self.optional_archive_property(id);
            if !value.is_empty() {
                properties.insert(id, value);
            }
        }
        Ok(properties)
    }

    /// Reads an archive-level property from the engine.
    pub fn archive_property(&self, property: PropertyId) -> Result<PropValue> {
        self.inner.archive_property(property)
    }

    /// Reads a property of item `index` from the engine.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `index >= items_count()`.
    pub fn item_property(&self, index: u32, property: PropertyId) -> Result<PropValue> {
        self.item(index)?;
        self.inner.item_property(index, property)
    }

    pub(super) fn out_of_range(&self, index: u32) -> Error {
        Error::IndexOutOfRange {
            index,
            count: self.items_count(),
        }
    }

    fn optional_archive_property(&self, property: PropertyId) -> PropValue {
        self.inner.archive_property(property).unwrap_or_else(|e| {
            log::trace!("archive property {} unavailable: {}", property, e);
            PropValue::Empty
        })
    }

    fn archive_flag(&self, property: PropertyId) -> bool {
        self.optional_archive_property(property)
            .as_bool()
            .unwrap_or(false)
    }
}

impl<'a, 'lib> IntoIterator for &'a Archive<'lib> {
    type Item = &'a ArchiveItem;
    type IntoIter = std::slice::Iter<'a, ArchiveItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
