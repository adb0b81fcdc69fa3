//! Metadata restoration for extracted files.

use std::path::Path;

use filetime::FileTime;

use super::{ArchiveItem, PreserveMetadata};
use crate::timestamp::Timestamp;

/// Applies an item's times and permissions to `path`.
///
/// Failures are logged and otherwise ignored: the data is already on disk.
pub(crate) fn apply_metadata(path: &Path, item: &ArchiveItem, options: &PreserveMetadata) {
    let mtime = item
        .modification_time
        .filter(|_| options.modification_time)
        .map(to_file_time);
    let atime = item
        .access_time
        .filter(|_| options.access_time)
        .map(to_file_time);

    let outcome = match (atime, mtime) {
        (Some(atime), Some(mtime)) => filetime::set_file_times(path, atime, mtime),
        (None, Some(mtime)) => filetime::set_file_mtime(path, mtime),
        (Some(atime), None) => filetime::set_file_atime(path, atime),
        (None, None) => Ok(()),
    };
    if let Err(e) = outcome {
        log::warn!("Failed to set file times on '{}': {}", path.display(), e);
    }

    // Permissions last: a read-only file refuses time changes on Windows.
    if options.attributes {
        apply_file_attributes(path, item);
    }
}

fn to_file_time(ts: Timestamp) -> FileTime {
    FileTime::from_unix_time(ts.as_unix_secs(), ts.sub_second_100ns() * 100)
}

#[cfg(unix)]
fn apply_file_attributes(path: &Path, item: &ArchiveItem) {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match item.posix_mode() {
        Some(mode) => std::fs::Permissions::from_mode(mode & 0o7777),
        None if item.is_readonly() => match std::fs::metadata(path) {
            Ok(metadata) => {
                let mut permissions = metadata.permissions();
                permissions.set_readonly(true);
                permissions
            }
            Err(e) => {
                log::warn!("Failed to read permissions of '{}': {}", path.display(), e);
                return;
            }
        },
        None => return,
    };
    if let Err(e) = std::fs::set_permissions(path, permissions) {
        log::warn!("Failed to set permissions on '{}': {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn apply_file_attributes(path: &Path, item: &ArchiveItem) {
    if !item.is_readonly() || item.is_directory {
        return;
    }
    match std::fs::metadata(path) {
        Ok(metadata) => {
            let mut permissions = metadata.permissions();
            permissions.set_readonly(true);
            if let Err(e) = std::fs::set_permissions(path, permissions) {
                log::warn!(
                    "Failed to set read-only attribute on '{}': {}",
                    path.display(),
                    e
                );
            }
        }
        Err(e) => log::warn!("Failed to read attributes of '{}': {}", path.display(), e),
    }
}
