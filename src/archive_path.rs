//! In-archive path normalization and extraction path safety.
//!
//! Handlers report paths with whatever separator the archive stores. Lookup
//! by path works on a normalized form: forward slashes, no leading `./` or
//! `/`. Extraction additionally rejects anything that could land outside the
//! destination directory.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Maximum accepted path length in bytes.
const MAX_PATH_LENGTH: usize = 32768;

/// Windows reserved device names that cannot be used as filenames.
///
/// Rejected on every platform so an archive extracts the same way
/// everywhere.
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Checks if a filename is a Windows reserved name, with or without an
/// extension (`CON`, `con.txt`).
fn is_windows_reserved(name: &str) -> bool {
    let base = match name.find('.') {
        Some(pos) => &name[..pos],
        None => name,
    };
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| base.eq_ignore_ascii_case(reserved))
}

/// Normalizes an in-archive path for comparison.
///
/// Backslashes become `/`, leading `./` and `/` are removed, and repeated
/// separators collapse.
///
/// # Examples
///
/// ```
/// use zesven_native::archive_path::normalize;
///
/// assert_eq!(normalize(r".\dir\file.txt"), "dir/file.txt");
/// assert_eq!(normalize("/dir//file.txt"), "dir/file.txt");
/// ```
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Returns the last segment of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Returns the extension of the last segment, without the dot.
///
/// Dotfiles such as `.profile` have no extension.
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(pos) => &name[pos + 1..],
    }
}

/// Returns the stem of a file system path, used as the item name of
/// single-stream archives (`notes.txt.gz` gives `notes.txt`).
pub fn stem_of(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

/// Maps an in-archive path onto a relative file system path.
///
/// # Errors
///
/// [`Error::InvalidPath`] if the path is empty, too long, contains NUL, is
/// absolute, contains a `..` segment, or names a reserved device.
pub fn to_relative_path(path: &str) -> Result<PathBuf> {
    let invalid = |reason| Error::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.contains('\0') {
        return Err(invalid("contains NUL byte"));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(invalid("path too long"));
    }
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(invalid("absolute path not allowed"));
    }

    let mut relative = PathBuf::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid("parent directory reference")),
            name if is_windows_reserved(name) => return Err(invalid("reserved device name")),
            name => relative.push(name),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(invalid("empty path"));
    }
    debug_assert!(relative.components().all(|c| matches!(c, Component::Normal(_))));
    Ok(relative)
}

/// Returns `true` if a link stored at `link_path` pointing to `target`
/// resolves inside the extraction root.
///
/// The target is resolved against the link's parent directory without
/// touching the file system. Absolute targets never qualify.
///
/// # Examples
///
/// ```
/// use zesven_native::archive_path::link_target_stays_inside;
///
/// assert!(link_target_stays_inside("dir/link", "../file.txt"));
/// assert!(!link_target_stays_inside("dir/link", "../../file.txt"));
/// assert!(!link_target_stays_inside("link", "/etc/passwd"));
/// ```
pub fn link_target_stays_inside(link_path: &str, target: &str) -> bool {
    let target = target.replace('\\', "/");
    if target.starts_with('/') || has_drive_prefix(&target) {
        return false;
    }

    let link = normalize(link_path);
    let mut depth = link.split('/').count().saturating_sub(1);
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => match depth.checked_sub(1) {
                Some(up) => depth = up,
                None => return false,
            },
            _ => depth += 1,
        }
    }
    true
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
