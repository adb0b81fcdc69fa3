//! Item attribute bitmask.
//!
//! The engine reports attributes as a 32-bit value. The low 16 bits hold
//! Windows file attributes. When [`UNIX_EXTENSION`] is set, the high 16 bits
//! hold a POSIX `st_mode`.

/// Windows read-only attribute.
pub const READONLY: u32 = 0x01;
/// Windows hidden attribute.
pub const HIDDEN: u32 = 0x02;
/// Windows system attribute.
pub const SYSTEM: u32 = 0x04;
/// Windows directory attribute.
pub const DIRECTORY: u32 = 0x10;
/// Windows archive attribute.
pub const ARCHIVE: u32 = 0x20;
/// Windows reparse point attribute (symbolic links and junctions).
pub const REPARSE_POINT: u32 = 0x400;
/// Flag: the high 16 bits carry a POSIX mode.
pub const UNIX_EXTENSION: u32 = 0x8000;
/// Bits of the Windows attribute half.
pub const WINDOWS_MASK: u32 = 0x7FFF;

/// POSIX file type mask.
pub const S_IFMT: u32 = 0o170000;
/// POSIX directory type.
pub const S_IFDIR: u32 = 0o040000;
/// POSIX regular file type.
pub const S_IFREG: u32 = 0o100000;
/// POSIX symbolic link type.
pub const S_IFLNK: u32 = 0o120000;

/// Returns the POSIX mode stored in `attributes`, if any.
pub fn posix_mode(attributes: u32) -> Option<u32> {
    (attributes & UNIX_EXTENSION != 0).then_some(attributes >> 16)
}

/// Returns true if `attributes` describe a directory.
pub fn is_dir(attributes: u32) -> bool {
    attributes & DIRECTORY != 0 || posix_mode(attributes).is_some_and(|m| m & S_IFMT == S_IFDIR)
}

/// Returns true if `attributes` describe a symbolic link.
pub fn is_symlink(attributes: u32) -> bool {
    match posix_mode(attributes) {
        Some(mode) if mode & S_IFMT != 0 => mode & S_IFMT == S_IFLNK,
        _ => attributes & REPARSE_POINT != 0,
    }
}

/// Returns true if `attributes` mark the item read-only.
pub fn is_readonly(attributes: u32) -> bool {
    attributes & READONLY != 0
}

/// Returns true if `attributes` carry the Windows hidden bit.
pub fn is_hidden(attributes: u32) -> bool {
    attributes & HIDDEN != 0
}

/// Builds an attribute value from a POSIX mode.
///
/// Directory and read-only bits are mirrored into the Windows half.
pub fn from_posix(mode: u32) -> u32 {
    let mut attributes = ((mode & 0xFFFF) << 16) | UNIX_EXTENSION;
    if mode & S_IFMT == S_IFDIR {
        attributes |= DIRECTORY;
    }
    if mode & 0o222 == 0 {
        attributes |= READONLY;
    }
    attributes
}
