//! String and path conversion at the engine boundary.
//!
//! The engine exchanges text as NUL-terminated `wchar_t` strings: UTF-16 on
//! Windows and UTF-32 elsewhere. Inside the crate all text is UTF-8. This
//! module converts between the two, narrows UTF-8 into legacy code pages
//! when unavoidable, and rewrites over-long Windows paths into their
//! extended-length form.
//!
//! Every function here is pure: no global state, no configuration.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use encoding_rs::{EncoderResult, Encoding};
use widestring::{WideCStr, WideCString, WideStr};

pub use widestring::WideChar;

/// Replacement byte for characters a legacy code page cannot represent.
pub const NARROW_PLACEHOLDER: u8 = b'?';

/// Path length at which Windows APIs stop accepting regular paths.
pub const MAX_PATH: usize = 260;

const LONG_PATH_PREFIX: &str = r"\\?\";
const LONG_UNC_PREFIX: &str = r"\\?\UNC\";

/// Whether over-long paths are rewritten into extended-length form.
///
/// Only Windows has the length ceiling; elsewhere both policies behave the
/// same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongPathPolicy {
    /// Rewrite paths of [`MAX_PATH`] characters or more.
    #[default]
    Auto,
    /// Pass paths through unchanged.
    Never,
}

/// Converts UTF-8 text to a NUL-terminated wide string.
///
/// Text after an interior NUL is dropped, matching what the engine would
/// see through a C string anyway.
pub fn to_wide(s: &str) -> WideCString {
    WideCString::from_str_truncate(s)
}

/// Converts wide characters to UTF-8, replacing invalid code units with
/// U+FFFD.
pub fn from_wide(units: &[WideChar]) -> String {
    WideStr::from_slice(units).to_string_lossy()
}

/// Borrows the code units of a NUL-terminated wide string owned by the
/// engine, without the terminator. A null pointer gives an empty slice.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated wide string that stays
/// valid for `'a`.
pub unsafe fn wide_units<'a>(ptr: *const WideChar) -> &'a [WideChar] {
    if ptr.is_null() {
        return &[];
    }
    // SAFETY: caller guarantees a valid NUL-terminated string
    unsafe { WideCStr::from_ptr_str(ptr) }.as_slice()
}

/// Encodes UTF-8 text into a legacy code page.
///
/// Characters the code page cannot represent become
/// [`NARROW_PLACEHOLDER`] instead of failing the conversion.
///
/// # Example
///
/// ```rust
/// use zesven_native::string::narrow;
///
/// assert_eq!(narrow("caf\u{e9}", encoding_rs::WINDOWS_1252), b"caf\xe9");
/// assert_eq!(narrow("\u{4e2d}x", encoding_rs::WINDOWS_1252), b"?x");
/// ```
pub fn narrow(s: &str, encoding: &'static Encoding) -> Vec<u8> {
    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(s.len() + 16);
    let mut input = s;
    loop {
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(input, &mut out, true);
        input = &input[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => out.reserve(input.len() + 16),
            EncoderResult::Unmappable(_) => out.push(NARROW_PLACEHOLDER),
        }
    }
    out
}

/// Decodes legacy code page bytes into UTF-8, replacing malformed sequences
/// with U+FFFD.
pub fn widen<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    encoding.decode_without_bom_handling(bytes).0
}

/// Returns true if `path` needs the extended-length prefix.
///
/// Paths shorter than [`MAX_PATH`] and paths that already carry the prefix
/// are left alone.
pub fn should_format_long_path(path: &str) -> bool {
    path.chars().count() >= MAX_PATH && !path.starts_with(LONG_PATH_PREFIX)
}

/// Rewrites an absolute Windows path into extended-length form.
///
/// `C:\dir\file` becomes `\\?\C:\dir\file` and `\\server\share\file`
/// becomes `\\?\UNC\server\share\file`. Forward slashes are converted,
/// since the extended form disables separator normalization.
///
/// # Example
///
/// ```rust
/// use zesven_native::string::format_long_path;
///
/// assert_eq!(format_long_path(r"C:/data/a.7z"), r"\\?\C:\data\a.7z");
/// assert_eq!(format_long_path(r"\\srv\share\a.7z"), r"\\?\UNC\srv\share\a.7z");
/// ```
pub fn format_long_path(path: &str) -> String {
    if path.starts_with(LONG_PATH_PREFIX) {
        return path.to_string();
    }
    let normalized = path.replace('/', "\\");
    match normalized.strip_prefix(r"\\") {
        Some(unc) => format!("{LONG_UNC_PREFIX}{unc}"),
        None => format!("{LONG_PATH_PREFIX}{normalized}"),
    }
}

/// Returns the path to hand to the file system for `path`.
///
/// With [`LongPathPolicy::Auto`] on Windows, long paths are made absolute
/// and prefixed. On other platforms the path is returned unchanged.
pub fn io_path(path: &Path, policy: LongPathPolicy) -> Cow<'_, Path> {
    if cfg!(windows) && policy == LongPathPolicy::Auto {
        let text = path.to_string_lossy();
        if should_format_long_path(&text) {
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            let formatted = format_long_path(&absolute.to_string_lossy());
            return Cow::Owned(PathBuf::from(formatted));
        }
    }
    Cow::Borrowed(path)
}

/// Converts a wide path received from the engine.
///
/// On Windows unpaired surrogates survive; elsewhere they become U+FFFD.
pub fn path_from_wide(units: &[WideChar]) -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from(WideStr::from_slice(units).to_os_string())
    }
    #[cfg(not(windows))]
    {
        PathBuf::from(from_wide(units))
    }
}

/// Applies a signed seek offset to a position.
///
/// Returns `None` if the result would be negative or overflow `u64`.
pub fn check_seek_overflow(position: u64, offset: i64) -> Option<u64> {
    position.checked_add_signed(offset)
}
