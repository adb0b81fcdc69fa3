//! Open and extraction options.

use crate::format::ArchiveFormat;
use crate::password::Password;
use crate::string::LongPathPolicy;

/// Options controlling how an archive is opened.
///
/// # Example
///
/// ```rust
/// use zesven_native::{ArchiveFormat, OpenOptions};
///
/// let options = OpenOptions::new()
///     .format(ArchiveFormat::SevenZip)
///     .password("secret");
/// assert_eq!(options.format, Some(ArchiveFormat::SevenZip));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Format to open as. `None` runs detection.
    pub format: Option<ArchiveFormat>,
    /// Password offered when the archive headers are encrypted. Also used
    /// for item data until [`Archive::set_password`](super::Archive::set_password)
    /// replaces it.
    pub password: Option<Password>,
    /// Whether long Windows paths get the `\\?\` prefix.
    pub long_path_policy: LongPathPolicy,
    /// How far into the source the engine scans for a signature. `None`
    /// uses [`DEFAULT_MAX_CHECK_START_POSITION`](crate::native::DEFAULT_MAX_CHECK_START_POSITION).
    pub max_check_start_position: Option<u64>,
}

impl OpenOptions {
    /// Creates options that auto-detect the format.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens as `format` instead of detecting it.
    pub fn format(mut self, format: ArchiveFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the long path policy.
    pub fn long_path_policy(mut self, policy: LongPathPolicy) -> Self {
        self.long_path_policy = policy;
        self
    }

    /// Limits how far into the source the engine looks for a signature.
    pub fn max_check_start_position(mut self, bytes: u64) -> Self {
        self.max_check_start_position = Some(bytes);
        self
    }
}

/// Policy for handling existing files during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Fail the extraction if a file exists.
    #[default]
    Error,
    /// Leave existing files alone.
    Skip,
    /// Replace existing files.
    Overwrite,
}

/// Policy for symbolic link items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPolicy {
    /// Skip symbolic links.
    #[default]
    Forbid,
    /// Create symbolic links whose target stays inside the destination;
    /// other links are reported as failures.
    ValidateTargets,
    /// Create symbolic links (Unix) or write the link target as a file
    /// (elsewhere), wherever they point.
    Allow,
}

/// Which item metadata to restore on extracted files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreserveMetadata {
    /// Restore modification times.
    pub modification_time: bool,
    /// Restore access times.
    pub access_time: bool,
    /// Restore read-only and POSIX permission bits.
    pub attributes: bool,
}

impl Default for PreserveMetadata {
    fn default() -> Self {
        Self::modification_time_only()
    }
}

impl PreserveMetadata {
    /// Restore everything available.
    pub fn all() -> Self {
        Self {
            modification_time: true,
            access_time: true,
            attributes: true,
        }
    }

    /// Restore nothing.
    pub fn none() -> Self {
        Self {
            modification_time: false,
            access_time: false,
            attributes: false,
        }
    }

    /// Restore modification and access times.
    pub fn times() -> Self {
        Self {
            modification_time: true,
            access_time: true,
            attributes: false,
        }
    }

    /// Restore only the modification time.
    pub fn modification_time_only() -> Self {
        Self {
            modification_time: true,
            access_time: false,
            attributes: false,
        }
    }
}

/// Options for [`Archive::extract_to`](super::Archive::extract_to).
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Policy for handling existing files.
    pub overwrite: OverwritePolicy,
    /// Policy for symbolic link items.
    pub link_policy: LinkPolicy,
    /// Metadata restored on extracted files.
    pub preserve_metadata: PreserveMetadata,
    /// Whether long Windows paths get the `\\?\` prefix.
    pub long_path_policy: LongPathPolicy,
}

impl ExtractOptions {
    /// Creates extraction options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overwrite policy.
    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Sets the link policy.
    pub fn link_policy(mut self, policy: LinkPolicy) -> Self {
        self.link_policy = policy;
        self
    }

    /// Sets the metadata preservation options.
    pub fn preserve_metadata(mut self, preserve: PreserveMetadata) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    /// Sets the long path policy.
    pub fn long_path_policy(mut self, policy: LongPathPolicy) -> Self {
        self.long_path_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_options_builder() {
        let options = OpenOptions::new()
            .format(ArchiveFormat::Zip)
            .password("pw")
            .long_path_policy(LongPathPolicy::Never)
            .max_check_start_position(1024);
        assert_eq!(options.format, Some(ArchiveFormat::Zip));
        assert_eq!(options.password.as_ref().map(Password::as_str), Some("pw"));
        assert_eq!(options.long_path_policy, LongPathPolicy::Never);
        assert_eq!(options.max_check_start_position, Some(1024));
    }

    #[test]
    fn test_extract_options_defaults() {
        let options = ExtractOptions::default();
        assert_eq!(options.overwrite, OverwritePolicy::Error);
        assert_eq!(options.link_policy, LinkPolicy::Forbid);
        assert_eq!(options.preserve_metadata, PreserveMetadata::modification_time_only());
    }

    #[test]
    fn test_preserve_presets() {
        assert!(PreserveMetadata::all().attributes);
        assert!(!PreserveMetadata::none().modification_time);
        let times = PreserveMetadata::times();
        assert!(times.access_time && !times.attributes);
    }
}
