//! Opening archives and format auto-detection.

use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

use super::{Archive, ArchiveItem, CONTENT_PLACEHOLDER, OpenOptions};
use crate::archive_path::stem_of;
use crate::engine::{Engine, EngineArchive, OpenRequest};
use crate::format::{ArchiveFormat, detection_candidates};
use crate::source::{ArchiveSource, OpenedSource, ReadSeek, SourceKind, lock_stream};
use crate::volume::is_volume_path;
use crate::{Error, Result};

impl<'lib> Archive<'lib> {
    /// Opens an archive.
    ///
    /// Without an explicit format the candidates from
    /// [`detection_candidates`] are tried in order. A candidate that
    /// structurally rejects the data is skipped; any other failure is
    /// returned at once.
    ///
    /// # Errors
    ///
    /// - [`Error::FormatMismatch`] if an explicit format rejects the data
    /// - [`Error::UnknownFormat`] if no candidate accepts the data
    /// - [`Error::PasswordRequired`] / [`Error::WrongPassword`] for an
    ///   encrypted header without the right password
    /// - [`Error::Io`] if the source cannot be read
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use zesven_native::{Archive, ArchiveFormat, Library, OpenOptions};
    ///
    /// let lib = Library::load_default()?;
    /// let options = OpenOptions::new().format(ArchiveFormat::SevenZip).password("secret");
    /// let archive = Archive::open(&lib, "secret.7z", options)?;
    /// println!("{} items", archive.items_count());
    /// # Ok::<(), zesven_native::Error>(())
    /// ```
    pub fn open(
        engine: &'lib dyn Engine,
        source: impl Into<ArchiveSource>,
        options: OpenOptions,
    ) -> Result<Self> {
        let opened = OpenedSource::open(source.into(), options.format, options.long_path_policy)?;
        let request = OpenRequest {
            password: options.password.as_ref(),
            volume_path: opened.path.as_deref(),
            max_check_start_position: options.max_check_start_position,
            long_path_policy: options.long_path_policy,
        };

        let (inner, format, detected) = match options.format {
            Some(format) => {
                log::debug!("opening as {} (explicit)", format);
                let inner = engine.open_archive(format, opened.stream.clone(), &request)?;
                (inner, format, false)
            }
            None => {
                let (inner, format) = open_detected(engine, &opened, &request)?;
                (inner, format, true)
            }
        };

        let fallback = match (&opened.kind, &opened.path) {
            (SourceKind::Path, Some(path)) => {
                stem_of(path).unwrap_or_else(|| CONTENT_PLACEHOLDER.to_string())
            }
            _ => CONTENT_PLACEHOLDER.to_string(),
        };
        let count = inner.item_count()?;
        let items = (0..count)
            .map(|index| ArchiveItem::load(inner.as_ref(), index, &fallback))
            .collect::<Result<Vec<_>>>()?;
        log::debug!("opened {} archive with {} items", format, items.len());

        Ok(Self {
            inner,
            format,
            detected,
            source: opened.kind,
            path: opened.path,
            items: Arc::from(items),
            password: options.password,
            volumes: opened.volumes,
            progress: RefCell::new(None),
        })
    }

    /// Opens the archive at `path`, detecting its format.
    pub fn open_path(engine: &'lib dyn Engine, path: impl AsRef<Path>) -> Result<Self> {
        Self::open(engine, path.as_ref(), OpenOptions::default())
    }

    /// Opens an archive held in memory, detecting its format.
    pub fn open_buffer(engine: &'lib dyn Engine, data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::open(engine, data.into(), OpenOptions::default())
    }

    /// Opens an archive read from `reader`, detecting its format.
    pub fn open_stream<R: ReadSeek + 'static>(engine: &'lib dyn Engine, reader: R) -> Result<Self> {
        Self::open(engine, ArchiveSource::stream(reader), OpenOptions::default())
    }

    /// Returns true if the archive headers are encrypted, so that listing
    /// the items needs a password.
    ///
    /// The source is opened without a password; the answer is `true`
    /// exactly when that fails with [`Error::PasswordRequired`].
    ///
    /// # Errors
    ///
    /// Any other open failure, such as [`Error::UnknownFormat`].
    pub fn is_header_encrypted(
        engine: &dyn Engine,
        source: impl Into<ArchiveSource>,
        format: Option<ArchiveFormat>,
    ) -> Result<bool> {
        let options = OpenOptions {
            format,
            ..OpenOptions::default()
        };
        match Archive::open(engine, source, options) {
            Ok(_) => Ok(false),
            Err(Error::PasswordRequired) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

/// Tries each detection candidate until one opens.
fn open_detected<'lib>(
    engine: &'lib dyn Engine,
    opened: &OpenedSource,
    request: &OpenRequest<'_>,
) -> Result<(Box<dyn EngineArchive + 'lib>, ArchiveFormat)> {
    let mut candidates = {
        let mut stream = lock_stream(&opened.stream);
        detection_candidates(&mut *stream, opened.path.as_deref())?
    };
    // The first volume of a set only opens as a whole through Split.
    if opened.path.as_deref().is_some_and(is_volume_path) {
        candidates.retain(|&f| f != ArchiveFormat::Split);
        candidates.insert(0, ArchiveFormat::Split);
    }

    for &format in &candidates {
        opened.rewind()?;
        match engine.open_archive(format, opened.stream.clone(), request) {
            Ok(inner) => return Ok((inner, format)),
            Err(Error::FormatMismatch { .. }) => {
                log::debug!("{} rejected the data", format);
            }
            Err(Error::UnsupportedFormat { .. }) => {
                log::debug!("engine has no {} handler", format);
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::UnknownFormat { tried: candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PropValue, PropertyId};
    use crate::read::fake::{FakeArchive, FakeEngine, FakeItem};
    use crate::string::LongPathPolicy;

    const SEVEN_ZIP_SIGNATURE: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
    const RAR4_SIGNATURE: &[u8] = b"Rar!\x1A\x07\x00\x00";
    const RAR5_SIGNATURE: &[u8] = b"Rar!\x1A\x07\x01\x00";

    fn two_files() -> FakeArchive {
        FakeArchive::new(vec![
            FakeItem::file("a.txt", b"alpha"),
            FakeItem::file("dir/b.bin", b"beta"),
        ])
    }

    #[test]
    fn test_open_detects_signature() {
        let engine = FakeEngine::accepting(ArchiveFormat::SevenZip, two_files());
        let archive = Archive::open_buffer(&engine, SEVEN_ZIP_SIGNATURE).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::SevenZip);
        assert_eq!(archive.detected_format(), Some(ArchiveFormat::SevenZip));
        assert_eq!(archive.source_kind(), SourceKind::Buffer);
        assert_eq!(archive.items_count(), 2);
    }

    #[test]
    fn test_open_falls_through_rar_siblings() {
        let engine = FakeEngine::accepting(ArchiveFormat::Rar5, two_files());
        let mut data = RAR4_SIGNATURE.to_vec();
        data.extend_from_slice(&[0; 16]);
        let archive = Archive::open(&engine, data, OpenOptions::default()).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::Rar5);
        assert_eq!(
            *engine.attempts.borrow(),
            vec![ArchiveFormat::Rar, ArchiveFormat::Rar5]
        );
    }

    #[test]
    fn test_open_passes_long_path_policy() {
        let engine = FakeEngine::accepting(ArchiveFormat::SevenZip, two_files());
        Archive::open(&engine, SEVEN_ZIP_SIGNATURE, OpenOptions::default()).unwrap();
        let options = OpenOptions::new()
            .format(ArchiveFormat::SevenZip)
            .long_path_policy(LongPathPolicy::Never);
        Archive::open(&engine, SEVEN_ZIP_SIGNATURE, options).unwrap();
        assert_eq!(
            *engine.path_policies.borrow(),
            vec![LongPathPolicy::Auto, LongPathPolicy::Never]
        );
    }

    #[test]
    fn test_open_skips_missing_handlers() {
        let engine = FakeEngine::accepting(ArchiveFormat::Rar, two_files())
            .without_handler(ArchiveFormat::Rar5);
        let archive = Archive::open_buffer(&engine, RAR5_SIGNATURE).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::Rar);
        assert_eq!(
            *engine.attempts.borrow(),
            vec![ArchiveFormat::Rar5, ArchiveFormat::Rar]
        );
    }

    #[test]
    fn test_open_unknown_format() {
        let engine = FakeEngine::accepting(ArchiveFormat::Zip, two_files());
        let err = Archive::open_buffer(&engine, SEVEN_ZIP_SIGNATURE).unwrap_err();
        match err {
            Error::UnknownFormat { tried } => assert_eq!(tried, vec![ArchiveFormat::SevenZip]),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = Archive::open_buffer(&engine, b"no signature here".as_slice()).unwrap_err();
        assert!(matches!(err, Error::UnknownFormat { tried } if tried.is_empty()));
    }

    #[test]
    fn test_explicit_wrong_format_fails_before_listing() {
        let engine = FakeEngine::accepting(ArchiveFormat::SevenZip, two_files());
        let options = OpenOptions::new().format(ArchiveFormat::Zip);
        let err = Archive::open(&engine, SEVEN_ZIP_SIGNATURE, options).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { format: ArchiveFormat::Zip }));
        assert_eq!(*engine.attempts.borrow(), vec![ArchiveFormat::Zip]);
    }

    #[test]
    fn test_explicit_format_is_not_detected() {
        let engine = FakeEngine::accepting(ArchiveFormat::Tar, two_files());
        let options = OpenOptions::new().format(ArchiveFormat::Tar);
        let archive = Archive::open(&engine, b"whatever".as_slice(), options).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::Tar);
        assert_eq!(archive.detected_format(), None);
    }

    #[test]
    fn test_header_encryption() {
        let engine = FakeEngine::accepting(ArchiveFormat::SevenZip, two_files())
            .with_header_password("secret");

        let err = Archive::open_buffer(&engine, SEVEN_ZIP_SIGNATURE).unwrap_err();
        assert!(matches!(err, Error::PasswordRequired));
        // Authentication failures end detection immediately.
        assert_eq!(engine.attempts.borrow().len(), 1);

        let wrong = OpenOptions::new().password("nope");
        let err = Archive::open(&engine, SEVEN_ZIP_SIGNATURE, wrong).unwrap_err();
        assert!(matches!(err, Error::WrongPassword { index: None }));

        let right = OpenOptions::new().password("secret");
        let archive = Archive::open(&engine, SEVEN_ZIP_SIGNATURE, right).unwrap();
        assert_eq!(archive.items_count(), 2);
        assert!(archive.has_password());

        assert!(Archive::is_header_encrypted(&engine, SEVEN_ZIP_SIGNATURE, None).unwrap());
    }

    #[test]
    fn test_is_header_encrypted_plain_archive() {
        let engine = FakeEngine::accepting(ArchiveFormat::SevenZip, two_files());
        assert!(!Archive::is_header_encrypted(&engine, SEVEN_ZIP_SIGNATURE, None).unwrap());
        assert!(
            Archive::is_header_encrypted(&engine, SEVEN_ZIP_SIGNATURE, Some(ArchiveFormat::Zip))
                .is_err()
        );
    }

    #[test]
    fn test_single_item_path_fallback() {
        let gzip = FakeArchive::new(vec![FakeItem::unnamed(b"payload")]);
        let engine = FakeEngine::accepting(ArchiveFormat::GZip, gzip);

        let archive = Archive::open_buffer(&engine, b"\x1F\x8B\x08\x00".as_slice()).unwrap();
        assert_eq!(archive.items()[0].path, CONTENT_PLACEHOLDER);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt.gz");
        std::fs::write(&path, b"\x1F\x8B\x08\x00").unwrap();
        let archive = Archive::open_path(&engine, &path).unwrap();
        assert_eq!(archive.items()[0].path, "notes.txt");
        assert_eq!(archive.items()[0].extension, "txt");
        assert_eq!(archive.path(), Some(path.as_path()));
    }

    #[test]
    fn test_volume_path_prefers_split() {
        let split = FakeArchive::new(vec![FakeItem::file("data.7z", b"whole")])
            .with_property(PropertyId::NumVolumes, PropValue::U32(2))
            .with_volumes(2);
        let engine = FakeEngine::accepting(ArchiveFormat::Split, split);

        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("data.7z.001");
        std::fs::write(&first, SEVEN_ZIP_SIGNATURE).unwrap();
        std::fs::write(dir.path().join("data.7z.002"), b"tail").unwrap();

        let archive = Archive::open_path(&engine, &first).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::Split);
        assert_eq!(engine.attempts.borrow().first(), Some(&ArchiveFormat::Split));
        assert!(archive.is_multi_volume());
        assert_eq!(archive.volumes_count(), 2);
    }

    #[test]
    fn test_open_stream() {
        let engine = FakeEngine::accepting(ArchiveFormat::SevenZip, two_files());
        let archive =
            Archive::open_stream(&engine, std::io::Cursor::new(SEVEN_ZIP_SIGNATURE.to_vec()))
                .unwrap();
        assert_eq!(archive.source_kind(), SourceKind::Stream);
        assert!(archive.path().is_none());
    }
}
