//! Shared helpers for the conformance tests.
//!
//! The tests need a real 7-Zip library and the reference archive set, so
//! they are `#[ignore]`d by default and run with `cargo test -- --ignored`.
//! Both inputs are located through environment variables; a missing
//! variable or fixture fails the test.
//!
//! - `ZESVEN_7Z_LIBRARY`: path to `7z.dll`, `7z.so` or `lib7z.dylib`
//! - `ZESVEN_TEST_ARCHIVES`: root of the reference archives
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use zesven_native::{Archive, ArchiveFormat, ArchiveSource, Library, OpenOptions, SourceKind};

/// Password of every encrypted reference archive.
pub const PASSWORD: &str = "helloworld";

/// The source kinds every conformance case is run against.
pub const SOURCE_KINDS: [SourceKind; 3] = [SourceKind::Path, SourceKind::Buffer, SourceKind::Stream];

/// Formats of the `extraction/single_file` set, keyed by file suffix.
pub const SINGLE_FILE_FORMATS: &[(&str, ArchiveFormat)] = &[
    ("7z", ArchiveFormat::SevenZip),
    ("bz2", ArchiveFormat::BZip2),
    ("gz", ArchiveFormat::GZip),
    ("iso", ArchiveFormat::Iso),
    ("lzh", ArchiveFormat::Lzh),
    ("lzma", ArchiveFormat::Lzma),
    ("rar4.rar", ArchiveFormat::Rar),
    ("rar5.rar", ArchiveFormat::Rar5),
    ("tar", ArchiveFormat::Tar),
    ("wim", ArchiveFormat::Wim),
    ("xz", ArchiveFormat::Xz),
    ("zip", ArchiveFormat::Zip),
];

/// Loads the library named by `ZESVEN_7Z_LIBRARY`.
pub fn library() -> Library {
    let path = std::env::var_os("ZESVEN_7Z_LIBRARY")
        .expect("ZESVEN_7Z_LIBRARY must point to a 7-Zip library");
    Library::load(&path)
        .unwrap_or_else(|e| panic!("cannot load {}: {e}", Path::new(&path).display()))
}

/// Returns `$ZESVEN_TEST_ARCHIVES/<parts..>`, which must exist.
pub fn fixture(parts: &[&str]) -> PathBuf {
    let root = std::env::var_os("ZESVEN_TEST_ARCHIVES")
        .expect("ZESVEN_TEST_ARCHIVES must point to the reference archives");
    let path = parts.iter().fold(PathBuf::from(root), |path, part| path.join(part));
    existing(path)
}

/// Returns `path` after checking that the fixture is present.
pub fn existing(path: PathBuf) -> PathBuf {
    assert!(path.exists(), "fixture {} not found", path.display());
    path
}

/// Returns both the library and a fixture.
pub fn setup(parts: &[&str]) -> (Library, PathBuf) {
    (library(), fixture(parts))
}

/// Builds a source of the given kind for the archive at `path`.
pub fn source(path: &Path, kind: SourceKind) -> ArchiveSource {
    match kind {
        SourceKind::Path => ArchiveSource::from(path),
        SourceKind::Buffer => {
            ArchiveSource::from(std::fs::read(path).expect("failed to read fixture"))
        }
        SourceKind::Stream => {
            let file = File::open(path).expect("failed to open fixture");
            ArchiveSource::stream(BufReader::new(file))
        }
    }
}

/// Opens `path` as `format` from a source of the given kind.
pub fn open<'lib>(
    lib: &'lib Library,
    path: &Path,
    kind: SourceKind,
    options: OpenOptions,
) -> zesven_native::Result<Archive<'lib>> {
    Archive::open(lib, source(path, kind), options)
}

/// Opens a RAR archive without knowing its version: RAR 1.5-4 first,
/// then RAR 5.
pub fn open_rar<'lib>(
    lib: &'lib Library,
    path: &Path,
    kind: SourceKind,
) -> zesven_native::Result<Archive<'lib>> {
    match open(lib, path, kind, OpenOptions::new().format(ArchiveFormat::Rar)) {
        Ok(archive) => Ok(archive),
        Err(_) => open(lib, path, kind, OpenOptions::new().format(ArchiveFormat::Rar5)),
    }
}

/// Item name expected for a single-stream archive without path metadata.
pub fn fallback_name(path: &Path, kind: SourceKind) -> String {
    match kind {
        SourceKind::Path => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
        SourceKind::Buffer | SourceKind::Stream => {
            zesven_native::read::CONTENT_PLACEHOLDER.to_string()
        }
    }
}

/// Runs `test` and `test_item` over the whole archive, plus the
/// out-of-range check.
pub fn assert_archive_tests(archive: &Archive<'_>) {
    archive.test().expect("archive test failed");
    for index in 0..archive.items_count() {
        archive
            .test_item(index)
            .unwrap_or_else(|e| panic!("testing item {index} failed: {e}"));
    }
    let err = archive
        .test_item(archive.items_count())
        .expect_err("out-of-range item test must fail");
    assert_eq!(err.kind(), zesven_native::ErrorKind::Range);
}

/// Checks that `items()`, `iter()` and `item()` agree.
pub fn assert_item_views_agree(archive: &Archive<'_>) {
    let items = archive.items();
    assert_eq!(items.len() as u32, archive.items_count());
    assert_eq!(archive.iter().count(), items.len());
    for (position, item) in archive.iter().enumerate() {
        assert_eq!(item.index as usize, position);
        let looked_up = archive.item(item.index).expect("item lookup failed");
        assert_eq!(looked_up.path, item.path);
    }
    assert_eq!(
        archive.files_count() + archive.folders_count(),
        archive.items_count()
    );
}

/// Per-item facts that must not depend on how an archive was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub is_directory: bool,
    pub is_encrypted: bool,
    pub size: u64,
    pub crc32: Option<u32>,
}

/// Snapshot of an archive's content, keyed by normalized item path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub items: BTreeMap<String, ItemSnapshot>,
    pub files_count: u32,
    pub size: u64,
}

impl ContentSnapshot {
    pub fn of(archive: &Archive<'_>) -> Self {
        let items = archive
            .iter()
            .map(|item| {
                let snapshot = ItemSnapshot {
                    is_directory: item.is_directory,
                    is_encrypted: item.is_encrypted,
                    size: item.size,
                    crc32: item.crc32,
                };
                (zesven_native::archive_path::normalize(&item.path), snapshot)
            })
            .collect();
        Self {
            items,
            files_count: archive.files_count(),
            size: archive.size(),
        }
    }
}

/// Reads the volumes `<base>.001`, `<base>.002`, ... back to back.
pub fn concat_volumes(first: &Path) -> Vec<u8> {
    let (base, width) = zesven_native::volume::split_volume_path(first)
        .expect("not a numbered volume");
    let mut data = Vec::new();
    for number in 1.. {
        let name = format!("{}.{:0width$}", base.display(), number, width = width);
        match std::fs::read(&name) {
            Ok(bytes) => data.extend_from_slice(&bytes),
            Err(_) => break,
        }
    }
    data
}
