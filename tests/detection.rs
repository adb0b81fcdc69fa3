//! Format detection through the public API. No engine is needed.

mod common;

use std::io::{Cursor, Seek, SeekFrom};
use std::path::Path;

use zesven_native::format::{
    ArchiveFormat, detect_format, detect_format_from_extension, detect_format_from_path,
    detect_format_with_fallback, detection_candidates,
};

fn signature_candidates(data: &[u8], path: Option<&str>) -> Vec<ArchiveFormat> {
    detection_candidates(&mut Cursor::new(data), path.map(Path::new)).unwrap()
}

#[test]
fn signature_wins_over_extension() {
    let data = b"PK\x03\x04\x14\x00\x00\x00\x00\x00";
    let candidates = signature_candidates(data, Some("misnamed.7z"));
    assert_eq!(candidates.first(), Some(&ArchiveFormat::Zip));
    assert!(candidates.contains(&ArchiveFormat::SevenZip));
}

#[test]
fn rar_signatures_distinguish_versions() {
    let rar4 = signature_candidates(b"Rar!\x1A\x07\x00\xCF\x90\x73", None);
    assert_eq!(rar4.first(), Some(&ArchiveFormat::Rar));
    let rar5 = signature_candidates(b"Rar!\x1A\x07\x01\x00\x33\x92", None);
    assert_eq!(rar5.first(), Some(&ArchiveFormat::Rar5));
}

#[test]
fn candidates_have_no_duplicates() {
    let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
    let candidates = signature_candidates(&data, Some("archive.7z"));
    let mut deduped = candidates.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), candidates.len());
}

#[test]
fn unknown_data_without_name_has_no_candidates() {
    let candidates = signature_candidates(b"just some text, not an archive", None);
    assert!(candidates.is_empty());
}

#[test]
fn detection_restores_stream_position() {
    let mut data = vec![0u8; 16];
    data.extend_from_slice(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04]);
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(16)).unwrap();

    let info = detect_format(&mut cursor).unwrap().unwrap();
    assert_eq!(info.format, ArchiveFormat::SevenZip);
    assert_eq!(cursor.position(), 16);
}

#[test]
fn extension_fallback_has_lower_confidence() {
    let mut cursor = Cursor::new(b"no magic here".to_vec());
    let info = detect_format_with_fallback(&mut cursor, Some(Path::new("backup.tar")))
        .unwrap()
        .unwrap();
    assert_eq!(info.format, ArchiveFormat::Tar);
    assert!(info.confidence < 1.0);
}

#[test]
fn volume_names() {
    assert_eq!(
        detect_format_from_path("clouds.jpg.7z.001"),
        Some(ArchiveFormat::Split)
    );
    assert_eq!(
        detect_format_from_path("clouds.jpg.part1.rar"),
        Some(ArchiveFormat::Rar5)
    );
    assert_eq!(detect_format_from_path("clouds.jpg.rar"), Some(ArchiveFormat::Rar));
    assert_eq!(detect_format_from_path("no_extension"), None);
}

#[test]
fn extensions_are_case_insensitive() {
    for ext in ["7Z", "Zip", "TAR", "gZ"] {
        assert!(detect_format_from_extension(ext).is_some(), "{ext}");
    }
}

#[test]
fn registry_extensions_detect_their_own_format() {
    for format in [
        ArchiveFormat::SevenZip,
        ArchiveFormat::Zip,
        ArchiveFormat::BZip2,
        ArchiveFormat::GZip,
        ArchiveFormat::Xz,
        ArchiveFormat::Tar,
        ArchiveFormat::Wim,
        ArchiveFormat::Iso,
        ArchiveFormat::Lzma,
        ArchiveFormat::Split,
    ] {
        assert_eq!(
            detect_format_from_extension(format.extension()),
            Some(format),
            "{format}"
        );
    }
}

#[test]
#[ignore = "requires reference archives"]
fn reference_archives_are_detected() {
    let dir = common::fixture(&["extraction", "single_file"]);

    // LZMA has no magic number and ISO needs a 32 KiB prefix; both still
    // come out of the combined candidate list.
    for &(suffix, format) in common::SINGLE_FILE_FORMATS {
        let path = common::existing(dir.join(format!("clouds.jpg.{suffix}")));
        let mut file = std::fs::File::open(&path).unwrap();
        let candidates = detection_candidates(&mut file, Some(path.as_path())).unwrap();
        assert!(
            candidates.contains(&format),
            "{suffix}: {format} not in {candidates:?}"
        );
    }
}
