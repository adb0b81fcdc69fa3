//! Archive format detection utilities.
//!
//! This module provides detection of archive formats based on file
//! signatures (magic bytes at the start, at a fixed offset, or at the end of
//! the data) and on file extensions. [`detection_candidates`] combines both
//! into the ordered list of formats the reader tries when no format is
//! given explicitly.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::ArchiveFormat;
use crate::Result;
use crate::source::read_up_to;

/// Format detection result.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatInfo {
    /// Detected archive format.
    pub format: ArchiveFormat,
    /// Offset of the signature that matched.
    pub offset: u64,
    /// Confidence level (0.0-1.0).
    ///
    /// - 1.0: Exact signature match
    /// - 0.7: Heuristic signature match
    /// - 0.5: Extension-based detection only
    pub confidence: f32,
}

impl FormatInfo {
    /// Creates a new FormatInfo with signature-based detection (high confidence).
    pub fn from_signature(format: ArchiveFormat, offset: u64) -> Self {
        Self {
            format,
            offset,
            confidence: 1.0,
        }
    }

    /// Creates a new FormatInfo with extension-based detection (medium confidence).
    pub fn from_extension(format: ArchiveFormat) -> Self {
        Self {
            format,
            offset: 0,
            confidence: 0.5,
        }
    }
}

/// Where a signature is anchored.
#[derive(Debug, Clone, Copy)]
enum Anchor {
    /// Offset from the start of the data.
    Start(u64),
    /// Offset back from the end of the data.
    End(u64),
}

/// Known format signatures, checked in order.
///
/// Longer and more specific signatures come before shorter ones that share a
/// prefix (RAR5 before RAR, Mach-O before the universal binary magic).
/// Executables are identified as executables: SFX stubs are never classified
/// as their payload format from the signature alone.
const SIGNATURES: &[(&[u8], Anchor, ArchiveFormat)] = &[
    // 7z: '7' 'z' 0xBC 0xAF 0x27 0x1C
    (&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], Anchor::Start(0), ArchiveFormat::SevenZip),
    // RAR5: 'R' 'a' 'r' '!' 0x1A 0x07 0x01 0x00
    (b"Rar!\x1A\x07\x01\x00", Anchor::Start(0), ArchiveFormat::Rar5),
    // RAR: 'R' 'a' 'r' '!' 0x1A 0x07 0x00
    (b"Rar!\x1A\x07\x00", Anchor::Start(0), ArchiveFormat::Rar),
    // ZIP: local file header, empty archive, spanned archive marker
    (b"PK\x03\x04", Anchor::Start(0), ArchiveFormat::Zip),
    (b"PK\x05\x06", Anchor::Start(0), ArchiveFormat::Zip),
    (b"PK\x07\x08", Anchor::Start(0), ArchiveFormat::Zip),
    (&[0x1F, 0x8B, 0x08], Anchor::Start(0), ArchiveFormat::GZip),
    (b"BZh", Anchor::Start(0), ArchiveFormat::BZip2),
    (&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], Anchor::Start(0), ArchiveFormat::Xz),
    (&[0x1F, 0x9D], Anchor::Start(0), ArchiveFormat::Z),
    (&[0x60, 0xEA], Anchor::Start(0), ArchiveFormat::Arj),
    (b"-lh", Anchor::Start(2), ArchiveFormat::Lzh),
    (b"MSCF", Anchor::Start(0), ArchiveFormat::Cab),
    (b"ITSF", Anchor::Start(0), ArchiveFormat::Chm),
    (&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1], Anchor::Start(0), ArchiveFormat::Compound),
    (&[0xED, 0xAB, 0xEE, 0xDB], Anchor::Start(0), ArchiveFormat::Rpm),
    (b"!<arch>\n", Anchor::Start(0), ArchiveFormat::Deb),
    (b"07070", Anchor::Start(0), ArchiveFormat::Cpio),
    (&[0xC7, 0x71], Anchor::Start(0), ArchiveFormat::Cpio),
    (b"MSWIM\x00\x00\x00", Anchor::Start(0), ArchiveFormat::Wim),
    (b"xar!", Anchor::Start(0), ArchiveFormat::Xar),
    (b"vhdxfile", Anchor::Start(0), ArchiveFormat::Vhdx),
    (b"conectix", Anchor::Start(0), ArchiveFormat::Vhd),
    (b"KDMV", Anchor::Start(0), ArchiveFormat::Vmdk),
    (&[0x51, 0x46, 0x49, 0xFB], Anchor::Start(0), ArchiveFormat::QCow),
    (b"hsqs", Anchor::Start(0), ArchiveFormat::SquashFs),
    (b"sqsh", Anchor::Start(0), ArchiveFormat::SquashFs),
    (&[0x45, 0x3D, 0xCD, 0x28], Anchor::Start(0), ArchiveFormat::CramFs),
    (b"FWS", Anchor::Start(0), ArchiveFormat::Swf),
    (b"CWS", Anchor::Start(0), ArchiveFormat::Swfc),
    (b"ZWS", Anchor::Start(0), ArchiveFormat::Swfc),
    (b"FLV\x01", Anchor::Start(0), ArchiveFormat::Flv),
    (b"SZDD\x88\xF0\x27\x33", Anchor::Start(0), ArchiveFormat::Mslz),
    (&[0x8F, 0xAF, 0xAC, 0x84], Anchor::Start(0), ArchiveFormat::Ppmd),
    (&[0x3A, 0xFF, 0x26, 0xED], Anchor::Start(0), ArchiveFormat::Sparse),
    (b"AVB0", Anchor::Start(0), ArchiveFormat::Avb),
    (&[0x7F, 0x45, 0x4C, 0x46], Anchor::Start(0), ArchiveFormat::Elf),
    (&[0xFE, 0xED, 0xFA, 0xCE], Anchor::Start(0), ArchiveFormat::Macho),
    (&[0xCE, 0xFA, 0xED, 0xFE], Anchor::Start(0), ArchiveFormat::Macho),
    (&[0xFE, 0xED, 0xFA, 0xCF], Anchor::Start(0), ArchiveFormat::Macho),
    (&[0xCF, 0xFA, 0xED, 0xFE], Anchor::Start(0), ArchiveFormat::Macho),
    (&[0xCA, 0xFE, 0xBA, 0xBE], Anchor::Start(0), ArchiveFormat::Mub),
    (b"MZ", Anchor::Start(0), ArchiveFormat::Pe),
    (b"NTFS    ", Anchor::Start(3), ArchiveFormat::Ntfs),
    (b"NXSB", Anchor::Start(32), ArchiveFormat::Apfs),
    (&[0x7F, 0x10, 0xDA, 0xBE], Anchor::Start(0x40), ArchiveFormat::Vdi),
    (b"ustar", Anchor::Start(257), ArchiveFormat::Tar),
    (b"EFI PART", Anchor::Start(0x200), ArchiveFormat::Gpt),
    (b"LABELONE", Anchor::Start(0x200), ArchiveFormat::Lvm),
    (b"H+\x00\x04", Anchor::Start(0x400), ArchiveFormat::Hfs),
    (b"HX\x00\x05", Anchor::Start(0x400), ArchiveFormat::Hfs),
    (&[0x53, 0xEF], Anchor::Start(0x438), ArchiveFormat::Ext),
    (b"CD001", Anchor::Start(0x8001), ArchiveFormat::Iso),
    (b"CD001", Anchor::Start(0x8801), ArchiveFormat::Iso),
    (b"CD001", Anchor::Start(0x9001), ArchiveFormat::Iso),
    (b"BEA01", Anchor::Start(0x8001), ArchiveFormat::Udf),
    (b"koly", Anchor::End(0x200), ArchiveFormat::Dmg),
    (b"conectix", Anchor::End(0x200), ArchiveFormat::Vhd),
];

/// Number of leading bytes read for start-anchored signatures.
const HEAD_WINDOW: usize = 0x9006;

/// Number of trailing bytes read for end-anchored signatures.
const TAIL_WINDOW: u64 = 0x200;

/// Formats whose signatures are easily confused with a sibling format.
///
/// When one of these is detected, the sibling is tried next, so a structural
/// rejection by the first handler falls back instead of failing.
fn ambiguous_siblings(format: ArchiveFormat) -> &'static [ArchiveFormat] {
    match format {
        ArchiveFormat::Rar => &[ArchiveFormat::Rar5],
        ArchiveFormat::Rar5 => &[ArchiveFormat::Rar],
        ArchiveFormat::Iso => &[ArchiveFormat::Udf],
        ArchiveFormat::Udf => &[ArchiveFormat::Iso],
        _ => &[],
    }
}

/// Detects the archive format from a reader by examining magic bytes.
///
/// The reader's position is restored before returning. Returns `None` when
/// no signature matches.
///
/// # Example
///
/// ```rust
/// use std::io::Cursor;
/// use zesven_native::format::{ArchiveFormat, detect_format};
///
/// let mut data = Cursor::new(vec![0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04]);
/// let info = detect_format(&mut data).unwrap().unwrap();
/// assert_eq!(info.format, ArchiveFormat::SevenZip);
/// ```
pub fn detect_format<R: Read + Seek>(reader: &mut R) -> Result<Option<FormatInfo>> {
    let start_pos = reader.stream_position()?;
    let result = detect_from_current(reader, start_pos);
    reader.seek(SeekFrom::Start(start_pos))?;
    result
}

fn detect_from_current<R: Read + Seek>(reader: &mut R, start_pos: u64) -> Result<Option<FormatInfo>> {
    let mut head = vec![0u8; HEAD_WINDOW];
    let head_len = read_up_to(reader, &mut head)?;
    head.truncate(head_len);

    let end_pos = reader.seek(SeekFrom::End(0))?;
    let data_len = end_pos.saturating_sub(start_pos);

    let mut tail = Vec::new();
    if data_len >= TAIL_WINDOW {
        reader.seek(SeekFrom::Start(end_pos - TAIL_WINDOW))?;
        tail.resize(TAIL_WINDOW as usize, 0);
        let n = read_up_to(reader, &mut tail)?;
        tail.truncate(n);
    }

    for &(signature, anchor, format) in SIGNATURES {
        let matched = match anchor {
            Anchor::Start(offset) => {
                let offset = offset as usize;
                head.get(offset..offset + signature.len()) == Some(signature)
            }
            Anchor::End(back) => {
                let back = back as usize;
                tail.len() == TAIL_WINDOW as usize
                    && tail.get(tail.len() - back..tail.len() - back + signature.len())
                        == Some(signature)
            }
        };
        if matched {
            let offset = match anchor {
                Anchor::Start(offset) => offset,
                Anchor::End(back) => data_len - back,
            };
            log::debug!("signature of {} matched at offset {:#x}", format, offset);
            return Ok(Some(FormatInfo::from_signature(format, offset)));
        }
    }

    // LZMA has no magic; the default properties byte is a reasonable hint
    if head.len() >= 13 && head[0] == 0x5D && head[1] == 0x00 && head[2] == 0x00 {
        return Ok(Some(FormatInfo {
            format: ArchiveFormat::Lzma,
            offset: 0,
            confidence: 0.7,
        }));
    }

    Ok(None)
}

/// Detects the archive format from a file extension.
///
/// The extension is matched case-insensitively and without the leading dot.
/// Purely numeric extensions (`001`, `002`, ...) map to [`ArchiveFormat::Split`].
///
/// # Example
///
/// ```rust
/// use zesven_native::format::{ArchiveFormat, detect_format_from_extension};
///
/// assert_eq!(detect_format_from_extension("7z"), Some(ArchiveFormat::SevenZip));
/// assert_eq!(detect_format_from_extension("TGZ"), Some(ArchiveFormat::GZip));
/// assert_eq!(detect_format_from_extension("unknown"), None);
/// ```
pub fn detect_format_from_extension(extension: &str) -> Option<ArchiveFormat> {
    let ext = extension.to_ascii_lowercase();
    if !ext.is_empty() && ext.len() >= 3 && ext.bytes().all(|b| b.is_ascii_digit()) {
        return Some(ArchiveFormat::Split);
    }
    let format = match ext.as_str() {
        "7z" => ArchiveFormat::SevenZip,
        "zip" | "zipx" | "jar" | "war" | "ear" | "apk" | "ipa" | "xpi" | "epub" | "appx"
        | "nupkg" | "docx" | "xlsx" | "pptx" | "odt" | "ods" | "odp" | "odg" => ArchiveFormat::Zip,
        "rar" | "r00" => ArchiveFormat::Rar,
        "gz" | "gzip" | "tgz" | "tpz" => ArchiveFormat::GZip,
        "bz2" | "bzip2" | "tbz" | "tbz2" => ArchiveFormat::BZip2,
        "xz" | "txz" => ArchiveFormat::Xz,
        "lzma" => ArchiveFormat::Lzma,
        "lzma86" => ArchiveFormat::Lzma86,
        "z" | "taz" => ArchiveFormat::Z,
        "tar" | "ova" => ArchiveFormat::Tar,
        "iso" | "img" => ArchiveFormat::Iso,
        "udf" => ArchiveFormat::Udf,
        "wim" | "swm" | "esd" => ArchiveFormat::Wim,
        "cab" => ArchiveFormat::Cab,
        "arj" => ArchiveFormat::Arj,
        "lzh" | "lha" => ArchiveFormat::Lzh,
        "chm" | "chi" | "chq" | "chw" | "lit" => ArchiveFormat::Chm,
        "hxs" | "hxi" | "hxr" | "hxq" | "hxw" => ArchiveFormat::Hxs,
        "msi" | "msp" | "doc" | "xls" | "ppt" => ArchiveFormat::Compound,
        "cpio" => ArchiveFormat::Cpio,
        "deb" | "ar" | "a" | "lib" => ArchiveFormat::Deb,
        "rpm" => ArchiveFormat::Rpm,
        "xar" | "pkg" => ArchiveFormat::Xar,
        "dmg" => ArchiveFormat::Dmg,
        "hfs" | "hfsx" => ArchiveFormat::Hfs,
        "vhd" => ArchiveFormat::Vhd,
        "vhdx" | "avhdx" => ArchiveFormat::Vhdx,
        "vmdk" => ArchiveFormat::Vmdk,
        "vdi" => ArchiveFormat::Vdi,
        "qcow" | "qcow2" | "qcow2c" => ArchiveFormat::QCow,
        "squashfs" => ArchiveFormat::SquashFs,
        "cramfs" => ArchiveFormat::CramFs,
        "ntfs" => ArchiveFormat::Ntfs,
        "fat" => ArchiveFormat::Fat,
        "mbr" => ArchiveFormat::Mbr,
        "gpt" => ArchiveFormat::Gpt,
        "apm" => ArchiveFormat::Apm,
        "ext" | "ext2" | "ext3" | "ext4" => ArchiveFormat::Ext,
        "exe" | "dll" | "sys" => ArchiveFormat::Pe,
        "elf" => ArchiveFormat::Elf,
        "macho" => ArchiveFormat::Macho,
        "mub" => ArchiveFormat::Mub,
        "swf" => ArchiveFormat::Swf,
        "flv" => ArchiveFormat::Flv,
        "pmd" | "ppmd" => ArchiveFormat::Ppmd,
        "nsis" => ArchiveFormat::Nsis,
        "ihex" => ArchiveFormat::IHex,
        "b64" => ArchiveFormat::Base64,
        "obj" => ArchiveFormat::Coff,
        "te" => ArchiveFormat::Te,
        "scap" => ArchiveFormat::UefiC,
        "uefif" => ArchiveFormat::UefiS,
        "lvm" => ArchiveFormat::Lvm,
        "apfs" => ArchiveFormat::Apfs,
        "simg" => ArchiveFormat::Sparse,
        "lpimg" => ArchiveFormat::Lp,
        "avb" => ArchiveFormat::Avb,
        "mslz" => ArchiveFormat::Mslz,
        _ => return None,
    };
    Some(format)
}

/// Detects the archive format from a file name.
///
/// Handles multi-part naming on top of [`detect_format_from_extension`]:
/// `name.partN.rar` maps to [`ArchiveFormat::Rar5`], the naming scheme
/// RAR 5 uses for volumes.
pub fn detect_format_from_path(path: impl AsRef<Path>) -> Option<ArchiveFormat> {
    let file_name = path.as_ref().file_name()?.to_string_lossy().to_ascii_lowercase();
    let (stem, ext) = file_name.rsplit_once('.')?;

    if ext == "rar" {
        if let Some((_, part)) = stem.rsplit_once('.') {
            if part.len() > 4
                && part.starts_with("part")
                && part[4..].bytes().all(|b| b.is_ascii_digit())
            {
                return Some(ArchiveFormat::Rar5);
            }
        }
    }

    detect_format_from_extension(ext)
}

/// Detects the archive format, falling back to the extension when no
/// signature matches.
pub fn detect_format_with_fallback<R: Read + Seek>(
    reader: &mut R,
    path: Option<&Path>,
) -> Result<Option<FormatInfo>> {
    if let Some(info) = detect_format(reader)? {
        return Ok(Some(info));
    }
    Ok(path
        .and_then(detect_format_from_path)
        .map(FormatInfo::from_extension))
}

/// Returns the ordered list of formats to try when opening `reader`.
///
/// The signature match comes first, followed by formats it is easily
/// confused with, then the extension-based guess and its siblings. A
/// signature always takes precedence over a disagreeing extension. The list
/// contains no duplicates and may be empty.
pub fn detection_candidates<R: Read + Seek>(
    reader: &mut R,
    path: Option<&Path>,
) -> Result<Vec<ArchiveFormat>> {
    fn push(list: &mut Vec<ArchiveFormat>, format: ArchiveFormat) {
        for f in std::iter::once(format).chain(ambiguous_siblings(format).iter().copied()) {
            if !list.contains(&f) {
                list.push(f);
            }
        }
    }

    let mut candidates = Vec::new();
    if let Some(info) = detect_format(reader)? {
        push(&mut candidates, info.format);
    }
    if let Some(format) = path.and_then(detect_format_from_path) {
        push(&mut candidates, format);
    }

    log::debug!("format candidates: {:?}", candidates);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn detect(data: &[u8]) -> Option<ArchiveFormat> {
        detect_format(&mut Cursor::new(data)).unwrap().map(|i| i.format)
    }

    fn with_signature_at(offset: usize, signature: &[u8], len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[offset..offset + signature.len()].copy_from_slice(signature);
        data
    }

    #[test]
    fn test_detect_7z_signature() {
        let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        let info = detect_format(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(info.format, ArchiveFormat::SevenZip);
        assert_eq!(info.confidence, 1.0);
        assert_eq!(info.offset, 0);
    }

    #[test]
    fn test_detect_rar_versions() {
        assert_eq!(detect(b"Rar!\x1A\x07\x00\x00"), Some(ArchiveFormat::Rar));
        assert_eq!(detect(b"Rar!\x1A\x07\x01\x00"), Some(ArchiveFormat::Rar5));
    }

    #[test]
    fn test_detect_common_compressors() {
        assert_eq!(detect(b"PK\x03\x04\x00\x00"), Some(ArchiveFormat::Zip));
        assert_eq!(detect(b"PK\x05\x06\x00\x00"), Some(ArchiveFormat::Zip));
        assert_eq!(detect(&[0x1F, 0x8B, 0x08, 0x00]), Some(ArchiveFormat::GZip));
        assert_eq!(detect(b"BZh91AY"), Some(ArchiveFormat::BZip2));
        assert_eq!(
            detect(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00]),
            Some(ArchiveFormat::Xz)
        );
        assert_eq!(detect(&[0x1F, 0x9D, 0x90]), Some(ArchiveFormat::Z));
        assert_eq!(detect(b"MSCF\x00\x00\x00\x00"), Some(ArchiveFormat::Cab));
        assert_eq!(detect(b"MSWIM\x00\x00\x00\xD0"), Some(ArchiveFormat::Wim));
    }

    #[test]
    fn test_detect_lzh_at_offset_two() {
        assert_eq!(detect(b"\x20\x00-lh5-"), Some(ArchiveFormat::Lzh));
    }

    #[test]
    fn test_detect_tar_ustar() {
        let data = with_signature_at(257, b"ustar", 1024);
        let info = detect_format(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(info.format, ArchiveFormat::Tar);
        assert_eq!(info.offset, 257);
    }

    #[test]
    fn test_detect_iso_deep_signature() {
        let data = with_signature_at(0x8001, b"CD001", 0x8800);
        assert_eq!(detect(&data), Some(ArchiveFormat::Iso));
    }

    #[test]
    fn test_detect_trailing_signature() {
        let mut data = vec![0u8; 4096];
        let at = data.len() - 0x200;
        data[at..at + 4].copy_from_slice(b"koly");
        let info = detect_format(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(info.format, ArchiveFormat::Dmg);
        assert_eq!(info.offset, at as u64);
    }

    #[test]
    fn test_executables_are_not_payload_formats() {
        // An SFX stub followed by a 7z payload is still an executable
        let mut data = b"MZ\x90\x00".to_vec();
        data.extend_from_slice(&[0u8; 60]);
        data.extend_from_slice(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]);
        assert_eq!(detect(&data), Some(ArchiveFormat::Pe));
        assert_eq!(detect(&[0x7F, b'E', b'L', b'F', 2, 1]), Some(ArchiveFormat::Elf));
        assert_eq!(detect(&[0xCF, 0xFA, 0xED, 0xFE]), Some(ArchiveFormat::Macho));
    }

    #[test]
    fn test_detect_lzma_heuristic() {
        let mut data = vec![0x5D, 0x00, 0x00, 0x80, 0x00];
        data.extend_from_slice(&[0xFF; 8]);
        let info = detect_format(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(info.format, ArchiveFormat::Lzma);
        assert!(info.confidence < 1.0);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect(&[0u8; 16]), None);
        assert_eq!(detect(&[]), None);
    }

    #[test]
    fn test_reader_position_restored() {
        let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        let mut cursor = Cursor::new(&data);
        cursor.seek(SeekFrom::Start(2)).unwrap();
        let _ = detect_format(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_detect_format_from_extension() {
        assert_eq!(detect_format_from_extension("7z"), Some(ArchiveFormat::SevenZip));
        assert_eq!(detect_format_from_extension("ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(detect_format_from_extension("docx"), Some(ArchiveFormat::Zip));
        assert_eq!(detect_format_from_extension("tgz"), Some(ArchiveFormat::GZip));
        assert_eq!(detect_format_from_extension("tbz"), Some(ArchiveFormat::BZip2));
        assert_eq!(detect_format_from_extension("txz"), Some(ArchiveFormat::Xz));
        assert_eq!(detect_format_from_extension("taz"), Some(ArchiveFormat::Z));
        assert_eq!(detect_format_from_extension("ova"), Some(ArchiveFormat::Tar));
        assert_eq!(detect_format_from_extension("swm"), Some(ArchiveFormat::Wim));
        assert_eq!(detect_format_from_extension("xls"), Some(ArchiveFormat::Compound));
        assert_eq!(detect_format_from_extension("chi"), Some(ArchiveFormat::Chm));
        assert_eq!(detect_format_from_extension("ar"), Some(ArchiveFormat::Deb));
        assert_eq!(detect_format_from_extension("pkg"), Some(ArchiveFormat::Xar));
        assert_eq!(detect_format_from_extension("ext4"), Some(ArchiveFormat::Ext));
        assert_eq!(detect_format_from_extension("pmd"), Some(ArchiveFormat::Ppmd));
        assert_eq!(detect_format_from_extension("exe"), Some(ArchiveFormat::Pe));
        assert_eq!(detect_format_from_extension("001"), Some(ArchiveFormat::Split));
        assert_eq!(detect_format_from_extension("unknown"), None);
        assert_eq!(detect_format_from_extension(""), None);
    }

    #[test]
    fn test_detect_format_from_path() {
        assert_eq!(
            detect_format_from_path("dir/archive.part1.rar"),
            Some(ArchiveFormat::Rar5)
        );
        assert_eq!(
            detect_format_from_path("archive.part01.RAR"),
            Some(ArchiveFormat::Rar5)
        );
        assert_eq!(detect_format_from_path("archive.rar"), Some(ArchiveFormat::Rar));
        assert_eq!(detect_format_from_path("archive.7z.001"), Some(ArchiveFormat::Split));
        assert_eq!(detect_format_from_path("image.iso.img"), Some(ArchiveFormat::Iso));
        assert_eq!(detect_format_from_path("backup.tar.gz"), Some(ArchiveFormat::GZip));
        assert_eq!(detect_format_from_path("noextension"), None);
    }

    #[test]
    fn test_detect_with_fallback() {
        // Signature match takes precedence
        let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        let info = detect_format_with_fallback(&mut Cursor::new(&data), Some(Path::new("a.zip")))
            .unwrap()
            .unwrap();
        assert_eq!(info.format, ArchiveFormat::SevenZip);
        assert_eq!(info.confidence, 1.0);

        // Extension fallback when signature unknown
        let data = [0u8; 8];
        let info = detect_format_with_fallback(&mut Cursor::new(&data), Some(Path::new("a.7z")))
            .unwrap()
            .unwrap();
        assert_eq!(info.format, ArchiveFormat::SevenZip);
        assert_eq!(info.confidence, 0.5);

        assert!(
            detect_format_with_fallback(&mut Cursor::new(&data), None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_candidates_signature_before_extension() {
        let data = b"PK\x03\x04\x14\x00";
        let candidates =
            detection_candidates(&mut Cursor::new(&data[..]), Some(Path::new("a.7z"))).unwrap();
        assert_eq!(candidates, vec![ArchiveFormat::Zip, ArchiveFormat::SevenZip]);
    }

    #[test]
    fn test_candidates_rar_siblings() {
        let data = b"Rar!\x1A\x07\x00\x00";
        let candidates =
            detection_candidates(&mut Cursor::new(&data[..]), Some(Path::new("a.rar"))).unwrap();
        assert_eq!(candidates, vec![ArchiveFormat::Rar, ArchiveFormat::Rar5]);
    }

    #[test]
    fn test_candidates_without_duplicates() {
        let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
        let candidates =
            detection_candidates(&mut Cursor::new(&data[..]), Some(Path::new("a.7z"))).unwrap();
        assert_eq!(candidates, vec![ArchiveFormat::SevenZip]);

        let candidates = detection_candidates(&mut Cursor::new(&[0u8; 4][..]), None).unwrap();
        assert!(candidates.is_empty());
    }
}
