//! Format registry.
//!
//! [`ArchiveFormat`] enumerates every container and compression format the
//! 7-Zip engine ships a handler for. Each format knows the engine class id
//! that selects its handler, its canonical name and extension, and which
//! per-item metadata it stores. Signature and extension based detection
//! lives in [`detect`].

pub mod detect;

pub use detect::{
    FormatInfo, detect_format, detect_format_from_extension, detect_format_from_path,
    detect_format_with_fallback, detection_candidates,
};

use crate::native::com::Guid;

/// An archive or compression format handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum ArchiveFormat {
    /// ZIP archive.
    Zip,
    /// bzip2 compressed file.
    BZip2,
    /// RAR archive (v1.5 to v4).
    Rar,
    /// ARJ archive.
    Arj,
    /// Unix `compress` (.Z) file.
    Z,
    /// LHA/LZH archive.
    Lzh,
    /// 7z archive.
    SevenZip,
    /// Microsoft Cabinet.
    Cab,
    /// NSIS installer.
    Nsis,
    /// LZMA compressed file.
    Lzma,
    /// LZMA86 (LZMA with x86 filter) compressed file.
    Lzma86,
    /// XZ compressed file.
    Xz,
    /// PPMd compressed file.
    Ppmd,
    /// Linux LVM volume.
    Lvm,
    /// Android verified boot image.
    Avb,
    /// Android logical partition image.
    Lp,
    /// Android sparse image.
    Sparse,
    /// Apple file system image.
    Apfs,
    /// Hyper-V VHDX disk image.
    Vhdx,
    /// Base64 encoded file.
    Base64,
    /// COFF object file.
    Coff,
    /// ext2/3/4 file system image.
    Ext,
    /// VMware VMDK disk image.
    Vmdk,
    /// VirtualBox VDI disk image.
    Vdi,
    /// QEMU QCOW disk image.
    QCow,
    /// GUID partition table.
    Gpt,
    /// RAR5 archive.
    Rar5,
    /// Intel HEX file.
    IHex,
    /// Microsoft Help 2.0 file.
    Hxs,
    /// Terse executable.
    Te,
    /// UEFI capsule.
    UefiC,
    /// UEFI firmware file system.
    UefiS,
    /// SquashFS image.
    SquashFs,
    /// CramFS image.
    CramFs,
    /// Apple partition map.
    Apm,
    /// MS-DOS `compress` (SZDD) file.
    Mslz,
    /// Flash video.
    Flv,
    /// Shockwave Flash (uncompressed).
    Swf,
    /// Shockwave Flash (compressed).
    Swfc,
    /// NTFS image.
    Ntfs,
    /// FAT image.
    Fat,
    /// Master boot record.
    Mbr,
    /// Virtual PC VHD disk image.
    Vhd,
    /// Windows PE executable.
    Pe,
    /// ELF executable.
    Elf,
    /// Mach-O executable.
    Macho,
    /// UDF image.
    Udf,
    /// XAR archive.
    Xar,
    /// Mach-O universal binary.
    Mub,
    /// HFS/HFS+ image.
    Hfs,
    /// Apple disk image.
    Dmg,
    /// OLE compound file (doc, xls, msi).
    Compound,
    /// Windows imaging format.
    Wim,
    /// ISO 9660 image.
    Iso,
    /// Compiled HTML help.
    Chm,
    /// Generic split volumes (`.001`, `.002`, ...).
    ///
    /// This is a virtual format: the engine joins the volumes and exposes the
    /// joined data as a single item.
    Split,
    /// RPM package.
    Rpm,
    /// Debian package (ar archive).
    Deb,
    /// CPIO archive.
    Cpio,
    /// TAR archive.
    Tar,
    /// gzip compressed file.
    GZip,
}

impl ArchiveFormat {
    /// Every format in the registry, in engine id order.
    pub const ALL: &'static [ArchiveFormat] = &[
        Self::Zip,
        Self::BZip2,
        Self::Rar,
        Self::Arj,
        Self::Z,
        Self::Lzh,
        Self::SevenZip,
        Self::Cab,
        Self::Nsis,
        Self::Lzma,
        Self::Lzma86,
        Self::Xz,
        Self::Ppmd,
        Self::Lvm,
        Self::Avb,
        Self::Lp,
        Self::Sparse,
        Self::Apfs,
        Self::Vhdx,
        Self::Base64,
        Self::Coff,
        Self::Ext,
        Self::Vmdk,
        Self::Vdi,
        Self::QCow,
        Self::Gpt,
        Self::Rar5,
        Self::IHex,
        Self::Hxs,
        Self::Te,
        Self::UefiC,
        Self::UefiS,
        Self::SquashFs,
        Self::CramFs,
        Self::Apm,
        Self::Mslz,
        Self::Flv,
        Self::Swf,
        Self::Swfc,
        Self::Ntfs,
        Self::Fat,
        Self::Mbr,
        Self::Vhd,
        Self::Pe,
        Self::Elf,
        Self::Macho,
        Self::Udf,
        Self::Xar,
        Self::Mub,
        Self::Hfs,
        Self::Dmg,
        Self::Compound,
        Self::Wim,
        Self::Iso,
        Self::Chm,
        Self::Split,
        Self::Rpm,
        Self::Deb,
        Self::Cpio,
        Self::Tar,
        Self::GZip,
    ];

    /// Returns (engine id, name, extension).
    fn descriptor(self) -> (u8, &'static str, &'static str) {
        match self {
            Self::Zip => (0x01, "ZIP", "zip"),
            Self::BZip2 => (0x02, "bzip2", "bz2"),
            Self::Rar => (0x03, "RAR", "rar"),
            Self::Arj => (0x04, "ARJ", "arj"),
            Self::Z => (0x05, "Z", "z"),
            Self::Lzh => (0x06, "LZH", "lzh"),
            Self::SevenZip => (0x07, "7z", "7z"),
            Self::Cab => (0x08, "Cab", "cab"),
            Self::Nsis => (0x09, "NSIS", "nsis"),
            Self::Lzma => (0x0A, "LZMA", "lzma"),
            Self::Lzma86 => (0x0B, "LZMA86", "lzma86"),
            Self::Xz => (0x0C, "XZ", "xz"),
            Self::Ppmd => (0x0D, "PPMd", "pmd"),
            Self::Lvm => (0xBF, "LVM", "lvm"),
            Self::Avb => (0xC0, "AVB", "avb"),
            Self::Lp => (0xC1, "LP", "lpimg"),
            Self::Sparse => (0xC2, "Sparse", "simg"),
            Self::Apfs => (0xC3, "APFS", "apfs"),
            Self::Vhdx => (0xC4, "VHDX", "vhdx"),
            Self::Base64 => (0xC5, "Base64", "b64"),
            Self::Coff => (0xC6, "COFF", "obj"),
            Self::Ext => (0xC7, "Ext", "ext"),
            Self::Vmdk => (0xC8, "VMDK", "vmdk"),
            Self::Vdi => (0xC9, "VDI", "vdi"),
            Self::QCow => (0xCA, "QCOW", "qcow"),
            Self::Gpt => (0xCB, "GPT", "gpt"),
            Self::Rar5 => (0xCC, "RAR5", "rar"),
            Self::IHex => (0xCD, "IHex", "ihex"),
            Self::Hxs => (0xCE, "Hxs", "hxs"),
            Self::Te => (0xCF, "TE", "te"),
            Self::UefiC => (0xD0, "UEFIc", "scap"),
            Self::UefiS => (0xD1, "UEFIf", "uefif"),
            Self::SquashFs => (0xD2, "SquashFS", "squashfs"),
            Self::CramFs => (0xD3, "CramFS", "cramfs"),
            Self::Apm => (0xD4, "APM", "apm"),
            Self::Mslz => (0xD5, "MsLZ", "mslz"),
            Self::Flv => (0xD6, "FLV", "flv"),
            Self::Swf => (0xD7, "SWF", "swf"),
            Self::Swfc => (0xD8, "SWFc", "swf"),
            Self::Ntfs => (0xD9, "NTFS", "ntfs"),
            Self::Fat => (0xDA, "FAT", "fat"),
            Self::Mbr => (0xDB, "MBR", "mbr"),
            Self::Vhd => (0xDC, "VHD", "vhd"),
            Self::Pe => (0xDD, "PE", "exe"),
            Self::Elf => (0xDE, "ELF", "elf"),
            Self::Macho => (0xDF, "Mach-O", "macho"),
            Self::Udf => (0xE0, "UDF", "udf"),
            Self::Xar => (0xE1, "XAR", "xar"),
            Self::Mub => (0xE2, "MUB", "mub"),
            Self::Hfs => (0xE3, "HFS", "hfs"),
            Self::Dmg => (0xE4, "DMG", "dmg"),
            Self::Compound => (0xE5, "Compound", "msi"),
            Self::Wim => (0xE6, "WIM", "wim"),
            Self::Iso => (0xE7, "ISO", "iso"),
            Self::Chm => (0xE9, "CHM", "chm"),
            Self::Split => (0xEA, "Split", "001"),
            Self::Rpm => (0xEB, "RPM", "rpm"),
            Self::Deb => (0xEC, "Ar", "deb"),
            Self::Cpio => (0xED, "CPIO", "cpio"),
            Self::Tar => (0xEE, "TAR", "tar"),
            Self::GZip => (0xEF, "gzip", "gz"),
        }
    }

    /// Returns the engine's format id (the variable byte of the class id).
    pub fn id(self) -> u8 {
        self.descriptor().0
    }

    /// Looks up a format by engine id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }

    /// Returns the class id passed to the engine's `CreateObject`.
    pub fn class_id(self) -> Guid {
        Guid::format_class(self.id())
    }

    /// Returns a human-readable name for this format.
    pub fn name(self) -> &'static str {
        self.descriptor().1
    }

    /// Returns the typical file extension for this format (without the dot).
    pub fn extension(self) -> &'static str {
        self.descriptor().2
    }

    /// Returns true if items carry their own path or name.
    ///
    /// Single-stream compressors store at most an original file name, so the
    /// item path is derived from the archive name instead.
    pub fn has_path_metadata(self) -> bool {
        !matches!(
            self,
            Self::BZip2
                | Self::GZip
                | Self::Lzma
                | Self::Lzma86
                | Self::Xz
                | Self::Z
                | Self::Ppmd
                | Self::Split
        )
    }

    /// Returns true if items report their uncompressed size.
    pub fn has_size_metadata(self) -> bool {
        !matches!(
            self,
            Self::BZip2 | Self::Lzma | Self::Lzma86 | Self::Z | Self::Ppmd
        )
    }

    /// Returns true if the format can store a CRC-32 per item.
    ///
    /// LZH headers carry a CRC-16 and CPIO a byte sum, so neither is listed.
    pub fn has_crc(self) -> bool {
        matches!(
            self,
            Self::SevenZip
                | Self::Zip
                | Self::Rar
                | Self::Rar5
                | Self::Arj
                | Self::GZip
        )
    }

    /// Returns true for meta-formats that reassemble other data.
    pub fn is_virtual(self) -> bool {
        matches!(self, Self::Split)
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<u8> = ArchiveFormat::ALL.iter().map(|f| f.id()).collect();
        assert_eq!(ids.len(), ArchiveFormat::ALL.len());
    }

    #[test]
    fn test_from_id_roundtrip() {
        for &format in ArchiveFormat::ALL {
            assert_eq!(ArchiveFormat::from_id(format.id()), Some(format));
        }
        assert_eq!(ArchiveFormat::from_id(0xE8), None);
    }

    #[test]
    fn test_well_known_ids() {
        assert_eq!(ArchiveFormat::SevenZip.id(), 0x07);
        assert_eq!(ArchiveFormat::Zip.id(), 0x01);
        assert_eq!(ArchiveFormat::Rar5.id(), 0xCC);
        assert_eq!(ArchiveFormat::Split.id(), 0xEA);
        assert_eq!(ArchiveFormat::GZip.id(), 0xEF);
    }

    #[test]
    fn test_class_id_layout() {
        let guid = ArchiveFormat::SevenZip.class_id();
        assert_eq!(guid.data1, 0x23170F69);
        assert_eq!(guid.data2, 0x40C1);
        assert_eq!(guid.data3, 0x278A);
        assert_eq!(guid.data4, [0x10, 0x00, 0x00, 0x01, 0x10, 0x07, 0x00, 0x00]);
    }

    #[test]
    fn test_capabilities() {
        assert!(ArchiveFormat::SevenZip.has_path_metadata());
        assert!(ArchiveFormat::SevenZip.has_size_metadata());
        assert!(!ArchiveFormat::GZip.has_path_metadata());
        assert!(ArchiveFormat::GZip.has_size_metadata());
        assert!(!ArchiveFormat::BZip2.has_size_metadata());
        assert!(!ArchiveFormat::Split.has_path_metadata());
        assert!(ArchiveFormat::Split.is_virtual());
        assert!(!ArchiveFormat::Tar.is_virtual());
    }

    #[test]
    fn test_display() {
        assert_eq!(ArchiveFormat::SevenZip.to_string(), "7z");
        assert_eq!(ArchiveFormat::Rar5.to_string(), "RAR5");
        assert_eq!(ArchiveFormat::Zip.extension(), "zip");
    }
}
