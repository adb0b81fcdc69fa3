//! Concatenating reader over numbered volume files.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::string::check_seek_overflow;
use crate::{Error, Result};

/// Trait for readers that can report volume information.
pub trait VolumeReader: Read + Seek {
    /// Returns the total number of volumes.
    fn volume_count(&self) -> u32;

    /// Returns the sizes of all volumes in bytes.
    fn volume_sizes(&self) -> &[u64];

    /// Returns the current volume number (1-indexed).
    fn current_volume(&self) -> u32;

    /// Returns the total logical size across all volumes.
    fn total_size(&self) -> u64;
}

/// A reader that presents `name.001`, `name.002`, ... as one stream.
///
/// Volumes are discovered from the first one by probing consecutive
/// numbers until one is missing, and opened lazily on first access.
///
/// # Example
///
/// ```rust,no_run
/// use std::io::Read;
/// use zesven_native::volume::{MultiVolumeReader, VolumeReader};
///
/// let mut reader = MultiVolumeReader::open("backup.zip.001")?;
/// println!("{} volumes, {} bytes", reader.volume_count(), reader.total_size());
///
/// let mut head = [0u8; 4];
/// reader.read_exact(&mut head)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct MultiVolumeReader {
    /// Volume file handles (opened lazily).
    volumes: Vec<Option<BufReader<File>>>,
    volume_sizes: Vec<u64>,
    /// Path without the numeric suffix.
    base_path: PathBuf,
    /// Digits in the numeric suffix of the first volume.
    width: usize,
    /// First volume number (usually 1, sometimes 0).
    first: u32,
    position: u64,
    /// Current volume index (0-based).
    current_volume: usize,
    volume_position: u64,
    total_size: u64,
}

impl MultiVolumeReader {
    /// Opens a volume set from the path of any of its volumes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPath`] if the path has no numeric suffix
    /// - [`Error::VolumeMissing`] if the first volume does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (base_path, width) = split_volume_path(path).ok_or_else(|| Error::InvalidPath {
            path: path.display().to_string(),
            reason: "not a numbered volume",
        })?;

        let first = if volume_path_for(&base_path, width, 0).is_file() {
            0
        } else {
            1
        };
        let (volume_sizes, total_size) = detect_volumes(&base_path, width, first)?;

        if volume_sizes.is_empty() {
            let missing = volume_path_for(&base_path, width, first);
            return Err(Error::VolumeMissing {
                volume: first,
                path: missing.display().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "volume file not found"),
            });
        }

        log::debug!(
            "opened volume set {} ({} volumes, {} bytes)",
            base_path.display(),
            volume_sizes.len(),
            total_size
        );

        Ok(Self {
            volumes: (0..volume_sizes.len()).map(|_| None).collect(),
            volume_sizes,
            base_path,
            width,
            first,
            position: 0,
            current_volume: 0,
            volume_position: 0,
            total_size,
        })
    }

    fn open_volume(&mut self, index: usize) -> io::Result<&mut BufReader<File>> {
        let path = self.volume_path(self.first + index as u32);
        let slot = &mut self.volumes[index];
        if slot.is_none() {
            *slot = Some(BufReader::new(File::open(&path)?));
        }
        slot.as_mut()
            .ok_or_else(|| io::Error::other("volume handle unavailable"))
    }

    /// Calculates volume index and offset for a logical position.
    fn position_to_volume(&self, pos: u64) -> (usize, u64) {
        let mut remaining = pos;
        for (i, &size) in self.volume_sizes.iter().enumerate() {
            if remaining < size {
                return (i, remaining);
            }
            remaining -= size;
        }
        let last = self.volume_sizes.len().saturating_sub(1);
        (last, self.volume_sizes.get(last).copied().unwrap_or(0))
    }

    /// Returns the path without the numeric suffix.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the path of volume `number`, formatted like the first one.
    pub fn volume_path(&self, number: u32) -> PathBuf {
        volume_path_for(&self.base_path, self.width, number)
    }
}

/// Splits `archive.zip.003` into (`archive.zip`, 3 digits).
///
/// Only suffixes of at least three digits count as volume numbers.
pub fn split_volume_path(path: &Path) -> Option<(PathBuf, usize)> {
    let text = path.to_str()?;
    let dot = text.rfind('.')?;
    let suffix = &text[dot + 1..];
    if suffix.len() < 3 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((PathBuf::from(&text[..dot]), suffix.len()))
}

/// Returns true if `path` ends in a numeric volume suffix.
pub fn is_volume_path(path: &Path) -> bool {
    split_volume_path(path).is_some()
}

fn volume_path_for(base: &Path, width: usize, number: u32) -> PathBuf {
    let mut text = base.as_os_str().to_owned();
    text.push(format!(".{:0width$}", number, width = width));
    PathBuf::from(text)
}

fn detect_volumes(base: &Path, width: usize, first: u32) -> Result<(Vec<u64>, u64)> {
    let mut sizes = Vec::new();
    let mut total = 0u64;
    let mut number = first;

    loop {
        match std::fs::metadata(volume_path_for(base, width, number)) {
            Ok(meta) if meta.is_file() => {
                sizes.push(meta.len());
                total += meta.len();
                number += 1;
            }
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::Io(e)),
        }
    }

    Ok((sizes, total))
}

impl Read for MultiVolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total_read = 0;

        while total_read < buf.len() && self.position < self.total_size {
            let remaining_in_volume = self.volume_sizes[self.current_volume] - self.volume_position;

            if remaining_in_volume == 0 {
                if self.current_volume + 1 >= self.volumes.len() {
                    break;
                }
                self.current_volume += 1;
                self.volume_position = 0;
                continue;
            }

            let to_read = (buf.len() - total_read).min(remaining_in_volume as usize);
            let seek_pos = self.volume_position;
            let volume = self.open_volume(self.current_volume)?;
            volume.seek(SeekFrom::Start(seek_pos))?;

            let n = volume.read(&mut buf[total_read..total_read + to_read])?;
            if n == 0 {
                // Volume shrank since it was measured.
                break;
            }

            total_read += n;
            self.position += n as u64;
            self.volume_position += n as u64;
        }

        Ok(total_read)
    }
}

impl Seek for MultiVolumeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(p) => (p, 0),
            SeekFrom::End(p) => (self.total_size, p),
            SeekFrom::Current(p) => (self.position, p),
        };
        let new_pos = check_seek_overflow(base, offset).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;

        self.position = new_pos.min(self.total_size);
        let (vol_idx, vol_pos) = self.position_to_volume(self.position);
        self.current_volume = vol_idx;
        self.volume_position = vol_pos;

        Ok(self.position)
    }
}

impl VolumeReader for MultiVolumeReader {
    fn volume_count(&self) -> u32 {
        self.volume_sizes.len() as u32
    }

    fn volume_sizes(&self) -> &[u64] {
        &self.volume_sizes
    }

    fn current_volume(&self) -> u32 {
        (self.current_volume + 1) as u32
    }

    fn total_size(&self) -> u64 {
        self.total_size
    }
}

impl std::fmt::Debug for MultiVolumeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiVolumeReader")
            .field("base_path", &self.base_path)
            .field("volume_count", &self.volume_sizes.len())
            .field("total_size", &self.total_size)
            .field("position", &self.position)
            .field("current_volume", &(self.current_volume + 1))
            .finish()
    }
}
