//! Extraction to memory and to the file system.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::metadata::apply_metadata;
use super::{Archive, ArchiveItem, ExtractOptions, ExtractResult, LinkPolicy, OverwritePolicy};
use crate::archive_path::{link_target_stays_inside, to_relative_path};
use crate::engine::{AskMode, ExtractMode, ExtractSink, OperationResult, SharedSink};
use crate::progress::ProgressReporter;
use crate::string::{LongPathPolicy, io_path};
use crate::{Error, Result};

impl<'lib> Archive<'lib> {
    /// Extracts item `index` into memory.
    ///
    /// # Errors
    ///
    /// - [`Error::IndexOutOfRange`] if `index >= items_count()`
    /// - [`Error::InvalidPath`] if the item is a directory
    /// - the item's integrity or password error
    pub fn extract_to_buffer(&self, index: u32) -> Result<Vec<u8>> {
        let item = self.item(index)?;
        if item.is_directory {
            return Err(Error::InvalidPath {
                path: item.path.clone(),
                reason: "directories have no data",
            });
        }
        let (sink, failures) = self.run(
            Some(std::slice::from_ref(&index)),
            ExtractMode::Extract,
            BufferSink::with_capacity(item.size),
        )?;
        first_failure(failures)?;
        Ok(sink.data)
    }

    /// Extracts every file into memory, keyed by in-archive path.
    ///
    /// Directories are left out.
    ///
    /// # Errors
    ///
    /// The first item that fails the integrity check, or a password error.
    pub fn extract_to_memory(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        let sink = MemorySink {
            items: Arc::clone(&self.items),
            files: BTreeMap::new(),
        };
        let (sink, failures) = self.run(None, ExtractMode::Extract, sink)?;
        first_failure(failures)?;
        Ok(sink.files)
    }

    /// Extracts every item below `dest`.
    ///
    /// Item paths are sanitized: absolute paths, `..` segments and reserved
    /// device names are rejected per item. Items that fail integrity checks
    /// are removed again and reported in the result.
    ///
    /// # Errors
    ///
    /// - [`Error::PasswordRequired`] if encrypted data is met without a
    ///   password
    /// - [`Error::Io`] if a file cannot be written, or already exists under
    ///   [`OverwritePolicy::Error`]
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use zesven_native::{Archive, ExtractOptions, Library, OverwritePolicy};
    ///
    /// let lib = Library::load_default()?;
    /// let archive = Archive::open_path(&lib, "backup.zip")?;
    /// let options = ExtractOptions::new().overwrite(OverwritePolicy::Skip);
    /// let result = archive.extract_to("restore", &options)?;
    /// for (path, error) in &result.failures {
    ///     eprintln!("{path}: {error}");
    /// }
    /// # Ok::<(), zesven_native::Error>(())
    /// ```
    pub fn extract_to(
        &self,
        dest: impl AsRef<Path>,
        options: &ExtractOptions,
    ) -> Result<ExtractResult> {
        let root = dest.as_ref().to_path_buf();
        fs::create_dir_all(io_path(&root, options.long_path_policy))?;
        let sink = DirSink {
            root,
            options: options.clone(),
            items: Arc::clone(&self.items),
            current: None,
            directories: Vec::new(),
            result: ExtractResult::default(),
        };
        let (sink, _) = self.run(None, ExtractMode::Extract, sink)?;
        Ok(sink.complete())
    }

    /// Runs the engine over `indices` with `sink`, reporting progress.
    ///
    /// Returns the sink together with the per-item failures.
    pub(super) fn run<S: ExtractSink + 'static>(
        &self,
        indices: Option<&[u32]>,
        mode: ExtractMode,
        sink: S,
    ) -> Result<(S, Vec<Error>)> {
        let tracked = Arc::new(Mutex::new(Tracked {
            sink,
            items: Arc::clone(&self.items),
            reporter: self.progress.borrow_mut().take(),
            total: 0,
            failures: Vec::new(),
        }));
        let shared: SharedSink = tracked.clone();
        let outcome = self
            .inner
            .extract(indices, mode, shared, self.password.as_ref());

        let reporter = lock(&tracked).reporter.take();
        *self.progress.borrow_mut() = reporter;
        outcome?;

        let tracked = Arc::try_unwrap(tracked)
            .map_err(|_| io::Error::other("extract callback still referenced by the engine"))?
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if !tracked.failures.is_empty() {
            log::debug!("{} items failed during {:?}", tracked.failures.len(), mode);
        }
        Ok((tracked.sink, tracked.failures))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(super) fn first_failure(failures: Vec<Error>) -> Result<()> {
    match failures.into_iter().next() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn item_at(items: &[ArchiveItem], index: u32) -> io::Result<&ArchiveItem> {
    items
        .get(index as usize)
        .ok_or_else(|| io::Error::other(format!("engine reported unknown item {}", index)))
}

/// Wraps a sink with progress reporting and per-item result mapping.
struct Tracked<S> {
    sink: S,
    items: Arc<[ArchiveItem]>,
    reporter: Option<Box<dyn ProgressReporter>>,
    total: u64,
    failures: Vec<Error>,
}

impl<S: ExtractSink> ExtractSink for Tracked<S> {
    fn total(&mut self, bytes: u64) {
        self.total = bytes;
        if let Some(reporter) = &mut self.reporter {
            reporter.on_total(bytes);
        }
        self.sink.total(bytes);
    }

    fn completed(&mut self, bytes: u64) {
        if let Some(reporter) = &mut self.reporter {
            reporter.on_progress(bytes, self.total);
        }
        self.sink.completed(bytes);
    }

    fn begin(&mut self, index: u32, mode: AskMode) -> io::Result<bool> {
        if mode != AskMode::Skip {
            if let Some(reporter) = &mut self.reporter {
                let item = item_at(&self.items, index)?;
                reporter.on_item_start(&item.path, item.size);
            }
        }
        self.sink.begin(index, mode)
    }

    fn write(&mut self, index: u32, data: &[u8]) -> io::Result<()> {
        self.sink.write(index, data)
    }

    fn finish(&mut self, index: u32, result: OperationResult) -> io::Result<()> {
        let item = item_at(&self.items, index)?;
        if let Some(e) = Error::from_operation_result(index, result, item.is_encrypted) {
            log::debug!("item {} ({}) failed: {}", index, item.path, e);
            self.failures.push(e);
        }
        if let Some(reporter) = &mut self.reporter {
            reporter.on_item_complete(&item.path, result.is_ok());
        }
        self.sink.finish(index, result)
    }
}

/// Verifies items without receiving data.
pub(super) struct Verify;

impl ExtractSink for Verify {
    fn begin(&mut self, _index: u32, _mode: AskMode) -> io::Result<bool> {
        Ok(false)
    }

    fn write(&mut self, _index: u32, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _index: u32, _result: OperationResult) -> io::Result<()> {
        Ok(())
    }
}

/// Collects the data of one item.
struct BufferSink {
    data: Vec<u8>,
}

impl BufferSink {
    fn with_capacity(size: u64) -> Self {
        // The size is only a hint from the archive headers.
        let capacity = usize::try_from(size.min(1 << 26)).unwrap_or(0);
        Self {
            data: Vec::with_capacity(capacity),
        }
    }
}

impl ExtractSink for BufferSink {
    fn begin(&mut self, _index: u32, mode: AskMode) -> io::Result<bool> {
        Ok(mode == AskMode::Extract)
    }

    fn write(&mut self, _index: u32, data: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self, _index: u32, _result: OperationResult) -> io::Result<()> {
        Ok(())
    }
}

/// Collects every file by path.
struct MemorySink {
    items: Arc<[ArchiveItem]>,
    files: BTreeMap<String, Vec<u8>>,
}

impl ExtractSink for MemorySink {
    fn begin(&mut self, index: u32, mode: AskMode) -> io::Result<bool> {
        let item = item_at(&self.items, index)?;
        if mode != AskMode::Extract || item.is_directory {
            return Ok(false);
        }
        self.files.insert(item.path.clone(), Vec::new());
        Ok(true)
    }

    fn write(&mut self, index: u32, data: &[u8]) -> io::Result<()> {
        let item = item_at(&self.items, index)?;
        if let Some(buffer) = self.files.get_mut(&item.path) {
            buffer.extend_from_slice(data);
        }
        Ok(())
    }

    fn finish(&mut self, _index: u32, _result: OperationResult) -> io::Result<()> {
        Ok(())
    }
}

/// The item currently being written by [`DirSink`].
enum Pending {
    File {
        index: u32,
        path: PathBuf,
        writer: BufWriter<File>,
        written: u64,
    },
    Link {
        index: u32,
        path: PathBuf,
        target: Vec<u8>,
    },
}

/// Writes items below a destination directory.
struct DirSink {
    root: PathBuf,
    options: ExtractOptions,
    items: Arc<[ArchiveItem]>,
    current: Option<Pending>,
    directories: Vec<(PathBuf, u32)>,
    result: ExtractResult,
}

impl DirSink {
    fn skip(&mut self, item: &ArchiveItem, why: &str) -> io::Result<bool> {
        log::debug!("skipping '{}': {}", item.path, why);
        self.result.entries_skipped += 1;
        Ok(false)
    }

    /// Restores directory metadata once their contents are in place.
    fn complete(self) -> ExtractResult {
        for (path, index) in self.directories.iter().rev() {
            if let Some(item) = self.items.get(*index as usize) {
                apply_metadata(path, item, &self.options.preserve_metadata);
            }
        }
        self.result
    }
}

impl ExtractSink for DirSink {
    fn begin(&mut self, index: u32, mode: AskMode) -> io::Result<bool> {
        self.current = None;
        if mode != AskMode::Extract {
            return Ok(false);
        }
        let items = Arc::clone(&self.items);
        let item = item_at(&items, index)?;

        let relative = match to_relative_path(&item.path) {
            Ok(relative) => relative,
            Err(e) => {
                log::warn!("refusing to extract '{}': {}", item.path, e);
                self.result.record_failure(&item.path, e.to_string());
                return Ok(false);
            }
        };
        let policy = self.options.long_path_policy;
        if let Some(link) = symlinked_ancestor(&self.root, &relative, policy) {
            log::warn!(
                "refusing to extract '{}' through symbolic link '{}'",
                item.path,
                link.display()
            );
            let e = Error::InvalidPath {
                path: item.path.clone(),
                reason: "parent directory is a symbolic link",
            };
            self.result.record_failure(&item.path, e.to_string());
            return Ok(false);
        }
        let path = self.root.join(relative);

        if item.is_directory {
            fs::create_dir_all(io_path(&path, policy))?;
            self.result.entries_extracted += 1;
            self.directories.push((path, index));
            return Ok(false);
        }
        if item.is_symlink && self.options.link_policy == LinkPolicy::Forbid {
            return self.skip(item, "symbolic links are not allowed");
        }

        if fs::symlink_metadata(io_path(&path, policy)).is_ok() {
            match self.options.overwrite {
                OverwritePolicy::Error => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("'{}' already exists", path.display()),
                    ));
                }
                OverwritePolicy::Skip => return self.skip(item, "file exists"),
                OverwritePolicy::Overwrite => fs::remove_file(io_path(&path, policy))?,
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(io_path(parent, policy))?;
        }

        if item.is_symlink && cfg!(unix) {
            self.current = Some(Pending::Link {
                index,
                path,
                target: Vec::new(),
            });
        } else {
            let file = File::create(io_path(&path, policy))?;
            self.current = Some(Pending::File {
                index,
                path,
                writer: BufWriter::new(file),
                written: 0,
            });
        }
        Ok(true)
    }

    fn write(&mut self, _index: u32, data: &[u8]) -> io::Result<()> {
        match &mut self.current {
            Some(Pending::File {
                writer, written, ..
            }) => {
                writer.write_all(data)?;
                *written += data.len() as u64;
            }
            Some(Pending::Link { target, .. }) => target.extend_from_slice(data),
            None => {}
        }
        Ok(())
    }

    fn finish(&mut self, _index: u32, result: OperationResult) -> io::Result<()> {
        let items = Arc::clone(&self.items);
        match self.current.take() {
            Some(Pending::File {
                index,
                path,
                writer,
                written,
            }) => {
                let item = item_at(&items, index)?;
                let file = writer.into_inner().map_err(|e| e.into_error())?;
                drop(file);
                if result.is_ok() {
                    apply_metadata(&path, item, &self.options.preserve_metadata);
                    self.result.entries_extracted += 1;
                    self.result.bytes_extracted += written;
                } else {
                    let _ = fs::remove_file(io_path(&path, self.options.long_path_policy));
                    self.fail(item, result);
                }
            }
            Some(Pending::Link {
                index,
                path,
                target,
            }) => {
                let item = item_at(&items, index)?;
                let target = String::from_utf8_lossy(&target);
                if !result.is_ok() {
                    self.fail(item, result);
                } else if self.options.link_policy == LinkPolicy::ValidateTargets
                    && !link_target_stays_inside(&item.path, &target)
                {
                    let e = Error::SymlinkTargetEscape {
                        index,
                        path: item.path.clone(),
                        target: target.into_owned(),
                    };
                    log::warn!("{}", e);
                    self.result.record_failure(&item.path, e.to_string());
                } else {
                    create_symlink(&target, &path)?;
                    self.result.entries_extracted += 1;
                }
            }
            None => {}
        }
        Ok(())
    }
}

impl DirSink {
    fn fail(&mut self, item: &ArchiveItem, result: OperationResult) {
        let message = Error::from_operation_result(item.index, result, item.is_encrypted)
            .map(|e| e.to_string())
            .unwrap_or_default();
        self.result.record_failure(&item.path, message);
    }
}

/// Returns the first directory between `root` and the parent of `relative`
/// that is a symbolic link.
fn symlinked_ancestor(root: &Path, relative: &Path, policy: LongPathPolicy) -> Option<PathBuf> {
    let mut current = root.to_path_buf();
    for component in relative.parent()?.components() {
        current.push(component);
        match fs::symlink_metadata(io_path(&current, policy)) {
            Ok(meta) if meta.file_type().is_symlink() => return Some(current),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

#[cfg(unix)]
fn create_symlink(target: &str, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn create_symlink(_target: &str, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are written as files on this platform",
    ))
}
