//! Progress reporting for test and extraction.
//!
//! The engine reports byte totals and running progress through its
//! `IProgress` callbacks; the reader adds per-item start and completion
//! events. Reporters observe only: there is no way to cancel an operation
//! from a callback.
//!
//! # Example
//!
//! ```rust,no_run
//! use zesven_native::progress::StatisticsProgress;
//! use zesven_native::{Archive, Library};
//!
//! let lib = Library::load_default()?;
//! let archive = Archive::open_path(&lib, "data.7z")?;
//! archive.set_progress(StatisticsProgress::new());
//! archive.test()?;
//! # Ok::<(), zesven_native::Error>(())
//! ```

use std::sync::{Arc, Mutex, PoisonError};

/// Receives progress events. Every method has a no-op default.
pub trait ProgressReporter: Send {
    /// Called with the total number of bytes the engine will process.
    fn on_total(&mut self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Called periodically with the bytes processed so far.
    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) {
        let _ = (bytes_processed, total_bytes);
    }

    /// Called when the engine starts on an item.
    fn on_item_start(&mut self, path: &str, size: u64) {
        let _ = (path, size);
    }

    /// Called when the engine finishes an item.
    fn on_item_complete(&mut self, path: &str, success: bool) {
        let _ = (path, success);
    }
}

/// A reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Snapshot of accumulated progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Total bytes to process.
    pub total_bytes: u64,
    /// Bytes processed so far.
    pub processed_bytes: u64,
    /// Item currently being processed.
    pub current_item: Option<String>,
    /// Items that completed successfully.
    pub items_succeeded: usize,
    /// Items that failed.
    pub items_failed: usize,
}

impl ProgressState {
    /// Percentage complete (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.processed_bytes as f64 / self.total_bytes as f64 * 100.0).min(100.0)
    }
}

/// A reporter that accumulates a [`ProgressState`] readable from another
/// handle.
#[derive(Debug, Clone, Default)]
pub struct StatisticsProgress {
    state: Arc<Mutex<ProgressState>>,
}

impl StatisticsProgress {
    /// Creates a new statistics reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> ProgressState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut ProgressState)) {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl ProgressReporter for StatisticsProgress {
    fn on_total(&mut self, total_bytes: u64) {
        self.update(|s| s.total_bytes = total_bytes);
    }

    fn on_progress(&mut self, bytes_processed: u64, _total_bytes: u64) {
        self.update(|s| s.processed_bytes = bytes_processed);
    }

    fn on_item_start(&mut self, path: &str, _size: u64) {
        self.update(|s| s.current_item = Some(path.to_string()));
    }

    fn on_item_complete(&mut self, _path: &str, success: bool) {
        self.update(|s| {
            s.current_item = None;
            if success {
                s.items_succeeded += 1;
            } else {
                s.items_failed += 1;
            }
        });
    }
}

/// A reporter that forwards byte progress to a closure.
pub struct ClosureProgress<F> {
    callback: F,
    total: u64,
}

impl<F> ClosureProgress<F>
where
    F: FnMut(u64, u64) + Send,
{
    /// Creates a reporter calling `callback(processed, total)`.
    pub fn new(callback: F) -> Self {
        Self { callback, total: 0 }
    }
}

impl<F> ProgressReporter for ClosureProgress<F>
where
    F: FnMut(u64, u64) + Send,
{
    fn on_total(&mut self, total_bytes: u64) {
        self.total = total_bytes;
        (self.callback)(0, total_bytes);
    }

    fn on_progress(&mut self, bytes_processed: u64, _total_bytes: u64) {
        (self.callback)(bytes_processed, self.total);
    }
}
