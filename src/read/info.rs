//! Extraction result summary.

/// Result of [`Archive::extract_to`](super::Archive::extract_to).
///
/// Integrity failures of single items do not abort an extraction; they are
/// counted here instead.
#[must_use = "extraction results should be checked for partial failures"]
#[derive(Debug, Clone, Default)]
pub struct ExtractResult {
    /// Number of items written, directories included.
    pub entries_extracted: usize,
    /// Number of items skipped by policy.
    pub entries_skipped: usize,
    /// Number of items that failed.
    pub entries_failed: usize,
    /// Total bytes written.
    pub bytes_extracted: u64,
    /// Failed items: in-archive path and error message.
    pub failures: Vec<(String, String)>,
}

impl ExtractResult {
    /// Returns true if no item failed.
    pub fn is_ok(&self) -> bool {
        self.entries_failed == 0
    }

    /// Returns true if any item failed.
    pub fn is_err(&self) -> bool {
        self.entries_failed > 0
    }

    pub(crate) fn record_failure(&mut self, path: &str, message: String) {
        self.entries_failed += 1;
        self.failures.push((path.to_string(), message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_result() {
        let mut result = ExtractResult::default();
        assert!(result.is_ok());
        assert!(!result.is_err());

        result.record_failure("a.txt", "CRC mismatch".to_string());
        assert!(!result.is_ok());
        assert!(result.is_err());
        assert_eq!(result.failures, vec![("a.txt".to_string(), "CRC mismatch".to_string())]);
    }
}
