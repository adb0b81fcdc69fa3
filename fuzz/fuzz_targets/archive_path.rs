//! Fuzz target for in-archive path handling with arbitrary string input.
//!
//! Item paths come straight from archive headers. The goal is to find
//! panics in normalization, or an accepted extraction path that escapes the
//! destination directory.
//!
//! Run with: cargo +nightly fuzz run archive_path
//!
//! Key security properties being tested:
//! - Parent directory segments are rejected
//! - Absolute and drive-prefixed paths are rejected
//! - NUL bytes are rejected

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Component;
use zesven_native::archive_path::{normalize, to_relative_path};

fuzz_target!(|data: &[u8]| {
    let Ok(path) = std::str::from_utf8(data) else {
        return;
    };

    let normalized = normalize(path);
    assert_eq!(normalize(&normalized), normalized, "normalize is not idempotent");

    if let Ok(relative) = to_relative_path(path) {
        assert!(
            relative.components().all(|c| matches!(c, Component::Normal(_))),
            "escaping path accepted: {:?}",
            relative
        );
        assert!(!path.contains('\0'), "NUL byte accepted: {:?}", path);
    }
});
