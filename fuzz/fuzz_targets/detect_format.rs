//! Fuzz target for signature detection with arbitrary byte input.
//!
//! Detection runs on untrusted data before any engine handler sees it, so
//! it must never panic, whatever the length or content.
//!
//! Run with: cargo +nightly fuzz run detect_format

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::{Cursor, Seek};
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);
    if let Ok(Some(info)) = zesven_native::format::detect_format(&mut cursor) {
        assert!(info.offset <= data.len() as u64);
    }
    // Position must be restored for the engine that reads next
    assert_eq!(cursor.stream_position().unwrap(), 0);

    let candidates =
        zesven_native::format::detection_candidates(&mut cursor, Some(Path::new("input.bin")))
            .unwrap();
    let mut deduped = candidates.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), candidates.len(), "duplicate candidates");
});
