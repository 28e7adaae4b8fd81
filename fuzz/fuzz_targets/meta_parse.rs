#![no_main]

use libfuzzer_sys::fuzz_target;
use spool_storage::ReaderMeta;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary text to the reader metadata parser.
    // Tests handling of:
    // - Missing or extra lines
    // - Missing or extra comma fields
    // - Non-numeric and overflowing integers
    // - Missing trailing newline
    // - Invalid UTF-8 (converted to lossy string)
    let text = String::from_utf8_lossy(data);

    // The parser must accept or reject, never panic
    if let Ok(meta) = ReaderMeta::parse(&text) {
        // anything accepted must survive a persist round-trip unchanged
        let reparsed = ReaderMeta::parse(&meta.encode()).expect("encoded form must parse");
        assert_eq!(meta, reparsed);
    }
});
