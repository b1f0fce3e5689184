//! Fuzz target for annotation file parsing.

#![no_main]

use camtrap::schema::io_json::from_json_slice;
use camtrap::validation::validate_annotation_file;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(file) = from_json_slice(data) {
        let _ = validate_annotation_file(&file, None, None);
    }
});
