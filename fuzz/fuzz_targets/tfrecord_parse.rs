//! Fuzz target for TFRecord framing and example decoding.
//!
//! Arbitrary bytes are read as a record stream; every payload that passes
//! the CRC checks is decoded as an object-detection example.

#![no_main]

use camtrap::tfrecord::{ExampleRecord, RecordReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    for payload in RecordReader::new(data, "fuzz.record") {
        let Ok(payload) = payload else { break };
        let _ = ExampleRecord::decode(&payload);
    }

    // Payloads that skipped the framing still must not panic the decoder.
    let _ = ExampleRecord::decode(data);
});
