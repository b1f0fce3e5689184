#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Non-empty byte blobs, as the store requires.
pub fn arb_blobs(max_blobs: usize, max_len: usize) -> BoxedStrategy<Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 1..=max_len), 1..=max_blobs).boxed()
}

/// A mask of the given size with arbitrary keep/blank pixels.
pub fn arb_mask_values(width: u32, height: u32) -> BoxedStrategy<Vec<u8>> {
    let len = (width * height) as usize;
    prop::collection::vec(prop_oneof![Just(0u8), Just(1u8)], len).boxed()
}

/// An RGB pixel buffer of the given size.
pub fn arb_pixels(width: u32, height: u32) -> BoxedStrategy<Vec<u8>> {
    let len = (width * height * 3) as usize;
    prop::collection::vec(any::<u8>(), len).boxed()
}
