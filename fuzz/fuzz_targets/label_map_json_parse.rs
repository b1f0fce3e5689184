#![no_main]

use camtrap::labels::{to_pbtxt_string, LabelMap, LabelResolver};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(map) = LabelMap::from_json_str(json) {
        let resolver = LabelResolver::new(&map);
        let _ = to_pbtxt_string(resolver.labels());
    }
});
