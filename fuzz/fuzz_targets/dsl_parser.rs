#![no_main]

use libfuzzer_sys::fuzz_target;
use betrace::dsl;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing (and static validation) must never panic or hang,
        // regardless of input.
        let _ = dsl::compile(input);
    }
});
