#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_bind::directive;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    // Parsing must never panic on arbitrary annotation text.
    let _ = directive::parse(source);
    let _ = directive::parse_count(source);
});
