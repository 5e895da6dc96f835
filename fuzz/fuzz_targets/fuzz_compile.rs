#![no_main]

use libfuzzer_sys::fuzz_target;
use molscript::compile;

fuzz_target!(|data: &[u8]| {
    if let Ok(script) = std::str::from_utf8(data) {
        // The compiler should never panic, only return Ok or Err
        if let Err(err) = compile(script) {
            let _ = err.format_error();
        }
    }
});
