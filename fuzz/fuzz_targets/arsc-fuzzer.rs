#![no_main]

use apk_meta_axml::ARSC;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // must provide at least 12 bytes
    if data.len() < 12 {
        return;
    }

    if let Ok(arsc) = ARSC::new(data) {
        // walk every entry, reference chains included
        let _ = arsc.dump();
    }
});
