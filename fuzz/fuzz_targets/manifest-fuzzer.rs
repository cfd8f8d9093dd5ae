#![no_main]

use apk_meta::{Apk, ExtractConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = ExtractConfig {
        max_entry_size: 16 * 1024 * 1024,
        ..Default::default()
    };

    if let Ok(apk) = Apk::from_bytes(data.to_vec(), &config) {
        let _ = apk.extract_manifest_info();
    }
});
