#![no_main]

use apk_meta_zip::ZipArchive;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(zip) = ZipArchive::new(data.to_vec()) else {
        return;
    };

    for entry in zip.entries() {
        let _ = zip.read(&entry.name);
    }
});
