#![no_main]

use apk_meta_axml::{AXML, XmlSerializer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // must provide at least 8 bytes
    if data.len() < 8 {
        return;
    }

    let Ok(nodes) = AXML::decode(data, None) else {
        return;
    };

    let mut serializer = XmlSerializer::new();
    for node in nodes {
        let Ok(node) = node else {
            break;
        };
        let _ = serializer.write_node(&node);
    }
    let _ = serializer.into_string();
});
