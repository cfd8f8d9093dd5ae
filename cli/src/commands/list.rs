use std::path::Path;

use anyhow::{Context, Result};
use apk_meta_zip::{CompressionMethod, ZipArchive};
use colored::Colorize;

pub(crate) fn command_list(path: &Path) -> Result<()> {
    let zip = ZipArchive::open(path).with_context(|| format!("can't open archive: {:?}", path))?;

    for entry in zip.entries() {
        let method = match entry.compression_method {
            CompressionMethod::Stored => "stored".to_owned(),
            CompressionMethod::Deflated => "deflated".to_owned(),
            CompressionMethod::Unsupported(method) => format!("{:#06x}", method),
        };

        let name = if entry.is_dir() {
            entry.name.blue()
        } else {
            entry.name.normal()
        };

        println!(
            "{:>10} {:>10} {:>8} {:08x} {}",
            entry.uncompressed_size, entry.compressed_size, method, entry.crc32, name
        );
    }

    Ok(())
}
