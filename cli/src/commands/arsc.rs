use std::path::Path;

use anyhow::{Context, Result};
use apk_meta::{Apk, ExtractConfig, RESOURCE_TABLE_PATH};
use apk_meta_axml::ARSC;
use colored::Colorize;

use crate::commands::path_helpers::is_archive;

pub(crate) fn command_arsc(path: &Path, dump: bool) -> Result<()> {
    let data = if is_archive(path) {
        let apk = Apk::new(path, &ExtractConfig::default())
            .with_context(|| format!("got error while parsing apk: {:?}", path))?;
        apk.read(RESOURCE_TABLE_PATH)
            .with_context(|| format!("can't read {} from {:?}", RESOURCE_TABLE_PATH, path))?
    } else {
        std::fs::read(path).with_context(|| format!("can't open and read file: {:?}", path))?
    };

    let arsc = ARSC::new(&data).context("can't decode resource table")?;
    if arsc.is_tampered {
        println!("{}", "resource table looks tampered".yellow());
    }

    for package in arsc.packages() {
        println!(
            "{}: {} (0x{:02x}), {} types, {} entries",
            "Package".blue(),
            package.name.green(),
            package.id,
            package.type_count,
            package.entry_count
        );
        for (id, name) in &package.libraries {
            println!("  {}: {} (0x{:02x})", "Shared library", name, id);
        }
    }

    if dump {
        for resource in arsc.dump() {
            println!(
                "0x{:08x} {} [{}] = {}",
                resource.id, resource.name, resource.config, resource.value
            );
        }
    }

    Ok(())
}
