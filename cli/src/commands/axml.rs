use std::path::Path;

use anyhow::{Context, Result};
use apk_meta::{Apk, ExtractConfig, RESOURCE_TABLE_PATH};
use apk_meta_axml::{ARSC, AXML, DecodeOptions, XmlSerializer};

use crate::commands::path_helpers::is_archive;

pub(crate) fn command_axml(path: &Path, entry: &str, resolve: bool) -> Result<()> {
    let (data, resources) = if is_archive(path) {
        let apk = Apk::new(path, &ExtractConfig::default())
            .with_context(|| format!("can't open apk file: {:?}", path))?;

        let data = apk
            .read(entry)
            .with_context(|| format!("can't read {} from {:?}", entry, path))?;

        let resources = if resolve {
            Some(
                apk.read(RESOURCE_TABLE_PATH)
                    .context("can't read resources.arsc")?,
            )
        } else {
            None
        };

        (data, resources)
    } else {
        let data =
            std::fs::read(path).with_context(|| format!("can't open and read file: {:?}", path))?;
        (data, None)
    };

    let arsc = resources
        .as_deref()
        .map(ARSC::new)
        .transpose()
        .context("can't decode resources.arsc")?;

    let nodes = AXML::new(&data)?.into_nodes(DecodeOptions {
        resources: arsc.as_ref(),
        ..Default::default()
    });

    let mut serializer = XmlSerializer::with_writer(std::io::stdout().lock());
    for node in nodes {
        serializer.write_node(&node?)?;
    }
    serializer.finish()?;
    println!();

    Ok(())
}
