use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apk_meta::{ExtractConfig, ManifestInfo, ResourceStatus, extract_manifest_info};
use colored::Colorize;

use crate::ShowOptions;
use crate::commands::path_helpers::get_all_files;

pub(crate) fn command_show(paths: &[PathBuf], options: &ShowOptions) -> Result<()> {
    let files: Vec<PathBuf> = get_all_files(paths, &["apk", "zip", "jar"]).collect();

    let config = ExtractConfig {
        include_raw_xml: options.raw || options.json,
        strict_resources: options.strict,
        symbolic_values: options.symbolic,
        ..Default::default()
    };

    for (i, path) in files.iter().enumerate() {
        let info = extract_manifest_info(path, &config)
            .with_context(|| format!("got error while parsing apk: {:?}", path))?;

        if options.json {
            println!("{}", serde_json::to_string(&info)?);
            continue;
        }

        show(path, &info, options.raw);

        // Add a newline between APKs except after the last one
        if i != files.len() - 1 {
            println!();
        }
    }

    Ok(())
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn show(path: &Path, info: &ManifestInfo, raw: bool) {
    println!("{}: {}", "File", path.display().to_string().blue());
    println!("{}: {}", "Package Name", or_dash(&info.package_name).green());
    println!("{}: {}", "Application Label", or_dash(&info.app_name).green());
    println!("{}: {}", "Application Class", or_dash(&info.application_name).green());
    println!("{}: {}", "Version Code", or_dash(&info.version_code).green());
    println!("{}: {}", "Version Name", or_dash(&info.version_name).green());
    println!("{}: {}", "Min SDK Version", or_dash(&info.min_sdk_version).green());

    match &info.resources {
        ResourceStatus::Loaded => {}
        ResourceStatus::Missing => println!("{}: {}", "Resources", "missing".yellow()),
        ResourceStatus::Failed(e) => println!("{}: {}", "Resources", e.to_string().red()),
    }

    for field in &info.unresolved {
        println!(
            "  {} {} = {} ({})",
            "unresolved".yellow(),
            field.field,
            field.reference,
            field.reason
        );
    }

    if raw {
        println!("\n{}", info.raw_package_content);
    }
}
