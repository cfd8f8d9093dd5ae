use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Files given on the command line, directories are walked for files with one of `extensions`
pub(crate) fn get_all_files<'a>(
    paths: &'a [PathBuf],
    extensions: &'a [&str],
) -> impl Iterator<Item = PathBuf> + 'a {
    paths.iter().flat_map(move |path| {
        if path.is_dir() {
            WalkDir::new(path)
                .into_iter()
                .filter_entry(|e| {
                    e.file_name()
                        .to_str()
                        .map(|s| !s.starts_with('.') || e.depth() == 0)
                        .unwrap_or(false)
                })
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file() && has_extension(e.path(), extensions))
                .map(|e| e.path().to_path_buf())
                .collect::<Vec<_>>()
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            log::warn!("skipping {:?}, no such file or directory", path);
            Vec::new()
        }
    })
}

/// Looks like a zip container judging by the name
pub(crate) fn is_archive(path: &Path) -> bool {
    has_extension(path, &["apk", "zip", "jar"])
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}
