pub mod apk;
pub mod config;
pub mod errors;
pub mod models;

mod manifest;

pub use apk::{ANDROID_MANIFEST_PATH, Apk, RESOURCE_TABLE_PATH, extract_manifest_info};
pub use config::ExtractConfig;
pub use errors::ApkError;
pub use models::{ManifestInfo, ResourceStatus, UnresolvedField};
