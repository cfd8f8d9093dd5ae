use std::fmt::Display;

use apk_meta_axml::ResourceTableError;
use serde::Serialize;

/// What happened to `resources.arsc`
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Decoded, references were resolved through it
    Loaded,

    /// Archive doesn't have a resource table
    Missing,

    /// Resource table is broken, references stay unresolved
    Failed(#[serde(serialize_with = "as_display")] ResourceTableError),
}

/// Manifest field that holds a reference placeholder instead of a value
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedField {
    /// Name of the [`ManifestInfo`] field
    pub field: &'static str,

    /// Placeholder kept in the field, `@7f0b0001` and alike
    pub reference: String,

    pub reason: &'static str,
}

/// Minimal information about an application taken from `AndroidManifest.xml`
///
/// Missing attributes are empty strings.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    /// `<application android:label>`
    pub app_name: String,

    /// `<manifest package>`
    pub package_name: String,

    /// `<manifest android:versionCode>`
    pub version_code: String,

    /// `<manifest android:versionName>`
    pub version_name: String,

    /// `<uses-sdk android:minSdkVersion>`
    pub min_sdk_version: String,

    /// `<application android:name>`
    pub application_name: String,

    /// Whole manifest as indented text XML
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_package_content: String,

    pub resources: ResourceStatus,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedField>,
}

fn as_display<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: Display,
{
    serializer.collect_str(value)
}
