use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use apk_meta_zip::{ZipArchive, ZipOptions};

/// Everything that changes how an APK is decoded
///
/// Passed into every call, nothing is kept in process-wide state.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Re-serialize the whole manifest into [`crate::ManifestInfo::raw_package_content`].
    /// When disabled, decoding stops as soon as every field is found.
    pub include_raw_xml: bool,

    /// Fail instead of continuing with unresolved references when resources.arsc is broken
    pub strict_resources: bool,

    /// Render enum and flag manifest attributes by name
    pub symbolic_values: bool,

    /// Refuse to inflate entries that declare more than this many bytes
    pub max_entry_size: u64,

    /// Set from another thread to stop decoding
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            include_raw_xml: true,
            strict_resources: false,
            symbolic_values: false,
            max_entry_size: ZipArchive::DEFAULT_MAX_ENTRY_SIZE,
            abort: None,
        }
    }
}

impl ExtractConfig {
    pub(crate) fn zip_options(&self) -> ZipOptions {
        ZipOptions {
            max_entry_size: self.max_entry_size,
            abort: self.abort.clone(),
        }
    }
}
