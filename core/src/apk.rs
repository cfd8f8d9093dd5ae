use std::io;
use std::path::Path;

use apk_meta_axml::{ARSC, AXML, DecodeOptions, ResourceTableError, XmlSerializer};
use apk_meta_zip::{ZipArchive, ZipError};
use log::{debug, warn};

use crate::config::ExtractConfig;
use crate::errors::ApkError;
use crate::manifest::ManifestCollector;
use crate::models::{ManifestInfo, ResourceStatus};

pub const ANDROID_MANIFEST_PATH: &str = "AndroidManifest.xml";
pub const RESOURCE_TABLE_PATH: &str = "resources.arsc";

/// Main structure that represents APK file
pub struct Apk {
    zip: ZipArchive,
    config: ExtractConfig,
}

/// Implementation of internal methods
impl Apk {
    /// Decode `resources.arsc`
    ///
    /// A missing or broken table is not fatal unless [`ExtractConfig::strict_resources`] is set.
    fn load_resources(&self) -> Result<(Option<ARSC>, ResourceStatus), ApkError> {
        let data = match self.zip.read(RESOURCE_TABLE_PATH) {
            Ok(data) => data,
            Err(ZipError::EntryNotFound(_)) => {
                debug!("{} not found, references stay unresolved", RESOURCE_TABLE_PATH);
                return Ok((None, ResourceStatus::Missing));
            }
            Err(e) => return Err(ApkError::Archive(e)),
        };

        let parsed = match self.config.abort.as_deref() {
            Some(abort) => ARSC::with_abort(&data, abort),
            None => ARSC::new(&data),
        };

        match parsed {
            Ok(arsc) => {
                if arsc.is_tampered {
                    warn!("{} looks tampered", RESOURCE_TABLE_PATH);
                }
                Ok((Some(arsc), ResourceStatus::Loaded))
            }
            Err(e @ ResourceTableError::Aborted) => Err(ApkError::Resources(e)),
            Err(e) if self.config.strict_resources => Err(ApkError::Resources(e)),
            Err(e) => {
                warn!("can't decode {}: {}", RESOURCE_TABLE_PATH, e);
                Ok((None, ResourceStatus::Failed(e)))
            }
        }
    }
}

impl Apk {
    /// Open an APK file from disk
    pub fn new(path: &Path, config: &ExtractConfig) -> Result<Apk, ApkError> {
        if !path.exists() {
            return Err(ApkError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file {} not found", path.display()),
            )));
        }

        let zip = ZipArchive::open_with(path, config.zip_options())?;

        Ok(Apk {
            zip,
            config: config.clone(),
        })
    }

    /// Use an APK that is already in memory
    pub fn from_bytes(input: Vec<u8>, config: &ExtractConfig) -> Result<Apk, ApkError> {
        let zip = ZipArchive::with_options(input, config.zip_options())?;

        Ok(Apk {
            zip,
            config: config.clone(),
        })
    }

    /// Underlying archive
    #[inline]
    pub fn archive(&self) -> &ZipArchive {
        &self.zip
    }

    /// List of the filenames included in the central directory
    pub fn namelist(&self) -> impl Iterator<Item = &str> {
        self.zip.namelist()
    }

    /// Read the data of an entry by name
    pub fn read(&self, filename: &str) -> Result<Vec<u8>, ApkError> {
        Ok(self.zip.read(filename)?)
    }

    /// Decode `AndroidManifest.xml` and pick the application information out of it
    ///
    /// ```xml
    /// <manifest package="com.example.app" android:versionCode="3" android:versionName="1.0">
    ///     <uses-sdk android:minSdkVersion="21"/>
    ///     <application android:label="@string/app_name" android:name=".App"/>
    /// </manifest>
    /// ```
    ///
    /// References are resolved through `resources.arsc` when it is present and readable.
    ///
    /// See: <https://developer.android.com/guide/topics/manifest/manifest-element>
    pub fn extract_manifest_info(&self) -> Result<ManifestInfo, ApkError> {
        let manifest = self.zip.read(ANDROID_MANIFEST_PATH)?;
        if manifest.is_empty() {
            return Err(ApkError::InvalidInput(
                "AndroidManifest.xml is empty, not a valid apk",
            ));
        }

        let (arsc, resources) = self.load_resources()?;

        let axml = AXML::new(&manifest)?;
        if axml.is_tampered {
            warn!("{} looks tampered", ANDROID_MANIFEST_PATH);
        }

        let mut nodes = axml.into_nodes(DecodeOptions {
            resources: arsc.as_ref(),
            symbolic_values: self.config.symbolic_values,
            abort: self.config.abort.as_deref(),
        });

        let mut collector = ManifestCollector::default();
        let mut serializer = self
            .config
            .include_raw_xml
            .then(XmlSerializer::<Vec<u8>>::new);

        for node in nodes.by_ref() {
            let node = node?;
            collector.feed(&node);

            match serializer.as_mut() {
                Some(serializer) => serializer.write_node(&node)?,
                None if collector.is_complete() => {
                    debug!("all manifest fields found, stop decoding");
                    break;
                }
                None => {}
            }
        }

        if nodes.is_tampered() {
            warn!("{} contains invalid nodes", ANDROID_MANIFEST_PATH);
        }

        let raw_package_content = match serializer {
            Some(serializer) => serializer.into_string()?,
            None => String::new(),
        };

        Ok(ManifestInfo {
            app_name: collector.app_name,
            package_name: collector.package_name,
            version_code: collector.version_code,
            version_name: collector.version_name,
            min_sdk_version: collector.min_sdk_version,
            application_name: collector.application_name,
            raw_package_content,
            resources,
            unresolved: collector.unresolved,
        })
    }
}

/// Open the APK at `path` and extract its manifest information
pub fn extract_manifest_info(path: &Path, config: &ExtractConfig) -> Result<ManifestInfo, ApkError> {
    Apk::new(path, config)?.extract_manifest_info()
}
