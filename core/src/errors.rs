use std::io;

use apk_meta_axml::{ResourceTableError, XmlDecodeError};
use apk_meta_zip::ZipError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApkError {
    /// Generic I/O error while trying to read or write data
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Got invalid input (for example, empty manifest)
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Error occurred while parsing apk as zip archive
    #[error("got error while parsing apk archive")]
    Archive(#[from] ZipError),

    /// Error occurred while parsing resources.arsc, only returned in strict mode
    #[error("got error while parsing resources.arsc")]
    Resources(#[from] ResourceTableError),

    /// Error occurred while parsing AndroidManifest.xml
    #[error("got error while parsing AndroidManifest.xml")]
    Manifest(#[from] XmlDecodeError),
}
