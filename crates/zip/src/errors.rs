use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipError {
    /// Generic I/O error while reading the archive from disk
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Input doesn't look like a zip archive at all
    #[error("not a zip archive: {0}")]
    NotAZip(&'static str),

    /// Some structure points outside of the archive
    #[error("zip archive is truncated: {0}")]
    Truncated(&'static str),

    /// Provided file not found in zip
    #[error("file not exist in zip: {0}")]
    EntryNotFound(String),

    /// Entry uses compression other than stored/deflated
    #[error("unsupported compression method {method} for {name}")]
    UnsupportedCompression { name: String, method: u16 },

    /// Decompression failed, or the result doesn't match size/crc from the central directory
    #[error("corrupted data in {name}: {reason}")]
    CorruptData { name: String, reason: &'static str },

    /// Declared uncompressed size is above the configured limit
    #[error("entry {name} is too large: {size} bytes (limit {limit})")]
    EntryTooLarge { name: String, size: u64, limit: u64 },

    /// Caller asked to stop
    #[error("zip parsing was aborted")]
    Aborted,
}

/// Compression method of a zip entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Data is stored as is
    Stored,

    /// Raw deflate stream
    Deflated,

    /// Anything else, can't be read
    Unsupported(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Unsupported(other),
        }
    }
}
