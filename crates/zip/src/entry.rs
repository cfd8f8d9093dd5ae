use crate::errors::CompressionMethod;
use crate::structs::central_directory::CentralDirectoryEntry;

/// Single file record from the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path of the file inside the archive
    pub name: String,

    pub compression_method: CompressionMethod,

    pub compressed_size: u64,

    pub uncompressed_size: u64,

    /// CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Offset of the local file header from the start of the archive
    pub offset: u64,

    /// Sizes and crc were written after the data (general purpose bit 3)
    pub(crate) has_data_descriptor: bool,
}

impl Entry {
    const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

impl From<CentralDirectoryEntry> for Entry {
    fn from(value: CentralDirectoryEntry) -> Self {
        Entry {
            name: value.file_name,
            compression_method: CompressionMethod::from(value.compression_method),
            compressed_size: value.compressed_size as u64,
            uncompressed_size: value.uncompressed_size as u64,
            crc32: value.crc32,
            offset: value.local_header_offset as u64,
            has_data_descriptor: value.general_purpose & Entry::DATA_DESCRIPTOR_FLAG != 0,
        }
    }
}
