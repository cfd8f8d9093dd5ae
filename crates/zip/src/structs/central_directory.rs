use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use winnow::binary::{le_u16, le_u32};
use winnow::prelude::*;
use winnow::token::take;

use crate::errors::ZipError;
use crate::structs::eocd::EndOfCentralDirectory;

#[derive(Debug)]
pub(crate) struct CentralDirectoryEntry {
    pub(crate) general_purpose: u16,
    pub(crate) compression_method: u16,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u32,
    pub(crate) uncompressed_size: u32,
    pub(crate) local_header_offset: u32,
    pub(crate) file_name: String,
}

impl CentralDirectoryEntry {
    const MAGIC: u32 = 0x02014b50;

    /// Magic (4) + fixed fields (42)
    pub(crate) const MIN_SIZE: usize = 46;

    #[inline(always)]
    fn parse(input: &mut &[u8]) -> ModalResult<CentralDirectoryEntry> {
        let (
            _,
            _,
            _,
            general_purpose,
            compression_method,
            _,
            _,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            file_comment_length,
            _,
            _,
            _,
            local_header_offset,
        ) = (
            le_u32.verify(|magic| *magic == Self::MAGIC), // magic
            le_u16,                                       // version_made_by
            le_u16,                                       // version_needed
            le_u16,                                       // general_purpose
            le_u16,                                       // compression_method
            le_u16,                                       // last_mod_time
            le_u16,                                       // last_mod_date
            le_u32,                                       // crc32
            le_u32,                                       // compressed_size
            le_u32,                                       // uncompressed_size
            le_u16,                                       // file_name_length
            le_u16,                                       // extra_field_length
            le_u16,                                       // file_comment_length
            le_u16,                                       // disk_number_start
            le_u16,                                       // internal_attrs
            le_u32,                                       // external_attrs
            le_u32,                                       // local_header_offset
        )
            .parse_next(input)?;

        let (file_name, _, _) = (
            take(file_name_length),
            take(extra_field_length),
            take(file_comment_length),
        )
            .parse_next(input)?;

        Ok(CentralDirectoryEntry {
            general_purpose,
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            file_name: String::from_utf8_lossy(file_name).to_string(),
        })
    }
}

#[derive(Debug)]
pub(crate) struct CentralDirectory {
    /// Entries in the order they appear in the archive
    pub(crate) entries: Vec<CentralDirectoryEntry>,
}

impl CentralDirectory {
    pub(crate) fn parse(
        input: &[u8],
        eocd: &EndOfCentralDirectory,
        abort: Option<&AtomicBool>,
    ) -> Result<CentralDirectory, ZipError> {
        let start = eocd.central_dir_offset as usize;
        let end = start
            .checked_add(eocd.central_dir_size as usize)
            .ok_or(ZipError::Truncated("central directory size overflows"))?;

        let mut slice = input
            .get(start..end)
            .ok_or(ZipError::Truncated("central directory is out of bounds"))?;

        // every record is at least 46 bytes, so the count can't be bigger than that
        let total_entries = eocd.total_entries as usize;
        if total_entries * CentralDirectoryEntry::MIN_SIZE > slice.len() {
            return Err(ZipError::Truncated("central directory is smaller than declared"));
        }

        let mut entries = Vec::with_capacity(total_entries);
        for _ in 0..total_entries {
            if abort.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(ZipError::Aborted);
            }

            let entry = CentralDirectoryEntry::parse(&mut slice)
                .map_err(|_| ZipError::Truncated("invalid central directory record"))?;
            entries.push(entry);
        }

        if !slice.is_empty() {
            warn!(
                "{} unparsed bytes left in central directory, ignoring them",
                slice.len()
            );
        }

        Ok(CentralDirectory { entries })
    }
}
