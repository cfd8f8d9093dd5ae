use memchr::memmem;
use winnow::binary::{le_u16, le_u32};
use winnow::prelude::*;
use winnow::token::take;

/// End of central directory record
///
/// See: <https://pkware.cachefly.net/webdocs/casestudies/APPNOTE.TXT> 4.3.16
#[derive(Debug)]
pub(crate) struct EndOfCentralDirectory {
    pub(crate) disk_number: u16,
    pub(crate) central_dir_start_disk: u16,
    pub(crate) total_entries: u16,
    pub(crate) central_dir_size: u32,
    pub(crate) central_dir_offset: u32,
    pub(crate) comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    const MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

    /// Magic (4) + fixed fields (18)
    pub(crate) const MIN_SIZE: usize = 22;

    /// Comment length is u16, so the record can't start further away from the end
    const MAX_SEARCH: usize = Self::MIN_SIZE + u16::MAX as usize;

    #[inline(always)]
    const fn magic_u32() -> u32 {
        u32::from_le_bytes(Self::MAGIC)
    }

    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<EndOfCentralDirectory> {
        let (
            _,
            disk_number,
            central_dir_start_disk,
            _,
            total_entries,
            central_dir_size,
            central_dir_offset,
            comment_length,
        ) = (
            le_u32.verify(|magic| *magic == Self::magic_u32()), // magic
            le_u16,                                             // disk_number
            le_u16,                                             // central_dir_start_disk
            le_u16,                                             // entries_on_this_disk
            le_u16,                                             // total_entries
            le_u32,                                             // central_dir_size
            le_u32,                                             // central_dir_offset
            le_u16,                                             // comment_length
        )
            .parse_next(input)?;

        // some archives lie about the comment length, don't fail on that
        let comment_length = (comment_length as usize).min(input.len());
        let comment = take(comment_length).parse_next(input)?;

        Ok(EndOfCentralDirectory {
            disk_number,
            central_dir_start_disk,
            total_entries,
            central_dir_size,
            central_dir_offset,
            comment: comment.to_vec(),
        })
    }

    /// Searching magic from the end of the file
    pub(crate) fn find_eocd(input: &[u8]) -> Option<usize> {
        let start = input.len().saturating_sub(Self::MAX_SEARCH);

        memmem::rfind(&input[start..], &Self::MAGIC).map(|pos| start + pos)
    }

    /// ZIP64 archives keep 0xffff/0xffffffff markers here
    #[inline]
    pub(crate) fn is_zip64(&self) -> bool {
        self.total_entries == u16::MAX || self.central_dir_offset == u32::MAX
    }

    #[inline]
    pub(crate) fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.central_dir_start_disk != 0
    }
}
