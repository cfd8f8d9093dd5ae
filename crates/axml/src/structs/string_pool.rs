use bitflags::bitflags;
use log::warn;
use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::{Chunk, ResChunkHeader};

bitflags! {
    #[derive(Debug, Default, Clone, Copy)]
    pub(crate) struct StringType: u32 {
        const SORTED = 1 << 0;
        const UTF8 = 1 << 8;
    }
}

/// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=454
#[derive(Debug, Default)]
pub(crate) struct ResStringPoolHeader {
    pub(crate) string_count: u32,
    pub(crate) style_count: u32,
    pub(crate) flags: StringType,
    pub(crate) strings_start: u32,
    pub(crate) styles_start: u32,
}

impl ResStringPoolHeader {
    /// Chunk header (8) + 5 fields
    pub(crate) const SIZE: usize = ResChunkHeader::size_of() + 4 * 5;

    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResStringPoolHeader> {
        let (string_count, style_count, flags, strings_start, styles_start) =
            (le_u32, le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        Ok(ResStringPoolHeader {
            string_count,
            style_count,
            flags: StringType::from_bits_truncate(flags),
            strings_start,
            styles_start,
        })
    }

    #[inline]
    pub(crate) fn is_utf8(&self) -> bool {
        self.flags.contains(StringType::UTF8)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StringPool {
    pub(crate) header: ResStringPoolHeader,
    strings: Vec<String>,

    /// Declared count didn't fit into the chunk, or some strings couldn't be decoded
    pub(crate) is_tampered: bool,

    /// Indices stored as an empty string because their data is broken
    invalid_strings: Vec<u32>,
}

impl StringPool {
    /// Parse a whole string pool chunk, strings are never read outside of it
    pub(crate) fn parse(chunk: &Chunk<'_>) -> ModalResult<StringPool> {
        if (chunk.header.header_size as usize) < ResStringPoolHeader::SIZE {
            return Err(ErrMode::Incomplete(Needed::Unknown));
        }

        let mut header = ResStringPoolHeader::parse(&mut chunk.header_ext())?;

        // offsets live between the header and the string data, anything declaring
        // more than fits there is a lie, cut it before allocating
        let offsets = chunk.body();
        let mut max_offsets = offsets.len() / 4;

        let header_size = chunk.header.header_size as usize;
        if let Some(space) = (header.strings_start as usize).checked_sub(header_size)
            && header.strings_start != 0
        {
            // style offsets follow string offsets, unless the style count is a lie too
            let style_offsets = (header.style_count as usize).saturating_mul(4);
            let space = space.checked_sub(style_offsets).unwrap_or(space);
            max_offsets = max_offsets.min(space / 4);
        }
        let mut is_tampered = false;

        if header.string_count as usize > max_offsets {
            warn!(
                "string pool declares {} strings, but only {} offsets fit into the chunk",
                header.string_count, max_offsets
            );
            header.string_count = max_offsets as u32;
            is_tampered = true;
        }

        let string_offsets: Vec<u32> =
            repeat(header.string_count as usize, le_u32).parse_next(&mut &offsets[..])?;

        let strings_data = chunk
            .data
            .get(header.strings_start as usize..)
            .unwrap_or_default();

        let is_utf8 = header.is_utf8();
        let mut invalid_strings = Vec::new();
        let strings = string_offsets
            .iter()
            .enumerate()
            .map(|(idx, &offset)| {
                // keep the index aligned even if the string itself is garbage
                strings_data
                    .get(offset as usize..)
                    .and_then(|mut data| Self::parse_string(&mut data, is_utf8).ok())
                    .unwrap_or_else(|| {
                        warn!("can't decode string #{} at offset 0x{:x}", idx, offset);
                        invalid_strings.push(idx as u32);
                        String::new()
                    })
            })
            .collect();

        is_tampered |= !invalid_strings.is_empty();

        Ok(StringPool {
            header,
            strings,
            is_tampered,
            invalid_strings,
        })
    }

    fn parse_string(input: &mut &[u8], is_utf8: bool) -> ModalResult<String> {
        if is_utf8 {
            // utf-16 length comes first, not needed for decoding
            let _ = Self::parse_utf8_length(input)?;
            let length = Self::parse_utf8_length(input)?;

            let content = take(length).parse_next(input)?;

            Ok(String::from_utf8_lossy(content).into_owned())
        } else {
            let u16len = le_u16(input)?;

            // high bit means the length continues in the next u16
            let real_len = if u16len & 0x8000 != 0 {
                let low = le_u16(input)?;
                ((((u16len & 0x7FFF) as u32) << 16) | low as u32) as usize
            } else {
                u16len as usize
            };

            let content = take(real_len * 2).parse_next(input)?;
            let units: Vec<u16> = content
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .collect();

            Ok(String::from_utf16_lossy(&units))
        }
    }

    /// 1 or 2 bytes, high bit of the first byte marks the long form
    #[inline]
    fn parse_utf8_length(input: &mut &[u8]) -> ModalResult<usize> {
        let first = le_u8(input)?;
        if first & 0x80 != 0 {
            let second = le_u8(input)?;
            Ok((((first & 0x7F) as usize) << 8) | second as usize)
        } else {
            Ok(first as usize)
        }
    }

    #[inline]
    pub(crate) fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    /// String at `idx` was replaced by an empty one
    #[inline]
    pub(crate) fn is_invalid(&self, idx: u32) -> bool {
        self.invalid_strings.contains(&idx)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StringPoolBuilder;

    fn parse(bytes: &[u8]) -> StringPool {
        let chunk = Chunk::read(bytes, 0).unwrap();
        StringPool::parse(&chunk).unwrap()
    }

    #[test]
    fn utf16_strings() {
        let bytes = StringPoolBuilder::utf16(&["manifest", "package", "", "Привет"]).build();
        let pool = parse(&bytes);

        assert_eq!(pool.len(), 4);
        assert!(!pool.header.is_utf8());
        assert_eq!(pool.get(0), Some("manifest"));
        assert_eq!(pool.get(2), Some(""));
        assert_eq!(pool.get(3), Some("Привет"));
    }

    #[test]
    fn utf8_strings() {
        let long = "x".repeat(300);
        let bytes = StringPoolBuilder::utf8(&["versionCode", "日本語", &long]).build();
        let pool = parse(&bytes);

        assert!(pool.header.is_utf8());
        assert_eq!(pool.get(0), Some("versionCode"));
        assert_eq!(pool.get(1), Some("日本語"));
        assert_eq!(pool.get(2), Some(long.as_str()));
    }

    #[test]
    fn out_of_range_is_none() {
        let bytes = StringPoolBuilder::utf16(&["a", "b"]).build();
        let pool = parse(&bytes);

        assert_eq!(pool.get(1), Some("b"));
        assert_eq!(pool.get(2), None);
        assert_eq!(pool.get(u32::MAX), None);
    }

    #[test]
    fn lying_string_count_is_clamped() {
        let mut bytes = StringPoolBuilder::utf16(&["a", "b"]).build();
        // string_count field
        bytes[8..12].copy_from_slice(&0x0fff_ffffu32.to_le_bytes());

        let pool = parse(&bytes);
        assert!(pool.is_tampered);
        assert_eq!(pool.get(0), Some("a"));
        assert_eq!(pool.get(1), Some("b"));
    }

    #[test]
    fn broken_offset_keeps_indices() {
        let mut bytes = StringPoolBuilder::utf16(&["a", "b", "c"]).build();
        // second offset points far outside of the pool
        let offsets = ResStringPoolHeader::SIZE + 4;
        bytes[offsets..offsets + 4].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());

        let pool = parse(&bytes);
        assert_eq!(pool.get(0), Some("a"));
        assert_eq!(pool.get(1), Some(""));
        assert_eq!(pool.get(2), Some("c"));

        assert!(pool.is_tampered);
        assert!(pool.is_invalid(1));
        assert!(!pool.is_invalid(0));
    }

    #[test]
    fn real_empty_string_is_not_invalid() {
        let pool = parse(&StringPoolBuilder::utf16(&["a", ""]).build());

        assert_eq!(pool.get(1), Some(""));
        assert!(!pool.is_tampered);
        assert!(!pool.is_invalid(1));
    }
}
