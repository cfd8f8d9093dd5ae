use log::warn;

use crate::structs::{ResChunkHeader, ResourceType};

/// Chunk header doesn't describe a chunk that fits into the input
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct ChunkError {
    /// Absolute offset of the broken chunk
    pub(crate) offset: usize,
}

/// A single chunk, `data` covers exactly `header.size` bytes
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub(crate) header: ResChunkHeader,

    /// Absolute offset of the chunk from the start of the file
    pub(crate) offset: usize,

    pub(crate) data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Read chunk at the start of `input`
    ///
    /// `header_size >= 8`, `size >= header_size` and `size <= input.len()`
    /// are checked before anything else touches the chunk
    pub(crate) fn read(input: &'a [u8], offset: usize) -> Result<Chunk<'a>, ChunkError> {
        let header =
            ResChunkHeader::parse(&mut &input[..]).map_err(|_| ChunkError { offset })?;

        let size = header.size as usize;
        if (header.header_size as usize) < ResChunkHeader::size_of()
            || size < header.header_size as usize
            || size > input.len()
        {
            return Err(ChunkError { offset });
        }

        Ok(Chunk {
            header,
            offset,
            data: &input[..size],
        })
    }

    #[inline]
    pub(crate) fn type_(&self) -> ResourceType {
        self.header.type_
    }

    /// Header bytes after the common 8 byte prefix
    #[inline]
    pub(crate) fn header_ext(&self) -> &'a [u8] {
        &self.data[ResChunkHeader::size_of()..self.header.header_size as usize]
    }

    /// Everything after the header, child chunks or payload
    #[inline]
    pub(crate) fn body(&self) -> &'a [u8] {
        &self.data[self.header.header_size as usize..]
    }

    /// Iterate child chunks placed right after the header
    #[inline]
    pub(crate) fn children(&self) -> ChunkIter<'a> {
        ChunkIter::new(
            self.body(),
            self.offset + self.header.header_size as usize,
        )
    }
}

/// Sibling chunks, every step advances by the declared size
#[derive(Debug, Clone)]
pub(crate) struct ChunkIter<'a> {
    input: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> ChunkIter<'a> {
    pub(crate) fn new(input: &'a [u8], base: usize) -> ChunkIter<'a> {
        ChunkIter {
            input,
            base,
            pos: 0,
        }
    }

    /// Absolute offset of the next chunk
    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<Chunk<'a>, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.input[self.pos..];
        if rest.is_empty() {
            return None;
        }

        if rest.len() < ResChunkHeader::size_of() {
            // aapt pads some chunks, too short to be a header anyway
            warn!(
                "ignoring {} trailing bytes at offset 0x{:x}",
                rest.len(),
                self.offset()
            );
            self.pos = self.input.len();
            return None;
        }

        match Chunk::read(rest, self.offset()) {
            Ok(chunk) => {
                self.pos += chunk.data.len();
                Some(Ok(chunk))
            }
            Err(e) => {
                // nothing after a broken chunk can be located
                self.pos = self.input.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(type_: u16, header_size: u16, size: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&type_.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn iterate_siblings_by_declared_size() {
        let mut input = chunk(0x0001, 8, 12, &[1, 2, 3, 4]);
        input.extend(chunk(0x7777, 8, 16, &[0; 8]));
        input.extend(chunk(0x0180, 8, 8, &[]));

        let chunks = ChunkIter::new(&input, 0)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].type_(), ResourceType::StringPool);
        assert_eq!(chunks[0].body(), &[1, 2, 3, 4]);
        assert_eq!(chunks[1].type_(), ResourceType::Unknown(0x7777));
        assert_eq!(chunks[1].offset, 12);
        assert_eq!(chunks[2].type_(), ResourceType::XmlResourceMap);
        assert_eq!(chunks[2].offset, 28);
    }

    #[test]
    fn reject_broken_headers() {
        // size bigger than input
        assert!(Chunk::read(&chunk(0x0001, 8, 100, &[0; 4]), 0).is_err());
        // header bigger than chunk
        assert!(Chunk::read(&chunk(0x0001, 16, 12, &[0; 4]), 0).is_err());
        // header smaller than the common prefix
        assert!(Chunk::read(&chunk(0x0001, 4, 12, &[0; 4]), 0).is_err());
    }

    #[test]
    fn fused_after_error() {
        let mut input = chunk(0x0001, 8, 8, &[]);
        input.extend(chunk(0x0001, 8, 0x1000, &[0; 8]));
        input.extend(chunk(0x0001, 8, 8, &[]));

        let mut iter = ChunkIter::new(&input, 0x40);
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(
            iter.next(),
            Some(Err(ChunkError { offset: 0x48 }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn trailing_padding_is_ignored() {
        let mut input = chunk(0x0001, 8, 8, &[]);
        input.extend([0, 0, 0]);

        assert_eq!(ChunkIter::new(&input, 0).count(), 1);
    }
}
