use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceTableError {
    /// Provided file too small to be resources.arsc
    #[error("file size too small for resources file")]
    TooSmall,

    /// Outer chunk is not a resource table
    #[error("expected resource table chunk, got chunk type 0x{0:04x}")]
    BadMagic(u16),

    /// Chunk declares more bytes than available or has a broken header
    #[error("truncated {chunk} chunk at offset 0x{offset:x}")]
    TruncatedChunk { chunk: &'static str, offset: usize },

    /// Header layout that this decoder doesn't know how to read
    #[error("unsupported {chunk} header size: {header_size}")]
    UnsupportedChunkVersion {
        chunk: &'static str,
        header_size: u16,
    },

    #[error("string index {index} is out of range, string pool has {count} strings")]
    InvalidStringIndex { index: u32, count: usize },

    #[error("invalid typed value type 0x{0:02x}")]
    InvalidTypedValue(u8),

    /// Reference chain returned to an already visited resource
    #[error("cyclic reference detected at resource 0x{0:08x}")]
    CyclicReference(u32),

    #[error("resource table parsing was aborted")]
    Aborted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlDecodeError {
    /// Provided file too small to be binary xml
    #[error("file size too small for binary xml")]
    TooSmall,

    /// Outer chunk is not a binary xml document
    #[error("expected xml chunk, got chunk type 0x{0:04x}")]
    BadMagic(u16),

    /// Invalid header size of the outer chunk
    #[error("got invalid header size {0}, expected 8")]
    HeaderSize(u16),

    /// Chunk declares more bytes than available or has a broken header
    #[error("truncated {chunk} chunk at offset 0x{offset:x}")]
    TruncatedChunk { chunk: &'static str, offset: usize },

    /// Document doesn't start with a string pool
    #[error("binary xml doesn't contain a string pool")]
    MissingStringPool,

    /// End element without start, mismatched end or unclosed elements
    #[error("malformed nesting: {0}")]
    MalformedNesting(String),

    #[error("string index {index} is out of range, string pool has {count} strings")]
    InvalidStringIndex { index: u32, count: usize },

    #[error("invalid typed value type 0x{0:02x}")]
    InvalidTypedValue(u8),

    #[error("binary xml decoding was aborted")]
    Aborted,
}
