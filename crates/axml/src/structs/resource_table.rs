use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use log::{debug, warn};
use winnow::binary::{le_u16, le_u32, u8};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::errors::ResourceTableError;
use crate::structs::{Chunk, ResTableConfig, ResourceType, ResourceValue, StringPool, ValueType};

/// Header for a resource table
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=906)
#[derive(Debug)]
pub(crate) struct ResTableHeader {
    /// The number of [ResTablePackage] structures
    pub(crate) package_count: u32,
}

impl ResTableHeader {
    /// Chunk header (8) + package_count (4)
    pub(crate) const SIZE: u16 = 12;

    #[inline(always)]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableHeader> {
        le_u32
            .map(|package_count| ResTableHeader { package_count })
            .parse_next(input)
    }
}

/// Decode `\0`-terminated utf-16 name field
fn utf16_name(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&c| c != 0)
        .collect();

    String::from_utf16_lossy(&units)
}

/// A collection of resource data types withing a package
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=919)
pub(crate) struct ResTablePackageHeader {
    /// If this is a base package, its ID. 0 means this is not a base package
    pub(crate) id: u32,

    /// Actual name of this package, \0-terminated
    pub(crate) name: [u8; 256],

    /// Offset to [StringPool] defining the resource type symbol table
    pub(crate) type_strings: u32,

    /// Last index into `type_strings` that is for public use by others
    pub(crate) last_public_type: u32,

    /// Offset to [StringPool] defining the resource key symbol table
    pub(crate) key_strings: u32,

    /// Last index into `key_strings` that is for public use by other
    pub(crate) last_public_key: u32,

    /// In old versions this field doesn't exists
    pub(crate) type_id_offset: u32,
}

impl ResTablePackageHeader {
    /// Header without `type_id_offset`
    pub(crate) const OLD_SIZE: u16 = 284;

    pub(crate) const SIZE: u16 = 288;

    pub(crate) fn parse(input: &mut &[u8], header_size: u16) -> ModalResult<ResTablePackageHeader> {
        let (id, name, type_strings, last_public_type, key_strings, last_public_key) =
            (le_u32, take(256usize), le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        let name: [u8; 256] = name
            .try_into()
            .map_err(|_| ErrMode::Incomplete(Needed::Unknown))?;

        // old structure doesn't have type_id_offset
        let type_id_offset = if header_size >= Self::SIZE {
            le_u32.parse_next(input)?
        } else {
            0
        };

        if header_size > Self::SIZE {
            warn!(
                "resource table package header is {} bytes, ignoring {} unknown bytes",
                header_size,
                header_size - Self::SIZE
            );
        }

        Ok(ResTablePackageHeader {
            id,
            name,
            type_strings,
            last_public_type,
            key_strings,
            last_public_key,
            type_id_offset,
        })
    }

    /// Get a real package name from `name` slice
    pub(crate) fn name(&self) -> String {
        utf16_name(&self.name)
    }
}

impl fmt::Debug for ResTablePackageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResTablePackageHeader")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("type_strings", &self.type_strings)
            .field("last_public_type", &self.last_public_type)
            .field("key_strings", &self.key_strings)
            .field("last_public_key", &self.last_public_key)
            .field("type_id_offset", &self.type_id_offset)
            .finish()
    }
}

/// A specification of the resources defined by a particular type
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=1448)
#[derive(Debug)]
pub(crate) struct ResTableTypeSpec {
    /// The type identifier this chunk is holding, 0 is invalid
    pub(crate) id: u8,

    /// If >0 specifies the number of [ResTableType] entries for this spec
    pub(crate) types_count: u16,

    /// Configuration mask per entry
    pub(crate) type_spec_flags: Vec<u32>,
}

impl ResTableTypeSpec {
    pub(crate) fn parse(chunk: &Chunk<'_>) -> ModalResult<ResTableTypeSpec> {
        let input = &mut chunk.header_ext();

        // res0 is documented as 0, malware likes to put garbage there
        let (id, _res0, types_count, entry_count) = (u8, u8, le_u16, le_u32).parse_next(input)?;

        let body = &mut chunk.body();
        if entry_count as usize > body.len() / 4 {
            return Err(ErrMode::Incomplete(Needed::Unknown));
        }

        let type_spec_flags = repeat(entry_count as usize, le_u32).parse_next(body)?;

        Ok(ResTableTypeSpec {
            id,
            types_count,
            type_spec_flags,
        })
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct ResTableFlag: u16 {
        /// If set, this is a complex entry, holding a set of name/value mappings.
        const FLAG_COMPLEX = 0x0001;

        /// If set, this resource has been declared public, so libraries are allowed to reference it.
        const FLAG_PUBLIC = 0x0002;

        /// If set, this is a weak resource and may be overridden by strong resources of the same name/type.
        const FLAG_WEAK = 0x0004;

        /// If set, this is a compact entry with data type and value directly encoded in this entry.
        const FLAG_COMPACT = 0x0008;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResTableMap {
    /// The resource identifier defining this mapping's name
    pub name: u32,

    pub value: ResourceValue,
}

impl ResTableMap {
    const SIZE: usize = 4 + ResourceValue::SIZE;

    #[inline(always)]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableMap> {
        (le_u32, ResourceValue::parse)
            .map(|(name, value)| ResTableMap { name, value })
            .parse_next(input)
    }
}

/// Bag resource: style, array, plurals, attribute definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResTableMapEntry {
    /// Reference to the key string pool
    pub key: u32,

    /// Resource identifier of the parent mapping, or 0 if there is none
    pub parent: u32,

    pub values: Vec<ResTableMap>,
}

/// Single resource value in one configuration
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=1583)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResTableEntry {
    Complex(ResTableMapEntry),

    /// Simple value, compact entries are expanded into this form too
    Value { key: u32, value: ResourceValue },
}

impl ResTableEntry {
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableEntry> {
        let (size, flags, index) = (le_u16, le_u16, le_u32).parse_next(input)?;
        let flags_set = ResTableFlag::from_bits_truncate(flags);

        if flags_set.contains(ResTableFlag::FLAG_COMPACT) {
            // key in `size`, data type in the high byte of `flags`, data in `index`
            return Ok(ResTableEntry::Value {
                key: size as u32,
                value: ResourceValue {
                    data_type: ValueType::from((flags >> 8) as u8),
                    data: index,
                },
            });
        }

        if flags_set.contains(ResTableFlag::FLAG_COMPLEX) {
            let (parent, count) = (le_u32, le_u32).parse_next(input)?;

            if count as usize > input.len() / ResTableMap::SIZE {
                return Err(ErrMode::Incomplete(Needed::Unknown));
            }

            let values = repeat(count as usize, ResTableMap::parse).parse_next(input)?;

            return Ok(ResTableEntry::Complex(ResTableMapEntry {
                key: index,
                parent,
                values,
            }));
        }

        Ok(ResTableEntry::Value {
            key: index,
            value: ResourceValue::parse(input)?,
        })
    }

    #[inline]
    pub fn key(&self) -> u32 {
        match self {
            ResTableEntry::Complex(entry) => entry.key,
            ResTableEntry::Value { key, .. } => *key,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct ResTableTypeFlags: u8 {
        /// Offsets are (entry id, offset) pairs sorted by entry id
        const SPARSE   = 0x01;

        /// Offsets are encoded in 16-bit, real_offset = offset * 4, 0xffff means NO_ENTRY
        const OFFSET16 = 0x02;
    }
}

/// A collection of resource entries for a specific resource data type and configuration
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=1500)
#[derive(Debug)]
pub(crate) struct ResTableType {
    /// The type identifier this chunk is holding, 0 is invalid
    pub(crate) id: u8,

    /// Configuration this collection of entries is designed for
    pub(crate) config: ResTableConfig,

    /// Present entries only, absent ids never show up here
    pub(crate) entries: BTreeMap<u16, ResTableEntry>,
}

impl ResTableType {
    const NO_ENTRY: u32 = u32::MAX;
    const NO_ENTRY16: u16 = u16::MAX;

    pub(crate) fn parse(chunk: &Chunk<'_>) -> ModalResult<ResTableType> {
        let input = &mut chunk.header_ext();

        let (id, flags, _reserved, entry_count, entries_start) =
            (u8, u8, le_u16, le_u32, le_u32).parse_next(input)?;
        let flags = ResTableTypeFlags::from_bits_truncate(flags);

        let config = ResTableConfig::parse(input)?;

        // offsets table starts right after the header, whatever the config size says
        let offsets = &mut chunk.body();
        let is_sparse = flags.contains(ResTableTypeFlags::SPARSE);
        let is_offset16 = flags.contains(ResTableTypeFlags::OFFSET16);
        let width = if is_offset16 && !is_sparse { 2 } else { 4 };

        if entry_count as usize > offsets.len() / width {
            return Err(ErrMode::Incomplete(Needed::Unknown));
        }

        // (entry id, offset from entries_start)
        let offsets: Vec<(u16, u32)> = if is_sparse {
            repeat(
                entry_count as usize,
                (le_u16, le_u16).map(|(idx, offset)| (idx, offset as u32 * 4)),
            )
            .parse_next(offsets)?
        } else if is_offset16 {
            let raw: Vec<u16> = repeat(entry_count as usize, le_u16).parse_next(offsets)?;
            raw.into_iter()
                .enumerate()
                .filter(|(_, offset)| *offset != Self::NO_ENTRY16)
                .map(|(idx, offset)| (idx as u16, offset as u32 * 4))
                .collect()
        } else {
            let raw: Vec<u32> = repeat(entry_count as usize, le_u32).parse_next(offsets)?;
            raw.into_iter()
                .enumerate()
                .filter(|(_, offset)| *offset != Self::NO_ENTRY)
                .map(|(idx, offset)| (idx as u16, offset))
                .collect()
        };

        // entries are read from this slice only, a lying offset can't escape the chunk
        let entries_data = chunk.data.get(entries_start as usize..).unwrap_or_default();

        let mut entries = BTreeMap::new();
        for (idx, offset) in offsets {
            let parsed = entries_data
                .get(offset as usize..)
                .map(|mut data| ResTableEntry::parse(&mut data));

            match parsed {
                Some(Ok(entry)) => {
                    entries.insert(idx, entry);
                }
                _ => warn!(
                    "skip broken entry {} at offset 0x{:x} in type 0x{:02x}",
                    idx, offset, id
                ),
            }
        }

        Ok(ResTableType {
            id,
            config,
            entries,
        })
    }
}

/// A shared library package-id to package name entry
#[derive(Debug)]
pub(crate) struct ResTableLibraryEntry {
    /// The package-id this shared library was assigned at build time
    pub(crate) package_id: u32,

    pub(crate) package_name: String,
}

impl ResTableLibraryEntry {
    const SIZE: usize = 4 + 256;

    pub(crate) fn parse(chunk: &Chunk<'_>) -> ModalResult<Vec<ResTableLibraryEntry>> {
        let count = le_u32.parse_next(&mut chunk.header_ext())?;

        let body = &mut chunk.body();
        if count as usize > body.len() / Self::SIZE {
            return Err(ErrMode::Incomplete(Needed::Unknown));
        }

        repeat(
            count as usize,
            (le_u32, take(256usize)).map(|(package_id, name): (u32, &[u8])| {
                ResTableLibraryEntry {
                    package_id,
                    package_name: utf16_name(name),
                }
            }),
        )
        .parse_next(body)
    }
}

#[derive(Debug)]
pub(crate) struct ResTablePackage {
    pub(crate) header: ResTablePackageHeader,
    pub(crate) type_strings: StringPool,
    pub(crate) key_strings: StringPool,

    /// type id => every configuration in file order
    pub(crate) types: AHashMap<u8, Vec<ResTableType>>,

    pub(crate) libraries: Vec<ResTableLibraryEntry>,
}

impl ResTablePackage {
    pub(crate) fn parse(
        chunk: &Chunk<'_>,
        abort: Option<&AtomicBool>,
    ) -> Result<ResTablePackage, ResourceTableError> {
        let header_size = chunk.header.header_size;
        if header_size < ResTablePackageHeader::OLD_SIZE {
            return Err(ResourceTableError::UnsupportedChunkVersion {
                chunk: "package",
                header_size,
            });
        }

        let header = ResTablePackageHeader::parse(&mut chunk.header_ext(), header_size)
            .map_err(|_| Self::truncated("package", chunk.offset))?;

        debug!("{:?}", header);

        let type_strings = Self::parse_pool(chunk, header.type_strings, "type strings")?;
        let key_strings = Self::parse_pool(chunk, header.key_strings, "key strings")?;

        let mut types: AHashMap<u8, Vec<ResTableType>> = AHashMap::new();
        let mut libraries = Vec::new();

        for child in chunk.children() {
            if abort.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(ResourceTableError::Aborted);
            }

            let child = child.map_err(|e| Self::truncated("package child", e.offset))?;

            match child.type_() {
                // type/key pools are located by the header offsets
                ResourceType::StringPool => {}
                ResourceType::TableTypeSpec => {
                    let spec = ResTableTypeSpec::parse(&child)
                        .map_err(|_| Self::truncated("type spec", child.offset))?;

                    debug!(
                        "type spec 0x{:02x}: {} entries, {} types",
                        spec.id,
                        spec.type_spec_flags.len(),
                        spec.types_count
                    );
                }
                ResourceType::TableType => {
                    let type_ = ResTableType::parse(&child)
                        .map_err(|_| Self::truncated("type", child.offset))?;

                    if type_.id == 0 {
                        warn!("skip type chunk with id 0 at offset 0x{:x}", child.offset);
                        continue;
                    }

                    types.entry(type_.id).or_default().push(type_);
                }
                ResourceType::TableLibrary => {
                    let entries = ResTableLibraryEntry::parse(&child)
                        .map_err(|_| Self::truncated("library", child.offset))?;
                    libraries.extend(entries);
                }
                other => debug!(
                    "skip {:?} chunk (0x{:04x}) at offset 0x{:x}",
                    other, child.header.raw_type, child.offset
                ),
            }
        }

        Ok(ResTablePackage {
            header,
            type_strings,
            key_strings,
            types,
            libraries,
        })
    }

    fn parse_pool(
        chunk: &Chunk<'_>,
        offset: u32,
        name: &'static str,
    ) -> Result<StringPool, ResourceTableError> {
        // zero offset means the package inherits pools from a base package
        if offset == 0 {
            return Ok(StringPool::default());
        }

        let data = chunk
            .data
            .get(offset as usize..)
            .ok_or_else(|| Self::truncated(name, chunk.offset))?;

        let absolute = chunk.offset + offset as usize;
        let pool_chunk = Chunk::read(data, absolute).map_err(|_| Self::truncated(name, absolute))?;

        if pool_chunk.type_() != ResourceType::StringPool {
            return Err(Self::truncated(name, absolute));
        }

        StringPool::parse(&pool_chunk).map_err(|_| Self::truncated(name, absolute))
    }

    #[inline]
    fn truncated(chunk: &'static str, offset: usize) -> ResourceTableError {
        ResourceTableError::TruncatedChunk { chunk, offset }
    }

    /// Default configuration if it has the entry, otherwise the first one in file order
    pub(crate) fn get_entry(&self, type_id: u8, entry_id: u16) -> Option<&ResTableEntry> {
        let configs = self.types.get(&type_id)?;

        configs
            .iter()
            .find(|type_| type_.config.is_default() && type_.entries.contains_key(&entry_id))
            .or_else(|| {
                configs
                    .iter()
                    .find(|type_| type_.entries.contains_key(&entry_id))
            })
            .and_then(|type_| type_.entries.get(&entry_id))
    }

    /// Type name from the type string pool, type ids start at 1
    #[inline]
    pub(crate) fn type_name(&self, type_id: u8) -> Option<&str> {
        self.type_strings.get(type_id.checked_sub(1)? as u32)
    }

    #[inline]
    pub(crate) fn id(&self) -> u8 {
        self.header.id as u8
    }
}
