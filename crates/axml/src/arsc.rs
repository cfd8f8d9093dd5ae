use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashSet;
use log::{debug, info, warn};

use crate::errors::ResourceTableError;
use crate::structs::{
    Chunk, ResTableEntry, ResTableHeader, ResTablePackage, ResourceType, ResourceValue,
    StringPool, ValueError,
};

/// Value found at the end of a reference chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    /// Simple value stored under `id`
    Value { id: u32, value: ResourceValue },

    /// Bag entry (style, array, plurals) stored under `id`
    Complex { id: u32, parent: u32, count: usize },
}

impl ResolvedValue {
    /// Resource id that actually holds the value
    #[inline]
    pub fn id(&self) -> u32 {
        match self {
            ResolvedValue::Value { id, .. } | ResolvedValue::Complex { id, .. } => *id,
        }
    }
}

/// Short description of a package inside the resource table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub id: u32,
    pub name: String,
    pub type_count: usize,
    pub entry_count: usize,

    /// Shared libraries referenced by this package: (build time package id, name)
    pub libraries: Vec<(u32, String)>,
}

/// One entry of a table dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDump {
    pub id: u32,
    pub name: String,

    /// Configuration qualifiers, `default` for the unqualified one
    pub config: String,

    pub value: String,
}

/// Decoded `resources.arsc`
#[derive(Debug)]
pub struct ARSC {
    /// Table contained chunks that don't follow the format, but were skipped
    pub is_tampered: bool,

    string_pool: StringPool,
    packages: Vec<ResTablePackage>,
}

impl ARSC {
    pub fn new(input: &[u8]) -> Result<ARSC, ResourceTableError> {
        Self::parse(input, None)
    }

    /// Same as [`ARSC::new`], `abort` is checked between chunks
    pub fn with_abort(input: &[u8], abort: &AtomicBool) -> Result<ARSC, ResourceTableError> {
        Self::parse(input, Some(abort))
    }

    fn parse(input: &[u8], abort: Option<&AtomicBool>) -> Result<ARSC, ResourceTableError> {
        if input.len() < ResTableHeader::SIZE as usize {
            return Err(ResourceTableError::TooSmall);
        }

        let table = Chunk::read(input, 0).map_err(|e| ResourceTableError::TruncatedChunk {
            chunk: "table",
            offset: e.offset,
        })?;

        if table.type_() != ResourceType::Table {
            return Err(ResourceTableError::BadMagic(table.header.raw_type));
        }

        if table.header.header_size < ResTableHeader::SIZE {
            return Err(ResourceTableError::UnsupportedChunkVersion {
                chunk: "table",
                header_size: table.header.header_size,
            });
        }

        let header = ResTableHeader::parse(&mut table.header_ext()).map_err(|_| {
            ResourceTableError::TruncatedChunk {
                chunk: "table",
                offset: 0,
            }
        })?;

        if table.data.len() < input.len() {
            debug!(
                "ignoring {} bytes after resource table chunk",
                input.len() - table.data.len()
            );
        }

        let mut is_tampered = false;
        let mut string_pool: Option<StringPool> = None;
        let mut packages = Vec::with_capacity(header.package_count.min(16) as usize);

        for chunk in table.children() {
            if abort.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(ResourceTableError::Aborted);
            }

            let chunk = chunk.map_err(|e| ResourceTableError::TruncatedChunk {
                chunk: "table child",
                offset: e.offset,
            })?;

            match chunk.type_() {
                ResourceType::StringPool if string_pool.is_none() => {
                    let pool = StringPool::parse(&chunk).map_err(|_| {
                        ResourceTableError::TruncatedChunk {
                            chunk: "string pool",
                            offset: chunk.offset,
                        }
                    })?;
                    is_tampered |= pool.is_tampered;
                    string_pool = Some(pool);
                }
                ResourceType::TablePackage => {
                    packages.push(ResTablePackage::parse(&chunk, abort)?);
                }
                other => {
                    warn!(
                        "skip unexpected {:?} chunk in resource table at offset 0x{:x}",
                        other, chunk.offset
                    );
                    is_tampered = true;
                }
            }
        }

        if packages.len() != header.package_count as usize {
            warn!(
                "resource table declares {} packages, but contains {}",
                header.package_count,
                packages.len()
            );
        }

        let string_pool = string_pool.unwrap_or_else(|| {
            warn!("resource table doesn't have a global string pool");
            StringPool::default()
        });

        info!(
            "parsed resource table: {} packages, {} global strings",
            packages.len(),
            string_pool.len()
        );

        Ok(ARSC {
            is_tampered,
            string_pool,
            packages,
        })
    }

    #[inline]
    fn split_resource_id(id: u32) -> (u8, u8, u16) {
        (
            (id >> 24) as u8,
            ((id >> 16) & 0xff) as u8,
            (id & 0xffff) as u16,
        )
    }

    #[inline]
    fn package(&self, package_id: u8) -> Option<&ResTablePackage> {
        self.packages.iter().find(|p| p.id() == package_id)
    }

    /// Entry for `id`, default configuration first, then the first configuration that has it
    pub fn get_entry(&self, id: u32) -> Option<&ResTableEntry> {
        let (package_id, type_id, entry_id) = Self::split_resource_id(id);

        self.package(package_id)?.get_entry(type_id, entry_id)
    }

    /// Follow references until a non-reference value
    ///
    /// Missing entry anywhere in the chain is `Ok(None)`,
    /// visiting an id twice is [`ResourceTableError::CyclicReference`].
    pub fn resolve(&self, id: u32) -> Result<Option<ResolvedValue>, ResourceTableError> {
        let mut visited = AHashSet::new();
        let mut current = id;

        loop {
            if !visited.insert(current) {
                return Err(ResourceTableError::CyclicReference(current));
            }

            let Some(entry) = self.get_entry(current) else {
                debug!("resource 0x{:08x} not found", current);
                return Ok(None);
            };

            match entry {
                ResTableEntry::Value { value, .. } if value.is_reference() && value.data != 0 => {
                    current = value.data;
                }
                ResTableEntry::Value { value, .. } => {
                    return Ok(Some(ResolvedValue::Value {
                        id: current,
                        value: *value,
                    }));
                }
                ResTableEntry::Complex(entry) => {
                    return Ok(Some(ResolvedValue::Complex {
                        id: current,
                        parent: entry.parent,
                        count: entry.values.len(),
                    }));
                }
            }
        }
    }

    /// Resolve `id` and render the final value as text
    pub fn resolve_to_string(&self, id: u32) -> Result<Option<String>, ResourceTableError> {
        match self.resolve(id)? {
            Some(ResolvedValue::Value { value, .. }) => self.value_to_string(&value).map(Some),
            Some(ResolvedValue::Complex { id, .. }) => Ok(Some(
                self.resource_name(id)
                    .unwrap_or_else(|| ResourceValue::fmt_reference('@', id)),
            )),
            None => Ok(None),
        }
    }

    /// Render value, strings come from the global string pool
    pub fn value_to_string(&self, value: &ResourceValue) -> Result<String, ResourceTableError> {
        value.to_string(&self.string_pool).map_err(|e| match e {
            ValueError::InvalidStringIndex { index, count } => {
                ResourceTableError::InvalidStringIndex { index, count }
            }
            ValueError::InvalidTypedValue(t) => ResourceTableError::InvalidTypedValue(t),
        })
    }

    /// `@[android:]type/key` name of the resource
    pub fn resource_name(&self, id: u32) -> Option<String> {
        let (package_id, type_id, entry_id) = Self::split_resource_id(id);
        let package = self.package(package_id)?;

        let entry = package.get_entry(type_id, entry_id)?;
        let type_name = package.type_name(type_id)?;
        let key = package.key_strings.get(entry.key())?;

        let prefix = if package_id == 1 { "android:" } else { "" };
        Some(format!("@{}{}/{}", prefix, type_name, key))
    }

    /// Name of the first package, usually the application package
    pub fn package_name(&self) -> Option<String> {
        self.packages.first().map(|p| p.header.name())
    }

    pub fn packages(&self) -> impl Iterator<Item = PackageInfo> + '_ {
        self.packages.iter().map(|package| PackageInfo {
            id: package.header.id,
            name: package.header.name(),
            type_count: package.types.len(),
            entry_count: package
                .types
                .values()
                .flat_map(|configs| configs.iter())
                .map(|type_| type_.entries.len())
                .sum(),
            libraries: package
                .libraries
                .iter()
                .map(|lib| (lib.package_id, lib.package_name.clone()))
                .collect(),
        })
    }

    /// Every entry of every configuration, ordered by package, type and entry id
    pub fn dump(&self) -> Vec<ResourceDump> {
        let mut result = Vec::new();

        for package in &self.packages {
            let mut type_ids: Vec<&u8> = package.types.keys().collect();
            type_ids.sort();

            for &type_id in type_ids {
                for type_ in &package.types[&type_id] {
                    let config = type_.config.as_string();

                    for (&entry_id, entry) in &type_.entries {
                        let id = ((package.id() as u32) << 24)
                            | ((type_id as u32) << 16)
                            | entry_id as u32;

                        let name = format!(
                            "{}/{}",
                            package.type_name(type_id).unwrap_or("?"),
                            package.key_strings.get(entry.key()).unwrap_or("?")
                        );

                        let value = match entry {
                            ResTableEntry::Value { value, .. } => self
                                .value_to_string(value)
                                .unwrap_or_else(|e| format!("<{}>", e)),
                            ResTableEntry::Complex(entry) => {
                                format!("<complex, {} values>", entry.values.len())
                            }
                        };

                        result.push(ResourceDump {
                            id,
                            name,
                            config: config.clone(),
                            value,
                        });
                    }
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::structs::{ResStringPoolHeader, ValueType};
    use crate::testing::{TableBuilder, TypeBuilder};

    fn app_table() -> Vec<u8> {
        TableBuilder::new(0x7f, "com.example.app")
            .strings(&["Example", "1.0", "Пример"])
            .types(&["attr", "string", "integer"])
            .keys(&["app_name", "version_name", "alias", "counter", "localized"])
            .add_type(
                TypeBuilder::new(2)
                    .string(0, 0, 0)
                    .string(1, 1, 1)
                    .reference(2, 2, 0x7f020000),
            )
            .add_type(TypeBuilder::new(3).value(0, 3, ValueType::Dec, 42))
            .add_type(TypeBuilder::new(2).with_locale(b"ru").string(4, 4, 2))
            .build()
    }

    #[test]
    fn resolve_plain_values() {
        let arsc = ARSC::new(&app_table()).unwrap();

        assert_eq!(
            arsc.resolve_to_string(0x7f020000).unwrap(),
            Some("Example".to_owned())
        );
        assert_eq!(
            arsc.resolve_to_string(0x7f020001).unwrap(),
            Some("1.0".to_owned())
        );
        assert_eq!(
            arsc.resolve_to_string(0x7f030000).unwrap(),
            Some("42".to_owned())
        );
        assert_eq!(arsc.package_name(), Some("com.example.app".to_owned()));
    }

    #[test]
    fn resolve_follows_references() {
        let arsc = ARSC::new(&app_table()).unwrap();

        let resolved = arsc.resolve(0x7f020002).unwrap().unwrap();
        assert_eq!(resolved.id(), 0x7f020000);
        assert_eq!(
            arsc.resolve_to_string(0x7f020002).unwrap(),
            Some("Example".to_owned())
        );
    }

    #[test]
    fn missing_entries_are_none() {
        let arsc = ARSC::new(&app_table()).unwrap();

        // unknown package, unknown type, unknown entry
        assert_eq!(arsc.resolve(0x7e020000).unwrap(), None);
        assert_eq!(arsc.resolve(0x7f090000).unwrap(), None);
        assert_eq!(arsc.resolve(0x7f020063).unwrap(), None);
        assert!(arsc.get_entry(0x7f020063).is_none());
    }

    #[test]
    fn non_default_config_is_used_as_fallback() {
        let arsc = ARSC::new(&app_table()).unwrap();

        assert_eq!(
            arsc.resolve_to_string(0x7f020004).unwrap(),
            Some("Пример".to_owned())
        );
    }

    #[test]
    fn resource_names() {
        let arsc = ARSC::new(&app_table()).unwrap();

        assert_eq!(
            arsc.resource_name(0x7f020001),
            Some("@string/version_name".to_owned())
        );
        assert_eq!(
            arsc.resource_name(0x7f030000),
            Some("@integer/counter".to_owned())
        );
        assert_eq!(arsc.resource_name(0x7f020063), None);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let table = TableBuilder::new(0x7f, "com.example.app")
            .types(&["string"])
            .keys(&["loop"])
            .add_type(TypeBuilder::new(1).reference(0, 0, 0x7f010000))
            .build();
        let arsc = ARSC::new(&table).unwrap();

        assert_eq!(
            arsc.resolve(0x7f010000),
            Err(ResourceTableError::CyclicReference(0x7f010000))
        );
    }

    #[test]
    fn cycles_of_any_length_fail() {
        for length in 2..=1000u32 {
            let keys: Vec<String> = (0..length).map(|i| format!("k{}", i)).collect();
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

            let mut type_ = TypeBuilder::new(1);
            for i in 0..length {
                let next = 0x7f010000 | ((i + 1) % length);
                type_ = type_.reference(i as u16, i, next);
            }

            let table = TableBuilder::new(0x7f, "com.example.app")
                .types(&["string"])
                .keys(&keys)
                .add_type(type_)
                .build();
            let arsc = ARSC::new(&table).unwrap();

            // start in the middle of the ring, the revisited id is the start
            let start = 0x7f010000 | (length / 2);
            assert_eq!(
                arsc.resolve(start),
                Err(ResourceTableError::CyclicReference(start)),
                "cycle of length {}",
                length
            );
            assert!(arsc.resolve_to_string(start).is_err());
        }
    }

    #[test]
    fn sparse_and_offset16_types() {
        let table = TableBuilder::new(0x7f, "com.example.app")
            .strings(&["sparse", "short"])
            .types(&["string", "dimen"])
            .keys(&["a", "b"])
            .add_type(TypeBuilder::new(1).sparse().string(1000, 0, 0))
            .add_type(TypeBuilder::new(2).offset16().string(3, 1, 1))
            .build();
        let arsc = ARSC::new(&table).unwrap();

        assert_eq!(
            arsc.resolve_to_string(0x7f0103e8).unwrap(),
            Some("sparse".to_owned())
        );
        assert_eq!(arsc.resolve(0x7f010000).unwrap(), None);
        assert_eq!(
            arsc.resolve_to_string(0x7f020003).unwrap(),
            Some("short".to_owned())
        );
        assert_eq!(arsc.resolve(0x7f020002).unwrap(), None);
    }

    #[test]
    fn compact_and_complex_entries() {
        let table = TableBuilder::new(0x7f, "com.example.app")
            .types(&["integer", "style"])
            .keys(&["compact", "AppTheme"])
            .add_type(TypeBuilder::new(1).compact(0, 0, ValueType::Dec, 7))
            .add_type(TypeBuilder::new(2).complex(0, 1, 0x01030005, &[(0x01010000, 1)]))
            .build();
        let arsc = ARSC::new(&table).unwrap();

        assert_eq!(
            arsc.resolve_to_string(0x7f010000).unwrap(),
            Some("7".to_owned())
        );
        assert_eq!(
            arsc.resolve(0x7f020000).unwrap(),
            Some(ResolvedValue::Complex {
                id: 0x7f020000,
                parent: 0x01030005,
                count: 1
            })
        );
        assert_eq!(
            arsc.resolve_to_string(0x7f020000).unwrap(),
            Some("@style/AppTheme".to_owned())
        );
    }

    #[test]
    fn header_errors() {
        assert_eq!(ARSC::new(&[0u8; 4]).err(), Some(ResourceTableError::TooSmall));

        let mut table = app_table();
        table[0] = 0x03;
        assert_eq!(ARSC::new(&table).err(), Some(ResourceTableError::BadMagic(0x0003)));

        let table = app_table();
        assert!(matches!(
            ARSC::new(&table[..table.len() - 1]),
            Err(ResourceTableError::TruncatedChunk { .. })
        ));
    }

    #[test]
    fn old_and_unsupported_package_headers() {
        let old = TableBuilder::new(0x7f, "com.example.app")
            .package_header_size(284)
            .strings(&["Example"])
            .types(&["string"])
            .keys(&["app_name"])
            .add_type(TypeBuilder::new(1).string(0, 0, 0))
            .build();
        let arsc = ARSC::new(&old).unwrap();
        assert_eq!(
            arsc.resolve_to_string(0x7f010000).unwrap(),
            Some("Example".to_owned())
        );

        let broken = TableBuilder::new(0x7f, "com.example.app")
            .package_header_size(200)
            .build();
        assert_eq!(
            ARSC::new(&broken).err(),
            Some(ResourceTableError::UnsupportedChunkVersion {
                chunk: "package",
                header_size: 200
            })
        );
    }

    #[test]
    fn trailing_chunk_is_ignored() {
        let mut table = app_table();
        // unrelated chunk after the table
        table.extend_from_slice(&[0x02, 0x00, 0x0c, 0x00, 0xff, 0xff, 0x00, 0x00]);

        let arsc = ARSC::new(&table).unwrap();
        assert_eq!(
            arsc.resolve_to_string(0x7f020000).unwrap(),
            Some("Example".to_owned())
        );
    }

    #[test]
    fn broken_global_string_marks_tampered() {
        assert!(!ARSC::new(&app_table()).unwrap().is_tampered);

        let mut table = app_table();
        // second offset of the global pool, right after the table and pool headers
        let offset = 12 + ResStringPoolHeader::SIZE + 4;
        table[offset..offset + 4].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());

        let arsc = ARSC::new(&table).unwrap();
        assert!(arsc.is_tampered);
        assert_eq!(arsc.resolve_to_string(0x7f020000).unwrap().as_deref(), Some("Example"));
    }

    #[test]
    fn abort_flag() {
        let abort = AtomicBool::new(true);

        assert_eq!(
            ARSC::with_abort(&app_table(), &abort).err(),
            Some(ResourceTableError::Aborted)
        );
    }

    #[test]
    fn dump_lists_every_config() {
        let arsc = ARSC::new(&app_table()).unwrap();
        let dump = arsc.dump();

        assert_eq!(dump.len(), 5);
        assert!(dump.iter().any(|d| d.id == 0x7f020004
            && d.config == "ru"
            && d.name == "string/localized"
            && d.value == "Пример"));

        let packages: Vec<PackageInfo> = arsc.packages().collect();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].id, 0x7f);
        assert_eq!(packages[0].entry_count, 5);
    }
}
