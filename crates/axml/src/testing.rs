//! Byte-exact builders for string pools, binary XML documents and resource tables
//!
//! Used by unit tests, the facade integration tests and fuzz seeds.

use crate::structs::ValueType;

const NO_STRING: u32 = u32::MAX;

/// Chunk with `ext` right after the common 8 byte header and `body` after it
fn chunk(type_: u16, ext: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = 8 + ext.len();
    let size = header_size + body.len();

    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&type_.to_le_bytes());
    out.extend_from_slice(&(header_size as u16).to_le_bytes());
    out.extend_from_slice(&(size as u32).to_le_bytes());
    out.extend_from_slice(ext);
    out.extend_from_slice(body);
    out
}

/// `Res_value` with size 8
fn res_value(data_type: u8, data: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..2].copy_from_slice(&8u16.to_le_bytes());
    out[3] = data_type;
    out[4..8].copy_from_slice(&data.to_le_bytes());
    out
}

fn pad4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

pub struct StringPoolBuilder {
    strings: Vec<String>,
    utf8: bool,
}

impl StringPoolBuilder {
    pub fn utf16(strings: &[&str]) -> Self {
        StringPoolBuilder {
            strings: strings.iter().map(|s| s.to_string()).collect(),
            utf8: false,
        }
    }

    pub fn utf8(strings: &[&str]) -> Self {
        StringPoolBuilder {
            utf8: true,
            ..Self::utf16(strings)
        }
    }

    fn utf8_length(out: &mut Vec<u8>, length: usize) {
        if length > 0x7f {
            out.push(((length >> 8) as u8) | 0x80);
        }
        out.push((length & 0xff) as u8);
    }

    fn encode(&self, string: &str, out: &mut Vec<u8>) {
        if self.utf8 {
            Self::utf8_length(out, string.encode_utf16().count());
            Self::utf8_length(out, string.len());
            out.extend_from_slice(string.as_bytes());
            out.push(0);
        } else {
            let units: Vec<u16> = string.encode_utf16().collect();
            if units.len() > 0x7fff {
                out.extend_from_slice(&(((units.len() >> 16) as u16) | 0x8000).to_le_bytes());
            }
            out.extend_from_slice(&((units.len() & 0xffff) as u16).to_le_bytes());
            for unit in units {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out.extend_from_slice(&0u16.to_le_bytes());
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut offsets = Vec::with_capacity(self.strings.len() * 4);
        let mut data = Vec::new();

        for string in &self.strings {
            offsets.extend_from_slice(&(data.len() as u32).to_le_bytes());
            self.encode(string, &mut data);
        }
        pad4(&mut data);

        let strings_start = 28 + offsets.len() as u32;
        let flags: u32 = if self.utf8 { 0x100 } else { 0 };

        let mut ext = Vec::with_capacity(20);
        ext.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        ext.extend_from_slice(&0u32.to_le_bytes());
        ext.extend_from_slice(&flags.to_le_bytes());
        ext.extend_from_slice(&strings_start.to_le_bytes());
        ext.extend_from_slice(&0u32.to_le_bytes());

        offsets.extend(data);
        chunk(0x0001, &ext, &offsets)
    }
}

enum AttrData {
    String(String),
    Data(u8, u32),
}

struct PendingAttr {
    namespace: Option<String>,
    name: String,
    resource_id: u32,
    data: AttrData,
}

enum NodeOp {
    Start {
        name: String,
        attributes: Vec<PendingAttr>,
    },
    End(String),
    Text(String),
}

enum Op {
    Node {
        comment: Option<String>,
        node: NodeOp,
    },
    Raw(Vec<u8>),
}

/// Two-part string table: resource mapped attribute names first, then everything else
#[derive(Default)]
struct Strings {
    mapped: Vec<(String, u32)>,
    plain: Vec<String>,
}

impl Strings {
    fn mapped(&mut self, name: &str, id: u32) {
        if !self.mapped.iter().any(|(n, i)| n == name && *i == id) {
            self.mapped.push((name.to_owned(), id));
        }
    }

    fn mapped_index(&self, name: &str, id: u32) -> u32 {
        self.mapped
            .iter()
            .position(|(n, i)| n == name && *i == id)
            .unwrap_or_default() as u32
    }

    fn plain(&mut self, value: &str) -> u32 {
        let idx = match self.plain.iter().position(|s| s == value) {
            Some(idx) => idx,
            None => {
                self.plain.push(value.to_owned());
                self.plain.len() - 1
            }
        };
        (self.mapped.len() + idx) as u32
    }

    fn optional(&mut self, value: Option<&str>) -> u32 {
        value.map(|v| self.plain(v)).unwrap_or(NO_STRING)
    }
}

/// Compiles a small document into binary XML the way aapt lays it out
///
/// Namespaces are declared around the whole document, a comment attaches to the
/// next node, attributes attach to the last started element.
#[derive(Default)]
pub struct XmlBuilder {
    namespaces: Vec<(String, String)>,
    ops: Vec<Op>,
    stack: Vec<String>,
    comment: Option<String>,
    utf8: bool,
    without_string_pool: bool,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.push((prefix.to_owned(), uri.to_owned()));
        self
    }

    pub fn utf8_strings(mut self) -> Self {
        self.utf8 = true;
        self
    }

    /// Leave out the string pool chunk
    pub fn without_string_pool(mut self) -> Self {
        self.without_string_pool = true;
        self
    }

    fn node(mut self, node: NodeOp) -> Self {
        let comment = self.comment.take();
        self.ops.push(Op::Node { comment, node });
        self
    }

    pub fn start(mut self, name: &str) -> Self {
        self.stack.push(name.to_owned());
        self.node(NodeOp::Start {
            name: name.to_owned(),
            attributes: Vec::new(),
        })
    }

    pub fn end(mut self) -> Self {
        let name = self.stack.pop().expect("end() without start()");
        self.node(NodeOp::End(name))
    }

    /// End element with an arbitrary name, the open element stack is left as is
    pub fn end_named(self, name: &str) -> Self {
        self.node(NodeOp::End(name.to_owned()))
    }

    pub fn text(self, text: &str) -> Self {
        self.node(NodeOp::Text(text.to_owned()))
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.comment = Some(text.to_owned());
        self
    }

    fn attr(mut self, namespace: Option<&str>, name: &str, resource_id: u32, data: AttrData) -> Self {
        let attributes = self.ops.iter_mut().rev().find_map(|op| match op {
            Op::Node {
                node: NodeOp::Start { attributes, .. },
                ..
            } => Some(attributes),
            _ => None,
        });

        attributes
            .expect("attribute without start()")
            .push(PendingAttr {
                namespace: namespace.map(str::to_owned),
                name: name.to_owned(),
                resource_id,
                data,
            });
        self
    }

    pub fn attr_string(self, namespace: Option<&str>, name: &str, value: &str) -> Self {
        self.attr(namespace, name, 0, AttrData::String(value.to_owned()))
    }

    /// Decimal integer, `resource_id` 0 means no resource map entry
    pub fn attr_int(self, namespace: Option<&str>, name: &str, resource_id: u32, value: u32) -> Self {
        self.attr(namespace, name, resource_id, AttrData::Data(0x10, value))
    }

    pub fn attr_hex(self, namespace: Option<&str>, name: &str, resource_id: u32, value: u32) -> Self {
        self.attr(namespace, name, resource_id, AttrData::Data(0x11, value))
    }

    pub fn attr_bool(self, namespace: Option<&str>, name: &str, resource_id: u32, value: bool) -> Self {
        let data = if value { u32::MAX } else { 0 };
        self.attr(namespace, name, resource_id, AttrData::Data(0x12, data))
    }

    pub fn attr_reference(self, namespace: Option<&str>, name: &str, resource_id: u32, target: u32) -> Self {
        self.attr(namespace, name, resource_id, AttrData::Data(0x01, target))
    }

    /// Typed value as is, no raw string and no resource map entry
    pub fn attr_raw(self, namespace: Option<&str>, name: &str, data_type: u8, data: u32) -> Self {
        self.attr(namespace, name, 0, AttrData::Data(data_type, data))
    }

    /// Arbitrary chunk with an 8 byte header
    pub fn raw_chunk(mut self, type_: u16, body: &[u8]) -> Self {
        self.ops.push(Op::Raw(chunk(type_, &[], body)));
        self
    }

    /// Chunk with a custom header size, `data` is everything after the common 8 bytes
    pub fn raw_node_with_header_size(mut self, type_: u16, header_size: u16, data: &[u8]) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(&type_.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes());
        out.extend_from_slice(&(8 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        self.ops.push(Op::Raw(out));
        self
    }

    fn node_chunk(type_: u16, line: u32, comment: u32, body: &[u8]) -> Vec<u8> {
        let mut ext = Vec::with_capacity(8);
        ext.extend_from_slice(&line.to_le_bytes());
        ext.extend_from_slice(&comment.to_le_bytes());
        chunk(type_, &ext, body)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut strings = Strings::default();

        // resource map covers the first string indices, collect mapped names first
        for op in &self.ops {
            if let Op::Node {
                node: NodeOp::Start { attributes, .. },
                ..
            } = op
            {
                for attr in attributes.iter().filter(|a| a.resource_id != 0) {
                    strings.mapped(&attr.name, attr.resource_id);
                }
            }
        }

        let mut nodes = Vec::new();
        let mut line = 1;

        for (prefix, uri) in &self.namespaces {
            let mut body = Vec::new();
            body.extend_from_slice(&strings.plain(prefix).to_le_bytes());
            body.extend_from_slice(&strings.plain(uri).to_le_bytes());
            nodes.extend(Self::node_chunk(0x0100, line, NO_STRING, &body));
        }

        for op in &self.ops {
            let (comment, node) = match op {
                Op::Raw(bytes) => {
                    nodes.extend_from_slice(bytes);
                    continue;
                }
                Op::Node { comment, node } => (comment, node),
            };

            line += 1;
            let comment = strings.optional(comment.as_deref());

            match node {
                NodeOp::Start { name, attributes } => {
                    let mut body = Vec::new();
                    body.extend_from_slice(&NO_STRING.to_le_bytes());
                    body.extend_from_slice(&strings.plain(name).to_le_bytes());
                    for field in [0x14u16, 0x14, attributes.len() as u16, 0, 0, 0] {
                        body.extend_from_slice(&field.to_le_bytes());
                    }

                    for attr in attributes {
                        let namespace = strings.optional(attr.namespace.as_deref());
                        let name = if attr.resource_id != 0 {
                            strings.mapped_index(&attr.name, attr.resource_id)
                        } else {
                            strings.plain(&attr.name)
                        };
                        let (raw, value) = match &attr.data {
                            AttrData::String(value) => {
                                let idx = strings.plain(value);
                                (idx, res_value(ValueType::String.into(), idx))
                            }
                            AttrData::Data(data_type, data) => (NO_STRING, res_value(*data_type, *data)),
                        };

                        body.extend_from_slice(&namespace.to_le_bytes());
                        body.extend_from_slice(&name.to_le_bytes());
                        body.extend_from_slice(&raw.to_le_bytes());
                        body.extend_from_slice(&value);
                    }

                    nodes.extend(Self::node_chunk(0x0102, line, comment, &body));
                }
                NodeOp::End(name) => {
                    let mut body = Vec::new();
                    body.extend_from_slice(&NO_STRING.to_le_bytes());
                    body.extend_from_slice(&strings.plain(name).to_le_bytes());
                    nodes.extend(Self::node_chunk(0x0103, line, comment, &body));
                }
                NodeOp::Text(text) => {
                    let idx = strings.plain(text);
                    let mut body = Vec::new();
                    body.extend_from_slice(&idx.to_le_bytes());
                    body.extend_from_slice(&res_value(0x00, 0));
                    nodes.extend(Self::node_chunk(0x0104, line, comment, &body));
                }
            }
        }

        for (prefix, uri) in self.namespaces.iter().rev() {
            line += 1;
            let mut body = Vec::new();
            body.extend_from_slice(&strings.plain(prefix).to_le_bytes());
            body.extend_from_slice(&strings.plain(uri).to_le_bytes());
            nodes.extend(Self::node_chunk(0x0101, line, NO_STRING, &body));
        }

        let mut all_strings: Vec<&str> = strings.mapped.iter().map(|(n, _)| n.as_str()).collect();
        all_strings.extend(strings.plain.iter().map(String::as_str));

        let mut body = Vec::new();
        if !self.without_string_pool {
            let pool = if self.utf8 {
                StringPoolBuilder::utf8(&all_strings)
            } else {
                StringPoolBuilder::utf16(&all_strings)
            };
            body.extend(pool.build());
        }

        if !strings.mapped.is_empty() {
            let ids: Vec<u8> = strings
                .mapped
                .iter()
                .flat_map(|(_, id)| id.to_le_bytes())
                .collect();
            body.extend(chunk(0x0180, &[], &ids));
        }

        body.extend(nodes);
        chunk(0x0003, &[], &body)
    }
}

enum EntryData {
    Value(u8, u32),
    Compact(u8, u32),
    Complex { parent: u32, values: Vec<(u32, u32)> },
}

/// One `ResTable_type` chunk: a type id in one configuration
pub struct TypeBuilder {
    id: u8,
    sparse: bool,
    offset16: bool,
    locale: [u8; 2],
    entries: Vec<(u16, u32, EntryData)>,
}

impl TypeBuilder {
    pub fn new(id: u8) -> Self {
        TypeBuilder {
            id,
            sparse: false,
            offset16: false,
            locale: [0; 2],
            entries: Vec::new(),
        }
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    pub fn offset16(mut self) -> Self {
        self.offset16 = true;
        self
    }

    /// Two letter language qualifier
    pub fn with_locale(mut self, language: &[u8; 2]) -> Self {
        self.locale = *language;
        self
    }

    pub fn value(mut self, entry: u16, key: u32, data_type: ValueType, data: u32) -> Self {
        self.entries.push((entry, key, EntryData::Value(data_type.into(), data)));
        self
    }

    /// String from the global string pool
    pub fn string(self, entry: u16, key: u32, string: u32) -> Self {
        self.value(entry, key, ValueType::String, string)
    }

    pub fn reference(self, entry: u16, key: u32, target: u32) -> Self {
        self.value(entry, key, ValueType::Reference, target)
    }

    pub fn compact(mut self, entry: u16, key: u32, data_type: ValueType, data: u32) -> Self {
        self.entries.push((entry, key, EntryData::Compact(data_type.into(), data)));
        self
    }

    /// Bag entry with decimal values
    pub fn complex(mut self, entry: u16, key: u32, parent: u32, values: &[(u32, u32)]) -> Self {
        self.entries.push((
            entry,
            key,
            EntryData::Complex {
                parent,
                values: values.to_vec(),
            },
        ));
        self
    }

    fn encode_entry(key: u32, data: &EntryData) -> Vec<u8> {
        let mut out = Vec::new();
        match data {
            EntryData::Value(data_type, data) => {
                out.extend_from_slice(&8u16.to_le_bytes());
                out.extend_from_slice(&0u16.to_le_bytes());
                out.extend_from_slice(&key.to_le_bytes());
                out.extend_from_slice(&res_value(*data_type, *data));
            }
            EntryData::Compact(data_type, data) => {
                let flags = 0x0008u16 | ((*data_type as u16) << 8);
                out.extend_from_slice(&(key as u16).to_le_bytes());
                out.extend_from_slice(&flags.to_le_bytes());
                out.extend_from_slice(&data.to_le_bytes());
            }
            EntryData::Complex { parent, values } => {
                out.extend_from_slice(&16u16.to_le_bytes());
                out.extend_from_slice(&0x0001u16.to_le_bytes());
                out.extend_from_slice(&key.to_le_bytes());
                out.extend_from_slice(&parent.to_le_bytes());
                out.extend_from_slice(&(values.len() as u32).to_le_bytes());
                for (name, data) in values {
                    out.extend_from_slice(&name.to_le_bytes());
                    out.extend_from_slice(&res_value(0x10, *data));
                }
            }
        }
        out
    }

    /// Number of entry slots, `max id + 1`
    fn slots(&self) -> u32 {
        self.entries
            .iter()
            .map(|(entry, _, _)| *entry as u32 + 1)
            .max()
            .unwrap_or_default()
    }

    fn build(&self) -> Vec<u8> {
        let mut entries = self.entries.iter().collect::<Vec<_>>();
        entries.sort_by_key(|(entry, _, _)| *entry);

        let mut data = Vec::new();
        let mut placed: Vec<(u16, u32)> = Vec::new();
        for (entry, key, value) in &entries {
            placed.push((*entry, data.len() as u32));
            data.extend(Self::encode_entry(*key, value));
        }

        let mut offsets = Vec::new();
        let entry_count = if self.sparse {
            for (entry, offset) in &placed {
                offsets.extend_from_slice(&entry.to_le_bytes());
                offsets.extend_from_slice(&((offset / 4) as u16).to_le_bytes());
            }
            placed.len() as u32
        } else {
            let slots = self.slots();
            for slot in 0..slots {
                let offset = placed
                    .iter()
                    .find(|(entry, _)| *entry as u32 == slot)
                    .map(|(_, offset)| *offset);

                if self.offset16 {
                    let offset = offset.map(|o| (o / 4) as u16).unwrap_or(u16::MAX);
                    offsets.extend_from_slice(&offset.to_le_bytes());
                } else {
                    offsets.extend_from_slice(&offset.unwrap_or(u32::MAX).to_le_bytes());
                }
            }
            slots
        };
        pad4(&mut offsets);

        let mut config = vec![0u8; 64];
        config[0..4].copy_from_slice(&64u32.to_le_bytes());
        config[8..10].copy_from_slice(&self.locale);

        let flags = (self.sparse as u8) | ((self.offset16 as u8) << 1);
        let header_size = 8 + 12 + config.len();
        let entries_start = (header_size + offsets.len()) as u32;

        let mut ext = Vec::new();
        ext.push(self.id);
        ext.push(flags);
        ext.extend_from_slice(&0u16.to_le_bytes());
        ext.extend_from_slice(&entry_count.to_le_bytes());
        ext.extend_from_slice(&entries_start.to_le_bytes());
        ext.extend(config);

        offsets.extend(data);
        chunk(0x0201, &ext, &offsets)
    }
}

/// Resource table with a single package
pub struct TableBuilder {
    package_id: u32,
    package_name: String,
    package_header_size: u16,
    strings: Vec<String>,
    types: Vec<String>,
    keys: Vec<String>,
    chunks: Vec<TypeBuilder>,
}

impl TableBuilder {
    pub fn new(package_id: u32, package_name: &str) -> Self {
        TableBuilder {
            package_id,
            package_name: package_name.to_owned(),
            package_header_size: 288,
            strings: Vec::new(),
            types: Vec::new(),
            keys: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Global value strings
    pub fn strings(mut self, strings: &[&str]) -> Self {
        self.strings = strings.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Type names, type id 1 is the first one
    pub fn types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn keys(mut self, keys: &[&str]) -> Self {
        self.keys = keys.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn add_type(mut self, type_: TypeBuilder) -> Self {
        self.chunks.push(type_);
        self
    }

    /// 288 for the current layout, 284 for the old one without `typeIdOffset`
    pub fn package_header_size(mut self, size: u16) -> Self {
        self.package_header_size = size;
        self
    }

    fn pool(strings: &[String]) -> Vec<u8> {
        let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
        StringPoolBuilder::utf16(&strings).build()
    }

    fn package(&self) -> Vec<u8> {
        let header_size = self.package_header_size as usize;
        let type_strings = Self::pool(&self.types);
        let key_strings = Self::pool(&self.keys);

        let mut name = [0u8; 256];
        for (idx, unit) in self.package_name.encode_utf16().take(127).enumerate() {
            name[idx * 2..idx * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }

        let mut ext = Vec::with_capacity(280);
        ext.extend_from_slice(&self.package_id.to_le_bytes());
        ext.extend_from_slice(&name);
        ext.extend_from_slice(&(header_size as u32).to_le_bytes());
        ext.extend_from_slice(&(self.types.len() as u32).to_le_bytes());
        ext.extend_from_slice(&((header_size + type_strings.len()) as u32).to_le_bytes());
        ext.extend_from_slice(&(self.keys.len() as u32).to_le_bytes());
        ext.extend_from_slice(&0u32.to_le_bytes());
        ext.resize(header_size.saturating_sub(8), 0);

        let mut body = Vec::new();
        body.extend(type_strings);
        body.extend(key_strings);

        let mut seen = Vec::new();
        for type_ in &self.chunks {
            if !seen.contains(&type_.id) {
                seen.push(type_.id);

                let slots = self
                    .chunks
                    .iter()
                    .filter(|t| t.id == type_.id)
                    .map(TypeBuilder::slots)
                    .max()
                    .unwrap_or_default();
                let configs = self.chunks.iter().filter(|t| t.id == type_.id).count();

                let mut spec_ext = vec![type_.id, 0];
                spec_ext.extend_from_slice(&(configs as u16).to_le_bytes());
                spec_ext.extend_from_slice(&slots.to_le_bytes());
                body.extend(chunk(0x0202, &spec_ext, &vec![0u8; slots as usize * 4]));
            }

            body.extend(type_.build());
        }

        chunk(0x0200, &ext, &body)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = Self::pool(&self.strings);
        body.extend(self.package());

        chunk(0x0002, &1u32.to_le_bytes(), &body)
    }
}
