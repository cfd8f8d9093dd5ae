use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use smallvec::SmallVec;

use crate::arsc::ARSC;
use crate::errors::{ResourceTableError, XmlDecodeError};
use crate::node::{
    Resolution, UnresolvedReason, XmlAttribute, XmlElement, XmlNamespaceDecl, XmlNode,
    XmlNodeKind,
};
use crate::structs::attrs_manifest::get_attr_value;
use crate::structs::system_types::get_attr_name;
use crate::structs::{
    Chunk, ChunkIter, ResChunkHeader, ResourceType, ResourceValue, StringPool, ValueError,
    ValueType, XmlAttributeElement, XmlCData, XmlEndElement, XmlNamespace, XmlNodeHeader,
    XmlParse, XmlResourceMap, XmlStartElement,
};

pub const ANDROID_NAMESPACE: &str = "http://schemas.android.com/apk/res/android";

/// Index value used for "no string"
const NO_STRING: u32 = u32::MAX;

/// Knobs for turning node chunks into [`XmlNode`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct DecodeOptions<'a> {
    /// Table used to resolve `@XXXXXXXX` references
    pub resources: Option<&'a ARSC>,

    /// Render enum and flag manifest attributes by name (`singleTop`, `keyboard|orientation`)
    pub symbolic_values: bool,

    /// Checked before every node chunk
    pub abort: Option<&'a AtomicBool>,
}

/// Binary XML document with the prelude decoded and node chunks pending
pub struct AXML<'a> {
    /// Document contained chunks that don't follow the format, but were skipped
    pub is_tampered: bool,

    string_pool: StringPool,
    resource_map: XmlResourceMap,
    nodes: ChunkIter<'a>,
}

impl<'a> AXML<'a> {
    pub fn new(input: &'a [u8]) -> Result<AXML<'a>, XmlDecodeError> {
        // basic sanity check
        if input.len() < ResChunkHeader::size_of() {
            return Err(XmlDecodeError::TooSmall);
        }

        let header =
            ResChunkHeader::parse(&mut &input[..]).map_err(|_| XmlDecodeError::TooSmall)?;

        if header.type_ != ResourceType::Xml {
            return Err(XmlDecodeError::BadMagic(header.raw_type));
        }

        // header size must be 8 bytes, otherwise is non valid axml
        if header.header_size as usize != ResChunkHeader::size_of() {
            return Err(XmlDecodeError::HeaderSize(header.header_size));
        }

        let document = Chunk::read(input, 0).map_err(|e| XmlDecodeError::TruncatedChunk {
            chunk: "xml",
            offset: e.offset,
        })?;

        if document.data.len() < input.len() {
            debug!(
                "ignoring {} bytes after xml chunk",
                input.len() - document.data.len()
            );
        }

        let mut nodes = document.children();

        let pool_chunk = match nodes.next() {
            Some(Ok(chunk)) if chunk.type_() == ResourceType::StringPool => chunk,
            Some(Err(e)) => {
                return Err(XmlDecodeError::TruncatedChunk {
                    chunk: "string pool",
                    offset: e.offset,
                });
            }
            _ => return Err(XmlDecodeError::MissingStringPool),
        };

        let string_pool =
            StringPool::parse(&pool_chunk).map_err(|_| XmlDecodeError::TruncatedChunk {
                chunk: "string pool",
                offset: pool_chunk.offset,
            })?;
        let mut is_tampered = string_pool.is_tampered;

        // resource map is optional, peek without consuming a node chunk
        let mut resource_map = XmlResourceMap::default();
        let mut lookahead = nodes.clone();
        if let Some(Ok(chunk)) = lookahead.next()
            && chunk.type_() == ResourceType::XmlResourceMap
        {
            resource_map =
                XmlResourceMap::parse(&chunk).map_err(|_| XmlDecodeError::TruncatedChunk {
                    chunk: "resource map",
                    offset: chunk.offset,
                })?;
            nodes = lookahead;
        } else {
            debug!("binary xml doesn't have a resource map");
        }

        if string_pool.len() == 0 {
            warn!("binary xml has an empty string pool");
            is_tampered = true;
        }

        info!(
            "parsed binary xml prelude: {} strings, {} resource ids",
            string_pool.len(),
            resource_map.resource_ids.len()
        );

        Ok(AXML {
            is_tampered,
            string_pool,
            resource_map,
            nodes,
        })
    }

    /// Decode the prelude and return the node iterator, references go through `resources`
    pub fn decode(
        input: &'a [u8],
        resources: Option<&'a ARSC>,
    ) -> Result<XmlNodes<'a>, XmlDecodeError> {
        let axml = AXML::new(input)?;

        Ok(axml.into_nodes(DecodeOptions {
            resources,
            ..Default::default()
        }))
    }

    pub fn into_nodes(self, options: DecodeOptions<'a>) -> XmlNodes<'a> {
        XmlNodes {
            is_tampered: self.is_tampered,
            string_pool: self.string_pool,
            resource_map: self.resource_map,
            chunks: self.nodes,
            options,
            open: SmallVec::new(),
            namespaces: Vec::new(),
            pending: None,
            finished: false,
        }
    }

    /// Every string of the document pool, in index order
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.string_pool.iter()
    }

    /// Framework attribute ids from the resource map
    pub fn resource_ids(&self) -> &[u32] {
        &self.resource_map.resource_ids
    }
}

/// Lazy, forward-only sequence of document nodes
///
/// Every call decodes at most one node chunk. After the first error, or the
/// end of the document, the iterator only returns `None`.
pub struct XmlNodes<'a> {
    is_tampered: bool,
    string_pool: StringPool,
    resource_map: XmlResourceMap,
    chunks: ChunkIter<'a>,
    options: DecodeOptions<'a>,

    /// (namespace, name) of the open elements, innermost last
    open: SmallVec<[(Option<String>, String); 16]>,

    /// (prefix, uri) of the namespace declarations in scope, innermost last
    namespaces: Vec<(Option<String>, String)>,

    /// Node that follows an already returned comment
    pending: Option<XmlNode>,

    finished: bool,
}

impl<'a> Iterator for XmlNodes<'a> {
    type Item = Result<XmlNode, XmlDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let Some(node) = self.pending.take() {
            return Some(Ok(node));
        }

        match self.next_node() {
            Ok(Some(node)) => Some(Ok(node)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a> XmlNodes<'a> {
    /// Skipped chunks or a clamped string pool were seen so far
    #[inline]
    pub fn is_tampered(&self) -> bool {
        self.is_tampered
    }

    /// Number of elements opened and not yet closed
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn next_node(&mut self) -> Result<Option<XmlNode>, XmlDecodeError> {
        loop {
            if self
                .options
                .abort
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                return Err(XmlDecodeError::Aborted);
            }

            let Some(chunk) = self.chunks.next() else {
                if let Some((_, name)) = self.open.last() {
                    return Err(XmlDecodeError::MalformedNesting(format!(
                        "element <{}> is not closed at the end of the document",
                        name
                    )));
                }

                return Ok(None);
            };

            let chunk = chunk.map_err(|e| XmlDecodeError::TruncatedChunk {
                chunk: "xml node",
                offset: e.offset,
            })?;

            if !ResourceType::is_xml_node(chunk.header.raw_type) {
                debug!(
                    "skip non node chunk 0x{:04x} at offset 0x{:x}",
                    chunk.header.raw_type, chunk.offset
                );
                continue;
            }

            // another junk malware techniques
            if chunk.header.header_size != XmlNodeHeader::SIZE {
                warn!(
                    "xml node chunk at offset 0x{:x} has header size {}, skipped",
                    chunk.offset, chunk.header.header_size
                );
                self.is_tampered = true;
                continue;
            }

            let header = XmlNodeHeader::parse(&chunk).map_err(|_| Self::truncated(&chunk))?;

            let kind = match chunk.type_() {
                ResourceType::XmlStartNamespace => self.start_namespace(&chunk)?,
                ResourceType::XmlEndNamespace => self.end_namespace(&chunk)?,
                ResourceType::XmlStartElement => self.start_element(&chunk)?,
                ResourceType::XmlEndElement => self.end_element(&chunk)?,
                ResourceType::XmlCdata => self.cdata(&chunk)?,
                _ => {
                    debug!(
                        "skip unknown node chunk 0x{:04x} at offset 0x{:x}",
                        chunk.header.raw_type, chunk.offset
                    );
                    continue;
                }
            };

            let node = XmlNode {
                line_number: header.line_number,
                kind,
            };

            if let Some(comment) = header.comment {
                match self.string_pool.get(comment) {
                    Some(text) => {
                        self.pending = Some(node);

                        return Ok(Some(XmlNode {
                            line_number: header.line_number,
                            kind: XmlNodeKind::Comment(text.to_owned()),
                        }));
                    }
                    None => {
                        warn!("comment string {} is out of range, dropped", comment);
                        self.is_tampered = true;
                    }
                }
            }

            return Ok(Some(node));
        }
    }

    #[inline]
    fn truncated(chunk: &Chunk<'_>) -> XmlDecodeError {
        let name = match chunk.type_() {
            ResourceType::XmlStartNamespace | ResourceType::XmlEndNamespace => "namespace",
            ResourceType::XmlStartElement => "start element",
            ResourceType::XmlEndElement => "end element",
            ResourceType::XmlCdata => "cdata",
            _ => "xml node",
        };

        XmlDecodeError::TruncatedChunk {
            chunk: name,
            offset: chunk.offset,
        }
    }

    fn string(&self, idx: u32) -> Result<String, XmlDecodeError> {
        self.string_pool
            .get(idx)
            .map(str::to_owned)
            .ok_or(XmlDecodeError::InvalidStringIndex {
                index: idx,
                count: self.string_pool.len(),
            })
    }

    /// `0xFFFFFFFF` and empty strings mean "not set"
    fn optional_string(&self, idx: u32) -> Result<Option<String>, XmlDecodeError> {
        if idx == NO_STRING {
            return Ok(None);
        }

        self.string(idx).map(|s| (!s.is_empty()).then_some(s))
    }

    fn start_namespace(&mut self, chunk: &Chunk<'_>) -> Result<XmlNodeKind, XmlDecodeError> {
        let ns = XmlNamespace::parse(chunk).map_err(|_| Self::truncated(chunk))?;

        let prefix = self.optional_string(ns.prefix)?;
        let uri = self.string(ns.uri)?;

        self.namespaces.push((prefix.clone(), uri.clone()));

        Ok(XmlNodeKind::StartNamespace(XmlNamespaceDecl { prefix, uri }))
    }

    fn end_namespace(&mut self, chunk: &Chunk<'_>) -> Result<XmlNodeKind, XmlDecodeError> {
        let ns = XmlNamespace::parse(chunk).map_err(|_| Self::truncated(chunk))?;

        let prefix = self.optional_string(ns.prefix)?;
        let uri = self.string(ns.uri)?;

        match self.namespaces.iter().rposition(|(_, u)| *u == uri) {
            Some(idx) => {
                self.namespaces.remove(idx);
            }
            None => warn!("end of namespace {} that was never declared", uri),
        }

        Ok(XmlNodeKind::EndNamespace(XmlNamespaceDecl { prefix, uri }))
    }

    fn start_element(&mut self, chunk: &Chunk<'_>) -> Result<XmlNodeKind, XmlDecodeError> {
        let element = XmlStartElement::parse(chunk).map_err(|_| Self::truncated(chunk))?;

        let name = self.string(element.name)?;
        let namespace = self.optional_string(element.namespace_uri)?;

        let mut attributes = Vec::with_capacity(element.attributes.len());
        for attribute in &element.attributes {
            if let Some(attribute) = self.attribute(attribute)? {
                attributes.push(attribute);
            }
        }

        self.open.push((namespace.clone(), name.clone()));

        Ok(XmlNodeKind::StartElement(XmlElement {
            name,
            namespace,
            attributes,
        }))
    }

    fn end_element(&mut self, chunk: &Chunk<'_>) -> Result<XmlNodeKind, XmlDecodeError> {
        let element = XmlEndElement::parse(chunk).map_err(|_| Self::truncated(chunk))?;

        let name = self.string(element.name)?;
        let namespace = self.optional_string(element.namespace_uri)?;

        match self.open.pop() {
            None => {
                return Err(XmlDecodeError::MalformedNesting(format!(
                    "end element </{}> without a start element",
                    name
                )));
            }
            Some((open_namespace, open_name)) if open_namespace != namespace || open_name != name => {
                return Err(XmlDecodeError::MalformedNesting(format!(
                    "expected </{}>, got </{}>",
                    open_name, name
                )));
            }
            Some(_) => {}
        }

        Ok(XmlNodeKind::EndElement { namespace, name })
    }

    fn cdata(&mut self, chunk: &Chunk<'_>) -> Result<XmlNodeKind, XmlDecodeError> {
        let cdata = XmlCData::parse(chunk).map_err(|_| Self::truncated(chunk))?;

        let text = if cdata.data == NO_STRING {
            self.render(&cdata.typed_data)?
        } else {
            self.string(cdata.data)?
        };

        Ok(XmlNodeKind::Text(text))
    }

    fn attribute_name(&mut self, attribute: &XmlAttributeElement) -> Result<Option<String>, XmlDecodeError> {
        let from_pool = self.string_pool.get(attribute.name);

        if let Some(name) = from_pool
            && !name.is_empty()
        {
            // skip garbage strings
            if name.contains(char::is_whitespace) {
                warn!("skipped garbage attribute name: {:?}", name);
                self.is_tampered = true;
                return Ok(None);
            }

            return Ok(Some(name.to_owned()));
        }

        // obfuscators strip names, the resource map still knows the attribute
        if let Some(name) = self.resource_map.get(attribute.name).and_then(get_attr_name) {
            return Ok(Some(name.to_owned()));
        }

        if from_pool.is_none() {
            return Err(XmlDecodeError::InvalidStringIndex {
                index: attribute.name,
                count: self.string_pool.len(),
            });
        }

        if self.string_pool.is_invalid(attribute.name) {
            warn!("skipped attribute, name string #{} is broken", attribute.name);
        } else {
            warn!("skipped attribute with an empty name");
        }
        self.is_tampered = true;
        Ok(None)
    }

    fn attribute(
        &mut self,
        attribute: &XmlAttributeElement,
    ) -> Result<Option<XmlAttribute>, XmlDecodeError> {
        let Some(name) = self.attribute_name(attribute)? else {
            return Ok(None);
        };

        let namespace = self.optional_string(attribute.namespace_uri)?;
        let prefix = namespace.as_ref().and_then(|uri| {
            self.namespaces
                .iter()
                .rev()
                .find(|(_, u)| u == uri)
                .and_then(|(p, _)| p.clone())
        });

        let resource_id = self
            .resource_map
            .get(attribute.name)
            .filter(|&id| id != 0);

        let raw_value = self.optional_string(attribute.raw_value)?;
        let typed_value = attribute.typed_value;

        let (value, resolution) = match typed_value.data_type {
            ValueType::Reference | ValueType::DynamicReference if typed_value.data != 0 => {
                self.resolve_reference(typed_value.data)
            }
            ValueType::Dec | ValueType::Hex if self.options.symbolic_values => {
                let value = match get_attr_value(&name, typed_value.data) {
                    Some(symbolic) => symbolic,
                    None => self.render(&typed_value)?,
                };
                (value, Resolution::Literal)
            }
            _ => (self.render(&typed_value)?, Resolution::Literal),
        };

        Ok(Some(XmlAttribute {
            name,
            namespace,
            prefix,
            resource_id,
            raw_value,
            typed_value,
            value,
            resolution,
        }))
    }

    fn render(&self, value: &ResourceValue) -> Result<String, XmlDecodeError> {
        value.to_string(&self.string_pool).map_err(|e| match e {
            ValueError::InvalidStringIndex { index, count } => {
                XmlDecodeError::InvalidStringIndex { index, count }
            }
            ValueError::InvalidTypedValue(t) => XmlDecodeError::InvalidTypedValue(t),
        })
    }

    fn resolve_reference(&self, id: u32) -> (String, Resolution) {
        let placeholder = || ResourceValue::fmt_reference('@', id);

        let Some(resources) = self.options.resources else {
            return (
                placeholder(),
                Resolution::Unresolved {
                    id,
                    reason: UnresolvedReason::NoTable,
                },
            );
        };

        let reason = match resources.resolve_to_string(id) {
            Ok(Some(value)) => return (value, Resolution::Resolved { id }),
            Ok(None) => UnresolvedReason::Missing,
            Err(ResourceTableError::CyclicReference(at)) => {
                warn!("reference 0x{:08x} loops at 0x{:08x}", id, at);
                UnresolvedReason::Cycle
            }
            Err(e) => {
                warn!("can't render resource 0x{:08x}: {}", id, e);
                UnresolvedReason::Invalid
            }
        };

        (placeholder(), Resolution::Unresolved { id, reason })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::structs::ResStringPoolHeader;
    use crate::testing::{TableBuilder, TypeBuilder, XmlBuilder};

    fn collect(bytes: &[u8], resources: Option<&ARSC>) -> Result<Vec<XmlNode>, XmlDecodeError> {
        AXML::decode(bytes, resources)?.collect()
    }

    fn elements(nodes: &[XmlNode]) -> Vec<&XmlElement> {
        nodes
            .iter()
            .filter_map(|node| match &node.kind {
                XmlNodeKind::StartElement(element) => Some(element),
                _ => None,
            })
            .collect()
    }

    fn manifest() -> XmlBuilder {
        XmlBuilder::new()
            .namespace("android", ANDROID_NAMESPACE)
            .start("manifest")
            .attr_string(None, "package", "com.x")
            .attr_int(Some(ANDROID_NAMESPACE), "versionCode", 0x0101021b, 3)
            .attr_string(Some(ANDROID_NAMESPACE), "versionName", "1.0")
            .start("uses-sdk")
            .attr_int(Some(ANDROID_NAMESPACE), "minSdkVersion", 0x0101020c, 21)
            .end()
            .start("application")
            .attr_reference(Some(ANDROID_NAMESPACE), "label", 0x01010001, 0x7f010000)
            .end()
            .end()
    }

    #[test]
    fn decode_manifest_nodes() {
        let nodes = collect(&manifest().build(), None).unwrap();

        assert!(matches!(
            &nodes[0].kind,
            XmlNodeKind::StartNamespace(XmlNamespaceDecl { prefix: Some(p), .. }) if p == "android"
        ));
        assert!(matches!(nodes.last().map(|n| &n.kind), Some(XmlNodeKind::EndNamespace(_))));

        let elements = elements(&nodes);
        assert_eq!(elements.len(), 3);

        let manifest = elements[0];
        assert_eq!(manifest.name, "manifest");
        assert_eq!(manifest.attr("package").unwrap().value, "com.x");
        assert_eq!(manifest.attr("package").unwrap().prefix, None);

        let version_code = manifest.attr("versionCode").unwrap();
        assert_eq!(version_code.value, "3");
        assert_eq!(version_code.prefix.as_deref(), Some("android"));
        assert_eq!(version_code.resource_id, Some(0x0101021b));
        assert_eq!(version_code.qualified_name(), "android:versionCode");

        assert_eq!(elements[1].attr("minSdkVersion").unwrap().value, "21");
    }

    #[test]
    fn references_without_table() {
        let nodes = collect(&manifest().build(), None).unwrap();
        let label = elements(&nodes)[2].attr("label").unwrap().clone();

        assert_eq!(label.value, "@7f010000");
        assert_eq!(
            label.resolution,
            Resolution::Unresolved {
                id: 0x7f010000,
                reason: UnresolvedReason::NoTable
            }
        );
    }

    #[test]
    fn references_through_table() {
        let table = TableBuilder::new(0x7f, "com.x")
            .strings(&["X"])
            .types(&["string"])
            .keys(&["app_name"])
            .add_type(TypeBuilder::new(1).string(0, 0, 0))
            .build();
        let arsc = ARSC::new(&table).unwrap();

        let nodes = collect(&manifest().build(), Some(&arsc)).unwrap();
        let label = elements(&nodes)[2].attr("label").unwrap().clone();

        assert_eq!(label.value, "X");
        assert_eq!(label.resolution, Resolution::Resolved { id: 0x7f010000 });
    }

    #[test]
    fn missing_and_cyclic_references() {
        let table = TableBuilder::new(0x7f, "com.x")
            .types(&["string"])
            .keys(&["a", "b"])
            .add_type(
                TypeBuilder::new(1)
                    .reference(1, 0, 0x7f010002)
                    .reference(2, 1, 0x7f010001),
            )
            .build();
        let arsc = ARSC::new(&table).unwrap();

        let xml = XmlBuilder::new()
            .start("application")
            .attr_reference(None, "label", 0, 0x7f010000)
            .attr_reference(None, "icon", 0, 0x7f010001)
            .end()
            .build();

        let nodes = collect(&xml, Some(&arsc)).unwrap();
        let element = elements(&nodes)[0];

        let label = element.attr("label").unwrap();
        assert_eq!(label.value, "@7f010000");
        assert!(matches!(
            label.resolution,
            Resolution::Unresolved { reason: UnresolvedReason::Missing, .. }
        ));

        let icon = element.attr("icon").unwrap();
        assert_eq!(icon.value, "@7f010001");
        assert!(matches!(
            icon.resolution,
            Resolution::Unresolved { reason: UnresolvedReason::Cycle, .. }
        ));
    }

    #[test]
    fn stripped_attribute_names_use_resource_map() {
        let xml = XmlBuilder::new()
            .start("manifest")
            .attr_int(Some(ANDROID_NAMESPACE), "", 0x0101021b, 7)
            .end()
            .build();

        let nodes = collect(&xml, None).unwrap();
        let attr = &elements(&nodes)[0].attributes[0];

        assert_eq!(attr.name, "versionCode");
        assert_eq!(attr.value, "7");
    }

    #[test]
    fn stripped_layout_attribute_name() {
        let xml = XmlBuilder::new()
            .start("activity")
            .attr_hex(Some(ANDROID_NAMESPACE), "", 0x010100f4, 0xffffffff)
            .end()
            .build();

        let nodes = collect(&xml, None).unwrap();
        assert_eq!(elements(&nodes)[0].attributes[0].name, "layout_width");
    }

    #[test]
    fn framework_references_by_name() {
        let xml = XmlBuilder::new()
            .start("application")
            .attr_reference(Some(ANDROID_NAMESPACE), "theme", 0x01010000, 0x01030005)
            .end()
            .build();

        let nodes = collect(&xml, None).unwrap();
        let theme = &elements(&nodes)[0].attributes[0];

        assert_eq!(theme.value, "@android:style/Theme");
        assert!(theme.resolution.is_unresolved());
    }

    #[test]
    fn text_and_comments() {
        let xml = XmlBuilder::new()
            .comment("root element")
            .start("string")
            .text("Hello")
            .end()
            .build();

        let nodes = collect(&xml, None).unwrap();
        let kinds: Vec<&XmlNodeKind> = nodes.iter().map(|n| &n.kind).collect();

        assert_eq!(kinds.len(), 4);
        assert_eq!(kinds[0], &XmlNodeKind::Comment("root element".to_owned()));
        assert!(matches!(kinds[1], XmlNodeKind::StartElement(e) if e.name == "string"));
        assert_eq!(kinds[2], &XmlNodeKind::Text("Hello".to_owned()));
        assert!(matches!(kinds[3], XmlNodeKind::EndElement { name, .. } if name == "string"));
    }

    #[test]
    fn symbolic_values() {
        let xml = XmlBuilder::new()
            .start("activity")
            .attr_int(Some(ANDROID_NAMESPACE), "launchMode", 0x0101001d, 1)
            .attr_hex(Some(ANDROID_NAMESPACE), "configChanges", 0x0101001f, 0x130)
            .end()
            .build();

        let plain: Vec<XmlNode> = AXML::new(&xml)
            .unwrap()
            .into_nodes(DecodeOptions::default())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(elements(&plain)[0].attr("launchMode").unwrap().value, "1");

        let symbolic: Vec<XmlNode> = AXML::new(&xml)
            .unwrap()
            .into_nodes(DecodeOptions {
                symbolic_values: true,
                ..Default::default()
            })
            .collect::<Result<_, _>>()
            .unwrap();
        let activity = elements(&symbolic)[0];
        assert_eq!(activity.attr("launchMode").unwrap().value, "singleTop");
        assert_eq!(
            activity.attr("configChanges").unwrap().value,
            "keyboard|keyboardHidden|screenLayout"
        );
    }

    #[test]
    fn prelude_errors() {
        assert_eq!(AXML::new(&[3, 0, 8]).err(), Some(XmlDecodeError::TooSmall));

        let mut xml = manifest().build();
        xml[0] = 0x02;
        assert_eq!(AXML::new(&xml).err(), Some(XmlDecodeError::BadMagic(0x0002)));

        let mut xml = manifest().build();
        xml[2] = 0x10;
        assert_eq!(AXML::new(&xml).err(), Some(XmlDecodeError::HeaderSize(0x10)));

        let xml = manifest().build();
        assert!(matches!(
            AXML::new(&xml[..xml.len() - 4]).err(),
            Some(XmlDecodeError::TruncatedChunk { chunk: "xml", .. })
        ));

        let xml = XmlBuilder::new().without_string_pool().start("a").end().build();
        assert_eq!(AXML::new(&xml).err(), Some(XmlDecodeError::MissingStringPool));
    }

    #[test]
    fn malformed_nesting() {
        let unclosed = XmlBuilder::new().start("manifest").start("application").end().build();
        let result = collect(&unclosed, None);
        assert!(matches!(result, Err(XmlDecodeError::MalformedNesting(_))));

        let mismatched = XmlBuilder::new()
            .start("manifest")
            .start("application")
            .end_named("manifest")
            .end_named("application")
            .build();
        assert!(matches!(
            collect(&mismatched, None),
            Err(XmlDecodeError::MalformedNesting(_))
        ));

        let stray = XmlBuilder::new().start("manifest").end().end_named("manifest").build();
        assert!(matches!(
            collect(&stray, None),
            Err(XmlDecodeError::MalformedNesting(_))
        ));
    }

    #[test]
    fn iterator_is_fused_after_error() {
        let xml = XmlBuilder::new()
            .start("manifest")
            .end_named("application")
            .start("application")
            .end()
            .build();

        let mut nodes = AXML::decode(&xml, None).unwrap();
        assert!(matches!(nodes.next(), Some(Ok(_))));
        assert!(matches!(nodes.next(), Some(Err(XmlDecodeError::MalformedNesting(_)))));
        assert!(nodes.next().is_none());
        assert!(nodes.next().is_none());
    }

    #[test]
    fn invalid_string_index_and_typed_value() {
        let xml = XmlBuilder::new()
            .start("manifest")
            .attr_raw(None, "package", 0x03, 0x7777)
            .end()
            .build();
        assert!(matches!(
            collect(&xml, None),
            Err(XmlDecodeError::InvalidStringIndex { index: 0x7777, .. })
        ));

        let xml = XmlBuilder::new()
            .start("manifest")
            .attr_raw(None, "package", 0x42, 0)
            .end()
            .build();
        assert_eq!(collect(&xml, None), Err(XmlDecodeError::InvalidTypedValue(0x42)));
    }

    #[test]
    fn foreign_chunks_are_skipped() {
        let xml = XmlBuilder::new()
            .start("manifest")
            .raw_chunk(0x0777, &[0xAB; 12])
            .raw_node_with_header_size(0x0102, 0x18, &[0xCD; 24])
            .end()
            .build();

        let mut nodes = AXML::decode(&xml, None).unwrap();
        let collected: Vec<XmlNode> = nodes.by_ref().collect::<Result<_, _>>().unwrap();

        assert_eq!(collected.len(), 2);
        assert!(nodes.is_tampered());
    }

    #[test]
    fn broken_string_marks_tampered() {
        let clean = manifest().build();
        assert!(!AXML::new(&clean).unwrap().is_tampered);

        let mut xml = clean.clone();
        // first offset of the pool that follows the 8 byte document header
        let offset = 8 + ResStringPoolHeader::SIZE;
        xml[offset..offset + 4].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());

        assert!(AXML::new(&xml).unwrap().is_tampered);
    }

    #[test]
    fn trailing_bytes_after_document() {
        let mut xml = manifest().build();
        xml.extend_from_slice(&[0x01, 0x00, 0x08, 0x00, 0xFF, 0xFF, 0xFF, 0x7F]);

        let nodes = collect(&xml, None).unwrap();
        assert_eq!(elements(&nodes).len(), 3);
    }

    #[test]
    fn abort_flag() {
        let xml = manifest().build();
        let abort = AtomicBool::new(true);

        let mut nodes = AXML::new(&xml).unwrap().into_nodes(DecodeOptions {
            abort: Some(&abort),
            ..Default::default()
        });

        assert_eq!(nodes.next(), Some(Err(XmlDecodeError::Aborted)));
        assert_eq!(nodes.next(), None);
    }
}
