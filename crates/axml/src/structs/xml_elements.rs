use log::debug;
use winnow::binary::{le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;

use crate::structs::{Chunk, ResourceValue};

/// Maps attribute name string index to a framework attribute id
#[derive(Debug, Default)]
pub(crate) struct XmlResourceMap {
    pub(crate) resource_ids: Vec<u32>,
}

impl XmlResourceMap {
    pub(crate) fn parse(chunk: &Chunk<'_>) -> ModalResult<XmlResourceMap> {
        let body = &mut chunk.body();

        if body.len() % 4 != 0 {
            debug!(
                "resource map at offset 0x{:x} has {} trailing bytes",
                chunk.offset,
                body.len() % 4
            );
        }

        let resource_ids = repeat(body.len() / 4, le_u32).parse_next(body)?;

        Ok(XmlResourceMap { resource_ids })
    }

    #[inline]
    pub(crate) fn get(&self, idx: u32) -> Option<u32> {
        self.resource_ids.get(idx as usize).copied()
    }
}

/// Basic XML tree node header
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=606)
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct XmlNodeHeader {
    /// Line number in original source file at which this element appeared
    pub(crate) line_number: u32,

    /// Optional XML comment that was associated with this element
    pub(crate) comment: Option<u32>,
}

impl XmlNodeHeader {
    /// Chunk header (8) + line number (4) + comment (4)
    pub(crate) const SIZE: u16 = 0x10;

    const NO_COMMENT: u32 = u32::MAX;

    #[inline]
    pub(crate) fn parse(chunk: &Chunk<'_>) -> ModalResult<XmlNodeHeader> {
        (le_u32, le_u32)
            .map(|(line_number, comment)| XmlNodeHeader {
                line_number,
                comment: (comment != Self::NO_COMMENT).then_some(comment),
            })
            .parse_next(&mut chunk.header_ext())
    }
}

/// Node payload that follows [`XmlNodeHeader`]
pub(crate) trait XmlParse {
    fn parse(chunk: &Chunk<'_>) -> ModalResult<Self>
    where
        Self: Sized;
}

/// Namespace start/end node
#[derive(Debug)]
pub(crate) struct XmlNamespace {
    /// The prefix of the namespace
    pub(crate) prefix: u32,

    /// The URI of the namespace
    pub(crate) uri: u32,
}

impl XmlParse for XmlNamespace {
    #[inline]
    fn parse(chunk: &Chunk<'_>) -> ModalResult<Self> {
        (le_u32, le_u32)
            .map(|(prefix, uri)| XmlNamespace { prefix, uri })
            .parse_next(&mut chunk.body())
    }
}

#[derive(Debug)]
pub(crate) struct XmlAttributeElement {
    /// Namespace of this attribute
    pub(crate) namespace_uri: u32,

    /// Name of this attribute
    pub(crate) name: u32,

    /// The original raw string value of this attribute
    pub(crate) raw_value: u32,

    /// Processed typed value of this attribute
    pub(crate) typed_value: ResourceValue,
}

impl XmlAttributeElement {
    pub(crate) const DEFAULT_SIZE: u16 = 0x14;

    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<XmlAttributeElement> {
        (le_u32, le_u32, le_u32, ResourceValue::parse)
            .map(
                |(namespace_uri, name, raw_value, typed_value)| XmlAttributeElement {
                    namespace_uri,
                    name,
                    raw_value,
                    typed_value,
                },
            )
            .parse_next(input)
    }
}

#[derive(Debug)]
pub(crate) struct XmlStartElement {
    /// String of the full namespace of this element
    pub(crate) namespace_uri: u32,

    /// String name of this node
    pub(crate) name: u32,

    pub(crate) attributes: Vec<XmlAttributeElement>,
}

impl XmlParse for XmlStartElement {
    fn parse(chunk: &Chunk<'_>) -> ModalResult<Self> {
        let body = chunk.body();
        let input = &mut &body[..];

        let (
            namespace_uri,
            name,
            attribute_start,
            attribute_size,
            attribute_count,
            _id_index,
            _class_index,
            _style_index,
        ) = (
            le_u32, // namespace_uri
            le_u32, // name
            le_u16, // attribute_start
            le_u16, // attribute_size
            le_u16, // attribute_count
            le_u16, // id_index
            le_u16, // class_index
            le_u16, // style_index
        )
            .parse_next(input)?;

        // packers move attributes further or make them wider, never closer or narrower
        if attribute_start != XmlAttributeElement::DEFAULT_SIZE
            || attribute_size != XmlAttributeElement::DEFAULT_SIZE
        {
            debug!(
                "element at offset 0x{:x}: attribute start {}, attribute size {}",
                chunk.offset, attribute_start, attribute_size
            );
        }
        let start = attribute_start.max(XmlAttributeElement::DEFAULT_SIZE) as usize;
        let step = attribute_size.max(XmlAttributeElement::DEFAULT_SIZE) as usize;

        let attributes_data = body.get(start..).unwrap_or_default();
        if attribute_count as usize > attributes_data.len() / step {
            return Err(ErrMode::Incomplete(Needed::Unknown));
        }

        let attributes = attributes_data
            .chunks(step)
            .take(attribute_count as usize)
            .map(|mut data| XmlAttributeElement::parse(&mut data))
            .collect::<ModalResult<Vec<_>>>()?;

        Ok(XmlStartElement {
            namespace_uri,
            name,
            attributes,
        })
    }
}

#[derive(Debug)]
pub(crate) struct XmlEndElement {
    pub(crate) namespace_uri: u32,
    pub(crate) name: u32,
}

impl XmlParse for XmlEndElement {
    #[inline]
    fn parse(chunk: &Chunk<'_>) -> ModalResult<Self> {
        (le_u32, le_u32)
            .map(|(namespace_uri, name)| XmlEndElement {
                namespace_uri,
                name,
            })
            .parse_next(&mut chunk.body())
    }
}

/// CDATA node with the character data
#[derive(Debug)]
pub(crate) struct XmlCData {
    /// The raw CDATA character data
    pub(crate) data: u32,

    /// The typed value of the character data
    pub(crate) typed_data: ResourceValue,
}

impl XmlParse for XmlCData {
    #[inline]
    fn parse(chunk: &Chunk<'_>) -> ModalResult<Self> {
        (le_u32, ResourceValue::parse)
            .map(|(data, typed_data)| XmlCData { data, typed_data })
            .parse_next(&mut chunk.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::ValueType;

    fn node(type_: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&type_.to_le_bytes());
        out.extend_from_slice(&XmlNodeHeader::SIZE.to_le_bytes());
        out.extend_from_slice(&(XmlNodeHeader::SIZE as u32 + body.len() as u32).to_le_bytes());
        out.extend_from_slice(&7u32.to_le_bytes());
        out.extend_from_slice(&u32::MAX.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn start_element(attribute_start: u16, attribute_size: u16, count: u16, attrs: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&u32::MAX.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
        for field in [attribute_start, attribute_size, count, 0, 0, 0] {
            body.extend_from_slice(&field.to_le_bytes());
        }
        body.resize(attribute_start as usize, 0xAA);
        body.extend_from_slice(attrs);
        node(0x0102, &body)
    }

    fn attribute(name: u32, data_type: u8, data: u32, padding: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&u32::MAX.to_le_bytes());
        out.extend_from_slice(&name.to_le_bytes());
        out.extend_from_slice(&u32::MAX.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.push(0);
        out.push(data_type);
        out.extend_from_slice(&data.to_le_bytes());
        out.extend(std::iter::repeat_n(0xBB, padding));
        out
    }

    #[test]
    fn node_header_comment() {
        let bytes = node(0x0103, &[0xFF; 8]);
        let chunk = Chunk::read(&bytes, 0).unwrap();

        let header = XmlNodeHeader::parse(&chunk).unwrap();
        assert_eq!(header.line_number, 7);
        assert_eq!(header.comment, None);
    }

    #[test]
    fn start_element_default_layout() {
        let mut attrs = attribute(2, 0x10, 21, 0);
        attrs.extend(attribute(3, 0x12, 1, 0));

        let bytes = start_element(0x14, 0x14, 2, &attrs);
        let chunk = Chunk::read(&bytes, 0).unwrap();
        let element = XmlStartElement::parse(&chunk).unwrap();

        assert_eq!(element.name, 1);
        assert_eq!(element.attributes.len(), 2);
        assert_eq!(element.attributes[0].name, 2);
        assert_eq!(element.attributes[0].typed_value.data_type, ValueType::Dec);
        assert_eq!(element.attributes[1].typed_value.data, 1);
    }

    #[test]
    fn start_element_moved_and_wide_attributes() {
        let mut attrs = attribute(2, 0x10, 21, 4);
        attrs.extend(attribute(3, 0x10, 22, 4));

        let bytes = start_element(0x20, 0x18, 2, &attrs);
        let chunk = Chunk::read(&bytes, 0).unwrap();
        let element = XmlStartElement::parse(&chunk).unwrap();

        assert_eq!(element.attributes[0].typed_value.data, 21);
        assert_eq!(element.attributes[1].name, 3);
        assert_eq!(element.attributes[1].typed_value.data, 22);
    }

    #[test]
    fn lying_attribute_count() {
        let attrs = attribute(2, 0x10, 21, 0);

        let bytes = start_element(0x14, 0x14, 0xFFFF, &attrs);
        let chunk = Chunk::read(&bytes, 0).unwrap();

        assert!(XmlStartElement::parse(&chunk).is_err());
    }
}
