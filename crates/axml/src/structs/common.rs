use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::prelude::*;

use crate::structs::StringPool;
use crate::structs::system_types::get_resource_name;

/// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=237
#[derive(Debug, PartialEq, Default, Eq, PartialOrd, Ord, Clone, Copy)]
pub(crate) enum ResourceType {
    #[default]
    Null,
    StringPool,
    Table,
    Xml,

    // Chunk types in XmlType
    XmlStartNamespace,
    XmlEndNamespace,
    XmlStartElement,
    XmlEndElement,
    XmlCdata,
    XmlResourceMap,

    // Chunk types in TableType
    TablePackage,
    TableType,
    TableTypeSpec,
    TableLibrary,
    TableOverlayable,
    TableOverlayablePolicy,
    TableStagedAlias,

    Unknown(u16),
}

impl ResourceType {
    /// Node chunks occupy `0x0100..=0x017f`
    #[inline]
    pub(crate) fn is_xml_node(raw: u16) -> bool {
        (0x0100..=0x017f).contains(&raw)
    }
}

impl From<u16> for ResourceType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => ResourceType::Null,
            0x0001 => ResourceType::StringPool,
            0x0002 => ResourceType::Table,
            0x0003 => ResourceType::Xml,
            0x0100 => ResourceType::XmlStartNamespace,
            0x0101 => ResourceType::XmlEndNamespace,
            0x0102 => ResourceType::XmlStartElement,
            0x0103 => ResourceType::XmlEndElement,
            0x0104 => ResourceType::XmlCdata,
            0x0180 => ResourceType::XmlResourceMap,
            0x0200 => ResourceType::TablePackage,
            0x0201 => ResourceType::TableType,
            0x0202 => ResourceType::TableTypeSpec,
            0x0203 => ResourceType::TableLibrary,
            0x0204 => ResourceType::TableOverlayable,
            0x0205 => ResourceType::TableOverlayablePolicy,
            0x0206 => ResourceType::TableStagedAlias,
            other => ResourceType::Unknown(other),
        }
    }
}

/// Header that appears at the front of every data chunk in a resource
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=220
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ResChunkHeader {
    /// Type identifier for this chunk. The meaning of this value depends on the containing chunk.
    pub(crate) type_: ResourceType,

    /// Raw type value, kept for error messages and unknown chunks
    pub(crate) raw_type: u16,

    /// Size of the chunk header (in bytes). Adding this value to
    /// the address of the chunk allows you to find its associated data.
    pub(crate) header_size: u16,

    /// Total size of this chunk (in bytes), including header and any child chunks.
    /// Adding this value to the chunk allows you to completely skip its contents.
    pub(crate) size: u32,
}

impl ResChunkHeader {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<ResChunkHeader> {
        (le_u16, le_u16, le_u32)
            .map(|(raw_type, header_size, size)| ResChunkHeader {
                type_: ResourceType::from(raw_type),
                raw_type,
                header_size,
                size,
            })
            .parse_next(input)
    }

    /// Get the size of this structure in bytes
    #[inline(always)]
    pub const fn size_of() -> usize {
        // 2 bytes - ResourceTypes
        // 2 bytes - header_size
        // 4 bytes - size
        2 + 2 + 4
    }
}

/// Type of the data value
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValueType {
    /// The `data` is either 0 or 1, specifying this resource is either undefined or empty, respectively.
    Null,

    /// The `data` holds a ResTable_ref, a reference to another resource table entry.
    Reference,

    /// The `data` holds an attribute resource identifier.
    Attribute,

    /// The `data` holds an index into the containing resource table's global value string pool.
    String,

    /// The `data` holds a single-precision floating point number.
    Float,

    /// The `data` holds a complex number encoding a dimension value, such as "100in".
    Dimension,

    /// The `data` holds a complex number encoding a fraction of a container.
    Fraction,

    /// The `data` holds a dynamic ResTable_ref, which needs to be resolved
    /// before it can be used like a `Reference`.
    DynamicReference,

    /// The `data` holds an attribute resource identifier, which needs to be
    /// resolved before it can be used like an `Attribute`.
    DynamicAttribute,

    /// The `data` is a raw integer value of the form n..n.
    Dec,

    /// The `data` is a raw integer value of the form 0xn..n.
    Hex,

    /// The `data` is either 0 or 1, for input "false" or "true" respectively.
    Boolean,

    /// The `data` is a raw integer value of the form #aarrggbb.
    ColorArgb8,

    /// The `data` is a raw integer value of the form #rrggbb.
    ColorRgb8,

    /// The `data` is a raw integer value of the form #argb.
    ColorArgb4,

    /// The `data` is a raw integer value of the form #rgb.
    ColorRgb4,

    Unknown(u8),
}

impl From<u8> for ValueType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ValueType::Null,
            0x01 => ValueType::Reference,
            0x02 => ValueType::Attribute,
            0x03 => ValueType::String,
            0x04 => ValueType::Float,
            0x05 => ValueType::Dimension,
            0x06 => ValueType::Fraction,
            0x07 => ValueType::DynamicReference,
            0x08 => ValueType::DynamicAttribute,
            0x10 => ValueType::Dec,
            0x11 => ValueType::Hex,
            0x12 => ValueType::Boolean,
            0x1c => ValueType::ColorArgb8,
            0x1d => ValueType::ColorRgb8,
            0x1e => ValueType::ColorArgb4,
            0x1f => ValueType::ColorRgb4,
            v => ValueType::Unknown(v),
        }
    }
}

impl From<ValueType> for u8 {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::Null => 0x00,
            ValueType::Reference => 0x01,
            ValueType::Attribute => 0x02,
            ValueType::String => 0x03,
            ValueType::Float => 0x04,
            ValueType::Dimension => 0x05,
            ValueType::Fraction => 0x06,
            ValueType::DynamicReference => 0x07,
            ValueType::DynamicAttribute => 0x08,
            ValueType::Dec => 0x10,
            ValueType::Hex => 0x11,
            ValueType::Boolean => 0x12,
            ValueType::ColorArgb8 => 0x1c,
            ValueType::ColorRgb8 => 0x1d,
            ValueType::ColorArgb4 => 0x1e,
            ValueType::ColorRgb4 => 0x1f,
            ValueType::Unknown(v) => v,
        }
    }
}

/// Why a typed value couldn't be turned into text
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ValueError {
    InvalidStringIndex { index: u32, count: usize },
    InvalidTypedValue(u8),
}

/// Representation of a value in a resource, supplying type information
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ResourceValue {
    /// Type of the data value
    pub data_type: ValueType,

    /// Data itself
    pub data: u32,
}

impl ResourceValue {
    // mantissa is not shifted down, so every multiplier carries an extra 1/256
    const RADIX_MULTS: [f64; 4] = [
        1.0 / 256.0,
        1.0 / 32768.0,
        1.0 / 8388608.0,
        1.0 / 2147483648.0,
    ];
    const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
    const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
    const COMPLEX_UNIT_MASK: u32 = 0x0F;

    /// Size in bytes of the serialized `Res_value`
    pub(crate) const SIZE: usize = 8;

    /// Parse `Res_value`, the `size` and `res0` fields are ignored
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResourceValue> {
        (le_u16, le_u8, le_u8, le_u32)
            .map(|(_, _, data_type, data)| ResourceValue {
                data_type: ValueType::from(data_type),
                data,
            })
            .parse_next(input)
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(
            self.data_type,
            ValueType::Reference | ValueType::DynamicReference
        )
    }

    /// Render value as text, references are left as `@XXXXXXXX` placeholders
    pub(crate) fn to_string(&self, string_pool: &StringPool) -> Result<String, ValueError> {
        let value = match self.data_type {
            ValueType::Null => String::new(),
            ValueType::Reference | ValueType::DynamicReference => {
                Self::fmt_reference('@', self.data)
            }
            ValueType::Attribute | ValueType::DynamicAttribute => {
                Self::fmt_reference('?', self.data)
            }
            ValueType::String => string_pool
                .get(self.data)
                .map(str::to_owned)
                .ok_or(ValueError::InvalidStringIndex {
                    index: self.data,
                    count: string_pool.len(),
                })?,
            ValueType::Float => f32::from_bits(self.data).to_string(),
            ValueType::Dimension => {
                let idx = (self.data & Self::COMPLEX_UNIT_MASK) as usize;
                let unit = Self::DIMENSION_UNITS.get(idx).unwrap_or(&"");
                format!("{}{}", self.complex_to_float(), unit)
            }
            ValueType::Fraction => {
                let idx = (self.data & Self::COMPLEX_UNIT_MASK) as usize;
                let unit = Self::FRACTION_UNITS.get(idx).unwrap_or(&"");
                format!("{}{}", self.complex_to_float() * 100f64, unit)
            }
            ValueType::Dec => (self.data as i32).to_string(),
            ValueType::Hex => format!("0x{:08x}", self.data),
            ValueType::Boolean => {
                if self.data == 0 {
                    "false".to_owned()
                } else {
                    "true".to_owned()
                }
            }
            ValueType::ColorArgb8
            | ValueType::ColorRgb8
            | ValueType::ColorArgb4
            | ValueType::ColorRgb4 => format!("#{:08x}", self.data),
            ValueType::Unknown(v) => return Err(ValueError::InvalidTypedValue(v)),
        };

        Ok(value)
    }

    /// Mantissa is the signed top 24 bits, radix selects the fixed point position
    #[inline(always)]
    pub(crate) fn complex_to_float(&self) -> f64 {
        ((self.data & 0xFFFFFF00) as i32 as f64) * Self::RADIX_MULTS[((self.data >> 4) & 3) as usize]
    }

    /// `@XXXXXXXX` or `@null`, public framework ids by name: `@android:style/Theme`,
    /// other framework ids as `@android:XXXXXXXX`
    pub fn fmt_reference(prefix: char, id: u32) -> String {
        if id == 0 && prefix == '@' {
            return "@null".to_owned();
        }

        if id >> 24 != 1 {
            return format!("{}{:08x}", prefix, id);
        }

        match get_resource_name(id) {
            Some((type_, name)) => format!("{}android:{}/{}", prefix, type_, name),
            None => format!("{}android:{:08x}", prefix, id),
        }
    }
}
